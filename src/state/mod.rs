//! Interactive session state.
//!
//! [`Session`] is the state machine the event loop drives; [`types`] holds
//! the small value types it exposes to the event handlers and the UI.

pub mod session;
pub mod types;

pub use session::{Session, SessionHandle, new_session};
pub use types::{
    ChannelStatus, InputMode, NOTICE_TTL, Notice, NoticeLevel, PlatformPicker, SessionState,
    VersionRow,
};
