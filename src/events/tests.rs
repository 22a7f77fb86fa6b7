//! Tests for keyboard dispatch.

use std::sync::Arc;

use crossterm::event::{Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use super::handle_event;
use crate::index::test_support::record;
use crate::index::{
    FreshnessToken, IndexSnapshot, QuerySpec, RefreshCompletion, RefreshOutcome, RefreshRequest,
    SnapshotId,
};
use crate::state::{InputMode, Session, SessionHandle, SessionState, new_session};

/// Session in `Browsing` over `names` (version 1.0 each) plus its request receiver.
fn browsing(names: &[&str]) -> (Session, mpsc::UnboundedReceiver<RefreshRequest>) {
    let channel = crate::index::test_support::test_channel();
    let SessionHandle {
        mut session,
        mut requests,
        ..
    } = new_session(vec![channel.clone()], QuerySpec::new("", 50));
    session.start();
    let request = requests.try_recv().expect("initial request");
    let snapshot = IndexSnapshot {
        id: SnapshotId::next(),
        channel: channel.clone(),
        records: names.iter().map(|n| Arc::new(record(n, "1.0"))).collect(),
        freshness: FreshnessToken::default(),
        fetched_at: 0,
        skipped: 0,
    };
    session.apply_refresh(RefreshCompletion {
        channel,
        generation: request.generation,
        outcome: RefreshOutcome::Updated(Arc::new(snapshot)),
    });
    (session, requests)
}

fn key(code: KeyCode) -> CEvent {
    CEvent::Key(KeyEvent::new(code, KeyModifiers::empty()))
}

fn ctrl(c: char) -> CEvent {
    CEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
}

#[test]
/// What: `/` enters filter mode where `q` is text; `Enter` returns to navigation.
///
/// - Input: `/`, `q`, `t`, `Enter`, `q`
/// - Output: Filter `qt`, then quit on the second `q`
fn filter_mode_captures_q() {
    let (mut session, _requests) = browsing(&["qt", "numpy"]);
    assert!(!handle_event(&key(KeyCode::Char('/')), &mut session));
    assert_eq!(session.input_mode(), InputMode::Filter);
    assert!(!handle_event(&key(KeyCode::Char('q')), &mut session));
    assert!(!handle_event(&key(KeyCode::Char('t')), &mut session));
    assert_eq!(session.filter_text(), "qt");
    assert_eq!(session.page().total, 1);
    assert!(!handle_event(&key(KeyCode::Enter), &mut session));
    assert_eq!(session.input_mode(), InputMode::Normal);
    assert!(handle_event(&key(KeyCode::Char('q')), &mut session));
    assert_eq!(session.state(), &SessionState::Shutdown);
}

#[test]
/// What: Navigation keys move the selection and open and close the detail view.
fn navigation_and_detail() {
    let (mut session, _requests) = browsing(&["a", "b", "c"]);
    handle_event(&key(KeyCode::Char('j')), &mut session);
    handle_event(&key(KeyCode::Down), &mut session);
    assert_eq!(session.selected(), 2);
    handle_event(&key(KeyCode::Char('k')), &mut session);
    assert_eq!(session.selected(), 1);
    handle_event(&key(KeyCode::Char('G')), &mut session);
    assert_eq!(session.selected(), 2);
    handle_event(&key(KeyCode::Char('g')), &mut session);
    assert_eq!(session.selected(), 0);

    handle_event(&key(KeyCode::Enter), &mut session);
    assert!(matches!(session.state(), SessionState::Detail(r) if r.name == "a"));
    handle_event(&key(KeyCode::Char('j')), &mut session);
    assert_eq!(session.selected(), 0);
    handle_event(&key(KeyCode::Esc), &mut session);
    assert_eq!(session.state(), &SessionState::Browsing);
}

#[test]
/// What: `r` issues a refresh and `Esc` in normal mode clears the filter.
fn refresh_and_clear_filter() {
    let (mut session, mut requests) = browsing(&["a", "b"]);
    handle_event(&key(KeyCode::Char('r')), &mut session);
    assert_eq!(session.state(), &SessionState::Refreshing);
    assert!(requests.try_recv().is_ok());
    assert!(session.notice().is_some());

    session.set_filter("a");
    assert_eq!(session.page().total, 1);
    handle_event(&key(KeyCode::Esc), &mut session);
    assert_eq!(session.filter_text(), "");
    assert_eq!(session.page().total, 2);
}

#[test]
/// What: `Ctrl-C` quits from filter mode and from the detail view.
fn ctrl_c_always_quits() {
    let (mut session, _requests) = browsing(&["a"]);
    session.set_input_mode(InputMode::Filter);
    assert!(handle_event(&ctrl('c'), &mut session));

    let (mut session, _requests) = browsing(&["a"]);
    session.open_detail();
    assert!(handle_event(&ctrl('c'), &mut session));
}

#[test]
/// What: Key releases and non-key events are ignored.
fn releases_and_resizes_are_ignored() {
    let (mut session, _requests) = browsing(&["a", "b"]);
    let mut release = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::empty());
    release.kind = KeyEventKind::Release;
    assert!(!handle_event(&CEvent::Key(release), &mut session));
    assert!(!handle_event(&CEvent::Resize(80, 24), &mut session));
    assert_eq!(session.state(), &SessionState::Browsing);
}

#[test]
/// What: Filter editing supports backspace and `Ctrl-U`.
fn filter_editing_keys() {
    let (mut session, _requests) = browsing(&["abc", "abd"]);
    handle_event(&key(KeyCode::Char('f')), &mut session);
    for c in ['a', 'b', 'c'] {
        handle_event(&key(KeyCode::Char(c)), &mut session);
    }
    assert_eq!(session.page().total, 1);
    handle_event(&key(KeyCode::Backspace), &mut session);
    assert_eq!(session.page().total, 2);
    handle_event(&ctrl('u'), &mut session);
    assert_eq!(session.filter_text(), "");
    assert_eq!(session.input_mode(), InputMode::Filter);
}

#[test]
/// What: `p` opens the platform selector, whose keys stay inside it until `Esc`.
///
/// - Input: `p`, `a`, `Space`, `j`, `Esc`
/// - Output: `Platforms` mode while open, selection unchanged after `Esc`
fn platform_selector_keys() {
    let (mut session, mut requests) = browsing(&["a"]);
    handle_event(&key(KeyCode::Char('p')), &mut session);
    assert_eq!(session.input_mode(), InputMode::Platforms);
    assert!(session.picker().is_some());
    handle_event(&key(KeyCode::Char('a')), &mut session);
    handle_event(&key(KeyCode::Char(' ')), &mut session);
    handle_event(&key(KeyCode::Char('j')), &mut session);
    handle_event(&key(KeyCode::Esc), &mut session);
    assert_eq!(session.input_mode(), InputMode::Normal);
    assert!(session.picker().is_none());
    assert_eq!(session.platforms(), vec!["linux-64"]);
    assert!(requests.try_recv().is_err());
}

#[test]
/// What: `c` opens the channel editor where `q` is text; `Esc` abandons the edit.
fn channel_editor_keys() {
    let (mut session, mut requests) = browsing(&["a"]);
    handle_event(&key(KeyCode::Char('c')), &mut session);
    assert_eq!(session.input_mode(), InputMode::Channel);
    handle_event(&ctrl('u'), &mut session);
    assert_eq!(session.channel_draft(), "");
    for c in ['q', 'x'] {
        assert!(!handle_event(&key(KeyCode::Char(c)), &mut session));
    }
    handle_event(&key(KeyCode::Backspace), &mut session);
    assert_eq!(session.channel_draft(), "q");
    handle_event(&key(KeyCode::Esc), &mut session);
    assert_eq!(session.input_mode(), InputMode::Normal);
    assert_eq!(session.state(), &SessionState::Browsing);
    assert!(requests.try_recv().is_err());

    handle_event(&key(KeyCode::Char('c')), &mut session);
    handle_event(&ctrl('u'), &mut session);
    for c in "other".chars() {
        handle_event(&key(KeyCode::Char(c)), &mut session);
    }
    handle_event(&key(KeyCode::Enter), &mut session);
    assert_eq!(session.input_mode(), InputMode::Normal);
    let request = requests.try_recv().expect("switch request");
    assert_eq!(request.channel.base_url(), "https://conda.anaconda.org/other");
}

#[test]
/// What: In the detail view `Enter` folds sections instead of closing, `d` asks for a download.
fn detail_version_keys() {
    let (mut session, _requests) = browsing(&["a", "b"]);
    handle_event(&key(KeyCode::Char('b')), &mut session);
    handle_event(&key(KeyCode::Enter), &mut session);
    assert!(matches!(session.state(), SessionState::Detail(_)));
    assert_eq!(session.version_cursor(), 1);
    handle_event(&key(KeyCode::Char('k')), &mut session);
    assert_eq!(session.version_cursor(), 0);
    handle_event(&key(KeyCode::Enter), &mut session);
    assert!(matches!(session.state(), SessionState::Detail(_)));
    assert_eq!(session.version_rows().len(), 1);
    handle_event(&key(KeyCode::Enter), &mut session);
    handle_event(&key(KeyCode::Char('j')), &mut session);
    handle_event(&key(KeyCode::Char('d')), &mut session);
    assert_eq!(
        session.notice().map(|n| n.text.as_str()),
        Some("downloads are unavailable")
    );
    handle_event(&key(KeyCode::Esc), &mut session);
    assert_eq!(session.state(), &SessionState::Browsing);
}
