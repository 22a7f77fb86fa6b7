//! Rendering checks using ratatui's `TestBackend`.
//!
//! These drive a real session into each state and look for the text a user
//! would see; they do not pin exact layout.

mod common;

use pixi_browse::index::{JobCompletion, RefreshOutcome};
use pixi_browse::state::{InputMode, Session};
use pixi_browse::ui;
use ratatui::{Terminal, backend::TestBackend};

use common::{channel, complete, snapshot, started};

/// Render `session` into a 120x32 buffer and return its text, one line per row.
fn render_text(session: &Session) -> String {
    let mut terminal = Terminal::new(TestBackend::new(120, 32)).expect("failed to create test terminal");
    terminal
        .draw(|f| ui::render(f, session))
        .expect("failed to draw test terminal");
    let buf = terminal.backend().buffer();
    let mut out = String::new();
    for y in 0..buf.area.height {
        for x in 0..buf.area.width {
            out.push_str(buf[(x, y)].symbol());
        }
        out.push('\n');
    }
    out
}

/// Session browsing numpy (two versions) and scipy.
fn browsing() -> Session {
    let forge = channel("linux-64");
    let (mut session, _requests, initial) = started(vec![forge.clone()], "", 50);
    session.apply_refresh(complete(
        &initial[0],
        RefreshOutcome::Updated(snapshot(
            &forge,
            &[
                ("numpy", "1.26.0", "py312_0"),
                ("numpy", "1.25.0", "py311_0"),
                ("scipy", "1.11.0", "py312_0"),
            ],
        )),
    ));
    session
}

#[test]
/// What: Before any snapshot the loading view lists the pending channel.
fn renders_loading_view() {
    let (session, _requests, _initial) = started(vec![channel("noarch")], "", 50);
    let text = render_text(&session);
    assert!(text.contains("Loading channel indexes"));
    assert!(text.contains("forge/noarch"));
    assert!(text.contains("loading"));
}

#[test]
/// What: The result list shows every record with version, build and platform.
fn renders_results_and_status() {
    let session = browsing();
    let text = render_text(&session);
    assert!(text.contains("Results 3"));
    assert!(text.contains("numpy"));
    assert!(text.contains("1.26.0"));
    assert!(text.contains("py311_0"));
    assert!(text.contains("scipy"));
    assert!(text.contains("browsing"));
    assert!(text.contains("forge/linux-64 3"));
}

#[test]
/// What: A malformed filter is shown next to the input while the old page stays.
fn renders_query_error_inline() {
    let mut session = browsing();
    session.set_input_mode(InputMode::Filter);
    session.set_filter("arch:x86");
    let text = render_text(&session);
    assert!(text.contains("unknown filter field 'arch'"));
    assert!(text.contains("scipy"));
}

#[test]
/// What: The detail view lists the record's fields and its other versions.
fn renders_detail_view() {
    let mut session = browsing();
    assert!(session.open_detail());
    let text = render_text(&session);
    assert!(text.contains("Build number"));
    assert!(text.contains("python >=3.9"));
    assert!(text.contains("Versions"));
    assert!(text.contains("linux-64 (2)"));
    assert!(text.contains("1.25.0"));
    assert!(text.contains("2.0 KiB"));
}

#[test]
/// What: With every channel failed the error view shows the reasons and how to retry.
fn renders_error_view() {
    let forge = channel("linux-64");
    let (mut session, _requests, initial) = started(vec![forge], "", 50);
    session.apply_refresh(complete(
        &initial[0],
        RefreshOutcome::Failed("forge/linux-64: HTTP 403".into()),
    ));
    let text = render_text(&session);
    assert!(text.contains("No channel index could be loaded."));
    assert!(text.contains("forge/linux-64: HTTP 403"));
    assert!(text.contains("Press r to retry"));
}

#[test]
/// What: Tiny terminals render without panicking.
fn renders_in_tiny_terminal() {
    let session = browsing();
    let mut terminal = Terminal::new(TestBackend::new(10, 4)).expect("failed to create test terminal");
    terminal
        .draw(|f| ui::render(f, &session))
        .expect("failed to draw test terminal");
}

#[test]
/// What: The platform selector replaces the result list and ticks the selected subdirs.
fn renders_platform_selector() {
    let mut session = browsing();
    session.open_platform_picker();
    session.apply_job(JobCompletion::Platforms {
        base_urls: session.base_urls(),
        platforms: vec!["osx-arm64".into(), "noarch".into()],
    });
    let text = render_text(&session);
    assert!(text.contains("Platforms 1/3"));
    assert!(text.contains("✓ linux-64"));
    assert!(text.contains("osx-arm64"));
    assert!(!text.contains("Results 3"));
}

#[test]
/// What: The channel editor takes over the input line.
fn renders_channel_editor() {
    let mut session = browsing();
    session.open_channel_edit();
    let text = render_text(&session);
    assert!(text.contains(" Channel "));
    assert!(text.contains("> https://conda.example.org/forge"));
    assert!(text.contains("Enter switch"));
}

#[test]
/// What: A folded platform section hides its versions behind a closed marker.
fn renders_folded_version_section() {
    let mut session = browsing();
    assert!(session.open_detail());
    assert!(render_text(&session).contains("▾ linux-64 (2)"));
    session.move_version_cursor(-10);
    session.activate_version_row();
    let text = render_text(&session);
    assert!(text.contains("▸ linux-64 (2)"));
    assert!(!text.contains("▾"));
}
