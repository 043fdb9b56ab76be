use std::sync::Arc;
use std::time::{Duration, Instant};

use marksync::layout::estimate_blocks;
use marksync::prelude::*;

const DOC: &str = "# Guide\n\nIntro paragraph.\n\n```sh\ncargo run\ncargo test\n```\n\n## Next\n\nMore text here.\n";

fn preview(clock: &Arc<ManualClock>, mode: SyncMode) -> Preview {
    let config = PreviewConfig {
        sync: mode,
        ..PreviewConfig::default()
    };
    Preview::new(
        config,
        Session::open(
            SessionStore::in_memory(),
            SessionState::from_config(&config),
            config.font_size,
        ),
        Arc::clone(clock) as Arc<dyn Clock>,
        Box::new(ThreadLoader::new()),
    )
}

fn wait_while_loading(preview: &mut Preview) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while preview.current_state() == PanelState::FileLoading && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
        preview.poll();
    }
}

#[test]
fn test_open_real_file_and_sync_both_ways() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guide.md");
    std::fs::write(&path, DOC).unwrap();

    let clock = Arc::new(ManualClock::new(0));
    let mut preview = preview(&clock, SyncMode::Bidirectional);
    preview.toggle();
    assert_eq!(preview.current_state(), PanelState::Empty);
    preview.open_file(&path);
    wait_while_loading(&mut preview);
    assert_eq!(preview.current_state(), PanelState::Viewing);
    assert_eq!(preview.source(), Some(DOC));
    assert_eq!(preview.session().last_file_path(), Some(path.as_path()));

    let text = preview.source().unwrap().to_owned();
    preview.on_layout(estimate_blocks(&text, 80));
    let table = preview.mapping();
    assert!(table.repairs().is_empty());

    // Line 6 is inside the code block, which anchors to its top.
    let code_top = table.source_line_to_offset(5);
    assert_eq!(table.source_line_to_offset(6), code_top);

    preview.on_source_scroll(6);
    clock.advance(50);
    let commands = preview.poll();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].target, View::Preview);
    assert_eq!(commands[0].position(), code_top);

    // Arrival report is swallowed.
    clock.advance(5);
    assert!(preview.on_preview_scroll(code_top).is_empty());
    clock.advance(500);
    assert!(preview.poll().is_empty());
    assert_eq!(preview.current_state(), PanelState::Viewing);

    // The user scrolls the preview to the last block.
    let last = table.blocks().last().unwrap().clone();
    preview.on_preview_scroll(last.offset_start);
    clock.advance(50);
    let commands = preview.poll();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].target, View::Source);
    assert_eq!(commands[0].position(), last.source_start);
}

#[test]
fn test_missing_file_surfaces_error_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("later.md");

    let clock = Arc::new(ManualClock::new(0));
    let mut preview = preview(&clock, SyncMode::SourceDriven);
    preview.open(Some(path.clone()));
    wait_while_loading(&mut preview);
    assert_eq!(preview.current_state(), PanelState::FileError);
    assert!(matches!(
        preview.error(),
        Some(PreviewError::FileNotFound { .. })
    ));

    std::fs::write(&path, "# Now it exists\n").unwrap();
    preview.retry();
    wait_while_loading(&mut preview);
    assert_eq!(preview.current_state(), PanelState::Viewing);
    assert_eq!(preview.source(), Some("# Now it exists\n"));
}
