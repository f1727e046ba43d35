// FileNoteStore tests: draft naming, front-matter contents, collision
// handling. Uses a throwaway directory per test.

use voxnote::notes::{FileNoteStore, NoteSink};

#[tokio::test]
async fn test_draft_filename_comes_from_title() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileNoteStore::new(dir.path()).unwrap();

    let summary = store
        .create_note(
            Some("Grocery List: Week 2!".to_string()),
            Some("milk\neggs".to_string()),
        )
        .await
        .unwrap();

    assert!(summary.contains("grocery-list-week-2.md"), "got: {summary}");
    let draft = std::fs::read_to_string(dir.path().join("grocery-list-week-2.md")).unwrap();
    assert!(draft.contains("title: Grocery List: Week 2!"));
    assert!(draft.contains("source: voice-session"));
    assert!(draft.ends_with("milk\neggs\n"));
}

#[tokio::test]
async fn test_untitled_draft_gets_timestamped_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileNoteStore::new(dir.path()).unwrap();

    store
        .create_note(None, Some("remember the milk".to_string()))
        .await
        .unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("voice-note-"), "got: {}", entries[0]);
    assert!(entries[0].ends_with(".md"));
}

#[tokio::test]
async fn test_title_collision_produces_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileNoteStore::new(dir.path()).unwrap();

    store
        .create_note(Some("Ideas".to_string()), Some("first".to_string()))
        .await
        .unwrap();
    store
        .create_note(Some("Ideas".to_string()), Some("second".to_string()))
        .await
        .unwrap();

    let count = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(count, 2, "second draft must not overwrite the first");
}

#[tokio::test]
async fn test_missing_content_still_writes_a_draft() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileNoteStore::new(dir.path()).unwrap();

    store.create_note(Some("Empty".to_string()), None).await.unwrap();

    let draft = std::fs::read_to_string(dir.path().join("empty.md")).unwrap();
    assert!(draft.starts_with("---\ntitle: Empty\n"));
}
