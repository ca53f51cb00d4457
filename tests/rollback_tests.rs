use cword::error::{CwordError, FileError, HistoryError};
use cword::history::{Operation, OperationKind, Recorded, CHANGELOG_FILE};
use cword::Workspace;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn workspace() -> (TempDir, Workspace) {
    let dir = tempdir().unwrap();
    let ws = Workspace::new(dir.path(), dir.path().join(".cword")).expect("workspace");
    (dir, ws)
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

fn kinds(ws: &Workspace, name: &str) -> Vec<OperationKind> {
    ws.history(name)
        .unwrap()
        .iter()
        .map(|entry| entry.kind())
        .collect()
}

#[test]
fn test_notes_scenario() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("notes.txt"), "a\nb\nc\n").unwrap();

    ws.append_lines("notes.txt", &["d\n"]).unwrap();
    assert_eq!(read(dir.path(), "notes.txt"), "a\nb\nc\nd\n");
    assert_eq!(kinds(&ws, "notes.txt"), vec![OperationKind::Append]);

    let outcome = ws.rollback("notes.txt").unwrap();
    assert_eq!(outcome.entry.operation, Operation::Append { lines: 1 });
    assert_eq!(read(dir.path(), "notes.txt"), "a\nb\nc\n");
    assert!(ws.history("notes.txt").unwrap().is_empty());
}

#[test]
fn test_insert_round_trip() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("a.txt"), "1\n2\n3\n").unwrap();

    ws.insert_line("a.txt", 2, "new").unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "1\nnew\n2\n3\n");

    let outcome = ws.rollback("a.txt").unwrap();
    assert_eq!(outcome.message, "INSERT operation rolled back\nLine 2 was deleted");
    assert_eq!(read(dir.path(), "a.txt"), "1\n2\n3\n");
}

#[test]
fn test_insert_after_last_line_appends() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("a.txt"), "1\n2\n").unwrap();

    ws.insert_line("a.txt", 3, "3").unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "1\n2\n3\n");
    assert!(ws.insert_line("a.txt", 5, "x").is_err());

    ws.rollback("a.txt").unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "1\n2\n");
}

#[test]
fn test_delete_round_trip_with_sanitized_content() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("a.txt"), "first\nlast\n").unwrap();

    ws.insert_line("a.txt", 2, "p||q::r").unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "first\npqr\nlast\n");

    ws.delete_line("a.txt", 2).unwrap();
    let last = ws.history("a.txt").unwrap().pop().unwrap();
    assert_eq!(last.operation, Operation::delete(2, "pqr"));

    ws.rollback("a.txt").unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "first\npqr\nlast\n");
}

#[test]
fn test_delete_of_last_line_round_trip() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("a.txt"), "1\n2\n").unwrap();

    ws.delete_line("a.txt", 2).unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "1\n");
    ws.rollback("a.txt").unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "1\n2\n");
}

#[test]
fn test_create_round_trip() {
    let (dir, ws) = workspace();
    ws.create_file("fresh.txt").unwrap();
    assert!(dir.path().join("fresh.txt").is_file());

    let outcome = ws.rollback("fresh.txt").unwrap();
    assert_eq!(outcome.entry.kind(), OperationKind::Created);
    assert!(!dir.path().join("fresh.txt").exists());
    assert!(ws.history("fresh.txt").unwrap().is_empty());
}

#[test]
fn test_whole_file_delete_round_trip_removes_snapshot() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("notes.txt"), "keep\nthis\n").unwrap();

    ws.delete_file("notes.txt").unwrap();
    assert!(!dir.path().join("notes.txt").exists());
    let history_dir = dir.path().join(".cword").join("notes.txt");
    assert_eq!(fs::read_dir(&history_dir).unwrap().count(), 2);

    let outcome = ws.rollback("notes.txt").unwrap();
    assert_eq!(outcome.entry.kind(), OperationKind::Deleted);
    assert_eq!(read(dir.path(), "notes.txt"), "keep\nthis\n");

    let remaining: Vec<String> = fs::read_dir(&history_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(remaining, vec![CHANGELOG_FILE.to_string()]);
}

#[test]
fn test_lifo_three_steps() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("a.txt"), "x\ny\n").unwrap();

    ws.append_lines("a.txt", &["z"]).unwrap();
    ws.insert_line("a.txt", 1, "w").unwrap();
    ws.delete_line("a.txt", 3).unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "w\nx\nz\n");

    let undone: Vec<OperationKind> = (0..3)
        .map(|_| ws.rollback("a.txt").unwrap().entry.kind())
        .collect();
    assert_eq!(
        undone,
        vec![OperationKind::Delete, OperationKind::Insert, OperationKind::Append]
    );
    assert_eq!(read(dir.path(), "a.txt"), "x\ny\n");
}

#[test]
fn test_copy_inherits_history() {
    let (dir, ws) = workspace();
    ws.create_file("orig.txt").unwrap();
    ws.append_lines("orig.txt", &["one", "two"]).unwrap();
    ws.insert_line("orig.txt", 2, "mid").unwrap();
    ws.delete_line("orig.txt", 1).unwrap();
    assert_eq!(read(dir.path(), "orig.txt"), "mid\ntwo\n");

    ws.copy_file("orig.txt", "copy.txt").unwrap();
    assert_eq!(read(dir.path(), "copy.txt"), "mid\ntwo\n");
    assert_eq!(kinds(&ws, "copy.txt"), kinds(&ws, "orig.txt"));

    // コピー側を最後まで巻き戻す
    let states = ["one\nmid\ntwo\n", "one\ntwo\n", ""];
    for expected in states {
        ws.rollback("copy.txt").unwrap();
        assert_eq!(read(dir.path(), "copy.txt"), expected);
    }
    let outcome = ws.rollback("copy.txt").unwrap();
    assert_eq!(outcome.entry.kind(), OperationKind::Created);
    assert!(!dir.path().join("copy.txt").exists());
    assert!(ws.history("copy.txt").unwrap().is_empty());

    assert_eq!(read(dir.path(), "orig.txt"), "mid\ntwo\n");
    assert_eq!(ws.history("orig.txt").unwrap().len(), 4);
}

#[test]
fn test_copy_rejects_same_name_and_existing_target() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("a.txt"), "1\n").unwrap();
    fs::write(dir.path().join("b.txt"), "2\n").unwrap();

    assert!(ws.copy_file("a.txt", "a.txt").is_err());
    assert!(ws.copy_file("a.txt", "b.txt").is_err());
    assert_eq!(read(dir.path(), "b.txt"), "2\n");
}

#[test]
fn test_no_history() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("plain.txt"), "x\n").unwrap();

    let result = ws.rollback("plain.txt");
    assert!(matches!(
        result,
        Err(CwordError::History(HistoryError::NoHistory { .. }))
    ));
    assert_eq!(read(dir.path(), "plain.txt"), "x\n");
}

#[test]
fn test_deleted_entry_with_file_present_is_inconsistent() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("a.txt"), "old\n").unwrap();
    ws.delete_file("a.txt").unwrap();
    fs::write(dir.path().join("a.txt"), "recreated\n").unwrap();

    let result = ws.rollback("a.txt");
    assert!(matches!(
        result,
        Err(CwordError::History(HistoryError::InconsistentState { .. }))
    ));
    assert_eq!(read(dir.path(), "a.txt"), "recreated\n");
    assert_eq!(kinds(&ws, "a.txt"), vec![OperationKind::Deleted]);
}

#[test]
fn test_file_deleted_elsewhere_is_inconsistent() {
    let (dir, ws) = workspace();
    ws.create_file("a.txt").unwrap();
    ws.append_lines("a.txt", &["x"]).unwrap();
    fs::remove_file(dir.path().join("a.txt")).unwrap();

    let err = ws.rollback("a.txt").unwrap_err();
    let (message, _) = err.user_message();
    assert!(message.contains("deleted elsewhere"));
    assert_eq!(ws.history("a.txt").unwrap().len(), 2);
}

#[test]
fn test_unavailable_history_directory_skips_record() {
    let (dir, ws) = workspace();
    // 履歴ディレクトリの位置を通常ファイルで塞ぐ
    fs::write(dir.path().join(".cword").join("blocked.txt"), "").unwrap();

    let report = ws.create_file("blocked.txt").unwrap();
    assert!(matches!(report.recorded, Recorded::Skipped { .. }));
    assert!(report.display_message().ends_with("This change hasn't been recorded!"));
    assert!(dir.path().join("blocked.txt").is_file());

    assert!(ws.history("blocked.txt").unwrap().is_empty());
}

#[test]
fn test_malformed_record_is_not_consumed() {
    let (dir, ws) = workspace();
    ws.create_file("a.txt").unwrap();
    let log = dir.path().join(".cword").join("a.txt").join(CHANGELOG_FILE);
    let mut content = fs::read_to_string(&log).unwrap();
    content.push_str("garbage line\n");
    fs::write(&log, &content).unwrap();

    assert!(matches!(
        ws.rollback("a.txt"),
        Err(CwordError::History(HistoryError::MalformedLog { .. }))
    ));
    assert_eq!(fs::read_to_string(&log).unwrap(), content);
    assert!(dir.path().join("a.txt").is_file());
}

#[test]
fn test_history_survives_file_deletion() {
    let (_dir, ws) = workspace();
    ws.create_file("a.txt").unwrap();
    ws.append_lines("a.txt", &["1", "2"]).unwrap();
    ws.delete_file("a.txt").unwrap();

    assert_eq!(
        kinds(&ws, "a.txt"),
        vec![
            OperationKind::Created,
            OperationKind::Append,
            OperationKind::Deleted
        ]
    );

    for _ in 0..3 {
        ws.rollback("a.txt").unwrap();
    }
    assert!(ws.history("a.txt").unwrap().is_empty());
}

#[test]
fn test_rollback_on_read_only_file_is_denied() {
    let (dir, ws) = workspace();
    let path = dir.path().join("r.txt");
    fs::write(&path, "a\n").unwrap();
    ws.append_lines("r.txt", &["b"]).unwrap();

    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_readonly(true);
    fs::set_permissions(&path, permissions).unwrap();

    assert!(matches!(
        ws.rollback("r.txt"),
        Err(CwordError::File(FileError::PermissionDenied { .. }))
    ));
    assert_eq!(read(dir.path(), "r.txt"), "a\nb\n");
    assert_eq!(kinds(&ws, "r.txt"), vec![OperationKind::Append]);
}

#[test]
fn test_append_rollback_terminates_dangling_last_line() {
    let (dir, ws) = workspace();
    fs::write(dir.path().join("a.txt"), "a\nb").unwrap();

    ws.append_lines("a.txt", &["c"]).unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "a\nb\nc\n");

    // 追記前に付けた改行は残る
    ws.rollback("a.txt").unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "a\nb\n");
}
