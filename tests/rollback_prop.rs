//! Rollback unwinding property tests
//!
//! Any sequence of recorded edits can be undone one step at a time, each
//! rollback restoring exactly the state before the matching edit.

use cword::error::{CwordError, HistoryError};
use cword::Workspace;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const FILE: &str = "prop.txt";

#[derive(Debug, Clone)]
enum Edit {
    Append { lines: Vec<String> },
    Insert { pos: usize, content: String },
    Delete { pos: usize },
}

fn line_content() -> impl Strategy<Value = String> {
    "[a-z :|]{0,8}"
}

/// 区切り文字を含まない既存行
fn plain_line() -> impl Strategy<Value = String> {
    "[a-z ]{0,8}"
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    let append = proptest::collection::vec(line_content(), 0..4)
        .prop_map(|lines| Edit::Append { lines });
    let insert = (0usize..64, line_content())
        .prop_map(|(pos, content)| Edit::Insert { pos, content });
    let delete = (0usize..64).prop_map(|pos| Edit::Delete { pos });

    prop_oneof![append, insert, delete]
}

fn snapshot(path: &Path) -> Option<Vec<u8>> {
    fs::read(path).ok()
}

fn line_count(ws: &Workspace) -> usize {
    ws.summary(FILE).map(|summary| summary.lines).unwrap_or(0)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 48, .. ProptestConfig::default() })]

    #[test]
    fn rollback_unwinds_every_recorded_edit(
        initial in proptest::collection::vec(plain_line(), 0..6),
        edits in proptest::collection::vec(edit_strategy(), 0..12),
        delete_at_end in any::<bool>()
    ) {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), dir.path().join(".cword")).unwrap();
        let path = dir.path().join(FILE);
        let initial_text: String = initial.iter().map(|line| format!("{}\n", line)).collect();
        fs::write(&path, &initial_text).unwrap();

        // 記録された編集ごとに、編集前の内容を積む
        let mut before = Vec::new();
        for edit in edits {
            let state = snapshot(&path);
            let report = match edit {
                Edit::Append { lines } => ws.append_lines(FILE, &lines),
                Edit::Insert { pos, content } => {
                    let line = 1 + pos % (line_count(&ws) + 1);
                    ws.insert_line(FILE, line, &content)
                }
                Edit::Delete { pos } => {
                    let total = line_count(&ws);
                    if total == 0 {
                        continue;
                    }
                    ws.delete_line(FILE, 1 + pos % total)
                }
            };
            if report.unwrap().recorded.is_logged() {
                before.push(state);
            }
        }
        if delete_at_end {
            let state = snapshot(&path);
            ws.delete_file(FILE).unwrap();
            before.push(state);
        }

        prop_assert_eq!(ws.history(FILE).unwrap().len(), before.len());

        while let Some(expected) = before.pop() {
            ws.rollback(FILE).unwrap();
            prop_assert_eq!(snapshot(&path), expected);
        }

        prop_assert_eq!(fs::read_to_string(&path).unwrap(), initial_text);
        let exhausted = matches!(
            ws.rollback(FILE),
            Err(CwordError::History(HistoryError::NoHistory { .. }))
        );
        prop_assert!(exhausted);
    }
}
