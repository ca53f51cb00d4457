//! ロールバックエンジン
//!
//! 最新の変更履歴レコードを読み、操作ごとの逆操作を適用してから
//! そのレコードを消費する。1回の呼び出しで戻るのは1操作だけで、
//! 繰り返すと履歴を過去へ遡る（やり直しはしない）
//!
//! 流れ: 読み込み → (履歴なし | 逆操作の決定) → (適用 | エラー) → 消費

use crate::error::{FileError, HistoryError, Result};
use crate::file::access::{can_create_in, FileAccess};
use crate::file::{TextStore, TrackedFile};
use crate::history::entry::{ChangeLogEntry, Operation};
use crate::history::snapshot::{SnapshotKey, SnapshotStore};
use crate::history::store::ChangeLogStore;
use std::fs;

/// 記録された操作に対する逆操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inverse {
    /// 末尾から `lines` 行を削除（APPEND の逆）
    DeleteTrailing { lines: usize },
    /// `line` 行目を削除（INSERT の逆）
    DeleteLine { line: usize },
    /// `line` 行目へ `content` を挿入（DELETE の逆）
    InsertLine { line: usize, content: String },
    /// ファイルを削除（CREATED の逆）
    RemoveFile,
    /// スナップショットから復元（DELETED の逆）
    RestoreSnapshot { key: SnapshotKey },
}

impl Inverse {
    /// レコードとファイルの存在から逆操作を決める
    ///
    /// ファイルが存在するなら DELETED 以外、存在しないなら DELETED のみが有効
    pub fn plan(file: &TrackedFile, entry: &ChangeLogEntry, file_exists: bool) -> Result<Self> {
        let inconsistent = |reason: &str| HistoryError::InconsistentState {
            file: file.to_string(),
            kind: entry.kind().to_string(),
            reason: reason.to_string(),
        };

        let inverse = match (&entry.operation, file_exists) {
            (Operation::Append { lines }, true) => Inverse::DeleteTrailing { lines: *lines },
            (Operation::Insert { line }, true) => Inverse::DeleteLine { line: *line },
            (Operation::Delete { line, content }, true) => Inverse::InsertLine {
                line: *line,
                content: content.clone(),
            },
            (Operation::Created, true) => Inverse::RemoveFile,
            (Operation::Deleted { snapshot }, false) => Inverse::RestoreSnapshot {
                key: snapshot.clone(),
            },
            (Operation::Deleted { .. }, true) => {
                return Err(inconsistent("found but the file still exists").into());
            }
            (_, false) => {
                return Err(inconsistent("found but the file is missing").into());
            }
        };
        Ok(inverse)
    }
}

/// ロールバック結果
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackOutcome {
    /// 取り消したレコード
    pub entry: ChangeLogEntry,
    /// 適用した逆操作
    pub inverse: Inverse,
    /// ユーザー向けメッセージ
    pub message: String,
}

/// ロールバックエンジン
///
/// 3つのストアを借用し、1回に1リクエストを処理する
pub struct RollbackEngine<'a> {
    text: &'a TextStore,
    log: &'a ChangeLogStore,
    snapshots: &'a SnapshotStore,
}

impl<'a> RollbackEngine<'a> {
    pub fn new(text: &'a TextStore, log: &'a ChangeLogStore, snapshots: &'a SnapshotStore) -> Self {
        Self {
            text,
            log,
            snapshots,
        }
    }

    /// 最新の1操作を取り消す
    ///
    /// 失敗した場合はファイルも履歴も変更しない
    pub fn rollback(&self, file: &TrackedFile) -> Result<RollbackOutcome> {
        let entry = self
            .log
            .read_last(file)?
            .ok_or_else(|| HistoryError::NoHistory {
                file: file.to_string(),
            })?;

        let inverse = Inverse::plan(file, &entry, file.exists())?;
        log::debug!("rolling back {} on {} via {:?}", entry.kind(), file, inverse);
        check_access(file, &inverse)?;

        let message = self.apply(file, &inverse)?;
        self.log.truncate_last(file)?;
        log::info!("rolled back {} on {}", entry.kind(), file);

        Ok(RollbackOutcome {
            entry,
            inverse,
            message,
        })
    }

    fn apply(&self, file: &TrackedFile, inverse: &Inverse) -> Result<String> {
        let message = match inverse {
            Inverse::DeleteTrailing { lines } => {
                let removed = self.text.delete_last_lines(file.path(), *lines)?;
                format!(
                    "APPEND operation rolled back\nLast {} line(s) were deleted",
                    removed
                )
            }
            Inverse::DeleteLine { line } => {
                self.text.delete_line(file.path(), *line)?;
                format!("INSERT operation rolled back\nLine {} was deleted", line)
            }
            Inverse::InsertLine { line, content } => {
                self.text.insert_line(file.path(), *line, content)?;
                format!("DELETE operation rolled back\nLine {} was inserted", line)
            }
            Inverse::RemoveFile => {
                fs::remove_file(file.path()).map_err(|e| FileError::from_io(e, file.path()))?;
                "CREATED operation rolled back\nThe file was deleted".to_string()
            }
            Inverse::RestoreSnapshot { key } => {
                self.snapshots.restore(file, key)?;
                "DELETED operation rolled back\nThe file was restored".to_string()
            }
        };
        Ok(message)
    }
}

/// 逆操作の前に対象へ書き込めることを確認する
fn check_access(file: &TrackedFile, inverse: &Inverse) -> Result<()> {
    match inverse {
        Inverse::RestoreSnapshot { .. } => {
            if !can_create_in(file.path()) {
                return Err(FileError::PermissionDenied {
                    path: file.to_string(),
                }
                .into());
            }
        }
        _ => {
            FileAccess::probe(file.path()).require_writable()?;
        }
    }
    Ok(())
}
