//! 変更履歴ストア
//!
//! 追跡対象ファイルごとに `<root>/<name>/changelog.txt` へ追記専用で記録する。
//! ロールバックは最後の1レコードだけを取り除く（LIFO）

use crate::error::{FileError, IoContext, Result};
use crate::file::access::test_writable;
use crate::file::TrackedFile;
use crate::history::entry::{ChangeLogEntry, Operation};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// 変更履歴ファイル名
pub const CHANGELOG_FILE: &str = "changelog.txt";

/// 記録結果
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// 記録された
    Logged(ChangeLogEntry),
    /// 履歴ディレクトリが使えず記録されなかった（編集自体は継続）
    Skipped { reason: String },
    /// 記録すべき変更がなかった
    Nothing,
}

impl Recorded {
    pub fn is_logged(&self) -> bool {
        matches!(self, Recorded::Logged(_))
    }
}

/// 変更履歴ストア
///
/// ファイル名 → ログファイルの対応を明示的に保持する値で、
/// 各操作へ参照で渡される
#[derive(Debug, Clone)]
pub struct ChangeLogStore {
    root: PathBuf,
}

impl ChangeLogStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// 変更履歴ルート
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// ファイルごとの履歴ディレクトリ
    pub fn file_dir(&self, file: &TrackedFile) -> PathBuf {
        self.root.join(file.name())
    }

    /// ファイルごとのログファイル
    pub fn log_path(&self, file: &TrackedFile) -> PathBuf {
        self.file_dir(file).join(CHANGELOG_FILE)
    }

    /// 書き込み可能なルートを用意する（失敗は起動中止）
    pub fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(|e| {
                log::error!("cannot create history root {}: {}", self.root.display(), e);
                FileError::PermissionDenied {
                    path: self.root.display().to_string(),
                }
            })?;
            log::info!("created history root {}", self.root.display());
        }

        if !self.root.is_dir() {
            return Err(FileError::InvalidPath {
                path: self.root.display().to_string(),
            }
            .into());
        }
        if !test_writable(&self.root) {
            return Err(FileError::PermissionDenied {
                path: self.root.display().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// 操作を記録
    ///
    /// 履歴ディレクトリを用意できない場合は警告して記録を省略する
    pub fn append(&self, file: &TrackedFile, operation: Operation) -> Recorded {
        let entry = ChangeLogEntry::new(operation);
        match self.write_record(file, &entry) {
            Ok(()) => {
                log::debug!("recorded {} for {}", entry.kind(), file);
                Recorded::Logged(entry)
            }
            Err(e) => {
                log::warn!("change to {} was not recorded: {}", file, e);
                Recorded::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn write_record(&self, file: &TrackedFile, entry: &ChangeLogEntry) -> Result<()> {
        let dir = self.file_dir(file);
        if !dir.is_dir() {
            fs::create_dir_all(&dir).with_path(&dir)?;
        }

        let path = self.log_path(file);
        let mut log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_path(&path)?;
        writeln!(log_file, "{}", entry.to_record()).with_path(&path)?;
        Ok(())
    }

    /// 全レコード（古い順）。ログがなければ空
    pub fn read_all(&self, file: &TrackedFile) -> Result<Vec<ChangeLogEntry>> {
        self.records(file)?
            .iter()
            .map(|record| ChangeLogEntry::parse(record))
            .collect()
    }

    /// 最新のレコード
    pub fn read_last(&self, file: &TrackedFile) -> Result<Option<ChangeLogEntry>> {
        match self.records(file)?.last() {
            Some(record) => ChangeLogEntry::parse(record).map(Some),
            None => Ok(None),
        }
    }

    /// 最新のレコードを1件だけ取り除く
    ///
    /// 取り除いたレコード行を返す（ログが空なら `None`）
    pub fn truncate_last(&self, file: &TrackedFile) -> Result<Option<String>> {
        let path = self.log_path(file);
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read(&path).with_path(&path)?;
        let Some((start, end)) = last_record_span(&content) else {
            return Ok(None);
        };
        let removed = String::from_utf8_lossy(&content[start..end]).into_owned();

        let log_file = OpenOptions::new().write(true).open(&path).with_path(&path)?;
        log_file.set_len(start as u64).with_path(&path)?;
        log::debug!("consumed last record of {}", file);
        Ok(Some(removed))
    }

    /// 履歴をコピー先のファイル名へ複製
    ///
    /// 元に履歴がなければ何もせず `false`
    pub fn clone_log(&self, from: &TrackedFile, to: &TrackedFile) -> Result<bool> {
        let source = self.log_path(from);
        if !source.is_file() {
            return Ok(false);
        }

        let dir = self.file_dir(to);
        fs::create_dir_all(&dir).with_path(&dir)?;
        let target = self.log_path(to);
        fs::copy(&source, &target).with_path(&target)?;
        log::debug!("cloned history of {} to {}", from, to);
        Ok(true)
    }

    /// 空行を除いたレコード行
    fn records(&self, file: &TrackedFile) -> Result<Vec<String>> {
        let path = self.log_path(file);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let content = fs::read(&path).with_path(&path)?;
        let text = String::from_utf8_lossy(&content);
        // CR を保持するため lines() ではなく '\n' で分割する
        Ok(text
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// 最後の空でないレコードのバイト範囲（末尾の改行を含む）
fn last_record_span(content: &[u8]) -> Option<(usize, usize)> {
    let mut end = content.len();
    while end > 0 && content[end - 1] == b'\n' {
        end -= 1;
    }
    if end == 0 {
        return None;
    }
    let start = content[..end]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    Some((start, content.len()))
}
