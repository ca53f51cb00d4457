//! ワークスペース
//!
//! ファイルの変更とその記録を1つの操作にまとめる。
//! フロントエンドはここを経由してのみファイルを変更する

use crate::config::Config;
use crate::error::{ConfigError, FileError, IoContext, Result};
use crate::file::access::{can_create_in, FileAccess};
use crate::file::{TextStore, TrackedFile};
use crate::history::{
    sanitize, ChangeLogEntry, ChangeLogStore, Operation, Recorded, RollbackEngine,
    RollbackOutcome, SnapshotStore,
};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// 編集結果
#[derive(Debug, Clone, PartialEq)]
pub struct EditReport {
    pub message: String,
    pub recorded: Recorded,
}

impl EditReport {
    fn new(message: impl Into<String>, recorded: Recorded) -> Self {
        Self {
            message: message.into(),
            recorded,
        }
    }

    /// 記録されなかった場合は注意書きを付ける
    pub fn display_message(&self) -> String {
        match &self.recorded {
            Recorded::Skipped { .. } => {
                format!("{}\nThis change hasn't been recorded!", self.message)
            }
            _ => self.message.clone(),
        }
    }
}

/// ファイル情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub name: String,
    pub lines: usize,
    pub readable: bool,
    pub writable: bool,
}

/// 進行中の一括追記
///
/// 1行ごとに即座にファイルへ書き込み、終了時にまとめて1件の APPEND として記録する
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendBatch {
    file: TrackedFile,
    lines: usize,
}

impl AppendBatch {
    pub fn file(&self) -> &TrackedFile {
        &self.file
    }

    /// ここまでに追記した行数
    pub fn lines(&self) -> usize {
        self.lines
    }
}

/// 作業ディレクトリと変更履歴ルートの組
#[derive(Debug, Clone)]
pub struct Workspace {
    working_dir: PathBuf,
    text: TextStore,
    log: ChangeLogStore,
    snapshots: SnapshotStore,
}

impl Workspace {
    /// 設定から開く（履歴ルートが用意できなければエラー）
    pub fn open(config: &Config) -> Result<Self> {
        Self::new(&config.working_dir, config.resolved_root())
    }

    pub fn new<P: Into<PathBuf>, R: Into<PathBuf>>(working_dir: P, root: R) -> Result<Self> {
        let root = root.into();
        let workspace = Self {
            working_dir: working_dir.into(),
            text: TextStore::new(),
            log: ChangeLogStore::new(root.clone()),
            snapshots: SnapshotStore::new(root),
        };
        workspace.log.ensure_root()?;
        Ok(workspace)
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// 変更履歴ルート
    pub fn history_root(&self) -> &Path {
        self.log.root()
    }

    /// ファイル名を解決（変更履歴ルート配下は対象外）
    pub fn resolve(&self, name: &str) -> Result<TrackedFile> {
        let file = TrackedFile::resolve(&self.working_dir, name)?;
        if file.path().starts_with(self.history_root()) {
            return Err(FileError::InvalidPath {
                path: name.to_string(),
            }
            .into());
        }
        Ok(file)
    }

    /// ファイルを作成（CREATED を記録）
    pub fn create_file(&self, name: &str) -> Result<EditReport> {
        let file = self.resolve(name)?;
        if file.path().exists() {
            return Err(FileError::AlreadyExists {
                path: file.to_string(),
            }
            .into());
        }
        if !can_create_in(file.path()) {
            return Err(FileError::PermissionDenied {
                path: file.to_string(),
            }
            .into());
        }

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(file.path())
            .with_path(file.path())?;

        let recorded = self.log.append(&file, Operation::Created);
        Ok(EditReport::new(format!("Created file: {}", file), recorded))
    }

    /// ファイルをコピーし、変更履歴も引き継ぐ
    pub fn copy_file(&self, from: &str, to: &str) -> Result<EditReport> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if source.name() == target.name() {
            return Err(FileError::SameFile {
                path: source.to_string(),
            }
            .into());
        }
        FileAccess::probe(source.path()).require_readable()?;
        if target.path().exists() {
            return Err(FileError::AlreadyExists {
                path: target.to_string(),
            }
            .into());
        }
        if !can_create_in(target.path()) {
            return Err(FileError::PermissionDenied {
                path: target.to_string(),
            }
            .into());
        }

        self.text.copy_file(source.path(), target.path())?;

        let recorded = match self.clone_history(&source, &target) {
            Ok(_) => Recorded::Nothing,
            Err(e) => {
                log::warn!("history of {} was not copied to {}: {}", source, target, e);
                Recorded::Skipped {
                    reason: e.to_string(),
                }
            }
        };
        Ok(EditReport::new("Files successfully copied!", recorded))
    }

    fn clone_history(&self, source: &TrackedFile, target: &TrackedFile) -> Result<bool> {
        if !self.log.clone_log(source, target)? {
            return Ok(false);
        }
        self.snapshots.clone_all(source, target)?;
        Ok(true)
    }

    /// ファイル全体を削除（スナップショットを残し DELETED を記録）
    pub fn delete_file(&self, name: &str) -> Result<EditReport> {
        let file = self.resolve(name)?;
        FileAccess::probe(file.path()).require_exists()?;

        let key = self.snapshots.save(&file)?;
        if let Err(e) = fs::remove_file(file.path()) {
            let _ = self.snapshots.discard(&file, &key);
            return Err(FileError::from_io(e, file.path()).into());
        }

        let recorded = self.log.append(&file, Operation::Deleted { snapshot: key });
        Ok(EditReport::new("File deleted!", recorded))
    }

    /// 一括追記を開始
    pub fn begin_append(&self, name: &str) -> Result<AppendBatch> {
        let file = self.resolve(name)?;
        FileAccess::probe(file.path()).require_writable()?;
        Ok(AppendBatch { file, lines: 0 })
    }

    /// 一括追記へ1行追加（改行を含む場合は複数行として数える）
    pub fn append_to(&self, batch: &mut AppendBatch, content: &str) -> Result<()> {
        for line in split_lines(content) {
            self.text.append_line(batch.file.path(), &sanitize(line))?;
            batch.lines += 1;
        }
        Ok(())
    }

    /// 一括追記を終了し、1件の APPEND として記録
    pub fn finish_append(&self, batch: AppendBatch) -> Result<EditReport> {
        if batch.lines == 0 {
            return Ok(EditReport::new("No lines were appended", Recorded::Nothing));
        }
        let recorded = self.log.append(&batch.file, Operation::Append { lines: batch.lines });
        Ok(EditReport::new(
            format!("{} line(s) appended to {}", batch.lines, batch.file),
            recorded,
        ))
    }

    /// 複数行をまとめて追記
    pub fn append_lines<S: AsRef<str>>(&self, name: &str, lines: &[S]) -> Result<EditReport> {
        let mut batch = self.begin_append(name)?;
        for line in lines {
            if let Err(e) = self.append_to(&mut batch, line.as_ref()) {
                // 途中まで書き込んだ行は記録しておく
                if let Err(record_error) = self.finish_append(batch) {
                    log::warn!("partial append could not be recorded: {}", record_error);
                }
                return Err(e);
            }
        }
        self.finish_append(batch)
    }

    /// 行を挿入（INSERT を記録）
    pub fn insert_line(&self, name: &str, line: usize, content: &str) -> Result<EditReport> {
        let file = self.resolve(name)?;
        FileAccess::probe(file.path()).require_writable()?;
        let content = single_line(content)?;

        self.text.insert_line(file.path(), line, &sanitize(content))?;
        let recorded = self.log.append(&file, Operation::Insert { line });
        Ok(EditReport::new("Line successfully inserted!", recorded))
    }

    /// 行を削除（DELETE と削除内容を記録）
    pub fn delete_line(&self, name: &str, line: usize) -> Result<EditReport> {
        let file = self.resolve(name)?;
        FileAccess::probe(file.path()).require_writable()?;

        let removed = self.text.delete_line(file.path(), line)?;
        let recorded = self.log.append(&file, Operation::delete(line, &removed));
        Ok(EditReport::new("Line successfully deleted!", recorded))
    }

    /// 最新の1操作を取り消す
    pub fn rollback(&self, name: &str) -> Result<RollbackOutcome> {
        let file = self.resolve(name)?;
        RollbackEngine::new(&self.text, &self.log, &self.snapshots).rollback(&file)
    }

    /// 変更履歴（古い順）。ファイルが削除済みでも読める
    pub fn history(&self, name: &str) -> Result<Vec<ChangeLogEntry>> {
        let file = self.resolve(name)?;
        self.log.read_all(&file)
    }

    /// 全行
    pub fn read_file(&self, name: &str) -> Result<Vec<String>> {
        let file = self.resolve(name)?;
        FileAccess::probe(file.path()).require_readable()?;
        self.text.read_lines(file.path())
    }

    /// 1行
    pub fn read_line(&self, name: &str, line: usize) -> Result<String> {
        let file = self.resolve(name)?;
        FileAccess::probe(file.path()).require_readable()?;
        self.text.read_line(file.path(), line)
    }

    /// 指定行の前後 `deviation` 行（行番号付き）
    pub fn line_context(
        &self,
        name: &str,
        line: usize,
        deviation: usize,
    ) -> Result<Vec<(usize, String)>> {
        let file = self.resolve(name)?;
        FileAccess::probe(file.path()).require_readable()?;
        let total = self.text.line_count(file.path())?;
        let (from, to) = context_window(line, total, deviation);
        self.text.read_range(file.path(), from, to)
    }

    /// 行数と権限
    pub fn summary(&self, name: &str) -> Result<FileSummary> {
        let file = self.resolve(name)?;
        let access = FileAccess::probe(file.path());
        access.require_readable()?;
        Ok(FileSummary {
            name: file.to_string(),
            lines: self.text.line_count(file.path())?,
            readable: access.readable,
            writable: access.writable,
        })
    }
}

/// 表示範囲 `(from, to)` を計算（両端含む、常に `2 * deviation + 1` 行を目指す）
pub fn context_window(line: usize, total: usize, deviation: usize) -> (usize, usize) {
    if total == 0 {
        return (1, 0);
    }
    let line = line.clamp(1, total);
    let span = deviation * 2 + 1;
    let from = line.saturating_sub(deviation).max(1);
    let to = (from + span - 1).min(total);
    let from = (to + 1).saturating_sub(span).max(1);
    (from, to)
}

/// 末尾の改行を1つ除き、改行で分割
fn split_lines(content: &str) -> Vec<&str> {
    let body = content.strip_suffix('\n').unwrap_or(content);
    body.split('\n').collect()
}

/// 1行分の内容であること（末尾の改行は許可）
fn single_line(content: &str) -> Result<&str> {
    let body = content.strip_suffix('\n').unwrap_or(content);
    if body.contains('\n') {
        return Err(ConfigError::InvalidValue {
            key: "line content".to_string(),
            value: body.replace('\n', "\\n"),
        }
        .into());
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CwordError;
    use tempfile::{tempdir, TempDir};

    fn workspace() -> (TempDir, Workspace) {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path(), dir.path().join(".cword")).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_context_window() {
        assert_eq!(context_window(50, 100, 5), (45, 55));
        assert_eq!(context_window(2, 100, 5), (1, 11));
        assert_eq!(context_window(99, 100, 5), (90, 100));
        assert_eq!(context_window(200, 100, 5), (90, 100));
        assert_eq!(context_window(1, 3, 5), (1, 3));
        assert_eq!(context_window(0, 0, 5), (1, 0));
    }

    #[test]
    fn test_split_and_single_line() {
        assert_eq!(split_lines("d\n"), vec!["d"]);
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(single_line("x\n").unwrap(), "x");
        assert!(single_line("x\ny").is_err());
    }

    #[test]
    fn test_create_records_created() {
        let (dir, ws) = workspace();
        let report = ws.create_file("notes.txt").unwrap();
        assert!(report.recorded.is_logged());
        assert!(dir.path().join("notes.txt").is_file());

        let history = ws.history("notes.txt").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].operation, Operation::Created);
    }

    #[test]
    fn test_create_existing_file_is_rejected() {
        let (dir, ws) = workspace();
        fs::write(dir.path().join("notes.txt"), "x\n").unwrap();
        assert!(matches!(
            ws.create_file("notes.txt"),
            Err(CwordError::File(FileError::AlreadyExists { .. }))
        ));
        assert!(ws.history("notes.txt").unwrap().is_empty());
    }

    #[test]
    fn test_append_batch_records_single_entry() {
        let (dir, ws) = workspace();
        ws.create_file("notes.txt").unwrap();

        let mut batch = ws.begin_append("notes.txt").unwrap();
        ws.append_to(&mut batch, "one").unwrap();
        ws.append_to(&mut batch, "two||three").unwrap();
        assert_eq!(batch.lines(), 2);
        ws.finish_append(batch).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
            "one\ntwothree\n"
        );
        let last = ws.history("notes.txt").unwrap().pop().unwrap();
        assert_eq!(last.operation, Operation::Append { lines: 2 });
    }

    #[test]
    fn test_empty_append_batch_is_not_recorded() {
        let (_dir, ws) = workspace();
        ws.create_file("notes.txt").unwrap();
        let batch = ws.begin_append("notes.txt").unwrap();
        let report = ws.finish_append(batch).unwrap();
        assert_eq!(report.recorded, Recorded::Nothing);
        assert_eq!(ws.history("notes.txt").unwrap().len(), 1);
    }

    #[test]
    fn test_failed_mutation_is_not_recorded() {
        let (_dir, ws) = workspace();
        ws.create_file("notes.txt").unwrap();
        assert!(ws.delete_line("notes.txt", 1).is_err());
        assert!(ws.insert_line("notes.txt", 5, "x").is_err());
        assert_eq!(ws.history("notes.txt").unwrap().len(), 1);
    }

    #[test]
    fn test_names_inside_history_root_are_rejected() {
        let (dir, ws) = workspace();
        ws.create_file("notes.txt").unwrap();
        let log = dir.path().join(".cword").join("notes.txt").join("changelog.txt");
        let before = fs::read_to_string(&log).unwrap();

        assert!(matches!(
            ws.append_lines(".cword/notes.txt/changelog.txt", &["x"]),
            Err(CwordError::File(FileError::InvalidPath { .. }))
        ));
        assert!(ws.resolve("./.cword").is_err());
        assert!(ws.resolve(".cwordless.txt").is_ok());
        assert_eq!(fs::read_to_string(&log).unwrap(), before);
    }

    #[test]
    fn test_summary() {
        let (dir, ws) = workspace();
        fs::write(dir.path().join("a.txt"), "1\n2\n3").unwrap();
        let summary = ws.summary("a.txt").unwrap();
        assert_eq!(summary.lines, 3);
        assert!(summary.readable && summary.writable);
    }

    #[test]
    fn test_skipped_record_is_reported() {
        let report = EditReport::new(
            "Line successfully inserted!",
            Recorded::Skipped {
                reason: "no directory".to_string(),
            },
        );
        assert!(report.display_message().contains("hasn't been recorded"));
    }
}
