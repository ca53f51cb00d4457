//! エラーハンドリングシステム
//!
//! cword 全体で使用される統一されたエラー型とユーティリティを定義
//! どのエラーもユーザー向けメッセージに変換され、状態は変更されない

use std::io;
use std::path::Path;
use thiserror::Error;

/// アプリケーション全体のエラー型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CwordError {
    /// ファイル操作エラー
    #[error("file operation failed: {0}")]
    File(#[from] FileError),

    /// 変更履歴エラー
    #[error("history operation failed: {0}")]
    History(#[from] HistoryError),

    /// 設定・コマンドラインエラー
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 端末操作エラー
    #[error("terminal error: {0}")]
    Terminal(String),
}

/// ファイル操作固有のエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FileError {
    #[error("file not found: {path}")]
    NotFound { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("file already exists: {path}")]
    AlreadyExists { path: String },

    #[error("source and destination are the same file: {path}")]
    SameFile { path: String },

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("line {line} is out of range ({total} lines)")]
    LineOutOfRange { line: usize, total: usize },

    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
}

impl FileError {
    /// `io::Error` を対象パス付きのエラーへ分類
    pub fn from_io(error: io::Error, path: &Path) -> Self {
        let path = path.display().to_string();
        match error.kind() {
            io::ErrorKind::NotFound => FileError::NotFound { path },
            io::ErrorKind::PermissionDenied => FileError::PermissionDenied { path },
            io::ErrorKind::AlreadyExists => FileError::AlreadyExists { path },
            _ => FileError::Io {
                path,
                message: error.to_string(),
            },
        }
    }
}

/// 変更履歴・ロールバック固有のエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    #[error("no change history for {file}")]
    NoHistory { file: String },

    #[error("inconsistent state for {file}: {kind} entry {reason}")]
    InconsistentState {
        file: String,
        kind: String,
        reason: String,
    },

    #[error("malformed change log record: {record}")]
    MalformedLog { record: String },

    #[error("snapshot {key} for {file} is missing")]
    SnapshotMissing { file: String, key: String },
}

/// 設定固有のエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// エラーレベル分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Info,
    Warning,
    Error,
}

impl CwordError {
    /// ユーザーへ表示するメッセージとレベル
    pub fn user_message(&self) -> (String, ErrorLevel) {
        match self {
            CwordError::File(FileError::NotFound { path }) => {
                (format!("{} doesn't exist!", path), ErrorLevel::Error)
            }
            CwordError::File(FileError::PermissionDenied { path }) => (
                format!("You don't have permission to access {}!", path),
                ErrorLevel::Error,
            ),
            CwordError::File(FileError::AlreadyExists { path }) => (
                format!("There is already a file called: {}", path),
                ErrorLevel::Error,
            ),
            CwordError::File(FileError::SameFile { .. }) => (
                "The copied file cannot have the same name as the original!".to_string(),
                ErrorLevel::Error,
            ),
            CwordError::File(FileError::LineOutOfRange { line, total }) => (
                format!("Line {} doesn't exist (the file has {} lines)", line, total),
                ErrorLevel::Error,
            ),
            CwordError::History(HistoryError::NoHistory { file }) => (
                format!("There is nothing to roll back for {}!", file),
                ErrorLevel::Info,
            ),
            CwordError::History(HistoryError::InconsistentState { file, kind, .. })
                if kind != "DELETED" =>
            {
                (
                    format!(
                        "{} was deleted elsewhere; nothing to roll back ({} entry kept).",
                        file, kind
                    ),
                    ErrorLevel::Warning,
                )
            }
            CwordError::History(HistoryError::InconsistentState { file, reason, .. }) => (
                format!("Cannot roll back {}: DELETED entry {}.", file, reason),
                ErrorLevel::Warning,
            ),
            CwordError::History(HistoryError::MalformedLog { record }) => (
                format!("The change log contains an unreadable record: {}", record),
                ErrorLevel::Error,
            ),
            _ => (format!("Error: {}", self), ErrorLevel::Error),
        }
    }
}

/// パニックハンドラの設定
///
/// 端末を通常モードに戻してから位置情報を出力し、即座に終了する
pub fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(std::io::stderr(), crossterm::terminal::LeaveAlternateScreen);

        let location = panic_info
            .location()
            .unwrap_or_else(|| std::panic::Location::caller());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s
        } else {
            "Unknown panic payload"
        };

        log::error!("PANIC at {}:{}: {}", location.file(), location.line(), message);
        eprintln!("PANIC at {}:{}: {}", location.file(), location.line(), message);
        eprintln!("Stack trace: {}", std::backtrace::Backtrace::capture());

        std::process::exit(1);
    }));
}

/// プロジェクト標準のResult型
pub type Result<T> = std::result::Result<T, CwordError>;

// std::io::Error から CwordError への変換（パス情報なし）
impl From<io::Error> for CwordError {
    fn from(error: io::Error) -> Self {
        CwordError::File(FileError::from_io(error, Path::new("<unknown>")))
    }
}

/// パス付きで `io::Error` を変換するためのトレイト
pub trait IoContext<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, io::Error> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|e| CwordError::File(FileError::from_io(e, path)))
    }
}
