//! 起動設定
//!
//! デフォルト値 ← 環境変数 ← コマンドライン引数 の順で解決する

use crate::error::{ConfigError, Result};
use crate::file::path::expand_path;
use crate::logging::LogLevel;
use std::path::PathBuf;

/// 変更履歴ルートのデフォルト名（作業ディレクトリ直下の隠しディレクトリ）
pub const DEFAULT_ROOT_DIR: &str = ".cword";

/// 実行時設定
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// 編集対象ファイルの基準ディレクトリ
    pub working_dir: PathBuf,
    /// 変更履歴ルート（相対パスは `working_dir` 基準）
    pub root_dir: PathBuf,
    /// ログレベル
    pub log_level: LogLevel,
    /// デバッグログ出力先
    pub debug_log: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            log_level: LogLevel::Warning,
            debug_log: None,
        }
    }
}

impl Config {
    /// プロセス環境と引数から設定を構築し、残りのコマンド引数を返す
    pub fn load(args: &[String]) -> Result<(Self, Vec<String>)> {
        let mut config = Self::from_vars(|key| std::env::var(key).ok())?;
        let rest = config.apply_args(args)?;
        Ok((config, rest))
    }

    /// 環境変数を適用（テストでは任意のルックアップを渡せる）
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(root) = lookup("CWORD_ROOT").filter(|v| !v.trim().is_empty()) {
            config.root_dir = expand_path(&root)?;
        }
        if let Some(level) = lookup("CWORD_LOG") {
            config.log_level = LogLevel::parse(&level).ok_or_else(|| ConfigError::InvalidValue {
                key: "CWORD_LOG".to_string(),
                value: level.clone(),
            })?;
        }
        if let Some(path) = lookup("CWORD_DEBUG_LOG").filter(|v| !v.trim().is_empty()) {
            config.debug_log = Some(expand_path(&path)?);
        }

        Ok(config)
    }

    /// フラグを取り除いて適用し、位置引数を返す
    pub fn apply_args(&mut self, args: &[String]) -> Result<Vec<String>> {
        let mut rest = Vec::new();
        let mut iter = args.iter().peekable();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--root" => {
                    let value = iter.next().ok_or_else(|| missing("--root", "DIR"))?;
                    self.root_dir = expand_path(value)?;
                }
                "--dir" => {
                    let value = iter.next().ok_or_else(|| missing("--dir", "DIR"))?;
                    self.working_dir = expand_path(value)?;
                }
                "--debug-log" => {
                    let path = iter.peek().and_then(|next| {
                        if !next.starts_with('-') && rest.is_empty() && looks_like_path(next) {
                            Some((*next).clone())
                        } else {
                            None
                        }
                    });
                    match path {
                        Some(path) => {
                            self.debug_log = Some(expand_path(&path)?);
                            iter.next();
                        }
                        None => self.debug_log = default_log_path(),
                    }
                }
                "--verbose" | "-v" => self.log_level = LogLevel::Debug,
                "--log-level" => {
                    let value = iter.next().ok_or_else(|| missing("--log-level", "LEVEL"))?;
                    self.log_level =
                        LogLevel::parse(value).ok_or_else(|| ConfigError::InvalidValue {
                            key: "--log-level".to_string(),
                            value: value.clone(),
                        })?;
                }
                "--" => {
                    rest.extend(iter.by_ref().cloned());
                }
                _ => rest.push(arg.clone()),
            }
        }

        Ok(rest)
    }

    /// 変更履歴ルートの実パス
    pub fn resolved_root(&self) -> PathBuf {
        if self.root_dir.is_absolute() {
            self.root_dir.clone()
        } else {
            self.working_dir.join(&self.root_dir)
        }
    }
}

fn missing(flag: &str, argument: &str) -> ConfigError {
    ConfigError::MissingArgument {
        command: flag.to_string(),
        argument: argument.to_string(),
    }
}

/// コマンド名と区別するため、拡張子か区切りを含むものだけをパスとみなす
fn looks_like_path(value: &str) -> bool {
    value.contains('/') || value.contains('.') || value.starts_with('~')
}

/// デフォルトのデバッグログ出力先（`~/.cword-log/debug.log`）
fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cword-log").join("debug.log"))
}
