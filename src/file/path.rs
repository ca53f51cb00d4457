//! パス処理ユーティリティ
//!
//! 追跡対象ファイル名の検証と正規化、設定パスの展開

use crate::error::{ConfigError, FileError, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// 設定値のパスを展開（~ と $VAR）
pub fn expand_path(input: &str) -> Result<PathBuf> {
    match shellexpand::full(input) {
        Ok(expanded) => Ok(PathBuf::from(expanded.as_ref())),
        Err(e) => Err(ConfigError::InvalidValue {
            key: "path".to_string(),
            value: format!("{} ({})", input, e),
        }
        .into()),
    }
}

/// 追跡対象ファイル
///
/// `name` は作業ディレクトリからの相対パスで、変更履歴ルート配下の
/// ディレクトリ名としても使われる。`path` は実ファイルの位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    name: PathBuf,
    path: PathBuf,
}

impl TrackedFile {
    /// ユーザー入力のファイル名を作業ディレクトリ基準で解決
    pub fn resolve(working_dir: &Path, input: &str) -> Result<Self> {
        let name = normalize_name(input)?;
        let path = working_dir.join(&name);
        Ok(Self { name, path })
    }

    /// 履歴キーとなる相対名
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// 実ファイルのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 実ファイルが存在するか
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

impl fmt::Display for TrackedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.display())
    }
}

/// 相対名の正規化
///
/// 変更履歴ルートの外を指す名前（絶対パス、`..`）は受け付けない
fn normalize_name(input: &str) -> Result<PathBuf> {
    let trimmed = input.trim();
    let invalid = || FileError::InvalidPath {
        path: input.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid().into());
    }

    let mut result = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::CurDir => continue,
            Component::Normal(part) => result.push(part),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(invalid().into());
            }
        }
    }

    if result.as_os_str().is_empty() {
        return Err(invalid().into());
    }
    Ok(result)
}
