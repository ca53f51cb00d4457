//! ファイルアクセス確認
//!
//! 操作の前に存在・読み取り・書き込みを確認する

use crate::error::{FileError, Result};
use std::path::{Path, PathBuf};

/// ファイルのアクセス状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAccess {
    pub path: PathBuf,
    pub exists: bool,
    pub readable: bool,
    pub writable: bool,
}

impl FileAccess {
    /// アクセス状態を調べる
    pub fn probe(path: &Path) -> Self {
        let exists = path.is_file();
        Self {
            path: path.to_path_buf(),
            exists,
            readable: exists && test_readable(path),
            writable: exists && test_writable(path),
        }
    }

    /// 存在しなければ NotFound
    pub fn require_exists(&self) -> Result<&Self> {
        if !self.exists {
            return Err(FileError::NotFound {
                path: self.path.display().to_string(),
            }
            .into());
        }
        Ok(self)
    }

    /// 存在かつ読み取り可能であること
    pub fn require_readable(&self) -> Result<&Self> {
        self.require_exists()?;
        if !self.readable {
            return Err(FileError::PermissionDenied {
                path: self.path.display().to_string(),
            }
            .into());
        }
        Ok(self)
    }

    /// 読み書き可能であること
    pub fn require_writable(&self) -> Result<&Self> {
        self.require_readable()?;
        if !self.writable {
            return Err(FileError::PermissionDenied {
                path: self.path.display().to_string(),
            }
            .into());
        }
        Ok(self)
    }
}

/// 読み取り権限テスト
pub fn test_readable(path: &Path) -> bool {
    std::fs::File::open(path).is_ok()
}

/// 書き込み権限テスト（ファイルは読み取り専用属性と追記オープン、ディレクトリは一時ファイル作成）
pub fn test_writable(path: &Path) -> bool {
    if path.is_file() {
        let read_only = std::fs::metadata(path)
            .map(|metadata| metadata.permissions().readonly())
            .unwrap_or(true);
        !read_only && std::fs::OpenOptions::new().append(true).open(path).is_ok()
    } else if path.is_dir() {
        let probe = path.join(format!(".cword_write_test_{}", std::process::id()));
        let result = std::fs::write(&probe, "").is_ok();
        if result {
            let _ = std::fs::remove_file(&probe);
        }
        result
    } else {
        false
    }
}

/// 新規ファイルを作成できるディレクトリか
pub fn can_create_in(path: &Path) -> bool {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent.is_dir() && test_writable(parent)
}
