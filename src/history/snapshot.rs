//! スナップショットストア
//!
//! ファイル全体を削除する直前の内容を `<root>/<name>/<hash>` に退避する。
//! キーは削除時刻文字列の djb2 ハッシュ（暗号学的でなく、同一ファイルを
//! 同じ秒に2回削除すると衝突する。既知の制限として許容）

use crate::error::{FileError, HistoryError, IoContext, Result};
use crate::file::TrackedFile;
use crate::history::entry::Timestamp;
use crate::history::store::CHANGELOG_FILE;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// スナップショットのキー（10進数字列）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey(String);

impl SnapshotKey {
    /// 文字列から djb2 ハッシュでキーを生成
    pub fn from_text(text: &str) -> Self {
        let hash = text.bytes().fold(5381u64, |hash, byte| {
            (hash << 5).wrapping_add(hash).wrapping_add(u64::from(byte))
        });
        Self(hash.to_string())
    }

    /// 時刻からキーを生成
    pub fn for_timestamp(timestamp: &Timestamp) -> Self {
        Self::from_text(&timestamp.to_string())
    }

    /// ログに記録されたキーを検証して取り込む（数字以外はパスとして使わせない）
    pub fn parse(text: &str) -> Option<Self> {
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(text.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 削除されたファイルの退避先
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// スナップショットのパス
    pub fn snapshot_path(&self, file: &TrackedFile, key: &SnapshotKey) -> PathBuf {
        self.root.join(file.name()).join(key.as_str())
    }

    /// スナップショットが存在するか
    pub fn exists(&self, file: &TrackedFile, key: &SnapshotKey) -> bool {
        self.snapshot_path(file, key).is_file()
    }

    /// 現在の内容を退避し、キーを返す
    pub fn save(&self, file: &TrackedFile) -> Result<SnapshotKey> {
        self.save_at(file, &Timestamp::now())
    }

    /// 指定時刻のキーで退避
    pub fn save_at(&self, file: &TrackedFile, timestamp: &Timestamp) -> Result<SnapshotKey> {
        let key = SnapshotKey::for_timestamp(timestamp);
        let dir = self.root.join(file.name());
        fs::create_dir_all(&dir).with_path(&dir)?;

        let target = self.snapshot_path(file, &key);
        if target.exists() {
            log::warn!(
                "snapshot {} for {} already exists and will be overwritten",
                key,
                file
            );
        }
        fs::copy(file.path(), &target).with_path(file.path())?;
        log::debug!("saved snapshot {} for {}", key, file);
        Ok(key)
    }

    /// スナップショットを元の場所へ戻し、スナップショットを削除
    pub fn restore(&self, file: &TrackedFile, key: &SnapshotKey) -> Result<()> {
        let source = self.snapshot_path(file, key);
        if !source.is_file() {
            return Err(HistoryError::SnapshotMissing {
                file: file.to_string(),
                key: key.to_string(),
            }
            .into());
        }

        fs::copy(&source, file.path()).with_path(file.path())?;
        fs::remove_file(&source).with_path(&source)?;
        log::debug!("restored snapshot {} for {}", key, file);
        Ok(())
    }

    /// 不要になったスナップショットを削除（存在しなければ何もしない）
    pub fn discard(&self, file: &TrackedFile, key: &SnapshotKey) -> Result<()> {
        let path = self.snapshot_path(file, key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileError::from_io(e, &path).into()),
        }
    }

    /// コピー先のファイル名へスナップショットを複製し、複製した数を返す
    pub fn clone_all(&self, from: &TrackedFile, to: &TrackedFile) -> Result<usize> {
        let source_dir = self.root.join(from.name());
        if !source_dir.is_dir() {
            return Ok(0);
        }
        let target_dir = self.root.join(to.name());
        fs::create_dir_all(&target_dir).with_path(&target_dir)?;

        let mut copied = 0;
        for entry in fs::read_dir(&source_dir).with_path(&source_dir)? {
            let entry = entry.with_path(&source_dir)?;
            let name = entry.file_name();
            let is_snapshot = name
                .to_str()
                .map(|n| n != CHANGELOG_FILE && SnapshotKey::parse(n).is_some())
                .unwrap_or(false);
            if is_snapshot && entry.path().is_file() {
                copy_into(&entry.path(), &target_dir.join(&name))?;
                copied += 1;
            }
        }
        Ok(copied)
    }
}

fn copy_into(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).with_path(to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn timestamp() -> Timestamp {
        Timestamp::from_datetime(
            NaiveDate::from_ymd_opt(2021, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
        )
    }

    #[test]
    fn test_djb2_hash() {
        // djb2("") = 5381, djb2("a") = 5381 * 33 + 97
        assert_eq!(SnapshotKey::from_text("").as_str(), "5381");
        assert_eq!(SnapshotKey::from_text("a").as_str(), "177670");
        assert_eq!(
            SnapshotKey::from_text("03:04:05 02/01/2021"),
            SnapshotKey::for_timestamp(&timestamp())
        );
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        assert!(SnapshotKey::parse("123").is_some());
        assert!(SnapshotKey::parse("").is_none());
        assert!(SnapshotKey::parse("../x").is_none());
        assert!(SnapshotKey::parse("12a").is_none());
    }

    #[test]
    fn test_save_and_restore() {
        let dir = tempdir().unwrap();
        let file = TrackedFile::resolve(dir.path(), "notes.txt").unwrap();
        fs::write(file.path(), "keep\nme\n").unwrap();
        let store = SnapshotStore::new(dir.path().join(".cword"));

        let key = store.save_at(&file, &timestamp()).unwrap();
        assert!(store.exists(&file, &key));

        fs::remove_file(file.path()).unwrap();
        store.restore(&file, &key).unwrap();

        assert_eq!(fs::read_to_string(file.path()).unwrap(), "keep\nme\n");
        assert!(!store.exists(&file, &key));
    }

    #[test]
    fn test_restore_missing_snapshot() {
        let dir = tempdir().unwrap();
        let file = TrackedFile::resolve(dir.path(), "notes.txt").unwrap();
        let store = SnapshotStore::new(dir.path().join(".cword"));

        let result = store.restore(&file, &SnapshotKey::from_text("never"));
        assert!(matches!(
            result,
            Err(crate::error::CwordError::History(HistoryError::SnapshotMissing { .. }))
        ));
        assert!(!file.exists());
    }

    #[test]
    fn test_clone_all_skips_changelog() {
        let dir = tempdir().unwrap();
        let from = TrackedFile::resolve(dir.path(), "a.txt").unwrap();
        let to = TrackedFile::resolve(dir.path(), "b.txt").unwrap();
        fs::write(from.path(), "x\n").unwrap();
        let store = SnapshotStore::new(dir.path().join(".cword"));

        let key = store.save_at(&from, &timestamp()).unwrap();
        fs::write(dir.path().join(".cword/a.txt").join(CHANGELOG_FILE), "").unwrap();

        assert_eq!(store.clone_all(&from, &to).unwrap(), 1);
        assert!(store.exists(&to, &key));
        assert!(!dir.path().join(".cword/b.txt").join(CHANGELOG_FILE).exists());
    }
}
