//! テキストストア
//!
//! 1始まりの行番号で読み取り・追記・挿入・削除を行う。
//! 追記はファイル末尾へ直接書き込み、挿入と削除は一時ファイルへ
//! 書き出してから rename で置き換える（読み手には旧内容か新内容のみが見える）

use crate::error::{FileError, IoContext, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// 行単位のファイル操作
#[derive(Debug, Clone, Copy, Default)]
pub struct TextStore;

impl TextStore {
    pub fn new() -> Self {
        Self
    }

    /// 行数（終端改行のない最終行も1行と数える）
    pub fn line_count(&self, path: &Path) -> Result<usize> {
        scan_lines(path, |_, _| true)
    }

    /// 指定行を取得（行末の改行は含まない）
    pub fn read_line(&self, path: &Path, line: usize) -> Result<String> {
        let mut found = None;
        let total = scan_lines(path, |number, raw| {
            if number == line {
                found = Some(strip_terminator(raw));
                false
            } else {
                true
            }
        })?;

        found.ok_or_else(|| FileError::LineOutOfRange { line, total }.into())
    }

    /// 全行を取得
    pub fn read_lines(&self, path: &Path) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        scan_lines(path, |_, raw| {
            lines.push(strip_terminator(raw));
            true
        })?;
        Ok(lines)
    }

    /// `from..=to` の行を行番号付きで取得（範囲外は切り詰める）
    pub fn read_range(&self, path: &Path, from: usize, to: usize) -> Result<Vec<(usize, String)>> {
        let mut lines = Vec::new();
        scan_lines(path, |number, raw| {
            if number >= from && number <= to {
                lines.push((number, strip_terminator(raw)));
            }
            number < to
        })?;
        Ok(lines)
    }

    /// 末尾に1行追記（書き換えなし）
    ///
    /// 最終行に改行がない場合は先に改行を補う
    pub fn append_line(&self, path: &Path, content: &str) -> Result<()> {
        let needs_separator = !ends_with_newline(path)?;

        let mut data = Vec::with_capacity(content.len() + 2);
        if needs_separator {
            data.push(b'\n');
        }
        data.extend_from_slice(terminated(content).as_bytes());

        let mut file = OpenOptions::new().append(true).open(path).with_path(path)?;
        file.write_all(&data).with_path(path)?;
        log::debug!("appended {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    /// 指定行の前に挿入
    ///
    /// `line == 行数 + 1` は追記と同じ扱い
    pub fn insert_line(&self, path: &Path, line: usize, content: &str) -> Result<()> {
        let total = self.line_count(path)?;
        if line == 0 || line > total + 1 {
            return Err(FileError::LineOutOfRange { line, total }.into());
        }
        if line == total + 1 {
            return self.append_line(path, content);
        }

        let inserted = terminated(content);
        self.rewrite(path, |number, raw, out| {
            if number == line {
                out.write_all(inserted.as_bytes())?;
            }
            out.write_all(raw)
        })?;
        log::debug!("inserted line {} into {}", line, path.display());
        Ok(())
    }

    /// 指定行を削除し、その内容（改行なし）を返す
    pub fn delete_line(&self, path: &Path, line: usize) -> Result<String> {
        let total = self.line_count(path)?;
        if line == 0 || line > total {
            return Err(FileError::LineOutOfRange { line, total }.into());
        }

        let mut removed = String::new();
        self.rewrite(path, |number, raw, out| {
            if number == line {
                removed = strip_terminator(raw);
                Ok(())
            } else {
                out.write_all(raw)
            }
        })?;
        log::debug!("deleted line {} from {}", line, path.display());
        Ok(removed)
    }

    /// 末尾から `count` 行を削除し、実際に削除した行数を返す
    pub fn delete_last_lines(&self, path: &Path, count: usize) -> Result<usize> {
        let total = self.line_count(path)?;
        let keep = total.saturating_sub(count);

        self.rewrite(path, |number, raw, out| {
            if number <= keep {
                out.write_all(raw)
            } else {
                Ok(())
            }
        })?;
        Ok(total - keep)
    }

    /// ファイル全体をコピー
    pub fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        if !from.is_file() {
            return Err(FileError::NotFound {
                path: from.display().to_string(),
            }
            .into());
        }
        fs::copy(from, to).with_path(to)?;
        Ok(())
    }

    /// 一時ファイル経由の書き換え
    fn rewrite<F>(&self, path: &Path, mut edit: F) -> Result<()>
    where
        F: FnMut(usize, &[u8], &mut dyn Write) -> io::Result<()>,
    {
        let temp_path = temp_path_for(path)?;

        if let Err(e) = write_edited(path, &temp_path, &mut edit) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if let Ok(metadata) = fs::metadata(path) {
            let _ = fs::set_permissions(&temp_path, metadata.permissions());
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            FileError::from_io(e, path).into()
        })
    }
}

/// 元ファイルを1行ずつ読み、編集結果を一時ファイルへ書き出す
fn write_edited<F>(path: &Path, temp_path: &Path, edit: &mut F) -> Result<()>
where
    F: FnMut(usize, &[u8], &mut dyn Write) -> io::Result<()>,
{
    let source = File::open(path).with_path(path)?;
    let mut reader = BufReader::new(source);
    let temp = File::create(temp_path).with_path(temp_path)?;
    let mut writer = BufWriter::new(temp);

    let mut buf = Vec::new();
    let mut number = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).with_path(path)? == 0 {
            break;
        }
        number += 1;
        edit(number, &buf, &mut writer).with_path(temp_path)?;
    }

    let file = writer.into_inner().map_err(|e| e.into_error()).with_path(temp_path)?;
    file.sync_all().with_path(temp_path)?;
    Ok(())
}

/// 行を順に走査し、総行数（途中終了時はそこまで）を返す
///
/// コールバックが `false` を返すと走査を打ち切る
fn scan_lines<F>(path: &Path, mut visit: F) -> Result<usize>
where
    F: FnMut(usize, &[u8]) -> bool,
{
    let file = File::open(path).with_path(path)?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut number = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).with_path(path)? == 0 {
            break;
        }
        number += 1;
        if !visit(number, &buf) {
            break;
        }
    }
    Ok(number)
}

/// 空ファイルか、最終バイトが改行か
fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path).with_path(path)?;
    let len = file.metadata().with_path(path)?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1)).with_path(path)?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).with_path(path)?;
    Ok(last[0] == b'\n')
}

fn strip_terminator(raw: &[u8]) -> String {
    let body = raw.strip_suffix(b"\n").unwrap_or(raw);
    String::from_utf8_lossy(body).into_owned()
}

fn terminated(content: &str) -> String {
    if content.ends_with('\n') {
        content.to_string()
    } else {
        format!("{}\n", content)
    }
}

/// 同じディレクトリに一意な一時ファイル名を生成
fn temp_path_for(original: &Path) -> Result<PathBuf> {
    let filename = original.file_name().ok_or_else(|| FileError::InvalidPath {
        path: original.display().to_string(),
    })?;
    let temp_name = format!(".{}_{}.cword-tmp", filename.to_string_lossy(), std::process::id());

    Ok(match original.parent() {
        Some(parent) => parent.join(temp_name),
        None => PathBuf::from(temp_name),
    })
}
