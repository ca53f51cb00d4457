//! 変更履歴レコード
//!
//! ディスク上の形式は1行1レコード: `[HH:MM:SS DD/MM/YYYY]||KIND||info`
//! 過去の実行で書かれたログと互換性を保つため、区切り文字の順序は固定。
//! 行内容は埋め込む前に `||` と `::` を取り除く（サニタイズ）

use crate::error::{HistoryError, Result};
use crate::history::snapshot::SnapshotKey;
use chrono::{Local, NaiveDateTime, Timelike};
use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// フィールド区切り
pub const FIELD_SEPARATOR: &str = "||";
/// DELETE の行番号と内容の区切り
pub const INFO_SEPARATOR: &str = "::";

const TIMESTAMP_FORMAT: &str = "%H:%M:%S %d/%m/%Y";

/// 予約区切り文字を取り除く
///
/// 取り除いた結果として新たな区切り文字ができることがあるため、
/// 残らなくなるまで繰り返す
pub fn sanitize(content: &str) -> String {
    let mut current = content.to_string();
    loop {
        let next = current
            .replace(INFO_SEPARATOR, "")
            .replace(FIELD_SEPARATOR, "");
        if next == current {
            return next;
        }
        current = next;
    }
}

/// 秒精度のローカル時刻
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// 現在時刻（秒未満は切り捨て）
    pub fn now() -> Self {
        let now = Local::now().naive_local();
        Self(now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self(datetime.with_nanosecond(0).unwrap_or(datetime))
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// `HH:MM:SS DD/MM/YYYY` 形式から解析
    pub fn parse(text: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
            .ok()
            .map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// 操作種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Created,
    Append,
    Insert,
    Delete,
    Deleted,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Created => "CREATED",
            OperationKind::Append => "APPEND",
            OperationKind::Insert => "INSERT",
            OperationKind::Delete => "DELETE",
            OperationKind::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = HistoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(OperationKind::Created),
            "APPEND" => Ok(OperationKind::Append),
            "INSERT" => Ok(OperationKind::Insert),
            "DELETE" => Ok(OperationKind::Delete),
            "DELETED" => Ok(OperationKind::Deleted),
            other => Err(HistoryError::MalformedLog {
                record: format!("unknown operation kind {}", other),
            }),
        }
    }
}

/// 記録された操作とその情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// ファイル作成
    Created,
    /// 末尾へ `lines` 行を一括追記
    Append { lines: usize },
    /// `line` 行目へ挿入
    Insert { line: usize },
    /// `line` 行目（内容 `content`）を削除
    Delete { line: usize, content: String },
    /// ファイル全体を削除（スナップショット `snapshot` に退避）
    Deleted { snapshot: SnapshotKey },
}

impl Operation {
    /// 行削除の記録（内容はサニタイズされる）
    pub fn delete(line: usize, content: &str) -> Self {
        Operation::Delete {
            line,
            content: sanitize(content),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Created => OperationKind::Created,
            Operation::Append { .. } => OperationKind::Append,
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Deleted { .. } => OperationKind::Deleted,
        }
    }

    /// info フィールドの文字列表現
    pub fn info(&self) -> String {
        match self {
            Operation::Created => String::new(),
            Operation::Append { lines } => format!("+{}", lines),
            Operation::Insert { line } => line.to_string(),
            Operation::Delete { line, content } => {
                format!("{}{}{}", line, INFO_SEPARATOR, sanitize(content))
            }
            Operation::Deleted { snapshot } => snapshot.to_string(),
        }
    }

    /// 種別と info から復元
    pub fn parse(kind: OperationKind, info: &str) -> Result<Self> {
        let malformed = || HistoryError::MalformedLog {
            record: format!("{}{}{}", kind, FIELD_SEPARATOR, info),
        };

        let operation = match kind {
            OperationKind::Created => Operation::Created,
            OperationKind::Append => {
                let digits = info.trim().trim_start_matches('+');
                Operation::Append {
                    lines: digits.parse().map_err(|_| malformed())?,
                }
            }
            OperationKind::Insert => Operation::Insert {
                line: info.trim().parse().map_err(|_| malformed())?,
            },
            OperationKind::Delete => {
                let (line, content) = info.split_once(INFO_SEPARATOR).ok_or_else(malformed)?;
                Operation::Delete {
                    line: line.trim().parse().map_err(|_| malformed())?,
                    content: content.to_string(),
                }
            }
            OperationKind::Deleted => Operation::Deleted {
                snapshot: SnapshotKey::parse(info.trim()).ok_or_else(malformed)?,
            },
        };
        Ok(operation)
    }
}

/// 変更履歴の1レコード（不変）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLogEntry {
    pub timestamp: Timestamp,
    pub operation: Operation,
}

fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[(?P<ts>[^\]]*)\]\|\|(?P<kind>[A-Z]+)\|\|(?P<info>.*)$")
            .expect("record pattern is valid")
    })
}

impl ChangeLogEntry {
    pub fn new(operation: Operation) -> Self {
        Self {
            timestamp: Timestamp::now(),
            operation,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// レコード行（改行なし）
    pub fn to_record(&self) -> String {
        format!(
            "[{}]{}{}{}{}",
            self.timestamp,
            FIELD_SEPARATOR,
            self.kind(),
            FIELD_SEPARATOR,
            self.operation.info()
        )
    }

    /// レコード行を解析
    pub fn parse(record: &str) -> Result<Self> {
        let record = record.strip_suffix('\n').unwrap_or(record);
        let malformed = || HistoryError::MalformedLog {
            record: record.to_string(),
        };

        let caps = record_pattern().captures(record).ok_or_else(malformed)?;
        let timestamp = Timestamp::parse(&caps["ts"]).ok_or_else(malformed)?;
        let kind: OperationKind = caps["kind"].parse()?;
        let operation = Operation::parse(kind, &caps["info"])?;

        Ok(Self {
            timestamp,
            operation,
        })
    }
}

impl fmt::Display for ChangeLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_record())
    }
}

impl Serialize for ChangeLogEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ChangeLogEntry", 3)?;
        state.serialize_field("timestamp", &self.timestamp.to_string())?;
        state.serialize_field("kind", self.kind().as_str())?;
        state.serialize_field("info", &self.operation.info())?;
        state.end()
    }
}
