//! 変更履歴モジュール
//!
//! - 追記専用の変更履歴（ファイルごと）
//! - ファイル全体削除時のスナップショット
//! - 最新1操作のロールバック

pub mod entry;
pub mod rollback;
pub mod snapshot;
pub mod store;

// 公開API
pub use entry::{sanitize, ChangeLogEntry, Operation, OperationKind, Timestamp};
pub use rollback::{Inverse, RollbackEngine, RollbackOutcome};
pub use snapshot::{SnapshotKey, SnapshotStore};
pub use store::{ChangeLogStore, Recorded, CHANGELOG_FILE};
