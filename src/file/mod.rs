//! ファイル操作モジュール
//!
//! - 行単位の読み書き（挿入・削除は一時ファイル経由で原子的に置き換え）
//! - 操作前のアクセス確認
//! - 追跡対象ファイル名の正規化

pub mod access;
pub mod path;
pub mod text_store;

// 公開API
pub use access::FileAccess;
pub use path::{expand_path, TrackedFile};
pub use text_store::TextStore;
