//! cword - 変更履歴付きの行単位テキストエディタ
//!
//! すべての変更をファイルごとの追記専用ログに記録し、
//! 直近の1操作ずつロールバックできる

// コアモジュール
pub mod config;
pub mod error;
pub mod logging;

// データ層
pub mod file;
pub mod history;

// 編集層
pub mod workspace;

// 表示層
pub mod app;
pub mod cli;
pub mod frontend;

// 公開API
pub use app::App;
pub use config::Config;
pub use error::{CwordError, Result};
pub use frontend::TuiApplication;
pub use workspace::Workspace;
