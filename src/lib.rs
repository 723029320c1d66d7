//! eBike の累計走行統計を別サイトへ同期するライブラリ
//!
//! - 取得元 (Source): Bosch eBike Connect のダッシュボードから累計距離・標高を取得
//! - 送信先 (Destination): radelt.at に新しいオドメーター値と追加標高を登録
//!
//! アダプターは設定ファイルの名前でレジストリから引かれ、1つのブラウザセッションを
//! 順番に使う。
//!
//! # 使用例
//!
//! ```rust,ignore
//! use ebikesync::{Settings, SyncRequest, SyncService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::load("config.toml".as_ref()).unwrap();
//!     let mut service = SyncService::new();
//!
//!     let request = SyncRequest::new(settings).with_dry_run(true);
//!     let report = service.call(request).await.unwrap();
//!     println!("exit status: {:?}", report.exit_status());
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod login;
pub mod orchestrator;
pub mod parse;
pub mod registry;
pub mod service;
pub mod session;
pub mod traits;
pub mod types;

// 主要な型をリエクスポート
pub use config::{AdapterSettings, BrowserDriver, Credentials, SessionConfig, Settings};
pub use error::{ExitStatus, SyncError};
pub use orchestrator::{sync, sync_with, Orchestrator, SyncReport};
pub use registry::{AdapterKind, AdapterLoadError, Registry};
pub use service::{SyncRequest, SyncService};
pub use session::{ChromeLauncher, ChromeSession, Launcher, Session};
pub use traits::{Adapter, Destination, Source};
pub use types::{Delta, Metrics, SubmitResult};
