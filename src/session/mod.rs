//! ブラウザセッション
//!
//! アダプターはブラウザを直接操作せず、`Session` を通してページを操作する。
//! 1回の実行につきセッションは1つだけで、全アダプターが順番に借りて使う。

mod chrome;
mod display;
#[cfg(test)]
pub(crate) mod fake;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::SessionConfig;
use crate::error::SyncError;

pub use chrome::{ChromeLauncher, ChromeSession};
pub use display::VirtualDisplay;

/// ページ操作の最小セット
///
/// 待機を伴う操作 (`wait_for`, `text`, `fill`, `click`, `submit`) は
/// 設定されたタイムアウトで打ち切られ、`SyncError::ElementNotFound` を返す。
#[async_trait]
pub trait Session: Send + Sync {
    /// 要素待ち・遷移待ちの上限
    fn timeout(&self) -> Duration;

    async fn navigate(&self, url: &str) -> Result<(), SyncError>;

    async fn current_url(&self) -> Result<String, SyncError>;

    async fn wait_for(&self, selector: &str) -> Result<(), SyncError>;

    /// 要素のテキスト (出現を待つ)
    async fn text(&self, selector: &str) -> Result<String, SyncError>;

    /// 一致する全要素のテキスト (待たない)
    async fn texts(&self, selector: &str) -> Result<Vec<String>, SyncError>;

    /// 入力欄をクリアして値を入力
    async fn fill(&self, selector: &str, value: &str) -> Result<(), SyncError>;

    async fn click(&self, selector: &str) -> Result<(), SyncError>;

    /// 要素が属するフォームを送信
    async fn submit(&self, selector: &str) -> Result<(), SyncError>;

    async fn add_cookie(&self, cookie: &Cookie) -> Result<(), SyncError>;

    /// PNG スクリーンショット
    async fn screenshot(&self) -> Result<Vec<u8>, SyncError>;

    /// 2回目以降の呼び出しは何もしない
    async fn close(&self) -> Result<(), SyncError>;
}

/// 仮想ディスプレイとセッションの起動
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn start_display(&self, display_number: u32) -> Result<VirtualDisplay, SyncError> {
        VirtualDisplay::start(display_number).await
    }

    async fn launch(
        &self,
        config: &SessionConfig,
        display: Option<&VirtualDisplay>,
    ) -> Result<Box<dyn Session>, SyncError>;
}

/// ログイン前に設定するクッキー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
        }
    }
}
