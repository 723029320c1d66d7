use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::config::{BrowserDriver, Settings};
use crate::error::SyncError;
use crate::orchestrator::{self, SyncReport};

/// 同期リクエスト
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub settings: Settings,
}

impl SyncRequest {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// 全送信先でフォームを送信しない
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.settings.global.dry_run |= dry_run;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.settings.global.headless = headless;
        self
    }

    /// 0 は 1 秒として扱う
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.settings.global.timeout_secs = timeout_secs.max(1);
        self
    }

    pub fn with_driver(mut self, driver: BrowserDriver) -> Self {
        self.settings.global.driver = driver;
        self
    }
}

/// tower::Serviceを実装した同期サービス
#[derive(Debug, Clone, Default)]
pub struct SyncService {}

impl SyncService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<SyncRequest> for SyncService {
    type Response = SyncReport;
    type Error = SyncError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SyncRequest) -> Self::Future {
        info!(
            sources = ?req.settings.global.sources,
            destinations = ?req.settings.global.destinations,
            dry_run = req.settings.global.dry_run,
            "同期リクエスト受信"
        );

        Box::pin(async move {
            let report = orchestrator::sync(req.settings).await?;

            info!(
                "同期完了: sources={}, destinations={}",
                report.sources.len(),
                report.destinations.len()
            );

            Ok(report)
        })
    }
}
