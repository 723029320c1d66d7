//! 同期処理の全体制御
//!
//! 設定読込 → アダプター読込 → セッション開始 → 取得元の取得 →
//! 送信先の処理 → セッション終了 の順に一方向に進む。
//!
//! 取得元の失敗はその取得元だけをスキップし、他の取得元と送信先の処理は続ける。
//! 送信先の失敗はその送信先 (と取得元の組) だけに留める。

use std::collections::HashMap;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{SessionConfig, Settings};
use crate::error::{ExitStatus, SyncError};
use crate::registry::{AdapterLoadError, Registry};
use crate::session::{ChromeLauncher, Launcher, Session};
use crate::traits::{Destination, Source};
use crate::types::{Metrics, SubmitResult};

/// 取得元1つの結果
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Fetched { metrics: Metrics },
    Failed { error: String },
}

/// 送信先1つ (取得元1つ分) の結果
#[derive(Debug, Clone, Serialize)]
pub struct DestinationReport {
    pub name: String,
    pub source: Option<String>,
    #[serde(flatten)]
    pub outcome: DestinationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DestinationOutcome {
    Completed { result: SubmitResult },
    Failed { error: String },
    /// 取得できた取得元がないため処理しなかった
    Skipped,
}

/// 実行結果
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sources: Vec<SourceReport>,
    pub destinations: Vec<DestinationReport>,
}

impl SyncReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            sources: Vec::new(),
            destinations: Vec::new(),
        }
    }

    fn source_failed(&mut self, name: &str, error: &SyncError) {
        self.sources.push(SourceReport {
            name: name.to_string(),
            outcome: SourceOutcome::Failed {
                error: error.to_string(),
            },
        });
    }

    fn destination_failed(&mut self, name: &str, source: Option<&str>, error: &SyncError) {
        self.destinations.push(DestinationReport {
            name: name.to_string(),
            source: source.map(str::to_string),
            outcome: DestinationOutcome::Failed {
                error: error.to_string(),
            },
        });
    }

    /// 取得元の失敗を優先する
    pub fn exit_status(&self) -> ExitStatus {
        let source_failed = self
            .sources
            .iter()
            .any(|s| matches!(s.outcome, SourceOutcome::Failed { .. }));
        let destination_failed = self
            .destinations
            .iter()
            .any(|d| matches!(d.outcome, DestinationOutcome::Failed { .. }));

        if source_failed {
            ExitStatus::SourceFetch
        } else if destination_failed {
            ExitStatus::DestinationSubmit
        } else {
            ExitStatus::Success
        }
    }
}

struct LoadedDestination {
    adapter: Box<dyn Destination>,
    submit: bool,
}

pub struct Orchestrator {
    settings: Settings,
    registry: Registry,
}

impl Orchestrator {
    pub fn new(settings: Settings, registry: Registry) -> Self {
        Self { settings, registry }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// モジュールを読み込み、設定順にアダプターを生成する
    pub fn load_adapters(mut self) -> LoadedAdapters {
        let global = &self.settings.global;
        let mut report = SyncReport::new();

        let names = global.sources.iter().chain(global.destinations.iter());
        let mut load_failures: HashMap<String, AdapterLoadError> = self
            .registry
            .load_all(names.map(String::as_str))
            .into_iter()
            .collect();

        let mut sources = Vec::new();
        for name in &global.sources {
            let built = match load_failures.remove(name) {
                Some(e) => Err(e.into()),
                None => self
                    .registry
                    .resolve(name)
                    .and_then(|d| d.build_source(self.settings.adapter(name))),
            };
            match built {
                Ok(source) => sources.push(source),
                Err(e) => {
                    error!(adapter = %name, "Error loading source: {}", e);
                    report.source_failed(name, &e);
                }
            }
        }

        let mut destinations = Vec::new();
        for name in &global.destinations {
            let adapter_settings = self.settings.adapter(name);
            let submit = adapter_settings.get_bool("submit", false) && !global.dry_run;
            let built = match load_failures.remove(name) {
                Some(e) => Err(e.into()),
                None => self
                    .registry
                    .resolve(name)
                    .and_then(|d| d.build_destination(adapter_settings)),
            };
            match built {
                Ok(adapter) => destinations.push(LoadedDestination { adapter, submit }),
                Err(e) => {
                    error!(adapter = %name, "Error loading destination: {}", e);
                    report.destination_failed(name, None, &e);
                }
            }
        }

        info!(
            sources = sources.len(),
            destinations = destinations.len(),
            "Adapters loaded"
        );

        LoadedAdapters {
            sources,
            destinations,
            debug_screenshots: global.debug_screenshots,
            report,
        }
    }
}

/// 生成済みのアダプター。セッションを渡して実行する
pub struct LoadedAdapters {
    sources: Vec<Box<dyn Source>>,
    destinations: Vec<LoadedDestination>,
    debug_screenshots: bool,
    report: SyncReport,
}

impl LoadedAdapters {
    /// 実行し、成否にかかわらずセッションを1回だけ閉じる
    pub async fn execute(self, session: &dyn Session) -> SyncReport {
        let mut report = self.run(session).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }
        report.finished_at = Some(Utc::now());
        info!(status = ?report.exit_status(), "Sync finished");
        report
    }

    async fn run(mut self, session: &dyn Session) -> SyncReport {
        let mut fetched: Vec<(String, Metrics)> = Vec::new();

        for source in self.sources.iter_mut() {
            let name = source.name().to_string();
            match source.fetch(session).await {
                Ok(metrics) => {
                    self.report.sources.push(SourceReport {
                        name: name.clone(),
                        outcome: SourceOutcome::Fetched { metrics },
                    });
                    fetched.push((name, metrics));
                }
                Err(e) => {
                    error!(adapter = %name, "Error accessing source: {}", e);
                    capture_screenshot(session, self.debug_screenshots, &name).await;
                    self.report.source_failed(&name, &e);
                }
            }
        }

        if fetched.is_empty() {
            warn!("No source metrics available, skipping destinations");
            for destination in &self.destinations {
                self.report.destinations.push(DestinationReport {
                    name: destination.adapter.name().to_string(),
                    source: None,
                    outcome: DestinationOutcome::Skipped,
                });
            }
            return self.report;
        }

        for destination in self.destinations.iter_mut() {
            let name = destination.adapter.name().to_string();

            if let Err(e) = destination.adapter.authenticate(session).await {
                error!(adapter = %name, "Error accessing destination: {}", e);
                capture_screenshot(session, self.debug_screenshots, &name).await;
                for (source_name, _) in &fetched {
                    self.report
                        .destination_failed(&name, Some(source_name), &e);
                }
                continue;
            }

            for (source_name, metrics) in &fetched {
                match deliver(destination, session, metrics).await {
                    Ok(result) => self.report.destinations.push(DestinationReport {
                        name: name.clone(),
                        source: Some(source_name.clone()),
                        outcome: DestinationOutcome::Completed { result },
                    }),
                    Err(e) => {
                        error!(
                            adapter = %name,
                            source = %source_name,
                            "Error submitting to destination: {}",
                            e
                        );
                        capture_screenshot(session, self.debug_screenshots, &name).await;
                        self.report
                            .destination_failed(&name, Some(source_name), &e);
                    }
                }
            }
        }

        self.report
    }
}

async fn deliver(
    destination: &mut LoadedDestination,
    session: &dyn Session,
    metrics: &Metrics,
) -> Result<SubmitResult, SyncError> {
    destination.adapter.retrieve_prior_metrics(session).await?;
    destination
        .adapter
        .submit_delta(session, metrics, destination.submit)
        .await
}

/// 失敗時のページをログに残す
async fn capture_screenshot(session: &dyn Session, enabled: bool, adapter: &str) {
    if !enabled {
        return;
    }
    match session.screenshot().await {
        Ok(png) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
            debug!(adapter, "Failure screenshot: data:image/png;base64,{}", encoded);
        }
        Err(e) => debug!(adapter, "Failed to capture screenshot: {}", e),
    }
}

/// 組み込みアダプターと Chrome セッションで1回同期する
pub async fn sync(settings: Settings) -> Result<SyncReport, SyncError> {
    sync_with(settings, Registry::new(), &ChromeLauncher).await
}

/// セッションを開けなければアダプターには一切触れずに `BrowserInit` で終わる
pub async fn sync_with(
    settings: Settings,
    registry: Registry,
    launcher: &dyn Launcher,
) -> Result<SyncReport, SyncError> {
    let session_config = SessionConfig::from(&settings.global);
    let loaded = Orchestrator::new(settings, registry).load_adapters();

    let display = match session_config.virtual_display {
        Some(number) => Some(launcher.start_display(number).await?),
        None => None,
    };

    let session = match launcher.launch(&session_config, display.as_ref()).await {
        Ok(session) => session,
        Err(e) => {
            error!("Error loading browser driver: {}", e);
            if let Some(display) = display {
                display.stop().await;
            }
            return Err(e);
        }
    };

    let report = loaded.execute(session.as_ref()).await;

    if let Some(display) = display {
        display.stop().await;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::config::AdapterSettings;
    use crate::registry::AdapterModule;
    use crate::session::fake::FakeSession;
    use crate::session::VirtualDisplay;
    use crate::traits::Adapter;
    use crate::types::Delta;

    /// 設定値 `distance` / `altitude` を返す。`selector` があればその要素を待つ
    struct StubSource {
        settings: AdapterSettings,
    }

    #[async_trait]
    impl Adapter for StubSource {
        fn name(&self) -> &str {
            &self.settings.name
        }

        async fn authenticate(&mut self, _session: &dyn Session) -> Result<(), SyncError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Source for StubSource {
        async fn retrieve_metrics(&mut self, session: &dyn Session) -> Result<Metrics, SyncError> {
            if let Some(selector) = self.settings.get_str("selector") {
                session.wait_for(selector).await?;
            }
            let value = |key: &str| {
                self.settings
                    .values
                    .get(key)
                    .and_then(toml::Value::as_integer)
                    .unwrap_or(0) as u64
            };
            Ok(Metrics::new(value("distance"), value("altitude")))
        }
    }

    /// 記録済みの累計値を設定から読み、差分を送信したことにする
    struct StubDestination {
        settings: AdapterSettings,
        prior: Metrics,
    }

    #[async_trait]
    impl Adapter for StubDestination {
        fn name(&self) -> &str {
            &self.settings.name
        }

        async fn authenticate(&mut self, session: &dyn Session) -> Result<(), SyncError> {
            if let Some(selector) = self.settings.get_str("login_selector") {
                session.wait_for(selector).await?;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Destination for StubDestination {
        async fn retrieve_prior_metrics(
            &mut self,
            _session: &dyn Session,
        ) -> Result<Metrics, SyncError> {
            Ok(self.prior)
        }

        async fn submit_delta(
            &mut self,
            session: &dyn Session,
            source: &Metrics,
            submit: bool,
        ) -> Result<SubmitResult, SyncError> {
            let Some(delta) = Delta::between(source, &self.prior) else {
                return Ok(SubmitResult::NoChange {
                    prior: self.prior,
                    source: *source,
                });
            };
            if let Some(selector) = self.settings.get_str("form_selector") {
                session.fill(selector, &delta.total_distance.to_string()).await?;
            }
            if !submit {
                return Ok(SubmitResult::DryRun { delta });
            }
            self.prior = delta.apply_to(&self.prior);
            Ok(SubmitResult::Submitted { delta })
        }
    }

    fn build_source(settings: AdapterSettings) -> Result<Box<dyn Source>, SyncError> {
        Ok(Box::new(StubSource { settings }))
    }

    fn build_destination(settings: AdapterSettings) -> Result<Box<dyn Destination>, SyncError> {
        let prior = Metrics::new(
            settings
                .values
                .get("prior_distance")
                .and_then(toml::Value::as_integer)
                .unwrap_or(0) as u64,
            settings
                .values
                .get("prior_altitude")
                .and_then(toml::Value::as_integer)
                .unwrap_or(0) as u64,
        );
        Ok(Box::new(StubDestination { settings, prior }))
    }

    fn register_stub_source(registry: &mut Registry, name: &str) {
        registry.register_source(name, build_source);
    }

    fn register_stub_destination(registry: &mut Registry, name: &str) {
        registry.register_destination(name, build_destination);
    }

    fn registry() -> Registry {
        Registry::with_modules(vec![
            AdapterModule::new("bike", register_stub_source),
            AdapterModule::new("portal", register_stub_destination),
        ])
    }

    async fn run(config: &str, session: &FakeSession) -> SyncReport {
        let settings = Settings::from_toml_str(config).unwrap();
        Orchestrator::new(settings, registry())
            .load_adapters()
            .execute(session)
            .await
    }

    #[tokio::test]
    async fn test_source_to_destination() {
        let session = FakeSession::new();
        let report = run(
            r#"
            [default]
            sources = ["bike"]
            destinations = ["portal"]

            [bike]
            distance = 1200
            altitude = 8400

            [portal]
            prior_distance = 1150
            prior_altitude = 8100
            submit = true
            "#,
            &session,
        )
        .await;

        assert_eq!(report.exit_status(), ExitStatus::Success);
        assert_eq!(
            report.sources[0].outcome,
            SourceOutcome::Fetched {
                metrics: Metrics::new(1200, 8400)
            }
        );
        assert_eq!(
            report.destinations[0].outcome,
            DestinationOutcome::Completed {
                result: SubmitResult::Submitted {
                    delta: Delta {
                        total_distance: 1200,
                        additional_altitude: Some(300),
                    }
                }
            }
        );
        assert_eq!(report.destinations[0].source.as_deref(), Some("bike"));
        assert!(report.finished_at.is_some());
        assert_eq!(session.close_count(), 1);
    }

    #[tokio::test]
    async fn test_global_dry_run_overrides_submit() {
        let session = FakeSession::new();
        let report = run(
            r#"
            [default]
            dry_run = true
            sources = ["bike"]
            destinations = ["portal"]

            [bike]
            distance = 1200

            [portal]
            prior_distance = 1150
            submit = true
            "#,
            &session,
        )
        .await;

        assert!(matches!(
            report.destinations[0].outcome,
            DestinationOutcome::Completed {
                result: SubmitResult::DryRun { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_single_source_timeout_skips_destinations() {
        let session = FakeSession::new();
        let report = run(
            r##"
            [default]
            sources = ["bike"]
            destinations = ["portal"]

            [bike]
            selector = "#statistic-box-distance"
            "##,
            &session,
        )
        .await;

        match &report.sources[0].outcome {
            SourceOutcome::Failed { error } => assert!(error.contains("#statistic-box-distance")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(report.destinations[0].outcome, DestinationOutcome::Skipped);
        assert_eq!(report.exit_status(), ExitStatus::SourceFetch);
        assert_eq!(session.close_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_source_does_not_block_others() {
        let session = FakeSession::new();
        let report = run(
            r##"
            [default]
            sources = ["bike.broken", "bike.ok"]
            destinations = ["portal"]

            [bike.broken]
            selector = "#missing"

            [bike.ok]
            distance = 10

            [portal]
            submit = true
            "##,
            &session,
        )
        .await;

        assert!(matches!(report.sources[0].outcome, SourceOutcome::Failed { .. }));
        assert!(matches!(report.sources[1].outcome, SourceOutcome::Fetched { .. }));
        assert_eq!(report.destinations.len(), 1);
        assert_eq!(report.destinations[0].source.as_deref(), Some("bike.ok"));
        assert_eq!(report.exit_status(), ExitStatus::SourceFetch);
    }

    #[tokio::test]
    async fn test_unknown_module_is_reported_and_others_load() {
        let session = FakeSession::new();
        let report = run(
            r#"
            [default]
            sources = ["strava", "bike"]
            destinations = ["portal"]

            [bike]
            distance = 10
            "#,
            &session,
        )
        .await;

        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.sources[0].name, "strava");
        assert!(matches!(report.sources[0].outcome, SourceOutcome::Failed { .. }));
        assert_eq!(report.sources[1].name, "bike");
        assert!(matches!(report.sources[1].outcome, SourceOutcome::Fetched { .. }));
        assert!(matches!(
            report.destinations[0].outcome,
            DestinationOutcome::Completed {
                result: SubmitResult::DryRun { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_reported() {
        let session = FakeSession::new();
        let report = run(
            r#"
            [default]
            sources = ["bike"]
            destinations = ["bike.wrong"]

            [bike]
            distance = 10
            "#,
            &session,
        )
        .await;

        match &report.destinations[0].outcome {
            DestinationOutcome::Failed { error } => assert!(error.contains("bike.wrong")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(report.exit_status(), ExitStatus::DestinationSubmit);
    }

    #[tokio::test]
    async fn test_destination_failure_is_scoped() {
        let session = FakeSession::new();
        let report = run(
            r##"
            [default]
            sources = ["bike"]
            destinations = ["portal.broken", "portal.ok", "portal.locked"]

            [bike]
            distance = 20

            [portal.broken]
            form_selector = "input[name=km_end]"

            [portal.ok]
            submit = true

            [portal.locked]
            login_selector = "#email"
            "##,
            &session,
        )
        .await;

        let outcomes: Vec<(&str, &DestinationOutcome)> = report
            .destinations
            .iter()
            .map(|d| (d.name.as_str(), &d.outcome))
            .collect();

        assert!(matches!(outcomes[0], ("portal.broken", DestinationOutcome::Failed { .. })));
        assert!(matches!(
            outcomes[1],
            (
                "portal.ok",
                DestinationOutcome::Completed {
                    result: SubmitResult::Submitted { .. }
                }
            )
        ));
        assert!(matches!(outcomes[2], ("portal.locked", DestinationOutcome::Failed { .. })));
        assert_eq!(report.exit_status(), ExitStatus::DestinationSubmit);
        assert_eq!(session.close_count(), 1);
    }

    #[tokio::test]
    async fn test_no_change_is_success() {
        let session = FakeSession::new();
        let report = run(
            r#"
            [default]
            debug_screenshots = true
            sources = ["bike"]
            destinations = ["portal"]

            [bike]
            distance = 1150
            altitude = 8400

            [portal]
            prior_distance = 1150
            prior_altitude = 8100
            submit = true
            "#,
            &session,
        )
        .await;

        assert!(matches!(
            report.destinations[0].outcome,
            DestinationOutcome::Completed {
                result: SubmitResult::NoChange { .. }
            }
        ));
        assert_eq!(report.exit_status(), ExitStatus::Success);
    }

    /// セッション起動に失敗するテストでだけ使うアダプターの認証回数
    static TOUCHED: AtomicUsize = AtomicUsize::new(0);

    struct TouchedSource {
        name: String,
    }

    #[async_trait]
    impl Adapter for TouchedSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn authenticate(&mut self, _session: &dyn Session) -> Result<(), SyncError> {
            TOUCHED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Source for TouchedSource {
        async fn retrieve_metrics(&mut self, _session: &dyn Session) -> Result<Metrics, SyncError> {
            Ok(Metrics::new(1, 0))
        }
    }

    fn build_touched(settings: AdapterSettings) -> Result<Box<dyn Source>, SyncError> {
        Ok(Box::new(TouchedSource {
            name: settings.name,
        }))
    }

    fn register_touched(registry: &mut Registry, name: &str) {
        registry.register_source(name, build_touched);
    }

    /// ディスプレイ/ブラウザの起動に失敗する
    #[derive(Default)]
    struct BrokenLauncher {
        display_fails: bool,
        launches: AtomicUsize,
    }

    #[async_trait]
    impl Launcher for BrokenLauncher {
        async fn start_display(&self, display_number: u32) -> Result<VirtualDisplay, SyncError> {
            if self.display_fails {
                return Err(SyncError::BrowserInit(format!(
                    "Xvfb :{} を起動できません",
                    display_number
                )));
            }
            VirtualDisplay::start(display_number).await
        }

        async fn launch(
            &self,
            _config: &SessionConfig,
            _display: Option<&VirtualDisplay>,
        ) -> Result<Box<dyn Session>, SyncError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Err(SyncError::BrowserInit("chrome が見つかりません".into()))
        }
    }

    /// 常に `FakeSession` を返す
    struct FakeLauncher;

    #[async_trait]
    impl Launcher for FakeLauncher {
        async fn launch(
            &self,
            _config: &SessionConfig,
            _display: Option<&VirtualDisplay>,
        ) -> Result<Box<dyn Session>, SyncError> {
            Ok(Box::new(FakeSession::new()))
        }
    }

    fn touched_registry() -> Registry {
        Registry::with_modules(vec![
            AdapterModule::new("touched", register_touched),
            AdapterModule::new("portal", register_stub_destination),
        ])
    }

    #[tokio::test]
    async fn test_browser_launch_failure_is_fatal() {
        let settings = Settings::from_toml_str(
            r#"
            [default]
            sources = ["touched"]
            destinations = ["portal"]
            "#,
        )
        .unwrap();
        let launcher = BrokenLauncher::default();

        let err = sync_with(settings, touched_registry(), &launcher)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::BrowserInit(_)));
        assert_eq!(err.exit_status(), ExitStatus::BrowserInit);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert_eq!(TOUCHED.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_virtual_display_failure_is_fatal() {
        let settings = Settings::from_toml_str(
            r#"
            [default]
            virtual_display = true
            display_number = 42
            sources = ["touched"]
            "#,
        )
        .unwrap();
        let launcher = BrokenLauncher {
            display_fails: true,
            ..Default::default()
        };

        let err = sync_with(settings, touched_registry(), &launcher)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::BrowserInit(ref msg) if msg.contains(":42")));
        assert_eq!(err.exit_status(), ExitStatus::BrowserInit);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
        assert_eq!(TOUCHED.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sync_with_launched_session() {
        let settings = Settings::from_toml_str(
            r#"
            [default]
            sources = ["bike"]
            destinations = ["portal"]

            [bike]
            distance = 1200
            altitude = 8400

            [portal]
            prior_distance = 1150
            prior_altitude = 8100
            "#,
        )
        .unwrap();

        let report = sync_with(settings, registry(), &FakeLauncher).await.unwrap();

        assert_eq!(report.exit_status(), ExitStatus::Success);
        assert!(matches!(
            report.destinations[0].outcome,
            DestinationOutcome::Completed {
                result: SubmitResult::DryRun { .. }
            }
        ));
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: EBIKESYNC_CONFIG=./config.toml cargo test test_live_sync -- --ignored --nocapture
    async fn test_live_sync() {
        tracing_subscriber::fmt()
            .with_env_filter("info,ebikesync=debug")
            .init();

        let path = std::env::var("EBIKESYNC_CONFIG").expect("EBIKESYNC_CONFIG not set");
        let mut settings = Settings::load(path.as_ref()).expect("Failed to load config");
        settings.global.dry_run = true;

        let report = sync(settings).await.expect("Failed to launch browser");
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    }

    #[tokio::test]
    async fn test_report_json() {
        let session = FakeSession::new();
        let report = run(
            r#"
            [default]
            sources = ["bike"]

            [bike]
            distance = 5
            "#,
            &session,
        )
        .await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sources"][0]["name"], "bike");
        assert_eq!(json["sources"][0]["status"], "fetched");
        assert_eq!(json["sources"][0]["metrics"]["total_distance"], 5);
    }
}
