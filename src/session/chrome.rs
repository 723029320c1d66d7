use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{BrowserDriver, SessionConfig};
use crate::error::SyncError;

use super::{Cookie, Launcher, Session, VirtualDisplay};

/// 要素出現チェックの間隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// CDPリクエストのタイムアウト
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const SUBMIT_FORM_JS: &str = r#"
    function() {
        const form = this.form || this.closest('form');
        if (!form) {
            return false;
        }
        if (typeof form.requestSubmit === 'function') {
            form.requestSubmit();
        } else {
            form.submit();
        }
        return true;
    }
"#;

const CLEAR_VALUE_JS: &str = "function() { this.value = ''; }";

/// 起動中のブラウザと、そのユーザーデータディレクトリ
struct Running {
    browser: Browser,
    profile: TempDir,
}

/// chromiumoxide (Chrome DevTools Protocol) によるセッション
pub struct ChromeSession {
    running: Mutex<Option<Running>>,
    page: Page,
    handler: JoinHandle<()>,
    timeout: Duration,
}

impl ChromeSession {
    /// ブラウザを起動して空のページを開く
    pub async fn launch(
        config: &SessionConfig,
        display: Option<&VirtualDisplay>,
    ) -> Result<Self, SyncError> {
        info!(driver = ?config.driver, headless = config.headless, "Launching browser...");

        let executable = resolve_executable(config.driver)?;
        debug!("Browser executable: {}", executable.display());

        // 実行ごとに使い捨てのユーザーデータディレクトリ (close で削除)
        let profile = create_profile()?;
        debug!("User data dir: {}", profile.path().display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile.path())
            .window_size(1280, 800)
            .no_sandbox()
            .request_timeout(REQUEST_TIMEOUT)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage");

        // 仮想ディスプレイ上ではヘッドありで起動する
        if let Some(display) = display {
            builder = builder.with_head().env("DISPLAY", display.name());
        } else if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| SyncError::BrowserInit(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SyncError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {:?}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SyncError::BrowserInit(e.to_string()))?;

        info!("Browser launched");
        Ok(Self {
            running: Mutex::new(Some(Running { browser, profile })),
            page,
            handler,
            timeout: config.timeout,
        })
    }

    async fn url_or_blank(&self) -> String {
        self.page.url().await.ok().flatten().unwrap_or_default()
    }

    /// 要素が現れるまで最大 `timeout` 待つ
    async fn find(&self, selector: &str) -> Result<Element, SyncError> {
        let start = Instant::now();
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) if start.elapsed() >= self.timeout => {
                    debug!(selector, "Element lookup gave up: {}", e);
                    return Err(SyncError::ElementNotFound {
                        selector: selector.to_string(),
                        url: self.url_or_blank().await,
                        timeout: self.timeout,
                    });
                }
                Err(_) => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    /// フォーム送信後、URLが `from` から変わるのを待ってから読み込み完了を待つ
    ///
    /// 同じURLに戻るフォームでは上限まで待つ。
    async fn settle(&self, from: &str) {
        let start = Instant::now();
        while self.url_or_blank().await == from {
            if start.elapsed() >= self.timeout {
                debug!(url = from, "No navigation within {:?}", self.timeout);
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        match tokio::time::timeout(self.timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("Navigation wait failed: {}", e),
            Err(_) => debug!("Page load not finished within {:?}", self.timeout),
        }
    }
}

/// `ChromeSession` を起動する
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(
        &self,
        config: &SessionConfig,
        display: Option<&VirtualDisplay>,
    ) -> Result<Box<dyn Session>, SyncError> {
        Ok(Box::new(ChromeSession::launch(config, display).await?))
    }
}

#[async_trait]
impl Session for ChromeSession {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn navigate(&self, url: &str) -> Result<(), SyncError> {
        debug!(url, "Navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| SyncError::Navigation(format!("{}: {}", url, e)))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| SyncError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SyncError> {
        self.page
            .url()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| SyncError::Driver(e.to_string()))
    }

    async fn wait_for(&self, selector: &str) -> Result<(), SyncError> {
        self.find(selector).await.map(|_| ())
    }

    async fn text(&self, selector: &str) -> Result<String, SyncError> {
        let element = self.find(selector).await?;
        let text = element
            .inner_text()
            .await
            .map_err(|e| SyncError::Driver(format!("{}: {}", selector, e)))?;
        Ok(text.unwrap_or_default())
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, SyncError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| SyncError::Driver(format!("{}: {}", selector, e)))?;

        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            let text = element
                .inner_text()
                .await
                .map_err(|e| SyncError::Driver(format!("{}: {}", selector, e)))?;
            texts.push(text.unwrap_or_default());
        }
        Ok(texts)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), SyncError> {
        let element = self.find(selector).await?;
        let driver_error = |e: chromiumoxide::error::CdpError| {
            SyncError::Driver(format!("{}への入力: {}", selector, e))
        };

        element.click().await.map_err(driver_error)?;
        element
            .call_js_fn(CLEAR_VALUE_JS, false)
            .await
            .map_err(driver_error)?;
        element.type_str(value).await.map_err(driver_error)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), SyncError> {
        self.find(selector)
            .await?
            .click()
            .await
            .map_err(|e| SyncError::Driver(format!("{}のクリック: {}", selector, e)))?;
        Ok(())
    }

    async fn submit(&self, selector: &str) -> Result<(), SyncError> {
        let element = self.find(selector).await?;
        let from = self.url_or_blank().await;
        let returns = element
            .call_js_fn(SUBMIT_FORM_JS, false)
            .await
            .map_err(|e| SyncError::Driver(format!("{}の送信: {}", selector, e)))?;

        let submitted = returns
            .result
            .value
            .as_ref()
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if !submitted {
            return Err(SyncError::Driver(format!(
                "{} はフォームに属していません",
                selector
            )));
        }

        self.settle(&from).await;
        Ok(())
    }

    async fn add_cookie(&self, cookie: &Cookie) -> Result<(), SyncError> {
        let param = CookieParam::builder()
            .name(&cookie.name)
            .value(&cookie.value)
            .domain(&cookie.domain)
            .path(&cookie.path)
            .secure(cookie.secure)
            .http_only(cookie.http_only)
            .build()
            .map_err(|e| SyncError::Driver(format!("クッキー {}: {}", cookie.name, e)))?;

        self.page
            .set_cookie(param)
            .await
            .map_err(|e| SyncError::Driver(format!("クッキー {}: {}", cookie.name, e)))?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SyncError> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| SyncError::Driver(e.to_string()))
    }

    async fn close(&self) -> Result<(), SyncError> {
        let Some(Running {
            mut browser,
            profile,
        }) = self.running.lock().await.take()
        else {
            return Ok(());
        };
        info!("Closing browser...");

        let result = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| SyncError::Driver(format!("ブラウザ終了: {}", e)));
        if let Err(e) = browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        self.handler.abort();
        remove_profile(profile);

        info!("Browser closed");
        result
    }
}

fn create_profile() -> Result<TempDir, SyncError> {
    tempfile::Builder::new()
        .prefix("ebikesync-")
        .tempdir()
        .map_err(|e| {
            SyncError::BrowserInit(format!("ユーザーデータディレクトリを作成できません: {}", e))
        })
}

/// ブラウザ終了後にユーザーデータディレクトリを削除する
fn remove_profile(profile: TempDir) {
    let path = profile.path().to_path_buf();
    match profile.close() {
        Ok(()) => debug!("Removed user data dir {}", path.display()),
        Err(e) => warn!("Failed to remove user data dir {}: {}", path.display(), e),
    }
}

/// `CHROME_PATH` が設定されていればそれを使い、なければ PATH からドライバーの実行ファイルを探す
fn resolve_executable(driver: BrowserDriver) -> Result<PathBuf, SyncError> {
    if let Ok(path) = std::env::var("CHROME_PATH") {
        return Ok(PathBuf::from(path));
    }

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&search_path)
        .flat_map(|dir| driver.executables().iter().map(move |exe| dir.join(exe)))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            SyncError::BrowserInit(format!(
                "{:?} の実行ファイルが見つかりません (候補: {})",
                driver,
                driver.executables().join(", ")
            ))
        })
}
