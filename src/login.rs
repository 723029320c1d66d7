//! ログイン処理
//!
//! 各サイトの違い (クッキー同意の方法、ログインの確定方法) は
//! `ConsentStep` / `LoginConfirm` で表現し、手順そのものは共通にする。

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::Credentials;
use crate::error::SyncError;
use crate::session::{Cookie, Session};

/// クッキー同意の方法
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConsentStep {
    #[default]
    None,
    /// ログインページ表示後に同意ボタンを押す
    ClickButton(String),
    /// ログインページを開く前に同意済みクッキーを設定する
    Cookies(Vec<Cookie>),
}

/// ログインフォームの確定方法
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoginConfirm {
    /// パスワード欄のフォームを送信
    #[default]
    SubmitForm,
    ClickButton(String),
}

/// サイトごとのログイン手順
#[derive(Debug, Clone)]
pub struct LoginFlow {
    pub login_url: String,
    pub consent: ConsentStep,
    pub username_selector: String,
    pub password_selector: String,
    pub confirm: LoginConfirm,
}

impl LoginFlow {
    pub fn new(
        login_url: impl Into<String>,
        username_selector: impl Into<String>,
        password_selector: impl Into<String>,
    ) -> Self {
        Self {
            login_url: login_url.into(),
            consent: ConsentStep::default(),
            username_selector: username_selector.into(),
            password_selector: password_selector.into(),
            confirm: LoginConfirm::default(),
        }
    }

    pub fn with_consent(mut self, consent: ConsentStep) -> Self {
        self.consent = consent;
        self
    }

    pub fn with_confirm(mut self, confirm: LoginConfirm) -> Self {
        self.confirm = confirm;
        self
    }

    /// ログイン後もログインページに留まっているか (クエリは無視)
    fn is_login_page(&self, url: &str) -> bool {
        strip_query(url) == strip_query(&self.login_url)
    }
}

/// 遷移確認の間隔
const NAVIGATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// ログインを実行する。失敗は `SyncError::Authentication` にまとめる
pub async fn authenticate(
    session: &dyn Session,
    flow: &LoginFlow,
    credentials: &Credentials,
    adapter: &str,
) -> Result<(), SyncError> {
    run_flow(session, flow, credentials, adapter)
        .await
        .map_err(|e| SyncError::Authentication {
            adapter: adapter.to_string(),
            source: Box::new(e),
        })
}

async fn run_flow(
    session: &dyn Session,
    flow: &LoginFlow,
    credentials: &Credentials,
    adapter: &str,
) -> Result<(), SyncError> {
    info!(adapter, url = %flow.login_url, user = %credentials.username, "Logging in");

    if let ConsentStep::Cookies(cookies) = &flow.consent {
        for cookie in cookies {
            debug!(adapter, cookie = %cookie.name, "Setting consent cookie");
            session.add_cookie(cookie).await?;
        }
    }

    session.navigate(&flow.login_url).await?;

    if let ConsentStep::ClickButton(selector) = &flow.consent {
        debug!(adapter, selector = %selector, "Accepting cookie consent");
        session.click(selector).await?;
    }

    session
        .fill(&flow.username_selector, &credentials.username)
        .await?;
    session
        .fill(&flow.password_selector, credentials.password())
        .await?;

    match &flow.confirm {
        LoginConfirm::SubmitForm => session.submit(&flow.password_selector).await?,
        LoginConfirm::ClickButton(selector) => session.click(selector).await?,
    }

    let url = wait_for_departure(session, flow).await?;
    if flow.is_login_page(&url) {
        return Err(SyncError::CredentialsRejected(format!(
            "{} のログインページから遷移しませんでした",
            url
        )));
    }

    info!(adapter, "Login completed");
    Ok(())
}

/// ログインページから遷移するまで待つ (最大 `session.timeout()`)
///
/// 確定操作の直後はまだ POST の応答待ちでURLが変わっていないことがある。
async fn wait_for_departure(
    session: &dyn Session,
    flow: &LoginFlow,
) -> Result<String, SyncError> {
    let start = Instant::now();
    loop {
        let url = session.current_url().await?;
        if !flow.is_login_page(&url) || start.elapsed() >= session.timeout() {
            return Ok(url);
        }
        tokio::time::sleep(NAVIGATION_POLL_INTERVAL).await;
    }
}
