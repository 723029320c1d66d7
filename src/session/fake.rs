//! テスト用のスクリプト化されたセッション

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::SyncError;

use super::{Cookie, Session};

/// 記録された操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Navigate(String),
    Fill(String, String),
    Click(String),
    Submit(String),
    AddCookie(String),
    Close,
}

/// ページ構造を持たない簡易ブラウザ
///
/// セレクターごとにテキストを登録しておき、未登録のセレクターは
/// タイムアウト (`ElementNotFound`) として扱う。
/// クリック/送信による遷移は登録した `delay` の経過後に確定する。
pub(crate) struct FakeSession {
    elements: HashMap<String, Vec<String>>,
    redirects: HashMap<String, (String, Duration)>,
    timeout: Duration,
    url: Mutex<String>,
    pending: Mutex<Option<(Instant, String)>>,
    actions: Mutex<Vec<Action>>,
    close_count: Mutex<usize>,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self {
            elements: HashMap::new(),
            redirects: HashMap::new(),
            timeout: Duration::from_millis(500),
            url: Mutex::default(),
            pending: Mutex::default(),
            actions: Mutex::default(),
            close_count: Mutex::default(),
        }
    }
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_element(self, selector: &str, text: &str) -> Self {
        self.with_elements(selector, &[text])
    }

    pub fn with_elements(mut self, selector: &str, texts: &[&str]) -> Self {
        self.elements.insert(
            selector.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// クリック/送信後に `url` へ遷移する要素
    pub fn with_redirect(self, selector: &str, url: &str) -> Self {
        self.with_delayed_redirect(selector, url, Duration::ZERO)
    }

    /// クリック/送信から `delay` 経過後に `url` へ遷移する要素
    pub fn with_delayed_redirect(mut self, selector: &str, url: &str, delay: Duration) -> Self {
        self.elements.entry(selector.to_string()).or_default();
        self.redirects
            .insert(selector.to_string(), (url.to_string(), delay));
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn filled(&self, selector: &str) -> Option<String> {
        self.actions()
            .into_iter()
            .rev()
            .find_map(|action| match action {
                Action::Fill(s, value) if s == selector => Some(value),
                _ => None,
            })
    }

    pub fn submitted(&self) -> bool {
        self.actions()
            .iter()
            .any(|action| matches!(action, Action::Submit(_)))
    }

    pub fn close_count(&self) -> usize {
        *self.close_count.lock().unwrap()
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }

    fn lookup(&self, selector: &str) -> Result<&Vec<String>, SyncError> {
        self.elements
            .get(selector)
            .ok_or_else(|| SyncError::ElementNotFound {
                selector: selector.to_string(),
                url: self.url.lock().unwrap().clone(),
                timeout: self.timeout,
            })
    }

    fn follow_redirect(&self, selector: &str) {
        if let Some((target, delay)) = self.redirects.get(selector) {
            *self.pending.lock().unwrap() = Some((Instant::now() + *delay, target.clone()));
            self.commit_navigation();
        }
    }

    /// 期限を過ぎた遷移を現在のURLに反映する
    fn commit_navigation(&self) {
        let mut pending = self.pending.lock().unwrap();
        if let Some((at, _)) = pending.as_ref() {
            if Instant::now() >= *at {
                if let Some((_, target)) = pending.take() {
                    *self.url.lock().unwrap() = target;
                }
            }
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn navigate(&self, url: &str) -> Result<(), SyncError> {
        self.record(Action::Navigate(url.to_string()));
        *self.pending.lock().unwrap() = None;
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SyncError> {
        self.commit_navigation();
        Ok(self.url.lock().unwrap().clone())
    }

    async fn wait_for(&self, selector: &str) -> Result<(), SyncError> {
        self.lookup(selector).map(|_| ())
    }

    async fn text(&self, selector: &str) -> Result<String, SyncError> {
        Ok(self
            .lookup(selector)?
            .first()
            .cloned()
            .unwrap_or_default())
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, SyncError> {
        Ok(self.elements.get(selector).cloned().unwrap_or_default())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), SyncError> {
        self.lookup(selector)?;
        self.record(Action::Fill(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), SyncError> {
        self.lookup(selector)?;
        self.record(Action::Click(selector.to_string()));
        self.follow_redirect(selector);
        Ok(())
    }

    async fn submit(&self, selector: &str) -> Result<(), SyncError> {
        self.lookup(selector)?;
        self.record(Action::Submit(selector.to_string()));
        self.follow_redirect(selector);
        Ok(())
    }

    async fn add_cookie(&self, cookie: &Cookie) -> Result<(), SyncError> {
        self.record(Action::AddCookie(cookie.name.clone()));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SyncError> {
        Ok(b"\x89PNG".to_vec())
    }

    async fn close(&self) -> Result<(), SyncError> {
        let mut count = self.close_count.lock().unwrap();
        if *count == 0 {
            self.record(Action::Close);
        }
        *count += 1;
        Ok(())
    }
}
