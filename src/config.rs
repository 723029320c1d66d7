//! 設定ファイル (`config.toml`)
//!
//! ```toml
//! [default]
//! log_level = "info"
//! driver = "chrome"
//! timeout_secs = 5
//! sources = ["ebike_connect"]
//! destinations = ["radelt"]
//!
//! [ebike_connect]
//! username = "rider@example.com"
//! password = "secret"
//!
//! [radelt]
//! username = "rider@example.com"
//! password = "secret"
//! bike_id = "245325"
//! submit = true
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::SyncError;

const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DISPLAY_NUMBER: u32 = 99;

/// 使用するブラウザ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserDriver {
    #[default]
    Chrome,
    Chromium,
    Edge,
}

impl BrowserDriver {
    /// ドライバーごとの実行ファイル候補
    pub fn executables(self) -> &'static [&'static str] {
        match self {
            BrowserDriver::Chrome => &["google-chrome", "google-chrome-stable", "chrome"],
            BrowserDriver::Chromium => &["chromium", "chromium-browser"],
            BrowserDriver::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
        }
    }
}

/// `[default]` セクション
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub log_level: String,
    pub driver: BrowserDriver,
    pub headless: bool,
    pub virtual_display: bool,
    pub display_number: u32,
    pub timeout_secs: u64,
    pub debug_screenshots: bool,
    pub dry_run: bool,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            driver: BrowserDriver::default(),
            headless: true,
            virtual_display: false,
            display_number: DEFAULT_DISPLAY_NUMBER,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            debug_screenshots: false,
            dry_run: false,
            sources: Vec::new(),
            destinations: Vec::new(),
        }
    }
}

/// 設定ファイル全体
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(rename = "default", default)]
    pub global: GlobalSettings,
    /// `[default]` 以外のセクション (アダプター名 → 設定値)
    #[serde(flatten)]
    pub adapters: BTreeMap<String, toml::Table>,
}

impl Settings {
    /// `$XDG_CONFIG_HOME/ebikesync/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ebikesync").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("{} を読み込めません: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SyncError> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.global.sources.is_empty() {
            return Err(SyncError::Config(
                "[default] sources にアダプターが指定されていません".into(),
            ));
        }
        if self.global.timeout_secs == 0 {
            return Err(SyncError::Config(
                "[default] timeout_secs は1以上にしてください".into(),
            ));
        }
        Ok(())
    }

    /// アダプターのセクションを取得 (存在しない場合は空)
    ///
    /// `radelt.work` は TOML では `[radelt.work]` の入れ子テーブルになる。
    pub fn adapter(&self, name: &str) -> AdapterSettings {
        let mut segments = name.split('.');
        let mut table = segments
            .next()
            .and_then(|first| self.adapters.get(first));
        for segment in segments {
            table = table
                .and_then(|t| t.get(segment))
                .and_then(toml::Value::as_table);
        }

        AdapterSettings {
            name: name.to_string(),
            values: table.cloned().unwrap_or_default(),
        }
    }
}

/// アダプター1つ分の設定値 (そのまま渡される)
#[derive(Clone, Default)]
pub struct AdapterSettings {
    pub name: String,
    pub values: toml::Table,
}

impl AdapterSettings {
    pub fn new(name: impl Into<String>, values: toml::Table) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(toml::Value::as_str)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, SyncError> {
        self.get_str(key).ok_or_else(|| {
            SyncError::Config(format!("[{}] {} が設定されていません", self.name, key))
        })
    }

    /// 文字列・整数どちらの表記も受け付ける (例: `bike_id = 245325`)
    pub fn require_id(&self, key: &str) -> Result<String, SyncError> {
        match self.values.get(key) {
            Some(toml::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(toml::Value::Integer(n)) if *n >= 0 => Ok(n.to_string()),
            _ => Err(SyncError::Config(format!(
                "[{}] {} が設定されていません",
                self.name, key
            ))),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(toml::Value::as_bool)
            .unwrap_or(default)
    }

    pub fn credentials(&self) -> Result<Credentials, SyncError> {
        Ok(Credentials::new(
            self.require_str("username")?,
            self.require_str("password")?,
        ))
    }
}

impl fmt::Debug for AdapterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 値には認証情報が含まれるためキーのみ出力
        f.debug_struct("AdapterSettings")
            .field("name", &self.name)
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// ログイン情報
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// ブラウザセッションの設定
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub driver: BrowserDriver,
    pub headless: bool,
    pub timeout: Duration,
    pub virtual_display: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            driver: BrowserDriver::default(),
            headless: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            virtual_display: None,
        }
    }
}

impl SessionConfig {
    pub fn new(driver: BrowserDriver) -> Self {
        Self {
            driver,
            ..Default::default()
        }
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_virtual_display(mut self, display_number: Option<u32>) -> Self {
        self.virtual_display = display_number;
        self
    }
}

impl From<&GlobalSettings> for SessionConfig {
    fn from(global: &GlobalSettings) -> Self {
        SessionConfig::new(global.driver)
            .with_headless(global.headless)
            .with_timeout(Duration::from_secs(global.timeout_secs))
            .with_virtual_display(global.virtual_display.then_some(global.display_number))
    }
}
