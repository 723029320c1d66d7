//! Bosch eBike Connect (www.ebike-connect.com)
//!
//! ダッシュボードの統計ボックスから累計走行距離と累計獲得標高を読む。

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{AdapterSettings, Credentials};
use crate::error::SyncError;
use crate::login::{self, ConsentStep, LoginFlow};
use crate::parse::parse_count;
use crate::registry::Registry;
use crate::session::{Cookie, Session};
use crate::traits::{Adapter, Source};
use crate::types::Metrics;

const LOGIN_URL: &str = "https://www.ebike-connect.com/login?lang=de-at";
const DASHBOARD_URL: &str = "https://www.ebike-connect.com/dashboard";
const COOKIE_DOMAIN: &str = "www.ebike-connect.com";

const EMAIL_SELECTOR: &str = "#login__email";
const PASSWORD_SELECTOR: &str = "#login__password";
const CONSENT_BUTTON_SELECTOR: &str = "#cookieConsent-button";
const DISTANCE_SELECTOR: &str = "#statistic-box-distance span.font-style-h2";
const ALTITUDE_SELECTOR: &str = "#statistic-box-elevation span.font-style-h2";

/// 全カテゴリ拒否の同意クッキー
const CONSENT_COOKIE_NAME: &str = "do-consent";
const CONSENT_COOKIE_VALUE: &str = "{%22consent%22:{%22convenience%22:false%2C%22analysis%22:false%2C%22marketing%22:false%2C%22custom%22:[]}%2C%22timeToLive%22:60%2C%22timestamp%22:1702329911490%2C%22version%22:4}";

pub struct EbikeConnect {
    name: String,
    credentials: Credentials,
    flow: LoginFlow,
}

impl EbikeConnect {
    /// 設定キー: `username`, `password`, `consent` (`cookie` | `button` | `none`)
    pub fn new(settings: AdapterSettings) -> Result<Self, SyncError> {
        let credentials = settings.credentials()?;
        let consent = match settings.get_str("consent").unwrap_or("cookie") {
            "cookie" => ConsentStep::Cookies(vec![consent_cookie()]),
            "button" => ConsentStep::ClickButton(CONSENT_BUTTON_SELECTOR.to_string()),
            "none" => ConsentStep::None,
            other => {
                return Err(SyncError::Config(format!(
                    "[{}] consent の値が不正です: {}",
                    settings.name, other
                )))
            }
        };

        Ok(Self {
            name: settings.name,
            credentials,
            flow: LoginFlow::new(LOGIN_URL, EMAIL_SELECTOR, PASSWORD_SELECTOR)
                .with_consent(consent),
        })
    }
}

fn consent_cookie() -> Cookie {
    Cookie::new(CONSENT_COOKIE_NAME, CONSENT_COOKIE_VALUE, COOKIE_DOMAIN)
}

#[async_trait]
impl Adapter for EbikeConnect {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&mut self, session: &dyn Session) -> Result<(), SyncError> {
        login::authenticate(session, &self.flow, &self.credentials, &self.name).await
    }
}

#[async_trait]
impl Source for EbikeConnect {
    async fn retrieve_metrics(&mut self, session: &dyn Session) -> Result<Metrics, SyncError> {
        debug!(adapter = %self.name, url = DASHBOARD_URL, "Fetching statistics");
        session.navigate(DASHBOARD_URL).await?;

        let distance = session.text(DISTANCE_SELECTOR).await?;
        let altitude = session.text(ALTITUDE_SELECTOR).await?;

        let metrics = Metrics::new(
            parse_count(DISTANCE_SELECTOR, &distance)?,
            parse_count(ALTITUDE_SELECTOR, &altitude)?,
        );
        info!("[{}] Distance: {} km", self.name, metrics.total_distance);
        info!("[{}] Altitude: {} m", self.name, metrics.total_altitude);
        Ok(metrics)
    }
}

fn build(settings: AdapterSettings) -> Result<Box<dyn Source>, SyncError> {
    Ok(Box::new(EbikeConnect::new(settings)?))
}

pub fn register(registry: &mut Registry, name: &str) {
    registry.register_source(name, build);
}
