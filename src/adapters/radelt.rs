//! radelt.at (地域ごとのサブドメイン、例: burgenland.radelt.at)
//!
//! 個人統計から記録済みの累計値を読み、走行登録フォームに
//! 新しいオドメーター値と追加の獲得標高を入力する。

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{AdapterSettings, Credentials};
use crate::error::SyncError;
use crate::login::{self, ConsentStep, LoginConfirm, LoginFlow};
use crate::parse::labeled_count;
use crate::registry::Registry;
use crate::session::Session;
use crate::traits::{Adapter, Destination};
use crate::types::{Delta, Metrics, SubmitResult};

const DEFAULT_REGION: &str = "burgenland";

const EMAIL_SELECTOR: &str = "#email";
const PASSWORD_SELECTOR: &str = "#password";
const CONSENT_BUTTON_SELECTOR: &str = "button.cookie-consent__agree";
const LOGIN_BUTTON_SELECTOR: &str = "button#login-button";

const PERSONAL_STATS_SELECTOR: &str = "div[id^=pers] table:first-of-type tr";
const ALTITUDE_LABEL: &str = "Höhenmeter";
const DISTANCE_LABEL: &str = "gefahrene Kilometer";

const DISTANCE_INPUT_SELECTOR: &str = r#"input[name="km_end"]"#;
const ALTITUDE_INPUT_SELECTOR: &str = r#"input[name="altitude"]"#;
const DESCRIPTION_INPUT_SELECTOR: &str = r#"input[name="description"]"#;

pub struct Radelt {
    name: String,
    credentials: Credentials,
    flow: LoginFlow,
    statistics_url: String,
    ride_form_url: String,
    prior: Option<Metrics>,
}

impl Radelt {
    /// 設定キー: `username`, `password`, `bike_id`, `region` (省略時 burgenland)
    pub fn new(settings: AdapterSettings) -> Result<Self, SyncError> {
        let credentials = settings.credentials()?;
        let bike_id = settings.require_id("bike_id")?;
        let region = settings.get_str("region").unwrap_or(DEFAULT_REGION);
        let base_url = format!("https://{}.radelt.at", region);

        let flow = LoginFlow::new(
            format!("{}/dashboard/login", base_url),
            EMAIL_SELECTOR,
            PASSWORD_SELECTOR,
        )
        .with_consent(ConsentStep::ClickButton(CONSENT_BUTTON_SELECTOR.to_string()))
        .with_confirm(LoginConfirm::ClickButton(LOGIN_BUTTON_SELECTOR.to_string()));

        Ok(Self {
            statistics_url: format!("{}/dashboard/statistics", base_url),
            ride_form_url: format!("{}/dashboard/rides/create/{}", base_url, bike_id),
            name: settings.name,
            credentials,
            flow,
            prior: None,
        })
    }
}

#[async_trait]
impl Adapter for Radelt {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&mut self, session: &dyn Session) -> Result<(), SyncError> {
        login::authenticate(session, &self.flow, &self.credentials, &self.name).await
    }
}

#[async_trait]
impl Destination for Radelt {
    async fn retrieve_prior_metrics(
        &mut self,
        session: &dyn Session,
    ) -> Result<Metrics, SyncError> {
        debug!(adapter = %self.name, url = %self.statistics_url, "Fetching statistics");
        session.navigate(&self.statistics_url).await?;
        session.wait_for(PERSONAL_STATS_SELECTOR).await?;

        // 期間ごとの行があるため最大値を採る
        let mut distance: Option<u64> = None;
        let mut altitude: Option<u64> = None;
        for row in session.texts(PERSONAL_STATS_SELECTOR).await? {
            if let Some(value) = labeled_count(ALTITUDE_LABEL, "m", &row) {
                debug!("Altitude found {:?}: {}", row, value);
                altitude = altitude.max(Some(value));
            } else if let Some(value) = labeled_count(DISTANCE_LABEL, "km", &row) {
                debug!("Distance found {:?}: {}", row, value);
                distance = distance.max(Some(value));
            }
        }

        let total_distance = distance.ok_or_else(|| SyncError::Parse {
            field: DISTANCE_LABEL.to_string(),
            text: format!("{} に該当する行がありません", PERSONAL_STATS_SELECTOR),
        })?;
        let total_altitude = altitude.unwrap_or_else(|| {
            warn!("[{}] No altitude row found, assuming 0 m", self.name);
            0
        });

        let metrics = Metrics::new(total_distance, total_altitude);
        info!("[{}] Distance: {} km", self.name, metrics.total_distance);
        info!("[{}] Altitude: {} m", self.name, metrics.total_altitude);
        self.prior = Some(metrics);
        Ok(metrics)
    }

    async fn submit_delta(
        &mut self,
        session: &dyn Session,
        source: &Metrics,
        submit: bool,
    ) -> Result<SubmitResult, SyncError> {
        let prior = match self.prior {
            Some(prior) => prior,
            None => self.retrieve_prior_metrics(session).await?,
        };

        let Some(delta) = Delta::between(source, &prior) else {
            warn!(
                "[{}] No changes in total distance ({} km), won't submit the form...",
                self.name, prior.total_distance
            );
            return Ok(SubmitResult::NoChange {
                prior,
                source: *source,
            });
        };

        debug!(adapter = %self.name, url = %self.ride_form_url, "Filling ride form");
        session.navigate(&self.ride_form_url).await?;
        session
            .fill(DISTANCE_INPUT_SELECTOR, &delta.total_distance.to_string())
            .await?;

        match delta.additional_altitude {
            Some(additional) => {
                info!("[{}] Additional altitude {} m", self.name, additional);
                session
                    .fill(
                        DESCRIPTION_INPUT_SELECTOR,
                        &format!("Gesamthöhe: {} m", source.total_altitude),
                    )
                    .await?;
                session
                    .fill(ALTITUDE_INPUT_SELECTOR, &additional.to_string())
                    .await?;
            }
            None => debug!(
                "[{}] Altitude left untouched (source {} m, recorded {} m)",
                self.name, source.total_altitude, prior.total_altitude
            ),
        }

        if !submit {
            warn!("[{}] Submit is disabled, won't submit the form...", self.name);
            return Ok(SubmitResult::DryRun { delta });
        }

        session.submit(DISTANCE_INPUT_SELECTOR).await?;
        info!(
            "[{}] Submitted ride: {} km total",
            self.name, delta.total_distance
        );
        self.prior = Some(delta.apply_to(&prior));
        Ok(SubmitResult::Submitted { delta })
    }
}

fn build(settings: AdapterSettings) -> Result<Box<dyn Destination>, SyncError> {
    Ok(Box::new(Radelt::new(settings)?))
}

pub fn register(registry: &mut Registry, name: &str) {
    registry.register_destination(name, build);
}
