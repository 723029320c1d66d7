//! 走行統計と差分計算

use serde::{Deserialize, Serialize};

/// 累計走行統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// 累計走行距離 (km)
    pub total_distance: u64,
    /// 累計獲得標高 (m)
    pub total_altitude: u64,
}

impl Metrics {
    pub fn new(total_distance: u64, total_altitude: u64) -> Self {
        Self {
            total_distance,
            total_altitude,
        }
    }
}

/// 送信先フォームに入力する値
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// 新しいオドメーター値 (km)
    pub total_distance: u64,
    /// 前回からの獲得標高 (m)。`None` の場合は標高欄に触れない
    pub additional_altitude: Option<u64>,
}

impl Delta {
    /// 距離が増えていなければ `None`
    pub fn between(source: &Metrics, prior: &Metrics) -> Option<Delta> {
        if source.total_distance <= prior.total_distance {
            return None;
        }

        // 0 は標高データなし
        let additional_altitude = match source.total_altitude {
            0 => None,
            altitude => altitude.checked_sub(prior.total_altitude),
        };

        Some(Delta {
            total_distance: source.total_distance,
            additional_altitude,
        })
    }

    /// 送信後に送信先が保持する累計値
    pub fn apply_to(&self, prior: &Metrics) -> Metrics {
        Metrics {
            total_distance: self.total_distance,
            total_altitude: prior.total_altitude + self.additional_altitude.unwrap_or(0),
        }
    }
}

/// 送信結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitResult {
    /// 距離に変化がないため送信しなかった
    NoChange { prior: Metrics, source: Metrics },
    /// フォームに入力したが送信しなかった
    DryRun { delta: Delta },
    /// フォームを送信した
    Submitted { delta: Delta },
}

impl SubmitResult {
    pub fn delta(&self) -> Option<&Delta> {
        match self {
            SubmitResult::NoChange { .. } => None,
            SubmitResult::DryRun { delta } | SubmitResult::Submitted { delta } => Some(delta),
        }
    }
}
