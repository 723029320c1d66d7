use std::process::ExitCode;
use std::time::Duration;

use thiserror::Error;

use crate::registry::AdapterLoadError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("ブラウザ操作エラー: {0}")]
    Driver(String),

    #[error("ログインエラー ({adapter}): {source}")]
    Authentication {
        adapter: String,
        #[source]
        source: Box<SyncError>,
    },

    #[error("ログインが拒否されました: {0}")]
    CredentialsRejected(String),

    #[error("要素が見つかりません: {selector} (url={url}, {}秒待機)", .timeout.as_secs())]
    ElementNotFound {
        selector: String,
        url: String,
        timeout: Duration,
    },

    #[error("数値を解析できません ({field}): {text:?}")]
    Parse { field: String, text: String },

    #[error("未登録のアダプター: {0}")]
    UnknownAdapter(String),

    #[error(transparent)]
    AdapterLoad(#[from] AdapterLoadError),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl SyncError {
    /// プロセス境界まで伝播した致命的エラーの終了コード
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            SyncError::Config(_) => ExitStatus::ConfigLoad,
            _ => ExitStatus::BrowserInit,
        }
    }
}

/// プロセス終了コード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    ConfigLoad,
    BrowserInit,
    SourceFetch,
    DestinationSubmit,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::ConfigLoad => 1,
            ExitStatus::BrowserInit => 2,
            ExitStatus::SourceFetch => 3,
            ExitStatus::DestinationSubmit => 4,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
