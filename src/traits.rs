use async_trait::async_trait;

use crate::error::SyncError;
use crate::session::Session;
use crate::types::{Metrics, SubmitResult};

/// サイトアダプター共通
///
/// アダプターは認証情報と設定を保持し、セッションは呼び出しごとに借りる。
#[async_trait]
pub trait Adapter: Send + Sync {
    /// 設定ファイル上の名前
    fn name(&self) -> &str;

    /// ログイン実行
    async fn authenticate(&mut self, session: &dyn Session) -> Result<(), SyncError>;
}

/// 累計値の取得元
#[async_trait]
pub trait Source: Adapter {
    /// 統計ページから累計値を取得
    async fn retrieve_metrics(&mut self, session: &dyn Session) -> Result<Metrics, SyncError>;

    /// 一括実行（authenticate → retrieve_metrics）
    async fn fetch(&mut self, session: &dyn Session) -> Result<Metrics, SyncError> {
        self.authenticate(session).await?;
        self.retrieve_metrics(session).await
    }
}

/// 差分の送信先
#[async_trait]
pub trait Destination: Adapter {
    /// 送信先に記録済みの累計値
    async fn retrieve_prior_metrics(&mut self, session: &dyn Session)
        -> Result<Metrics, SyncError>;

    /// `source` との差分をフォームに入力し、`submit` が真なら送信する
    async fn submit_delta(
        &mut self,
        session: &dyn Session,
        source: &Metrics,
        submit: bool,
    ) -> Result<SubmitResult, SyncError>;
}
