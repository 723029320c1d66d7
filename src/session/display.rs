use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::SyncError;

const XVFB: &str = "Xvfb";

/// Xvfb の起動待ち
const STARTUP_WAIT: Duration = Duration::from_millis(500);

/// Xvfb による仮想ディスプレイ
///
/// サーバー上でヘッドありのブラウザを動かすために使う。`Drop` でもプロセスは終了する。
pub struct VirtualDisplay {
    name: String,
    child: Child,
}

impl VirtualDisplay {
    pub async fn start(display_number: u32) -> Result<Self, SyncError> {
        Self::spawn(XVFB, display_number).await
    }

    async fn spawn(program: &str, display_number: u32) -> Result<Self, SyncError> {
        let name = format!(":{}", display_number);
        info!(display = %name, program, "Starting virtual display...");

        let mut child = Command::new(program)
            .arg(&name)
            .args(["-screen", "0", "1280x800x24", "-nolisten", "tcp"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SyncError::BrowserInit(format!("{} を起動できません: {}", program, e)))?;

        tokio::time::sleep(STARTUP_WAIT).await;

        if let Some(status) = child.try_wait()? {
            return Err(SyncError::BrowserInit(format!(
                "{} {} が終了しました: {}",
                program, name, status
            )));
        }

        debug!(display = %name, "Virtual display ready");
        Ok(Self { name, child })
    }

    /// `DISPLAY` 環境変数の値
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(display = %self.name, "Failed to stop Xvfb: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExitStatus;

    #[tokio::test]
    async fn test_missing_xvfb_is_browser_init_error() {
        let err = VirtualDisplay::spawn("ebikesync-missing-xvfb", 99)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SyncError::BrowserInit(ref msg) if msg.contains("ebikesync-missing-xvfb")));
        assert_eq!(err.exit_status(), ExitStatus::BrowserInit);
    }

    #[tokio::test]
    async fn test_display_that_exits_immediately() {
        // `true` は引数を無視してすぐ終了する
        let err = VirtualDisplay::spawn("true", 99).await.err().unwrap();
        assert!(matches!(err, SyncError::BrowserInit(ref msg) if msg.contains(":99")));
    }
}
