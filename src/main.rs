use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tower::Service;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ebikesync::{Settings, SyncError, SyncRequest, SyncService};

/// eBike Connect の累計走行統計を radelt.at に同期する
#[derive(Debug, Parser)]
#[command(name = "ebikesync", version, about)]
struct Cli {
    /// 設定ファイル (省略時: $XDG_CONFIG_HOME/ebikesync/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// フォームに入力するが送信しない
    #[arg(long)]
    dry_run: bool,

    /// 実行結果を JSON で標準出力に書く
    #[arg(long)]
    json: bool,

    /// ログレベル (設定ファイルの log_level より優先、RUST_LOG が最優先)
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(cli: &Cli) -> Result<Settings, SyncError> {
    let path = cli
        .config
        .clone()
        .or_else(Settings::default_path)
        .ok_or_else(|| SyncError::Config("設定ディレクトリを特定できません".into()))?;
    Settings::load(&path)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(cli.log_level.as_deref().unwrap_or("info"));
            error!("{}", e);
            return e.exit_status().into();
        }
    };

    init_tracing(
        cli.log_level
            .as_deref()
            .unwrap_or(&settings.global.log_level),
    );

    let mut service = SyncService::new();
    let request = SyncRequest::new(settings).with_dry_run(cli.dry_run);

    match service.call(request).await {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => error!("Failed to serialize report: {}", e),
                }
            }
            report.exit_status().into()
        }
        Err(e) => {
            error!("{}", e);
            e.exit_status().into()
        }
    }
}
