use std::path::PathBuf;
use std::process::ExitCode;

use backup_sync::logging::{self, DEFAULT_LOG_FILE};
use backup_sync::prelude::{
    BackupSyncer, RsyncRunner, RsyncSettings, SyncConfig, SyncError, TelegramNotifier,
};
use clap::Parser;
use log::{error, info};
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "backup-sync")]
#[command(about = "Mirror directories with rsync and report the run to Telegram", long_about = None)]
#[command(version)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(long, value_name = "PATH", default_value = "config.json")]
    pub config: PathBuf,

    /// Send a test Telegram notification and exit
    #[arg(long = "test-telegram")]
    pub test_telegram: bool,

    /// Log file to append to
    #[arg(long = "log-file", value_name = "PATH", env = "BACKUP_SYNC_LOG", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,
}

/// Resolves once Ctrl-C is received. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn run(args: &CliArgs, config: &SyncConfig) -> Result<bool, SyncError> {
    let notifier = TelegramNotifier::new(&config.telegram)?;
    let runner = RsyncRunner::new(RsyncSettings::from_config(config));
    let syncer = BackupSyncer::new(config, runner, notifier);

    if args.test_telegram {
        let sent = syncer.send_test().await;
        if sent {
            println!("✅ Telegram test notification sent successfully!");
        } else {
            println!("❌ Failed to send Telegram test notification");
        }
        return Ok(sent);
    }

    tokio::select! {
        success = syncer.sync() => Ok(success),
        _ = interrupted() => {
            info!("Backup synchronization interrupted by user");
            Ok(false)
        }
    }
}

fn try_main(args: &CliArgs) -> Result<bool, SyncError> {
    let config = SyncConfig::load(&args.config)?;
    let rt = Runtime::new()?;
    rt.block_on(run(args, &config))
}

pub fn main() -> ExitCode {
    let args = CliArgs::parse();
    if let Err(e) = logging::init(&args.log_file) {
        eprintln!("❌ {e}");
        return ExitCode::FAILURE;
    }

    match try_main(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(SyncError::Config(e)) => {
            error!("{e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Unexpected error: {e}");
            ExitCode::FAILURE
        }
    }
}
