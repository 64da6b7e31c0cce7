use chrono::Local;
use itertools::Itertools;
use log::{error, info};

use crate::config::SyncConfig;
use crate::notify::Notifier;
use crate::report::{self, ReportContext};
use crate::rsync::{TransferResult, TransferTool};

/// Drives one run: start notice, every job in order, then the summary.
pub struct BackupSyncer<'a, T, N> {
    config: &'a SyncConfig,
    tool: T,
    notifier: N,
}

impl<'a, T: TransferTool, N: Notifier> BackupSyncer<'a, T, N> {
    pub fn new(config: &'a SyncConfig, tool: T, notifier: N) -> BackupSyncer<'a, T, N> {
        BackupSyncer {
            config,
            tool,
            notifier,
        }
    }

    fn context(&self) -> ReportContext<'a> {
        let config = self.config;
        ReportContext {
            timestamp: Local::now(),
            source_server: &config.source_server,
            dest_label: config.dest_label(),
        }
    }

    /// Runs each configured job sequentially. Yields one result per job, in order.
    pub async fn run_jobs(&self) -> Vec<TransferResult> {
        let mut results = Vec::with_capacity(self.config.jobs.len());
        for job in &self.config.jobs {
            info!("Starting sync for directory: {}", job.name);
            let result = self.tool.run(job).await;
            if result.success() {
                info!("Successfully synced directory: {}", job.name);
            } else {
                error!(
                    "Failed to sync directory {}: {}",
                    job.name,
                    result.error_summary().unwrap_or_default()
                );
            }
            results.push(result);
        }
        results
    }

    /// Full run. Returns `true` only when every job succeeded; notification
    /// failures do not affect the result.
    pub async fn sync(&self) -> bool {
        info!("Starting backup synchronization");
        self.notifier
            .send_message(&report::started_message(&self.config.jobs, &self.context()))
            .await;

        let results = self.run_jobs().await;
        let overall_success = results.iter().all(TransferResult::success);
        if overall_success {
            info!("All backup synchronizations completed successfully");
        } else {
            error!(
                "Backup synchronization failed for directories: {}",
                results
                    .iter()
                    .filter(|r| !r.success())
                    .map(|r| r.job.name.as_str())
                    .join(", ")
            );
        }

        self.notifier
            .send_message(&report::completion_message(&results, &self.context()))
            .await;
        overall_success
    }

    /// Sends the fixed test message without touching any job.
    pub async fn send_test(&self) -> bool {
        self.notifier
            .send_message(&report::test_message(Local::now()))
            .await
    }
}
