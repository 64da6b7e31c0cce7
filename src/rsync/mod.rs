pub mod runner;
pub mod stats;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};

use crate::config::JobSpec;

pub use runner::{RsyncRunner, RsyncSettings};
pub use stats::RsyncStats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The process ran to completion.
    Completed { exit_code: i32 },
    /// Killed after exceeding the configured timeout.
    TimedOut { after: Duration },
    /// Could not be launched or waited on, or died without an exit code.
    Faulted(String),
}

/// Everything captured from one job's rsync invocation.
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub job: JobSpec,
    pub outcome: TransferOutcome,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
}

impl TransferResult {
    pub fn success(&self) -> bool {
        matches!(self.outcome, TransferOutcome::Completed { exit_code: 0 })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            TransferOutcome::Completed { exit_code } => Some(exit_code),
            _ => None,
        }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    pub fn stats(&self) -> RsyncStats {
        RsyncStats::parse(&self.stdout)
    }

    /// Short description of why the job failed, `None` on success.
    pub fn error_summary(&self) -> Option<String> {
        match &self.outcome {
            TransferOutcome::Completed { exit_code: 0 } => None,
            TransferOutcome::Completed { exit_code } => {
                let stderr = self.stderr.trim();
                Some(if !stderr.is_empty() {
                    stderr.to_string()
                } else {
                    match describe_exit_code(*exit_code) {
                        Some(desc) => format!("rsync exited with code {exit_code} ({desc})"),
                        None => format!("rsync exited with code {exit_code}"),
                    }
                })
            }
            TransferOutcome::TimedOut { after } => {
                Some(format!("Timeout after {}s", after.as_secs()))
            }
            TransferOutcome::Faulted(e) => Some(e.clone()),
        }
    }
}

/// Meaning of rsync's documented exit codes (`errcode.h`).
pub fn describe_exit_code(code: i32) -> Option<&'static str> {
    Some(match code {
        1 => "syntax or usage error",
        2 => "protocol incompatibility",
        3 => "errors selecting input/output files, dirs",
        4 => "requested action not supported",
        5 => "error starting client-server protocol",
        6 => "daemon unable to append to log-file",
        10 => "error in socket I/O",
        11 => "error in file I/O",
        12 => "error in rsync protocol data stream",
        13 => "errors with program diagnostics",
        14 => "error in IPC code",
        20 => "received SIGUSR1 or SIGINT",
        21 => "some error returned by waitpid()",
        22 => "error allocating core memory buffers",
        23 => "partial transfer due to error",
        24 => "partial transfer due to vanished source files",
        25 => "the --max-delete limit stopped deletions",
        30 => "timeout in data send/receive",
        35 => "timeout waiting for daemon connection",
        255 => "remote shell failed",
        _ => return None,
    })
}

/// Runs one job to completion. Implementations never return early with an
/// error: every fault is folded into the [`TransferResult`].
pub trait TransferTool {
    fn run(&self, job: &JobSpec) -> impl Future<Output = TransferResult>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn job(name: &str) -> JobSpec {
        JobSpec {
            name: name.into(),
            source_path: format!("/srv/{name}"),
            dest_path: format!("/backup/{name}"),
            exclusions: vec![],
        }
    }

    pub fn result(name: &str, outcome: TransferOutcome, stdout: &str, stderr: &str) -> TransferResult {
        let start_time = Local::now();
        TransferResult {
            job: job(name),
            outcome,
            command: "rsync".into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            start_time,
            end_time: start_time + TimeDelta::seconds(75),
        }
    }

    #[test]
    fn only_zero_exit_is_success() {
        let ok = result("a", TransferOutcome::Completed { exit_code: 0 }, "", "");
        assert!(ok.success());
        assert_eq!(ok.exit_code(), Some(0));
        assert_eq!(ok.error_summary(), None);
        assert_eq!(ok.duration(), TimeDelta::seconds(75));

        let partial = result("b", TransferOutcome::Completed { exit_code: 23 }, "", "");
        assert!(!partial.success());
        assert_eq!(
            partial.error_summary().as_deref(),
            Some("rsync exited with code 23 (partial transfer due to error)")
        );
    }

    #[test]
    fn stderr_wins_over_exit_code_text() {
        let r = result(
            "a",
            TransferOutcome::Completed { exit_code: 255 },
            "",
            "ssh: connect to host a port 22: Connection refused\n",
        );
        assert_eq!(
            r.error_summary().as_deref(),
            Some("ssh: connect to host a port 22: Connection refused")
        );
    }

    #[test]
    fn timeout_has_no_exit_code() {
        let r = result(
            "a",
            TransferOutcome::TimedOut {
                after: Duration::from_secs(3600),
            },
            "",
            "",
        );
        assert!(!r.success());
        assert_eq!(r.exit_code(), None);
        assert_eq!(r.error_summary().as_deref(), Some("Timeout after 3600s"));
    }
}
