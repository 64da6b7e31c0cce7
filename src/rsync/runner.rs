use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::Local;
use itertools::Itertools;
use log::{error, info};
use tokio::process::Command;

use super::{TransferOutcome, TransferResult, TransferTool};
use crate::config::{JobSpec, SyncConfig};

const RSYNC_FLAGS: [&str; 5] = [
    "-avz",
    "--progress",
    "--stats",
    "--itemize-changes",
    "--delete",
];

#[derive(Debug, Clone)]
pub struct RsyncSettings {
    binary: String,
    ssh_key_path: PathBuf,
    source_server: String,
    dest_server: Option<String>,
    timeout: Duration,
}

impl RsyncSettings {
    pub fn new<P: AsRef<Path>>(
        binary: &str,
        ssh_key_path: P,
        source_server: &str,
        dest_server: Option<&str>,
        timeout: Duration,
    ) -> RsyncSettings {
        RsyncSettings {
            binary: binary.to_string(),
            ssh_key_path: ssh_key_path.as_ref().to_path_buf(),
            source_server: source_server.to_string(),
            dest_server: dest_server.map(str::to_string),
            timeout,
        }
    }

    pub fn from_config(config: &SyncConfig) -> RsyncSettings {
        Self::new(
            &config.rsync_path,
            &config.ssh_key_path,
            &config.source_server,
            config.dest_server.as_deref(),
            config.timeout,
        )
    }

    fn ssh_options(&self) -> Vec<String> {
        vec![
            "-i".into(),
            self.ssh_key_path.to_string_lossy().into_owned(),
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
        ]
    }

    fn rsync_args(&self, job: &JobSpec, remote_shell: String, source: String, dest: String) -> Vec<String> {
        let mut args: Vec<String> = RSYNC_FLAGS.iter().map(|x| x.to_string()).collect();
        args.push("-e".into());
        args.push(remote_shell);
        for pattern in &job.exclusions {
            args.push("--exclude".into());
            args.push(pattern.clone());
        }
        args.push(source);
        args.push(dest);
        args
    }

    /// Program and argument list for `job`.
    ///
    /// Without a destination host rsync pulls `source_server:src/` into the
    /// local `dest/`. With one, rsync is started on the source host over ssh
    /// and pushes to `dest_server:dest/`.
    pub fn command(&self, job: &JobSpec) -> (String, Vec<String>) {
        let source = dir_arg(&job.source_path);
        match &self.dest_server {
            None => {
                let remote_shell = std::iter::once("ssh".to_string())
                    .chain(self.ssh_options().iter().map(|x| shell_quote(x)))
                    .join(" ");
                let args = self.rsync_args(
                    job,
                    remote_shell,
                    format!("{}:{}", self.source_server, source),
                    dir_arg(&job.dest_path),
                );
                (self.binary.clone(), args)
            }
            Some(dest_server) => {
                let remote_args = self.rsync_args(
                    job,
                    "ssh -o StrictHostKeyChecking=no".into(),
                    source,
                    format!("{}:{}", dest_server, dir_arg(&job.dest_path)),
                );
                let remote_cmd = render_command(&self.binary, &remote_args);
                let mut args = self.ssh_options();
                args.push(self.source_server.clone());
                args.push(remote_cmd);
                ("ssh".into(), args)
            }
        }
    }
}

/// Directory operand with exactly one trailing slash, so rsync copies contents.
fn dir_arg(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}

/// Quotes `arg` for a POSIX shell when it contains anything beyond a safe set.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

pub fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(shell_quote(program))
        .chain(args.iter().map(|x| shell_quote(x)))
        .join(" ")
}

pub struct RsyncRunner {
    settings: RsyncSettings,
}

impl RsyncRunner {
    pub fn new(settings: RsyncSettings) -> RsyncRunner {
        RsyncRunner { settings }
    }
}

impl TransferTool for RsyncRunner {
    async fn run(&self, job: &JobSpec) -> TransferResult {
        let (program, args) = self.settings.command(job);
        let command = render_command(&program, &args);
        info!("Starting rsync for {}: {}", job.name, command);

        let start_time = Local::now();
        let spawned = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let (outcome, stdout, stderr) = match spawned {
            Err(e) => {
                error!("Error running rsync for {}: {}", job.name, e);
                (
                    TransferOutcome::Faulted(format!("Failed to launch {program}: {e}")),
                    String::new(),
                    String::new(),
                )
            }
            // Dropping the wait future on timeout kills the child.
            Ok(child) => match tokio::time::timeout(self.settings.timeout, child.wait_with_output()).await {
                Err(_) => {
                    error!("Rsync command timed out for {}", job.name);
                    (
                        TransferOutcome::TimedOut {
                            after: self.settings.timeout,
                        },
                        String::new(),
                        String::new(),
                    )
                }
                Ok(Err(e)) => {
                    error!("Error running rsync for {}: {}", job.name, e);
                    (TransferOutcome::Faulted(e.to_string()), String::new(), String::new())
                }
                Ok(Ok(output)) => {
                    let outcome = match output.status.code() {
                        Some(exit_code) => TransferOutcome::Completed { exit_code },
                        None => TransferOutcome::Faulted("rsync was terminated by a signal".into()),
                    };
                    (
                        outcome,
                        String::from_utf8_lossy(&output.stdout).into_owned(),
                        String::from_utf8_lossy(&output.stderr).into_owned(),
                    )
                }
            },
        };

        TransferResult {
            job: job.clone(),
            outcome,
            command,
            stdout,
            stderr,
            start_time,
            end_time: Local::now(),
        }
    }
}
