//! CLI integration tests for backup-sync.
//!
//! A shell script stands in for rsync and the Telegram endpoint points at a
//! closed local port, so no test touches the network or a real transfer.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Port 9 (discard) is not listening on test machines, so delivery fails fast.
const DEAD_API: &str = "http://127.0.0.1:9";

fn cmd() -> Command {
    Command::cargo_bin("backup-sync").unwrap()
}

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Sandbox {
        Sandbox {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn log_file(&self) -> PathBuf {
        self.path("sync.log")
    }

    fn marker(&self) -> PathBuf {
        self.path("rsync-was-called")
    }

    /// Writes a fake rsync that records its invocation and then runs `body`.
    #[cfg(unix)]
    fn fake_rsync_script(&self, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.path("rsync");
        let script = format!("#!/bin/sh\ntouch '{}'\n{body}\n", self.marker().display());
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// A fake rsync that prints a stats block and exits with `exit_code`.
    #[cfg(unix)]
    fn fake_rsync(&self, exit_code: i32) -> PathBuf {
        self.fake_rsync_script(&format!(
            "echo '>f+++++++++ new.txt'\n\
             echo 'Number of files: 1,234'\n\
             echo 'Total bytes sent: 2,048'\n\
             exit {exit_code}"
        ))
    }

    fn write_config(&self, telegram: &str, rsync: &Path) -> PathBuf {
        let path = self.path("config.json");
        let text = format!(
            r#"{{
                "source_server": "backup@server-a",
                "ssh_key_path": "/keys/id_ed25519",
                "rsync_path": "{}",
                "timeout": 30,
                "telegram": {telegram},
                "directories": [
                    {{"name": "Photos", "source_path": "/srv/photos", "dest_path": "{}"}},
                    {{"name": "Mail", "source_path": "/srv/mail", "dest_path": "{}"}}
                ]
            }}"#,
            rsync.display(),
            self.path("photos").display(),
            self.path("mail").display()
        );
        fs::write(&path, text).unwrap();
        path
    }

    fn run(&self, config: &Path, extra: &[&str]) -> assert_cmd::assert::Assert {
        cmd()
            .arg("--config")
            .arg(config)
            .arg("--log-file")
            .arg(self.log_file())
            .args(extra)
            .assert()
    }

    fn log_text(&self) -> String {
        fs::read_to_string(self.log_file()).unwrap_or_default()
    }
}

fn telegram() -> String {
    format!(r#"{{"bot_token": "123:abc", "chat_id": "-100", "api_url": "{DEAD_API}"}}"#)
}

#[test]
fn test_help_lists_options() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--test-telegram"))
        .stdout(predicate::str::contains("--log-file"));
}

#[test]
fn test_missing_config_file_fails() {
    let sb = Sandbox::new();
    sb.run(&sb.path("absent.json"), &[])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_malformed_config_fails() {
    let sb = Sandbox::new();
    let config = sb.path("config.json");
    fs::write(&config, "{ this is not json").unwrap();
    sb.run(&config, &[])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid JSON"));
}

#[cfg(unix)]
#[test]
fn test_missing_token_stops_before_any_transfer() {
    let sb = Sandbox::new();
    let rsync = sb.fake_rsync(0);
    let config = sb.write_config(r#"{"chat_id": "-100"}"#, &rsync);

    sb.run(&config, &[])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("telegram.bot_token"));
    assert!(!sb.marker().exists());
    assert!(sb.log_text().contains("Missing required configuration key: telegram.bot_token"));
}

#[cfg(unix)]
#[test]
fn test_telegram_mode_never_runs_rsync() {
    let sb = Sandbox::new();
    let rsync = sb.fake_rsync(0);
    let config = sb.write_config(&telegram(), &rsync);

    sb.run(&config, &["--test-telegram"])
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Failed to send Telegram test notification"));
    assert!(!sb.marker().exists());
}

#[cfg(unix)]
#[test]
fn test_successful_run_exits_zero_even_if_notifications_fail() {
    let sb = Sandbox::new();
    let rsync = sb.fake_rsync(0);
    let config = sb.write_config(&telegram(), &rsync);

    sb.run(&config, &[]).success();
    assert!(sb.marker().exists());

    let log = sb.log_text();
    assert!(log.contains("Successfully synced directory: Photos"));
    assert!(log.contains("Successfully synced directory: Mail"));
    assert!(log.contains("All backup synchronizations completed successfully"));
    assert!(log.contains("Failed to send Telegram notification"));
    assert!(!log.contains("123:abc"));
}

#[cfg(unix)]
#[test]
fn test_failed_transfer_exits_one() {
    let sb = Sandbox::new();
    let rsync = sb.fake_rsync(23);
    let config = sb.write_config(&telegram(), &rsync);

    sb.run(&config, &[]).failure().code(1);

    let log = sb.log_text();
    assert!(log.contains("Failed to sync directory Photos"));
    assert!(log.contains("Backup synchronization failed for directories: Photos, Mail"));
}

#[cfg(unix)]
#[test]
fn test_interrupt_stops_run_and_exits_one() {
    use std::process::{Command as StdCommand, Stdio};
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    let sb = Sandbox::new();
    let rsync = sb.fake_rsync_script("sleep 30");
    let config = sb.write_config(&telegram(), &rsync);

    let mut child = StdCommand::new(assert_cmd::cargo::cargo_bin("backup-sync"))
        .arg("--config")
        .arg(&config)
        .arg("--log-file")
        .arg(sb.log_file())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(20);
    while !sb.marker().exists() {
        assert!(Instant::now() < deadline, "rsync never started");
        sleep(Duration::from_millis(50));
    }

    let sent = StdCommand::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());

    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() >= deadline {
            child.kill().unwrap();
            panic!("backup-sync did not stop after SIGINT");
        }
        sleep(Duration::from_millis(50));
    };
    assert_eq!(status.code(), Some(1));

    let log = sb.log_text();
    assert!(log.contains("Backup synchronization interrupted by user"));
    assert!(!log.contains("Successfully synced directory"));
    assert!(!log.contains("All backup synchronizations completed successfully"));
    assert!(!log.contains("Backup synchronization failed for directories"));
    // Only the start notice was attempted.
    assert_eq!(log.matches("Failed to send Telegram notification").count(), 1);
}
