use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;
use env_logger::{Builder, Env, Target};

use crate::error::SyncError;

pub const DEFAULT_LOG_FILE: &str = "backup_sync.log";

/// Copies every record to stderr and the append-only log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A closed stderr (cron without a mailer) must not cost us the file copy.
        let _ = io::stderr().write_all(buf);
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.file.flush()
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the process logger writing to stderr and `log_file`.
///
/// The level defaults to `info` and follows `RUST_LOG` when set.
pub fn init<P: AsRef<Path>>(log_file: P) -> Result<(), SyncError> {
    let path = log_file.as_ref();
    let file = open_log_file(path).map_err(|e| {
        SyncError::Str(format!("Cannot open log file {}: {}", path.display(), e))
    })?;
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(TeeWriter { file })))
        .try_init()?;
    Ok(())
}
