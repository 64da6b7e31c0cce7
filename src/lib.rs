pub mod config;
pub mod error;
pub mod file_size;
pub mod logging;
pub mod notify;
pub mod report;
pub mod rsync;
pub mod sync;

pub mod prelude {
    pub use crate::config::{JobSpec, SyncConfig, TelegramSettings};
    pub use crate::error::{ConfigError, SyncError};
    pub use crate::file_size::FileSize;
    pub use crate::notify::{Notifier, TelegramNotifier};
    pub use crate::rsync::{
        RsyncRunner, RsyncSettings, RsyncStats, TransferOutcome, TransferResult, TransferTool,
    };
    pub use crate::sync::BackupSyncer;
}
