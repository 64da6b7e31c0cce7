use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_RSYNC_PATH: &str = "rsync";
pub const DEFAULT_PARSE_MODE: &str = "HTML";
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
pub const LEGACY_JOB_NAME: &str = "Main Backup";

/// One source -> destination directory transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: String,
    pub source_path: String,
    pub dest_path: String,
    pub exclusions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub parse_mode: String,
    pub api_url: String,
}

/// Validated, normalized configuration. Built once by [`SyncConfig::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub source_server: String,
    pub ssh_key_path: PathBuf,
    pub dest_server: Option<String>,
    pub rsync_path: String,
    pub timeout: Duration,
    pub telegram: TelegramSettings,
    pub jobs: Vec<JobSpec>,
}

fn string_or_int<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    match val {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(serde::de::Error::custom("Expected a string or a number")),
    }
}

#[derive(Deserialize)]
struct RawTelegram {
    bot_token: Option<String>,
    #[serde(default, deserialize_with = "string_or_int")]
    chat_id: Option<String>,
    parse_mode: Option<String>,
    api_url: Option<String>,
}

#[derive(Deserialize)]
struct RawDirectory {
    name: Option<String>,
    source_path: Option<String>,
    dest_path: Option<String>,
    #[serde(default)]
    exclusions: Vec<String>,
}

#[derive(Deserialize)]
struct RawConfig {
    source_server: Option<String>,
    ssh_key_path: Option<String>,
    dest_server: Option<String>,
    rsync_path: Option<String>,
    timeout: Option<u64>,
    telegram: Option<RawTelegram>,
    directories: Option<Vec<RawDirectory>>,
    // Legacy single-directory layout.
    source_path: Option<String>,
    dest_path: Option<String>,
}

fn required(value: Option<String>, key: &str) -> Result<String, ConfigError> {
    value
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .ok_or_else(|| ConfigError::ValueRequired(key.into()))
}

impl SyncConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SyncConfig, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<SyncConfig, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<SyncConfig, ConfigError> {
        let source_server = required(raw.source_server, "source_server")?;
        let ssh_key_path = PathBuf::from(required(raw.ssh_key_path, "ssh_key_path")?);

        let telegram = raw
            .telegram
            .ok_or_else(|| ConfigError::ValueRequired("telegram".into()))?;
        let telegram = TelegramSettings {
            bot_token: required(telegram.bot_token, "telegram.bot_token")?,
            chat_id: required(telegram.chat_id, "telegram.chat_id")?,
            parse_mode: telegram
                .parse_mode
                .unwrap_or_else(|| DEFAULT_PARSE_MODE.into()),
            api_url: telegram
                .api_url
                .map(|x| x.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API.into()),
        };

        let jobs = Self::normalize_jobs(raw.directories, raw.source_path, raw.dest_path)?;

        let timeout = match raw.timeout {
            Some(0) => return Err(ConfigError::BadValue("timeout must be positive".into())),
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(SyncConfig {
            source_server,
            ssh_key_path,
            dest_server: raw
                .dest_server
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty()),
            rsync_path: raw.rsync_path.unwrap_or_else(|| DEFAULT_RSYNC_PATH.into()),
            timeout,
            telegram,
            jobs,
        })
    }

    /// Collapses both accepted layouts into one ordered job list.
    fn normalize_jobs(
        directories: Option<Vec<RawDirectory>>,
        source_path: Option<String>,
        dest_path: Option<String>,
    ) -> Result<Vec<JobSpec>, ConfigError> {
        match directories {
            Some(dirs) if dirs.is_empty() => Err(ConfigError::BadValue(
                "'directories' must be a non-empty list".into(),
            )),
            Some(dirs) => dirs
                .into_iter()
                .enumerate()
                .map(|(i, dir)| -> Result<JobSpec, ConfigError> {
                    Ok(JobSpec {
                        name: required(dir.name, &format!("directories[{i}].name"))?,
                        source_path: required(
                            dir.source_path,
                            &format!("directories[{i}].source_path"),
                        )?,
                        dest_path: required(dir.dest_path, &format!("directories[{i}].dest_path"))?,
                        exclusions: dir.exclusions,
                    })
                })
                .collect(),
            None => match (source_path, dest_path) {
                (None, None) => Err(ConfigError::ValueRequired("directories".into())),
                (source_path, dest_path) => Ok(vec![JobSpec {
                    name: LEGACY_JOB_NAME.into(),
                    source_path: required(source_path, "source_path")?,
                    dest_path: required(dest_path, "dest_path")?,
                    exclusions: vec![],
                }]),
            },
        }
    }

    /// Label for the destination side used in messages.
    pub fn dest_label(&self) -> &str {
        self.dest_server.as_deref().unwrap_or("local")
    }
}
