//! Settings for the bot.
//!
//! Read from an optional `domain_block_bot.toml` in the working directory,
//! then overridden by environment variables of the same names in any case,
//! like `TELEGRAM_TOKEN` or `CHAT_ID`.

use std::{net::IpAddr, path::PathBuf, time::Duration};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use teloxide::types::ChatId;
use url::Url;

use crate::domains::{
    database::{JsonFileStorage, SheetStorage, StorageError, TextFileStorage},
    CheckErrorPolicy, Storage,
};

pub static CONFIG_FILE: &str = "domain_block_bot.toml";

/// Keys that get picked up from the environment.
const ENV_KEYS: &[&str] = &[
    "telegram_token",
    "chat_id",
    "port",
    "listen_address",
    "storage",
    "list_path",
    "json_path",
    "spreadsheet_id",
    "sheet_name",
    "sheet_credentials_path",
    "check_url",
    "scan_interval_secs",
    "list_limit",
    "check_error_policy",
    "webhook_url",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),
    #[error("invalid {key}: {source}")]
    BadUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} must be set to use the sheet storage")]
    MissingSheetSetting(&'static str),
    #[error("scan_interval_secs must be above zero")]
    ZeroInterval,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// One domain per line in `list_path`.
    #[default]
    Text,
    /// A JSON document at `json_path`.
    Json,
    /// A Google spreadsheet, accessed as the service account whose JSON key
    /// is at `sheet_credentials_path`.
    Sheet,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub telegram_token: String,
    /// The operator's chat, where alerts go.
    pub chat_id: i64,
    pub listen_address: IpAddr,
    pub port: u16,
    /// Public URL Telegram should post updates to. If unset, the webhook
    /// is assumed to be registered already.
    pub webhook_url: Option<String>,

    pub storage: StorageKind,
    pub list_path: PathBuf,
    pub json_path: PathBuf,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    pub sheet_credentials_path: Option<PathBuf>,

    pub check_url: String,
    pub scan_interval_secs: u64,
    /// How many domains `/list` shows. 0 shows all of them.
    pub list_limit: usize,
    pub check_error_policy: CheckErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            chat_id: 0,
            listen_address: IpAddr::from([0, 0, 0, 0]),
            port: 10000,
            webhook_url: None,
            storage: StorageKind::Text,
            list_path: "list.txt".into(),
            json_path: "database.json".into(),
            spreadsheet_id: None,
            sheet_name: "Sheet1".to_string(),
            sheet_credentials_path: None,
            check_url: "https://check.skiddle.id/".to_string(),
            scan_interval_secs: 60,
            list_limit: 15,
            check_error_policy: CheckErrorPolicy::default(),
        }
    }
}

impl Config {
    /// Load from [`CONFIG_FILE`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::raw().only(ENV_KEYS)),
        )
    }

    /// Load from `figment`, on top of the defaults.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(figment)
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.is_empty() {
            return Err(ConfigError::Missing("telegram_token"));
        }
        if self.chat_id == 0 {
            return Err(ConfigError::Missing("chat_id"));
        }
        self.check_url()?;
        if let Some(url) = &self.webhook_url {
            Url::parse(url).map_err(|source| ConfigError::BadUrl {
                key: "webhook_url",
                source,
            })?;
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.storage == StorageKind::Sheet {
            if self.spreadsheet_id.is_none() {
                return Err(ConfigError::MissingSheetSetting("spreadsheet_id"));
            }
            if self.sheet_credentials_path.is_none() {
                return Err(ConfigError::MissingSheetSetting("sheet_credentials_path"));
            }
        }
        Ok(())
    }

    pub fn operator_chat(&self) -> ChatId {
        ChatId(self.chat_id)
    }

    pub fn check_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.check_url).map_err(|source| ConfigError::BadUrl {
            key: "check_url",
            source,
        })
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn list_limit(&self) -> Option<usize> {
        (self.list_limit > 0).then_some(self.list_limit)
    }

    /// Build the storage backend this config asks for.
    pub fn storage(&self) -> Result<Storage, StorageError> {
        Ok(match self.storage {
            StorageKind::Text => Storage::TextFile(TextFileStorage::new(&self.list_path)),
            StorageKind::Json => Storage::JsonFile(JsonFileStorage::new(&self.json_path)),
            StorageKind::Sheet => Storage::Sheet(SheetStorage::new(
                self.spreadsheet_id.clone().unwrap_or_default(),
                self.sheet_name.clone(),
                self.sheet_credentials_path.clone().unwrap_or_default(),
            )?),
        })
    }
}
