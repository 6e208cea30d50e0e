//! Runtime configuration.
//!
//! Resolved once at startup and handed to [`crate::ClinicCore`]; nothing
//! reads the environment while serving calls.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

use crate::auth::Account;

pub const DEFAULT_DATABASE_PATH: &str = "clinic.db";
pub const DEFAULT_SESSION_TTL_HOURS: u32 = 24;

pub const ENV_DATABASE_PATH: &str = "CLINIC_DB_PATH";
pub const ENV_SESSION_TTL_HOURS: &str = "CLINIC_SESSION_TTL_HOURS";
pub const ENV_ACCOUNTS_FILE: &str = "CLINIC_ACCOUNTS_FILE";
pub const ENV_UTC_OFFSET: &str = "CLINIC_UTC_OFFSET";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Cannot read accounts file {}: {source}", .path.display())]
    AccountsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed accounts file: {0}")]
    AccountsJson(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Clinic configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ClinicConfig {
    database_path: PathBuf,
    session_ttl_hours: u32,
    accounts: Vec<Account>,
    /// Offset of the clinic's wall clock, for shifts and export times
    utc_offset: FixedOffset,
}

impl ClinicConfig {
    /// Config with the clinic clock on UTC.
    pub fn new(
        database_path: PathBuf,
        session_ttl_hours: u32,
        accounts: Vec<Account>,
    ) -> ConfigResult<Self> {
        if session_ttl_hours == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_SESSION_TTL_HOURS,
                reason: "must be at least 1".into(),
            });
        }
        validate_accounts(&accounts)?;

        Ok(Self {
            database_path,
            session_ttl_hours,
            accounts,
            utc_offset: Utc.fix(),
        })
    }

    pub fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// Load `.env` if present, then resolve from process environment.
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();

        Self::from_values(
            std::env::var(ENV_DATABASE_PATH).ok(),
            std::env::var(ENV_SESSION_TTL_HOURS).ok(),
            std::env::var(ENV_ACCOUNTS_FILE).ok(),
            std::env::var(ENV_UTC_OFFSET).ok(),
        )
    }

    /// Resolve from raw setting values. Blank values count as unset.
    pub fn from_values(
        database_path: Option<String>,
        session_ttl_hours: Option<String>,
        accounts_file: Option<String>,
        utc_offset: Option<String>,
    ) -> ConfigResult<Self> {
        let database_path = non_blank(database_path)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        let session_ttl_hours = match non_blank(session_ttl_hours) {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                name: ENV_SESSION_TTL_HOURS,
                reason: e.to_string(),
            })?,
            None => DEFAULT_SESSION_TTL_HOURS,
        };

        let utc_offset = match non_blank(utc_offset) {
            Some(raw) => raw.parse::<FixedOffset>().map_err(|e| ConfigError::Invalid {
                name: ENV_UTC_OFFSET,
                reason: format!("{:?}: {}", raw, e),
            })?,
            None => Utc.fix(),
        };

        let accounts_file =
            non_blank(accounts_file).ok_or(ConfigError::Missing(ENV_ACCOUNTS_FILE))?;
        let accounts = load_accounts(Path::new(&accounts_file))?;

        Ok(Self::new(database_path, session_ttl_hours, accounts)?.with_utc_offset(utc_offset))
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn session_ttl_hours(&self) -> u32 {
        self.session_ttl_hours
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.session_ttl_hours))
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }
}

/// Read a JSON array of accounts.
pub fn load_accounts(path: &Path) -> ConfigResult<Vec<Account>> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::AccountsFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn validate_accounts(accounts: &[Account]) -> ConfigResult<()> {
    if accounts.is_empty() {
        return Err(ConfigError::Invalid {
            name: ENV_ACCOUNTS_FILE,
            reason: "no accounts configured".into(),
        });
    }

    let mut seen = HashSet::new();
    for account in accounts {
        if account.username.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: ENV_ACCOUNTS_FILE,
                reason: "account with empty username".into(),
            });
        }
        if !seen.insert(account.username.as_str()) {
            return Err(ConfigError::Invalid {
                name: ENV_ACCOUNTS_FILE,
                reason: format!("duplicate username {}", account.username),
            });
        }
        let digest_ok = account.password_sha256.len() == 64
            && account.password_sha256.chars().all(|c| c.is_ascii_hexdigit());
        if !digest_ok {
            return Err(ConfigError::Invalid {
                name: ENV_ACCOUNTS_FILE,
                reason: format!(
                    "password_sha256 for {} is not a SHA-256 hex digest",
                    account.username
                ),
            });
        }
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
