//! Configuration types, built from environment variables.

use std::path::PathBuf;

use chrono_tz::Tz;
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::openai::DEFAULT_BASE_URL;
use crate::whatsapp::gateway::{DEFAULT_API_BASE, DEFAULT_API_VERSION};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

/// Where the record store lives.
#[derive(Debug, Clone)]
pub enum DatabaseLocation {
    /// Local SQLite file.
    Local(PathBuf),
    /// Remote libSQL server (`libsql://` or `https://`).
    Remote { url: String, auth_token: SecretString },
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub verify_token: SecretString,
    pub whatsapp_access_token: SecretString,
    pub whatsapp_phone_number_id: String,
    pub whatsapp_api_base: String,
    pub whatsapp_api_version: String,
    pub openai_api_key: SecretString,
    pub ai_model: String,
    pub ai_base_url: String,
    pub database: DatabaseLocation,
    pub timezone: Tz,
    /// Phone number quoted in fallback and apology messages.
    pub business_phone: String,
    pub mark_read: bool,
    pub serialize_per_contact: bool,
    /// Directory for daily-rolling log files. Stdout only when unset.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let verify_token = SecretString::from(required("WHATSAPP_VERIFY_TOKEN")?);
        let whatsapp_access_token = SecretString::from(required("WHATSAPP_ACCESS_TOKEN")?);
        let whatsapp_phone_number_id = required("WHATSAPP_PHONE_NUMBER_ID")?;
        let openai_api_key = SecretString::from(required("OPENAI_API_KEY")?);
        let business_phone = required("BUSINESS_PHONE")?;

        let database_url = required("DATABASE_URL")?;
        let database = if is_remote_url(&database_url) {
            let token = get("DATABASE_AUTH_TOKEN").ok_or_else(|| ConfigError::MissingRequired {
                key: "DATABASE_AUTH_TOKEN".into(),
                hint: format!("required for remote database {database_url}"),
            })?;
            DatabaseLocation::Remote {
                url: database_url,
                auth_token: SecretString::from(token),
            }
        } else {
            let path = database_url
                .strip_prefix("file:")
                .unwrap_or(&database_url)
                .to_string();
            DatabaseLocation::Local(PathBuf::from(path))
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".into(),
                message: format!("'{raw}': {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let tz_name = get("BUSINESS_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = tz_name
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "BUSINESS_TIMEZONE".into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            port,
            verify_token,
            whatsapp_access_token,
            whatsapp_phone_number_id,
            whatsapp_api_base: get("WHATSAPP_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            whatsapp_api_version: get("WHATSAPP_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            openai_api_key,
            ai_model: get("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ai_base_url: get("AI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            database,
            timezone,
            business_phone,
            mark_read: parse_flag(get("WHATSAPP_MARK_READ")),
            serialize_per_contact: parse_flag(get("PIPELINE_SERIALIZE_PER_CONTACT")),
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }
}

fn is_remote_url(url: &str) -> bool {
    ["libsql://", "https://", "http://", "wss://", "ws://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn parse_flag(value: Option<String>) -> bool {
    value.is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
