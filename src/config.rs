use crate::error::AppError;
use crate::sigv4::AwsCredentials;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SERVICE_NAME: &str = "billing-reporter";

const ACCESS_KEY_ENTRY: &str = "aws:access-key-id";
const SECRET_KEY_ENTRY: &str = "aws:secret-access-key";
const SESSION_TOKEN_ENTRY: &str = "aws:session-token";

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("BILLING_REPORTER_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("com", "neubell", SERVICE_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".billing-reporter"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub region: String,
    pub channel: String,
    pub webhook_url: String,
    pub service_names: Vec<String>,
    pub conversion_rate: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            channel: "robots".into(),
            webhook_url: String::new(),
            service_names: vec![
                "AmazonEC2".into(),
                "AmazonRDS".into(),
                "AmazonRoute53".into(),
                "AmazonS3".into(),
                "AmazonSNS".into(),
                "AWSDataTransfer".into(),
                "AWSLambda".into(),
                "AWSQueueService".into(),
            ],
            conversion_rate: 110.0,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.region.trim().is_empty() {
            return Err(AppError::Config("region must not be empty".into()));
        }
        if self.channel.trim().is_empty() {
            return Err(AppError::Config("channel must not be empty".into()));
        }
        if !(self.conversion_rate.is_finite() && self.conversion_rate > 0.0) {
            return Err(AppError::Config(
                "conversion_rate must be a positive number".into(),
            ));
        }
        if self.webhook_url.is_empty() {
            return Err(AppError::Config(
                "webhook_url is not set. Edit the config file first.".into(),
            ));
        }
        let parsed = url::Url::parse(&self.webhook_url)
            .map_err(|e| AppError::Config(format!("invalid webhook_url: {e}")))?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(AppError::Config(format!(
                "webhook_url must be http(s), got '{}'",
                parsed.scheme()
            )));
        }
        Ok(())
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn ensure_dirs() -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    Ok(())
}

pub fn load_config() -> Result<AppConfig, AppError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&path)?;
    Ok(toml::from_str(&raw)?)
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    ensure_dirs()?;
    let path = config_path()?;
    let raw = toml::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

pub fn ensure_initialized() -> Result<(), AppError> {
    ensure_dirs()?;
    let cfg_path = config_path()?;
    if !Path::new(&cfg_path).exists() {
        save_config(&AppConfig::default())?;
    }
    Ok(())
}

pub fn set_aws_credentials(
    access_key_id: &str,
    secret_access_key: &str,
    session_token: Option<&str>,
) -> Result<(), AppError> {
    set_keyring_value(ACCESS_KEY_ENTRY, access_key_id)?;
    set_keyring_value(SECRET_KEY_ENTRY, secret_access_key)?;
    match session_token {
        Some(token) if !token.is_empty() => set_keyring_value(SESSION_TOKEN_ENTRY, token)?,
        _ => delete_keyring_value(SESSION_TOKEN_ENTRY)?,
    }
    Ok(())
}

/// Keyring entries first, falling back to the standard AWS environment
/// variables injected by most runtimes.
pub fn aws_credentials() -> Result<AwsCredentials, AppError> {
    let access_key_id = keyring_value(ACCESS_KEY_ENTRY)?
        .or_else(|| env_value("AWS_ACCESS_KEY_ID"))
        .ok_or_else(|| {
            AppError::Config(
                "No AWS access key id found. Run `billing-reporter set-credentials` or set AWS_ACCESS_KEY_ID.".into(),
            )
        })?;
    let secret_access_key = keyring_value(SECRET_KEY_ENTRY)?
        .or_else(|| env_value("AWS_SECRET_ACCESS_KEY"))
        .ok_or_else(|| {
            AppError::Config(
                "No AWS secret access key found. Run `billing-reporter set-credentials` or set AWS_SECRET_ACCESS_KEY.".into(),
            )
        })?;
    let session_token = keyring_value(SESSION_TOKEN_ENTRY)?.or_else(|| env_value("AWS_SESSION_TOKEN"));

    Ok(AwsCredentials {
        access_key_id,
        secret_access_key,
        session_token,
    })
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn keyring_value(name: &str) -> Result<Option<String>, AppError> {
    let entry = keyring::Entry::new(SERVICE_NAME, name)?;
    match entry.get_password() {
        Ok(v) if !v.is_empty() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(AppError::Keyring(e)),
    }
}

fn set_keyring_value(name: &str, value: &str) -> Result<(), AppError> {
    let entry = keyring::Entry::new(SERVICE_NAME, name)?;
    entry.set_password(value)?;
    Ok(())
}

fn delete_keyring_value(name: &str) -> Result<(), AppError> {
    let entry = keyring::Entry::new(SERVICE_NAME, name)?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(AppError::Keyring(e)),
    }
}
