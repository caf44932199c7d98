//! Configuration management for caltrack.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "caltrack";

/// Default data file name.
const DATA_FILE_NAME: &str = "transducers.csv";

/// Default outbox directory name, inside the data directory.
const OUTBOX_DIR_NAME: &str = "outbox";

/// Prefix for environment overrides, e.g. `CALTRACK_NOTIFY__TRANSPORT`.
const ENV_PREFIX: &str = "CALTRACK_";

/// Default port for SMTP over implicit TLS.
const DEFAULT_SMTP_PORT: u16 = 465;

/// Unprefixed variables older deployments used for mail settings.
const LEGACY_ENV_VARS: [&str; 5] = [
    "RECIPIENTS",
    "SMTP_SERVER",
    "SMTP_PORT",
    "EMAIL_USER",
    "EMAIL_PASSWORD",
];

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables prefixed with `CALTRACK_` (nested keys joined by `__`)
/// 2. The unprefixed `RECIPIENTS`, `SMTP_SERVER`, `SMTP_PORT`, `EMAIL_USER`
///    and `EMAIL_PASSWORD` variables, mapped into `[notify]`
/// 3. TOML config file at `~/.config/caltrack/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub store: StoreConfig,
    /// Notification configuration.
    pub notify: NotifyConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the CSV data file.
    /// Defaults to `~/.local/share/caltrack/transducers.csv`
    pub data_file: Option<PathBuf>,
}

/// How expiry notifications are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Write due records to the log only.
    #[default]
    Log,
    /// Pipe a MIME message into a sendmail-compatible program.
    Sendmail,
    /// Drop a `.eml` file into an outbox directory.
    Outbox,
    /// Submit to an SMTP relay over implicit TLS.
    Smtp,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Sendmail => write!(f, "sendmail"),
            Self::Outbox => write!(f, "outbox"),
            Self::Smtp => write!(f, "smtp"),
        }
    }
}

/// Notification-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Addresses that receive expiry alerts.
    /// Accepts a list or a comma-separated string.
    #[serde(deserialize_with = "deserialize_recipients")]
    pub recipients: Vec<String>,
    /// Delivery transport.
    pub transport: Transport,
    /// `From` address on outgoing messages.
    pub sender: String,
    /// Program used by the sendmail transport.
    pub sendmail_program: String,
    /// Arguments passed to the sendmail program.
    pub sendmail_args: Vec<String>,
    /// Directory used by the outbox transport.
    /// Defaults to `~/.local/share/caltrack/outbox`
    pub outbox_dir: Option<PathBuf>,
    /// SMTP relay host used by the smtp transport.
    pub smtp_server: Option<String>,
    /// SMTP relay port (implicit TLS).
    pub smtp_port: u16,
    /// Login for the SMTP relay. No authentication when unset.
    pub smtp_user: Option<String>,
    /// Password for `smtp_user`. Never serialized.
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            transport: Transport::Log,
            sender: "caltrack@localhost".to_string(),
            sendmail_program: "sendmail".to_string(),
            sendmail_args: vec!["-t".to_string(), "-i".to_string()],
            outbox_dir: None,
            smtp_server: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_user: None,
            smtp_password: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Recipients {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_recipients<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Recipients::deserialize(deserializer)? {
        Recipients::List(list) => list,
        Recipients::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(raw
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect())
}

/// Key under `[notify]` for an unprefixed legacy variable.
fn legacy_env_key(var: &str) -> &'static str {
    match var.to_ascii_uppercase().as_str() {
        "SMTP_SERVER" => "notify.smtp_server",
        "SMTP_PORT" => "notify.smtp_port",
        "EMAIL_USER" => "notify.smtp_user",
        "EMAIL_PASSWORD" => "notify.smtp_password",
        _ => "notify.recipients",
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(
                Env::raw()
                    .only(&LEGACY_ENV_VARS)
                    .map(|key| legacy_env_key(key.as_str()).into()),
            )
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::from_figment(&figment)
    }

    /// Extract and validate configuration from a prepared figment.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let notify = &self.notify;

        if !notify.sender.contains('@') {
            return Err(Error::config_validation(format!(
                "sender ({}) is not an email address",
                notify.sender
            )));
        }

        for recipient in &notify.recipients {
            if !recipient.contains('@') || recipient.chars().any(char::is_whitespace) {
                return Err(Error::config_validation(format!(
                    "invalid recipient address: {recipient:?}"
                )));
            }
        }

        if notify.transport != Transport::Log && notify.recipients.is_empty() {
            return Err(Error::config_validation(format!(
                "the {} transport needs at least one recipient",
                notify.transport
            )));
        }

        if notify.transport == Transport::Sendmail && notify.sendmail_program.trim().is_empty() {
            return Err(Error::config_validation(
                "sendmail_program must not be empty",
            ));
        }

        if notify.transport == Transport::Smtp {
            let has_server = notify
                .smtp_server
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty());
            if !has_server {
                return Err(Error::config_validation(
                    "the smtp transport needs smtp_server",
                ));
            }
            if notify.smtp_port == 0 {
                return Err(Error::config_validation("smtp_port must not be 0"));
            }
            if notify.smtp_user.is_some() && notify.smtp_password.is_none() {
                return Err(Error::config_validation(
                    "smtp_user is set but smtp_password is missing",
                ));
            }
        }

        Ok(())
    }

    /// Get the data file path, resolving defaults if not set.
    #[must_use]
    pub fn data_file(&self) -> PathBuf {
        self.store
            .data_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATA_FILE_NAME))
    }

    /// Get the outbox directory, resolving defaults if not set.
    #[must_use]
    pub fn outbox_dir(&self) -> PathBuf {
        self.notify
            .outbox_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(OUTBOX_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml));
        Config::from_figment(&figment)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.store.data_file.is_none());
        assert!(config.notify.recipients.is_empty());
        assert_eq!(config.notify.transport, Transport::Log);
        assert_eq!(config.notify.sendmail_args, vec!["-t", "-i"]);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_recipients_from_list() {
        let config = from_toml(
            r#"
            [notify]
            recipients = ["a@example.com", " b@example.com "]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.notify.recipients,
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_recipients_from_comma_string() {
        let config = from_toml(
            r#"
            [notify]
            recipients = "a@example.com, b@example.com,,"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.notify.recipients,
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_transport_from_toml() {
        let config = from_toml(
            r#"
            [notify]
            transport = "outbox"
            recipients = ["ops@example.com"]
            outbox_dir = "/var/spool/caltrack"
            "#,
        )
        .unwrap();
        assert_eq!(config.notify.transport, Transport::Outbox);
        assert_eq!(config.outbox_dir(), PathBuf::from("/var/spool/caltrack"));
    }

    #[test]
    fn test_validate_transport_needs_recipients() {
        let mut config = Config::default();
        config.notify.transport = Transport::Sendmail;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sendmail"));
        assert!(err.contains("recipient"));
    }

    #[test]
    fn test_validate_rejects_bad_recipient() {
        let mut config = Config::default();
        config.notify.recipients = vec!["not-an-address".to_string()];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("not-an-address"));
    }

    #[test]
    fn test_validate_rejects_header_injection() {
        let mut config = Config::default();
        config.notify.recipients = vec!["a@example.com\nBcc: x@evil.test".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_sendmail_program() {
        let mut config = Config::default();
        config.notify.transport = Transport::Sendmail;
        config.notify.recipients = vec!["ops@example.com".to_string()];
        config.notify.sendmail_program = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sendmail_program"));
    }

    #[test]
    fn test_validate_bad_sender() {
        let mut config = Config::default();
        config.notify.sender = "caltrack".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_file_default() {
        let config = Config::default();
        let path = config.data_file();

        assert!(path.to_string_lossy().contains("caltrack"));
        assert!(path.to_string_lossy().ends_with("transducers.csv"));
    }

    #[test]
    fn test_data_file_custom() {
        let mut config = Config::default();
        config.store.data_file = Some(PathBuf::from("/srv/data.csv"));

        assert_eq!(config.data_file(), PathBuf::from("/srv/data.csv"));
    }

    #[test]
    fn test_outbox_dir_default() {
        let path = Config::default().outbox_dir();
        assert!(path.ends_with("caltrack/outbox"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("caltrack"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_toml_value_is_load_error() {
        let err = from_toml(
            r#"
            [notify]
            transport = "carrier-pigeon"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigLoad(_)));
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(Transport::Log.to_string(), "log");
        assert_eq!(Transport::Sendmail.to_string(), "sendmail");
        assert_eq!(Transport::Outbox.to_string(), "outbox");
        assert_eq!(Transport::Smtp.to_string(), "smtp");
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("recipients"));
        assert!(json.contains("\"transport\":\"log\""));
        assert!(json.contains("\"smtp_port\":465"));
    }

    #[test]
    fn test_smtp_from_toml() {
        let config = from_toml(
            r#"
            [notify]
            transport = "smtp"
            recipients = ["ops@example.com"]
            smtp_server = "smtp.example.com"
            smtp_user = "alerts@example.com"
            smtp_password = "hunter2"
            "#,
        )
        .unwrap();
        assert_eq!(config.notify.transport, Transport::Smtp);
        assert_eq!(config.notify.smtp_server.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.notify.smtp_port, 465);
        assert_eq!(config.notify.smtp_user.as_deref(), Some("alerts@example.com"));
    }

    #[test]
    fn test_smtp_password_not_serialized() {
        let mut config = Config::default();
        config.notify.smtp_password = Some("hunter2".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("smtp_password"));
    }

    #[test]
    fn test_validate_smtp_needs_server() {
        let mut config = Config::default();
        config.notify.transport = Transport::Smtp;
        config.notify.recipients = vec!["ops@example.com".to_string()];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("smtp_server"));

        config.notify.smtp_server = Some("smtp.example.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_smtp_user_needs_password() {
        let mut config = Config::default();
        config.notify.transport = Transport::Smtp;
        config.notify.recipients = vec!["ops@example.com".to_string()];
        config.notify.smtp_server = Some("smtp.example.com".to_string());
        config.notify.smtp_user = Some("alerts@example.com".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("smtp_password"));
    }

    #[test]
    fn test_legacy_env_keys() {
        assert_eq!(legacy_env_key("SMTP_SERVER"), "notify.smtp_server");
        assert_eq!(legacy_env_key("smtp_port"), "notify.smtp_port");
        assert_eq!(legacy_env_key("EMAIL_USER"), "notify.smtp_user");
        assert_eq!(legacy_env_key("EMAIL_PASSWORD"), "notify.smtp_password");
        assert_eq!(legacy_env_key("RECIPIENTS"), "notify.recipients");
    }
}
