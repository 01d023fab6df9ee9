use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::{mailer::MailSettings, manual::ManualSettings};

#[derive(serde::Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub database: DBConfig,
    pub redis_uri: SecretString,
    pub hmac_secret: SecretString,
    pub mail: MailSettings,
    pub manual: ManualSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    /// 邮件中链接使用的外部地址
    pub base_url: String,
}

impl WebConfig {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DBConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub db_name: String,
    pub require_ssl: bool,
    pub connect_retries: u32,
    pub retry_delay_milliseconds: u64,
}

impl DBConfig {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose_secret())
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.db_name)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_milliseconds)
    }
}

/// 读取`config.yaml`，环境变量`APP_*`覆盖，如`APP_MAIL__HOST`
pub fn config() -> Config {
    try_config().expect("failed to load configuration.")
}

pub fn try_config() -> Result<Config, config::ConfigError> {
    let base_dir = std::env::current_dir().map_err(|e| config::ConfigError::Foreign(e.into()))?;
    config::Config::builder()
        .add_source(config::File::from(base_dir.join("config.yaml")))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<Config>()
}
