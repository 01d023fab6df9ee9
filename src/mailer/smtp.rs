use std::time::Duration;

use lettre::{
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use serde_aux::field_attributes::deserialize_number_from_string;

/// SMTP连接加密方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    None,
    StartTls,
    SslTls,
}

impl Encryption {
    /// 大小写不敏感，未知值按STARTTLS处理
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssl" | "ssltls" | "ssl/tls" => Self::SslTls,
            "none" => Self::None,
            _ => Self::StartTls,
        }
    }
}

/// 邮件服务器配置，启动时读取一次，所有worker只读共享
#[derive(serde::Deserialize, Clone)]
pub struct MailSettings {
    pub domain: String,
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub encryption: String,
    pub from_address: String,
    pub from_name: String,
    pub timeout_seconds: u64,
    pub templates_dir: String,
    pub queue_capacity: usize,
}

impl MailSettings {
    pub fn encryption(&self) -> Encryption {
        Encryption::parse(&self.encryption)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// 每封邮件新建一个传输，不复用连接
    pub fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, lettre::transport::smtp::Error> {
        let tls = match self.encryption() {
            Encryption::None => Tls::None,
            Encryption::StartTls => Tls::Required(TlsParameters::new(self.host.clone())?),
            Encryption::SslTls => Tls::Wrapper(TlsParameters::new(self.host.clone())?),
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
            .port(self.port)
            .tls(tls)
            .timeout(Some(self.timeout()));
        if !self.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.username.clone(),
                self.password.expose_secret().to_string(),
            ));
        }

        Ok(builder.build())
    }

    #[cfg(test)]
    pub(crate) fn for_test(host: &str, port: u16) -> Self {
        Self {
            domain: "localhost".into(),
            host: host.into(),
            port,
            username: String::new(),
            password: SecretString::from(""),
            encryption: "none".into(),
            from_address: "info@mycompany.com".into(),
            from_name: "Company".into(),
            timeout_seconds: 10,
            templates_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/templates").into(),
            queue_capacity: 100,
        }
    }
}
