use std::{collections::BTreeMap, path::PathBuf};

use serde_json::Value;

use super::MailSettings;

pub const DEFAULT_TEMPLATE: &str = "mail";
/// 负载在模板数据中的键名
pub const PAYLOAD_KEY: &str = "message";

/// 邮件负载
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MessageData {
    #[default]
    Empty,
    Text(String),
    Record(serde_json::Map<String, Value>),
}

impl MessageData {
    /// 将可序列化的结构体转换为`Record`
    pub fn record<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self::Record(map)),
            other => Err(serde::ser::Error::custom(format!(
                "expected a record, got `{other}`."
            ))),
        }
    }

    fn into_value(self) -> Value {
        match self {
            MessageData::Empty => Value::Null,
            MessageData::Text(text) => Value::String(text),
            MessageData::Record(map) => Value::Object(map),
        }
    }
}

impl From<&str> for MessageData {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<String> for MessageData {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// 一次发送请求，由一个Mail Worker消费一次后丢弃
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub subject: String,
    pub data: MessageData,
    pub data_map: BTreeMap<String, Value>,
    /// 附件显示名 -> 文件路径
    pub attachments: BTreeMap<String, PathBuf>,
    pub template: String,
}

impl Message {
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<MessageData>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_attachment(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.attachments.insert(name.into(), path.into());
        self
    }

    /// 填充缺省的模板名、发件地址和发件人名称
    pub fn with_defaults(mut self, settings: &MailSettings) -> Self {
        if self.template.is_empty() {
            self.template = DEFAULT_TEMPLATE.into();
        }
        if self.from.is_empty() {
            self.from = settings.from_address.clone();
        }
        if self.from_name.is_empty() {
            self.from_name = settings.from_name.clone();
        }
        self
    }

    /// 将负载合并进模板数据
    pub fn template_data(&self) -> BTreeMap<String, Value> {
        let mut data = self.data_map.clone();
        data.insert(PAYLOAD_KEY.into(), self.data.clone().into_value());
        data
    }
}
