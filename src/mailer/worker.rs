use std::sync::Arc;

use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart},
    AsyncTransport,
};

use crate::{error_log::ErrorSink, tracker::InFlight};

use super::{render::RenderError, MailSettings, Message, TemplateRenderer};

#[derive(thiserror::Error, Debug)]
pub enum MailError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("invalid mail address `{address}`.")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to read attachment `{name}`.")]
    Attachment {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid attachment content type.")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),
    #[error("failed to build email.")]
    Build(#[from] lettre::error::Error),
    #[error("smtp delivery failed.")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

pub(crate) const WORKER_ORIGIN: &str = "mail worker";

/// 一次性任务：渲染并发送一封邮件
pub struct MailWorker {
    settings: Arc<MailSettings>,
    renderer: Arc<TemplateRenderer>,
}

impl MailWorker {
    pub fn new(settings: Arc<MailSettings>, renderer: Arc<TemplateRenderer>) -> Self {
        Self { settings, renderer }
    }

    /// 发送失败时上报一次错误，不重试
    pub async fn run(self: Arc<Self>, message: Message, in_flight: InFlight, errors: ErrorSink) {
        if let Err(e) = self.deliver(message).await {
            errors.report(WORKER_ORIGIN, e);
        }
        drop(in_flight);
    }

    #[tracing::instrument(
        name = "deliver mail",
        skip_all,
        fields(to = %message.to, subject = %message.subject, template = tracing::field::Empty)
    )]
    pub async fn deliver(&self, message: Message) -> Result<(), MailError> {
        let message = message.with_defaults(&self.settings);
        tracing::Span::current().record("template", tracing::field::display(&message.template));

        let data = message.template_data();
        let html = self.renderer.render_html(&message.template, &data)?;
        let plain = self.renderer.render_plain(&message.template, &data)?;

        let transport = self.settings.transport()?;
        let email = build_email(&message, html, plain).await?;
        transport.send(email).await?;
        tracing::info!("mail sent.");

        Ok(())
    }
}

/// 构造 HTML + 纯文本的multipart邮件，附件按显示名逐个附加
pub async fn build_email(
    message: &Message,
    html: String,
    plain: String,
) -> Result<lettre::Message, MailError> {
    let mut from = parse_mailbox(&message.from)?;
    if from.name.is_none() && !message.from_name.is_empty() {
        from.name = Some(message.from_name.clone());
    }
    let to = parse_mailbox(&message.to)?;
    let builder = lettre::Message::builder()
        .from(from)
        .to(to)
        .subject(&message.subject);

    let body = MultiPart::alternative_plain_html(plain, html);
    if message.attachments.is_empty() {
        return Ok(builder.multipart(body)?);
    }

    let mut mixed = MultiPart::mixed().multipart(body);
    for (name, path) in &message.attachments {
        let content = tokio::fs::read(path)
            .await
            .map_err(|source| MailError::Attachment {
                name: name.clone(),
                source,
            })?;
        let content_type =
            ContentType::parse(mime_guess::from_path(path).first_or_octet_stream().as_ref())?;
        mixed = mixed.singlepart(Attachment::new(name.clone()).body(content, content_type));
    }

    Ok(builder.multipart(mixed)?)
}

/// 接受`a@b.com`与`Ada <a@b.com>`两种写法
fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.into(),
        source,
    })
}
