mod dispatcher;
mod message;
mod render;
mod smtp;
mod worker;

use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

pub use dispatcher::MailDispatcher;
pub use message::{Message, MessageData, DEFAULT_TEMPLATE, PAYLOAD_KEY};
pub use render::{RenderError, TemplateRenderer};
pub use smtp::{Encryption, MailSettings};
pub use worker::{build_email, MailError, MailWorker};

use crate::{error_log::ErrorSink, tracker::CompletionTracker};
use dispatcher::Envelope;

#[derive(thiserror::Error, Debug)]
#[error("mail dispatcher has stopped, message to `{0}` was not queued.")]
pub struct MailboxClosed(pub String);

/// 邮件分发actor的发送端
#[derive(Clone)]
pub struct Mailer {
    mailbox: mpsc::Sender<Envelope>,
    tracker: CompletionTracker,
}

impl Mailer {
    /// 入队前计数加一，排队中的邮件同样计入排空等待
    #[tracing::instrument(name = "queue mail", skip_all, fields(to = %message.to, subject = %message.subject))]
    pub async fn send(&self, message: Message) -> Result<(), MailboxClosed> {
        let in_flight = self.tracker.begin();
        self.mailbox
            .send(Envelope { message, in_flight })
            .await
            .map_err(|e| MailboxClosed(e.0.message.to))
    }
}

#[cfg(test)]
impl Mailer {
    /// 不启动actor，由测试直接读取邮箱
    pub(crate) fn detached(tracker: CompletionTracker) -> (Self, mpsc::Receiver<Envelope>) {
        let (mailbox, rx) = mpsc::channel(100);
        (Self { mailbox, tracker }, rx)
    }
}

/// 停止actor的句柄
pub struct MailerControl {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MailerControl {
    /// 发送停止信号并等待actor退出
    pub async fn stop(self) {
        if self.stop.send(()).is_err() {
            tracing::warn!("mail dispatcher already gone.");
        }
        if let Err(e) = self.handle.await {
            tracing::error!(error.cause_chain = ?e, error.message = %e, "mail dispatcher panicked.");
        }
    }
}

/// 创建邮箱并启动分发actor
pub fn spawn_mailer(
    settings: Arc<MailSettings>,
    renderer: Arc<TemplateRenderer>,
    tracker: CompletionTracker,
    logger: ErrorSink,
) -> (Mailer, MailerControl) {
    let (mailbox_tx, mailbox_rx) = mpsc::channel(settings.queue_capacity.max(1));
    let (stop_tx, stop_rx) = oneshot::channel();

    let worker = Arc::new(MailWorker::new(settings, renderer));
    let dispatcher = MailDispatcher::new(mailbox_rx, stop_rx, worker, logger);
    let handle = tokio::spawn(dispatcher.run());

    (
        Mailer {
            mailbox: mailbox_tx,
            tracker,
        },
        MailerControl {
            stop: stop_tx,
            handle,
        },
    )
}
