use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinSet,
};

use crate::{
    error_log::{error_channel, ErrorEvent, ErrorSink},
    tracker::InFlight,
};

use super::{worker::WORKER_ORIGIN, MailWorker, Message};

/// 邮箱中的一条发送请求，附带其计数令牌
pub(crate) struct Envelope {
    pub(crate) message: Message,
    pub(crate) in_flight: InFlight,
}

/// 邮件分发actor
///
/// 单任务事件循环，分支无固定优先级：
/// 收到邮件 -> 派生worker；收到worker错误 -> 转发给错误日志；
/// worker panic -> 同样作为错误转发；收到停止信号 -> 退出。
pub struct MailDispatcher {
    mailbox: mpsc::Receiver<Envelope>,
    worker_errors: mpsc::UnboundedReceiver<ErrorEvent>,
    worker_sink: ErrorSink,
    logger: ErrorSink,
    stop: oneshot::Receiver<()>,
    worker: Arc<MailWorker>,
    workers: JoinSet<()>,
}

impl MailDispatcher {
    pub(crate) fn new(
        mailbox: mpsc::Receiver<Envelope>,
        stop: oneshot::Receiver<()>,
        worker: Arc<MailWorker>,
        logger: ErrorSink,
    ) -> Self {
        let (worker_sink, worker_errors) = error_channel();
        Self {
            mailbox,
            worker_errors,
            worker_sink,
            logger,
            stop,
            worker,
            workers: JoinSet::new(),
        }
    }

    pub async fn run(mut self) {
        tracing::info!("mail dispatcher started.");
        loop {
            tokio::select! {
                Some(envelope) = self.mailbox.recv() => {
                    let Envelope { message, in_flight } = envelope;
                    self.workers.spawn(
                        self.worker
                            .clone()
                            .run(message, in_flight, self.worker_sink.clone()),
                    );
                }
                Some(event) = self.worker_errors.recv() => self.logger.forward(event),
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    if let Err(e) = joined {
                        self.logger.report(WORKER_ORIGIN, e);
                    }
                }
                _ = &mut self.stop => break,
            }
        }

        // 停止信号之后才关闭通道
        self.mailbox.close();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                self.logger.report(WORKER_ORIGIN, e);
            }
        }
        self.worker_errors.close();
        while let Ok(event) = self.worker_errors.try_recv() {
            self.logger.forward(event);
        }
        tracing::info!("mail dispatcher stopped.");
    }
}
