use std::fmt::{Debug, Display};

use tokio::sync::{mpsc, oneshot};

/// 后台任务产生的错误
pub struct ErrorEvent {
    pub origin: &'static str,
    pub error: anyhow::Error,
}

impl ErrorEvent {
    pub fn new(origin: &'static str, error: impl Into<anyhow::Error>) -> Self {
        Self {
            origin,
            error: error.into(),
        }
    }

    fn log(&self) {
        tracing::error!(
            origin = self.origin,
            error.cause_chain = ?self.error,
            error.message = %self.error,
            "background task failed."
        );
    }
}

impl Debug for ErrorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:?}", self.origin, self.error)
    }
}

impl Display for ErrorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.origin, self.error)
    }
}

/// 错误上报端，可任意克隆，发送永不阻塞
#[derive(Clone)]
pub struct ErrorSink(mpsc::UnboundedSender<ErrorEvent>);

impl ErrorSink {
    pub fn report(&self, origin: &'static str, error: impl Into<anyhow::Error>) {
        self.forward(ErrorEvent::new(origin, error));
    }

    pub fn forward(&self, event: ErrorEvent) {
        // 接收端已关闭时直接写日志，错误不会被丢弃
        if let Err(mpsc::error::SendError(event)) = self.0.send(event) {
            event.log();
        }
    }
}

pub fn error_channel() -> (ErrorSink, mpsc::UnboundedReceiver<ErrorEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ErrorSink(tx), rx)
}

/// 集中式错误日志循环
pub struct ErrorLogger {
    errors: mpsc::UnboundedReceiver<ErrorEvent>,
    stop: oneshot::Receiver<()>,
}

impl ErrorLogger {
    pub fn new(errors: mpsc::UnboundedReceiver<ErrorEvent>, stop: oneshot::Receiver<()>) -> Self {
        Self { errors, stop }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.errors.recv() => event.log(),
                _ = &mut self.stop => break,
            }
        }

        // 停止信号之后关闭通道，剩余的错误仍然写入日志
        self.errors.close();
        while let Ok(event) = self.errors.try_recv() {
            event.log();
        }
        tracing::info!("error logger stopped.");
    }
}
