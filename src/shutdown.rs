use tokio::{
    signal,
    sync::{oneshot, watch},
    task::JoinHandle,
};

use crate::{context::AppContext, mailer::MailerControl, tracker::CompletionTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// 优雅退出
///
/// Running -> Draining：等待所有后台任务完成，不设超时也不取消；
/// Draining -> Stopped：先停止邮件actor，再停止错误日志循环，最后释放所有通道。
pub struct ShutdownCoordinator {
    tracker: CompletionTracker,
    mailer: MailerControl,
    logger_stop: oneshot::Sender<()>,
    logger: JoinHandle<()>,
    state: watch::Sender<ShutdownState>,
}

impl ShutdownCoordinator {
    pub(crate) fn new(
        tracker: CompletionTracker,
        mailer: MailerControl,
        logger_stop: oneshot::Sender<()>,
        logger: JoinHandle<()>,
    ) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            tracker,
            mailer,
            logger_stop,
            logger,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// 调用前必须已停止接收HTTP请求
    #[tracing::instrument(name = "graceful shutdown", skip_all)]
    pub async fn shutdown(self, context: AppContext) {
        self.state.send_replace(ShutdownState::Draining);
        tracing::info!(
            in_flight = self.tracker.in_flight(),
            "running clean up tasks, waiting for background work."
        );
        self.tracker.drain().await;

        self.mailer.stop().await;
        if self.logger_stop.send(()).is_err() {
            tracing::warn!("error logger already gone.");
        }
        if let Err(e) = self.logger.await {
            tracing::error!(error.cause_chain = ?e, error.message = %e, "error logger panicked.");
        }

        // 释放最后的发送端，关闭全部通道
        drop(context);
        self.state.send_replace(ShutdownState::Stopped);
        tracing::info!("background work drained, channels closed.");
    }
}

/// 等待 Ctrl+C 或 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error.message = %e, "failed to install Ctrl+C handler.");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error.message = %e, "failed to install SIGTERM handler.");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down."),
        () = terminate => tracing::info!("received SIGTERM, shutting down."),
    }
}
