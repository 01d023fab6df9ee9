use std::sync::Arc;

use tokio::{runtime::Handle, sync::oneshot};

use crate::{
    error_log::{error_channel, ErrorLogger, ErrorSink},
    mailer::{spawn_mailer, MailSettings, Mailer, TemplateRenderer},
    manual::ManualSettings,
    shutdown::ShutdownCoordinator,
    tracker::CompletionTracker,
};

/// 启动时构造一次的应用上下文，以句柄形式传给所有组件
#[derive(Clone)]
pub struct AppContext {
    pub mailer: Mailer,
    pub errors: ErrorSink,
    pub tracker: CompletionTracker,
    pub manual: Arc<ManualSettings>,
    pub base_url: String,
    /// 后台任务运行在主运行时上，不随HTTP worker退出
    pub runtime: Handle,
}

impl AppContext {
    /// 启动邮件actor与错误日志循环
    pub fn start(
        mail: Arc<MailSettings>,
        renderer: Arc<TemplateRenderer>,
        manual: ManualSettings,
        base_url: String,
    ) -> (AppContext, ShutdownCoordinator) {
        let tracker = CompletionTracker::new();

        let (errors, error_rx) = error_channel();
        let (logger_stop, logger_stop_rx) = oneshot::channel();
        let logger = tokio::spawn(ErrorLogger::new(error_rx, logger_stop_rx).run());

        let (mailer, mailer_control) = spawn_mailer(mail, renderer, tracker.clone(), errors.clone());

        let context = AppContext {
            mailer,
            errors,
            tracker: tracker.clone(),
            manual: Arc::new(manual),
            base_url,
            runtime: Handle::current(),
        };
        let coordinator = ShutdownCoordinator::new(tracker, mailer_control, logger_stop, logger);

        (context, coordinator)
    }
}
