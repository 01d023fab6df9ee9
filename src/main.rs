use membership::{config, startup::Application, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测初始化
    let subscriber = telemetry::get_subscriber("membership", "info", std::io::stdout);
    telemetry::init_subscriber(subscriber);

    let config = config::config();
    let application = Application::build(config).await?;
    tracing::info!(port = application.port(), "application started.");

    application.run_until_stopped().await
}
