use std::{net::TcpListener, sync::Arc, time::Duration};

use actix_session::{storage::RedisSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, dev::Server, web, App, HttpServer};
use actix_web_flash_messages::{storage::CookieMessageStore, FlashMessagesFramework};
use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing_actix_web::TracingLogger;

use crate::{
    config::{Config, DBConfig},
    context::AppContext,
    mailer::TemplateRenderer,
    routes,
    shutdown::{shutdown_signal, ShutdownCoordinator},
};

pub struct Application {
    port: u16,
    server: Server,
    context: AppContext,
    coordinator: ShutdownCoordinator,
}

impl Application {
    /// 数据库重试耗尽、模板加载失败或端口绑定失败都会终止启动
    pub async fn build(config: Config) -> Result<Self, anyhow::Error> {
        let pool = connect_with_retry(&config.database)
            .await
            .context("failed to connect to the database.")?;

        let renderer = TemplateRenderer::from_dir(&config.mail.templates_dir)
            .context("failed to load mail templates.")?;
        let (context, coordinator) = AppContext::start(
            Arc::new(config.mail),
            Arc::new(renderer),
            config.manual,
            config.web.base_url.clone(),
        );

        let listener = TcpListener::bind(config.web.server_address())
            .context("failed to bind web port.")?;
        let port = listener.local_addr()?.port();
        let server = run(
            listener,
            pool,
            context.clone(),
            config.hmac_secret,
            config.redis_uri,
        )
        .await?;

        Ok(Self {
            port,
            server,
            context,
            coordinator,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// 收到退出信号后停止接收请求，等待后台任务排空再返回
    pub async fn run_until_stopped(self) -> Result<(), anyhow::Error> {
        let Self {
            server,
            context,
            coordinator,
            ..
        } = self;
        let handle = server.handle();
        let mut server = tokio::spawn(server);

        tokio::select! {
            res = &mut server => {
                tracing::warn!("web server exited before a shutdown signal.");
                res.context("web server task panicked.")??;
            }
            () = shutdown_signal() => {
                handle.stop(true).await;
                server.await.context("web server task panicked.")??;
            }
        }

        coordinator.shutdown(context).await;
        Ok(())
    }
}

/// 有限次重试连接数据库
#[tracing::instrument(name = "Connect to database", skip_all, fields(host = %config.host, db = %config.db_name))]
pub async fn connect_with_retry(config: &DBConfig) -> Result<PgPool, sqlx::Error> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(config.with_db())
            .await
        {
            Ok(pool) => {
                tracing::info!(attempt, "connected to database.");
                return Ok(pool);
            }
            Err(e) if attempt <= config.connect_retries => {
                tracing::warn!(attempt, error.message = %e, "database not ready, retrying.");
                tokio::time::sleep(config.retry_delay()).await;
            }
            Err(e) => {
                tracing::error!(attempt, error.message = %e, "giving up on database connection.");
                return Err(e);
            }
        }
    }
}

/// 信号由`run_until_stopped`统一处理，服务器自身不监听
pub async fn run(
    listener: TcpListener,
    pool: PgPool,
    context: AppContext,
    hmac_secret: SecretString,
    redis_uri: SecretString,
) -> Result<Server, anyhow::Error> {
    let secret_key = Key::from(hmac_secret.expose_secret().as_bytes());
    let message_store = CookieMessageStore::builder(secret_key.clone()).build();
    let message_framework = FlashMessagesFramework::builder(message_store).build();
    let redis_store = RedisSessionStore::new(redis_uri.expose_secret()).await?;

    let pool = web::Data::new(pool);
    let context = web::Data::new(context);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(message_framework.clone())
            .wrap(SessionMiddleware::new(
                redis_store.clone(),
                secret_key.clone(),
            ))
            .wrap(TracingLogger::default())
            .configure(routes::configure)
            .app_data(pool.clone())
            .app_data(context.clone())
    })
    .listen(listener)?
    .disable_signals()
    .run();

    Ok(server)
}
