use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use membership::{
    context::AppContext,
    domain::{Plan, User},
    mailer::{MailSettings, TemplateRenderer},
    manual::ManualSettings,
    shutdown::ShutdownCoordinator,
    telemetry::{get_subscriber, init_subscriber},
};
use once_cell::sync::Lazy;
use secrecy::SecretString;
use tempfile::TempDir;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};
use uuid::Uuid;

// `TEST_LOG=true cargo test`时输出日志
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter = "info";
    let name = "test";
    if std::env::var("TEST_LOG").is_ok() {
        init_subscriber(get_subscriber(name, default_filter, std::io::stdout));
    } else {
        init_subscriber(get_subscriber(name, default_filter, std::io::sink));
    }
});

/// 只收不发的SMTP服务器，记录每封邮件的原始内容
pub struct SmtpSink {
    pub port: u16,
    messages: Arc<Mutex<Vec<String>>>,
}

impl SmtpSink {
    pub async fn start() -> Self {
        Self::with_delay(Duration::ZERO).await
    }

    /// 收到邮件正文后延迟`delay`再应答，模拟慢速服务器
    pub async fn with_delay(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind smtp port.");
        let port = listener.local_addr().unwrap().port();
        let messages = Arc::new(Mutex::new(Vec::new()));

        let store = messages.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, store.clone(), delay));
            }
        });

        Self { port, messages }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// 等待至少`count`封邮件到达
    pub async fn wait_for(&self, count: usize) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
        loop {
            let messages = self.messages();
            if messages.len() >= count || tokio::time::Instant::now() > deadline {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

async fn serve(
    stream: TcpStream,
    messages: Arc<Mutex<Vec<String>>>,
    delay: Duration,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    write.write_all(b"220 localhost ESMTP sink\r\n").await?;

    while let Some(line) = lines.next_line().await? {
        let command = line.to_ascii_uppercase();
        if command.starts_with("DATA") {
            write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await?;
            let mut data = String::new();
            while let Some(line) = lines.next_line().await? {
                if line == "." {
                    break;
                }
                data.push_str(&line);
                data.push('\n');
            }
            tokio::time::sleep(delay).await;
            messages.lock().unwrap().push(data);
            write.write_all(b"250 OK queued\r\n").await?;
        } else if command.starts_with("QUIT") {
            write.write_all(b"221 Bye\r\n").await?;
            break;
        } else {
            write.write_all(b"250 OK\r\n").await?;
        }
    }

    Ok(())
}

pub fn mail_settings(port: u16) -> MailSettings {
    MailSettings {
        domain: "localhost".into(),
        host: "127.0.0.1".into(),
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

pub fn renderer() -> TemplateRenderer {
    TemplateRenderer::from_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/templates"))
        .expect("failed to load templates.")
}

pub struct TestApp {
    pub context: AppContext,
    pub coordinator: ShutdownCoordinator,
    pub sink: SmtpSink,
    pub output: TempDir,
}

/// 启动后台子系统，邮件发往本地SMTP sink
pub async fn spawn_app() -> TestApp {
    spawn_app_with_sink(SmtpSink::start().await).await
}

pub async fn spawn_app_with_sink(sink: SmtpSink) -> TestApp {
    Lazy::force(&TRACING);

    let output = TempDir::new().expect("failed to create temp dir.");
    let manual = ManualSettings {
        template_path: concat!(env!("CARGO_MANIFEST_DIR"), "/assets/manual.pdf").into(),
        output_dir: output.path().to_string_lossy().into_owned(),
    };
    let (context, coordinator) = AppContext::start(
        Arc::new(mail_settings(sink.port)),
        Arc::new(renderer()),
        manual,
        "http://127.0.0.1:8000".into(),
    );

    TestApp {
        context,
        coordinator,
        sink,
        output,
    }
}

pub fn test_user() -> User {
    User {
        id: Uuid::new_v4(),
        email: "ada@example.com".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        is_active: true,
        is_admin: false,
        plan: None,
    }
}

pub fn test_plan() -> Plan {
    Plan {
        id: 1,
        plan_name: "Bronze Plan".into(),
        plan_amount: 1000,
        created_at: Utc::now(),
    }
}
