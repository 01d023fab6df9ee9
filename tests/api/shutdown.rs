use std::time::Duration;

use claim::assert_err;
use membership::{mailer::Message, shutdown::ShutdownState};

use crate::helper::{spawn_app, spawn_app_with_sink, SmtpSink};

#[tokio::test]
async fn shutdown_waits_for_a_message_in_flight() {
    let sink = SmtpSink::with_delay(Duration::from_millis(500)).await;
    let app = spawn_app_with_sink(sink).await;
    let mut state = app.coordinator.subscribe();
    assert_eq!(*state.borrow(), ShutdownState::Running);

    app.context
        .mailer
        .send(Message::new("a@b.com", "slow"))
        .await
        .unwrap();
    let shutdown = tokio::spawn(app.coordinator.shutdown(app.context));

    state.changed().await.unwrap();
    assert_eq!(*state.borrow_and_update(), ShutdownState::Draining);
    assert!(app.sink.messages().is_empty());

    shutdown.await.unwrap();
    assert_eq!(*state.borrow(), ShutdownState::Stopped);
    assert_eq!(app.sink.messages().len(), 1);
}

#[tokio::test]
async fn mailer_refuses_messages_after_shutdown() {
    let app = spawn_app().await;
    let mailer = app.context.mailer.clone();

    app.coordinator.shutdown(app.context).await;

    assert_err!(mailer.send(Message::new("a@b.com", "late")).await);
    assert!(app.sink.messages().is_empty());
}
