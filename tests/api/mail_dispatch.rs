use linkify::{LinkFinder, LinkKind};
use membership::{
    mailer::{Message, MessageData},
    routes::activation_message,
};

use crate::helper::{renderer, spawn_app};

#[tokio::test]
async fn plain_message_is_delivered_once_with_its_subject() {
    let app = spawn_app().await;

    app.context
        .mailer
        .send(Message::new("a@b.com", "X"))
        .await
        .unwrap();
    app.coordinator.shutdown(app.context).await;

    let messages = app.sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Subject: X"));
    assert!(messages[0].contains("To: a@b.com"));
    assert!(messages[0].contains("info@mycompany.com"));
}

#[tokio::test]
async fn concurrent_messages_are_all_delivered() {
    let app = spawn_app().await;

    for i in 0..5 {
        let message = Message::new(format!("user{i}@example.com"), format!("Notice {i}"))
            .with_data(MessageData::Text(format!("body {i}")));
        app.context.mailer.send(message).await.unwrap();
    }
    let messages = app.sink.wait_for(5).await;
    assert_eq!(messages.len(), 5);
    for i in 0..5 {
        assert!(messages.iter().any(|m| m.contains(&format!("Subject: Notice {i}"))));
    }

    let tracker = app.context.tracker.clone();
    app.coordinator.shutdown(app.context).await;
    assert_eq!(tracker.in_flight(), 0);
}

#[tokio::test]
async fn failed_delivery_does_not_stop_later_messages() {
    let app = spawn_app().await;

    // 收件人非法，worker报告错误后继续处理
    app.context
        .mailer
        .send(Message::new("not an address", "broken"))
        .await
        .unwrap();
    app.context
        .mailer
        .send(Message::new("a@b.com", "after"))
        .await
        .unwrap();
    app.coordinator.shutdown(app.context).await;

    let messages = app.sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Subject: after"));
}

#[test]
fn activation_link_is_the_same_in_html_and_plain_text() {
    let renderer = renderer();
    let message =
        activation_message("http://127.0.0.1:8000", "Ada", "ada@example.com", "token123").unwrap();
    let data = message.template_data();

    let get_link = |s: &str| {
        let links: Vec<_> = LinkFinder::new()
            .links(s)
            .filter(|l| *l.kind() == LinkKind::Url)
            .collect();
        assert_eq!(links.len(), 1);
        links[0].as_str().to_owned()
    };
    let html = get_link(&renderer.render_html(&message.template, &data).unwrap());
    let plain = get_link(&renderer.render_plain(&message.template, &data).unwrap());

    assert_eq!(html, plain);
    assert_eq!(plain, "http://127.0.0.1:8000/activate?token=token123");
}
