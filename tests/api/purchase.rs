use membership::{
    domain::Plan,
    purchase::{dispatch_purchase, MANUAL_ATTACHMENT},
};

use crate::helper::{spawn_app, test_plan, test_user};

#[tokio::test]
async fn purchase_sends_invoice_and_manual() {
    let app = spawn_app().await;
    let user = test_user();

    dispatch_purchase(&app.context, &user, &test_plan());
    let messages = app.sink.wait_for(2).await;

    assert_eq!(messages.len(), 2);
    let invoice = messages
        .iter()
        .find(|m| m.contains("Subject: Your invoice"))
        .expect("invoice email was not sent.");
    assert!(invoice.contains("Bronze Plan"));

    let manual = messages
        .iter()
        .find(|m| m.contains("Subject: Your manual"))
        .expect("manual email was not sent.");
    assert!(manual.contains(MANUAL_ATTACHMENT));
    assert!(manual.contains("application/pdf"));
    assert!(app
        .output
        .path()
        .join(format!("{}_manual.pdf", user.id))
        .exists());

    app.coordinator.shutdown(app.context).await;
}

#[tokio::test]
async fn shutdown_waits_for_purchase_side_effects() {
    let app = spawn_app().await;
    let tracker = app.context.tracker.clone();

    dispatch_purchase(&app.context, &test_user(), &test_plan());
    assert!(tracker.in_flight() >= 2);

    app.coordinator.shutdown(app.context).await;

    assert_eq!(tracker.in_flight(), 0);
    assert_eq!(app.sink.messages().len(), 2);
}

#[tokio::test]
async fn invalid_plan_only_loses_the_invoice() {
    let app = spawn_app().await;
    let plan = Plan {
        plan_amount: -100,
        ..test_plan()
    };

    dispatch_purchase(&app.context, &test_user(), &plan);
    app.coordinator.shutdown(app.context).await;

    let messages = app.sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Subject: Your manual"));
}
