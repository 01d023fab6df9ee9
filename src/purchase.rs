use std::path::PathBuf;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::{
    context::AppContext,
    domain::{Plan, User},
    error_log::ErrorSink,
    invoice::compute_invoice,
    mailer::{Message, MessageData},
    manual::generate_manual,
    telemetry::spawn_blocking_with_tracing,
    tracker::InFlight,
};

pub const INVOICE_TEMPLATE: &str = "invoice";
pub const MANUAL_TEMPLATE: &str = "manual";
pub const MANUAL_ATTACHMENT: &str = "Manual.pdf";
const FAN_OUT_ORIGIN: &str = "purchase fan-out";

/// 购买后的副作用扇出
///
/// 同步返回，不等待邮件或PDF完成；两个任务各持有一个计数令牌，
/// 由本次购买专属的任务集合托管，panic同样上报到错误日志。
#[tracing::instrument(name = "purchase fan-out", skip_all, fields(user_id = %user.id, plan_id = plan.id))]
pub fn dispatch_purchase(context: &AppContext, user: &User, plan: &Plan) {
    let mut jobs = JoinSet::new();

    let in_flight = context.tracker.begin();
    jobs.spawn_on(
        send_invoice(context.clone(), user.clone(), plan.clone(), in_flight)
            .instrument(tracing::Span::current()),
        &context.runtime,
    );

    let in_flight = context.tracker.begin();
    jobs.spawn_on(
        send_manual(context.clone(), user.clone(), plan.clone(), in_flight)
            .instrument(tracing::Span::current()),
        &context.runtime,
    );

    // 监督任务同样计数，panic上报之前不会排空
    let in_flight = context.tracker.begin();
    context
        .runtime
        .spawn(supervise(jobs, context.errors.clone(), in_flight));
}

async fn supervise(mut jobs: JoinSet<()>, errors: ErrorSink, _in_flight: InFlight) {
    while let Some(res) = jobs.join_next().await {
        if let Err(e) = res {
            errors.report(FAN_OUT_ORIGIN, e);
        }
    }
}

async fn send_invoice(context: AppContext, user: User, plan: Plan, _in_flight: InFlight) {
    if let Err(e) = try_send_invoice(&context, &user, &plan).await {
        context.errors.report("invoice", e);
    }
}

#[tracing::instrument(name = "send invoice", skip_all)]
async fn try_send_invoice(context: &AppContext, user: &User, plan: &Plan) -> anyhow::Result<()> {
    let invoice = compute_invoice(user, plan).context("failed to compute invoice.")?;
    let data = MessageData::record(&invoice).context("failed to serialize invoice.")?;

    let message = Message::new(&user.email, "Your invoice")
        .with_data(data)
        .with_template(INVOICE_TEMPLATE);
    context.mailer.send(message).await?;

    Ok(())
}

async fn send_manual(context: AppContext, user: User, plan: Plan, _in_flight: InFlight) {
    if let Err(e) = try_send_manual(&context, user, plan).await {
        context.errors.report("manual", e);
    }
}

#[tracing::instrument(name = "send manual", skip_all)]
async fn try_send_manual(context: &AppContext, user: User, plan: Plan) -> anyhow::Result<()> {
    let template = PathBuf::from(&context.manual.template_path);
    let output = context.manual.manual_path(user.id);

    // 生成失败时不发送邮件
    let path = output.clone();
    let (user, plan) = spawn_blocking_with_tracing(move || {
        generate_manual(&template, &path, &user, &plan).map(|_| (user, plan))
    })
    .await
    .context("failed to spawn blocking task.")?
    .context("failed to generate manual.")?;

    let message = Message::new(&user.email, "Your manual")
        .with_data(format!(
            "Hello {}, thank you for choosing the {}.",
            user.first_name, plan.plan_name
        ))
        .with_template(MANUAL_TEMPLATE)
        .with_attachment(MANUAL_ATTACHMENT, output);
    context.mailer.send(message).await?;

    Ok(())
}
