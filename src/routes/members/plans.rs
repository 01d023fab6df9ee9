use std::fmt::Write;

use actix_web::{http::header::ContentType, web, HttpResponse};
use actix_web_flash_messages::IncomingFlashMessages;
use sqlx::PgPool;

use crate::{
    domain::Plan,
    repository::list_plans,
    session_state::TypedSession,
    util::{e500, format_flash_messages},
};

pub async fn plans(
    pool: web::Data<PgPool>,
    session: TypedSession,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, actix_web::Error> {
    let plans = list_plans(&pool).await.map_err(e500)?;
    let current = session
        .get_user()
        .map_err(e500)?
        .and_then(|user| user.plan)
        .map(|plan| plan.id);

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(format!(
            include_str!("plans.html"),
            format_flash_messages(flash_messages),
            plan_rows(&plans, current),
        )))
}

fn plan_rows(plans: &[Plan], current: Option<i32>) -> String {
    let mut html = String::new();
    for plan in plans {
        let action = if Some(plan.id) == current {
            "<i>Current plan</i>".to_string()
        } else {
            format!(r#"<a href="/members/subscribe?id={}">Subscribe</a>"#, plan.id)
        };
        // 写入String不会失败
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{action}</td></tr>",
            plan.plan_name,
            plan.amount_formatted()
        );
    }

    html
}
