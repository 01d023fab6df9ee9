use actix_web::{web, HttpResponse};
use actix_web_flash_messages::FlashMessage;
use sqlx::PgPool;

use crate::{
    authentication::UserId,
    context::AppContext,
    purchase::dispatch_purchase,
    repository::{get_plan, get_user, subscribe_user_to_plan},
    session_state::TypedSession,
    util::{e500, see_other},
};

#[derive(serde::Deserialize)]
pub struct PlanQuery {
    id: Option<String>,
}

/// 购买计划：发票与使用手册在后台发送，请求立即返回
#[tracing::instrument(
    name = "Subscribe to a plan",
    skip_all,
    fields(user_id = ?*user_id, plan_id = tracing::field::Empty)
)]
pub async fn subscribe_to_plan(
    parameters: web::Query<PlanQuery>,
    pool: web::Data<PgPool>,
    context: web::Data<AppContext>,
    session: TypedSession,
    user_id: web::ReqData<UserId>,
) -> Result<HttpResponse, actix_web::Error> {
    let user_id = user_id.into_inner();
    let Some(plan_id) = parameters.id.as_deref().and_then(|id| id.parse::<i32>().ok()) else {
        FlashMessage::error("Unknown plan.").send();
        return Ok(see_other("/members/plans"));
    };
    tracing::Span::current().record("plan_id", plan_id);

    let Some(plan) = get_plan(plan_id, &pool).await.map_err(e500)? else {
        FlashMessage::error("Unknown plan.").send();
        return Ok(see_other("/members/plans"));
    };
    let Some(user) = get_user(*user_id, &pool).await.map_err(e500)? else {
        session.logout();
        FlashMessage::warning("Log in first!").send();
        return Ok(see_other("/login"));
    };

    dispatch_purchase(&context, &user, &plan);

    subscribe_user_to_plan(user.id, plan.id, &pool)
        .await
        .map_err(e500)?;
    if let Some(user) = get_user(user.id, &pool).await.map_err(e500)? {
        session.insert_user(&user).map_err(e500)?;
    }

    FlashMessage::success(format!("You are now subscribed to {}!", plan.plan_name)).send();
    Ok(see_other("/members/plans"))
}
