use actix_web::{web, HttpResponse};
use actix_web_flash_messages::FlashMessage;
use sqlx::PgPool;

use crate::{
    repository::activate_user,
    util::{e500, see_other},
};

#[derive(serde::Deserialize)]
pub struct ActivationQuery {
    token: String,
}

#[tracing::instrument(name = "Activate an account", skip_all)]
pub async fn activate(
    parameters: web::Query<ActivationQuery>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, actix_web::Error> {
    match activate_user(&pool, &parameters.token).await.map_err(e500)? {
        Some(user_id) => {
            tracing::info!(%user_id, "account activated.");
            FlashMessage::success("Account activated, you can now log in.").send();
        }
        None => {
            tracing::warn!("unknown activation token.");
            FlashMessage::error("Invalid or expired activation link.").send();
        }
    }

    Ok(see_other("/login"))
}
