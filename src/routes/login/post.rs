use std::fmt::Debug;

use actix_web::{body::BoxBody, web, HttpResponse, Responder, ResponseError};
use actix_web_flash_messages::FlashMessage;
use anyhow::Context;
use secrecy::SecretString;
use sqlx::PgPool;

use crate::{
    authentication::{validate_credential, AuthError, Credential},
    context::AppContext,
    mailer::{Message, MessageData},
    repository::{get_user, get_user_by_email},
    session_state::TypedSession,
    util::error_chain_fmt,
    util::see_other,
};

#[derive(serde::Deserialize)]
pub struct FormData {
    email: String,
    password: SecretString,
}

#[tracing::instrument(
    skip_all,
    fields(email=tracing::field::Empty, user_id=tracing::field::Empty)
)]
pub async fn login(
    form: web::Form<FormData>,
    pool: web::Data<PgPool>,
    context: web::Data<AppContext>,
    session: TypedSession,
) -> Result<impl Responder, LoginError> {
    let email = form.0.email.trim().to_lowercase();
    let credential = Credential {
        email: email.clone(),
        password: form.0.password,
    };
    tracing::Span::current().record("email", tracing::field::display(&email));

    let user_id = match validate_credential(credential, &pool).await {
        Ok(user_id) => user_id,
        Err(AuthError::InvalidCredential(e)) => {
            notify_failed_login(&email, &pool, &context).await;
            return Err(LoginError::AuthError(e));
        }
        Err(AuthError::Inactive) => return Err(LoginError::Inactive),
        Err(AuthError::UnexpectedError(e)) => return Err(LoginError::UnexpectedError(e)),
    };
    tracing::Span::current().record("user_id", tracing::field::display(&user_id));

    let user = get_user(user_id, &pool)
        .await?
        .context("authenticated user disappeared.")?;

    session.renew();
    session
        .insert_user_id(user_id)
        .map_err(|e| LoginError::UnexpectedError(e.into()))?;
    session
        .insert_user(&user)
        .map_err(|e| LoginError::UnexpectedError(e.into()))?;

    FlashMessage::success("Logged in successfully!").send();
    Ok(see_other("/"))
}

/// 账户存在但密码错误时通知用户，失败只记录不影响响应
async fn notify_failed_login(email: &str, pool: &PgPool, context: &AppContext) {
    let user = match get_user_by_email(email, pool).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(e) => {
            context.errors.report("login", e);
            return;
        }
    };

    let message = Message::new(user.email, "Failed login attempt!").with_data(MessageData::Text(
        "Someone tried to log in to your account with a wrong password.".into(),
    ));
    if let Err(e) = context.mailer.send(message).await {
        context.errors.report("login", e);
    }
}

#[derive(thiserror::Error)]
pub enum LoginError {
    #[error("Authentication failed.")]
    AuthError(#[source] anyhow::Error),
    #[error("Account is not activated, check your email.")]
    Inactive,
    #[error("Something went wrong.")]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for LoginError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        FlashMessage::error(self.to_string()).send();
        see_other("/login")
    }
}
