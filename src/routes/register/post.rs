use std::fmt::Debug;

use actix_web::{body::BoxBody, web, HttpResponse, ResponseError};
use actix_web_flash_messages::FlashMessage;
use anyhow::Context;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use secrecy::SecretString;
use sqlx::PgPool;

use crate::{
    authentication::hash_password,
    context::AppContext,
    domain::NewUser,
    mailer::{Message, MessageData},
    repository::{insert_user, store_activation_token},
    util::{error_chain_fmt, see_other},
};

pub const ACTIVATION_TEMPLATE: &str = "activation";
const ACTIVATION_TOKEN_LENGTH: usize = 25;

#[derive(serde::Deserialize)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: SecretString,
    pub verify_password: SecretString,
}

#[derive(serde::Serialize)]
struct ActivationLink<'a> {
    name: &'a str,
    link: String,
}

#[tracing::instrument(
    name = "Register a new user",
    skip_all,
    fields(email = %form.email, user_id = tracing::field::Empty)
)]
pub async fn register(
    form: web::Form<RegisterForm>,
    pool: web::Data<PgPool>,
    context: web::Data<AppContext>,
) -> Result<HttpResponse, RegisterError> {
    let new_user: NewUser = form.0.try_into().map_err(RegisterError::ValidationError)?;
    let password_hash = hash_password(new_user.password.clone()).await?;

    let mut transaction = pool
        .begin()
        .await
        .context("failed to acquire a Postgres connection from the pool.")?;
    let user_id = insert_user(&mut transaction, &new_user, &password_hash)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RegisterError::EmailTaken,
            e => RegisterError::UnexpectedError(
                anyhow::Error::new(e).context("failed to insert a new user."),
            ),
        })?;
    tracing::Span::current().record("user_id", tracing::field::display(&user_id));

    let token = generate_activation_token();
    store_activation_token(&mut transaction, user_id, &token)
        .await
        .context("failed to store the activation token.")?;
    transaction
        .commit()
        .await
        .context("failed to commit the transaction to register a new user.")?;

    let message = activation_message(
        &context.base_url,
        new_user.first_name.as_ref(),
        new_user.email.as_ref(),
        &token,
    )
    .context("failed to build the activation email.")?;
    context
        .mailer
        .send(message)
        .await
        .context("failed to queue the activation email.")?;

    FlashMessage::success("Thanks for registering! Check your email to activate your account.")
        .send();
    Ok(see_other("/login"))
}

/// 激活邮件，链接指向`{base_url}/activate?token=...`
pub fn activation_message(
    base_url: &str,
    first_name: &str,
    email: &str,
    token: &str,
) -> Result<Message, serde_json::Error> {
    let link = format!("{}/activate?token={token}", base_url.trim_end_matches('/'));
    let data = MessageData::record(&ActivationLink {
        name: first_name,
        link,
    })?;

    Ok(Message::new(email, "Activate your account")
        .with_template(ACTIVATION_TEMPLATE)
        .with_data(data))
}

fn generate_activation_token() -> String {
    let mut rng = thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(ACTIVATION_TOKEN_LENGTH)
        .collect()
}

#[derive(thiserror::Error)]
pub enum RegisterError {
    #[error("{0}")]
    ValidationError(String),
    #[error("An account with this email already exists.")]
    EmailTaken,
    #[error("Something went wrong.")]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for RegisterError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        FlashMessage::error(self.to_string()).send();
        see_other("/register")
    }
}
