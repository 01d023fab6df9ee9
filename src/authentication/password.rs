use anyhow::Context;
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use uuid::Uuid;

use crate::telemetry::spawn_blocking_with_tracing;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Invalid credential.")]
    InvalidCredential(#[source] anyhow::Error),
    #[error("Account is not activated.")]
    Inactive,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

pub struct Credential {
    pub email: String,
    pub password: SecretString,
}

struct StoredCredential {
    user_id: Uuid,
    password_hash: SecretString,
    active: bool,
}

#[tracing::instrument(name = "Validate credential", skip(credential, pool))]
/// 校验用户凭证
pub async fn validate_credential(credential: Credential, pool: &PgPool) -> Result<Uuid, AuthError> {
    let mut stored = None;
    // 用户不存在时仍然做一次哈希校验，避免时间侧信道
    let mut expected_password_hash = SecretString::from(
        "$argon2id$v=19$m=15000,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno",
    );

    if let Some(credential) = get_stored_credential(&credential.email, pool).await? {
        expected_password_hash = credential.password_hash.clone();
        stored = Some(credential);
    };

    spawn_blocking_with_tracing(move || {
        verify_password_hash(expected_password_hash, credential.password)
    })
    .await
    .context("failed to spawn blocking task.")??;

    let stored = stored
        .ok_or_else(|| AuthError::InvalidCredential(anyhow::anyhow!("Unknown email.")))?;
    if !stored.active {
        return Err(AuthError::Inactive);
    }

    Ok(stored.user_id)
}

#[tracing::instrument(name = "Get stored credential", skip(email, pool))]
async fn get_stored_credential(
    email: &str,
    pool: &PgPool,
) -> Result<Option<StoredCredential>, anyhow::Error> {
    let row: Option<(Uuid, String, bool)> = sqlx::query_as(
        r#"
        SELECT id, password_hash, user_active FROM users
        WHERE email = $1
        "#,
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await
    .context("failed to perform a query to retrieve stored credential.")?;

    Ok(row.map(|(user_id, password_hash, active)| StoredCredential {
        user_id,
        password_hash: SecretString::from(password_hash),
        active,
    }))
}

#[tracing::instrument(
    name = "Verify password hash",
    skip(expected_password_hash, password_candidate)
)]
fn verify_password_hash(
    expected_password_hash: SecretString,
    password_candidate: SecretString,
) -> Result<(), AuthError> {
    let expected_password_hash = PasswordHash::new(expected_password_hash.expose_secret())
        .context("failed to parse hash in PHC string format.")?;

    Argon2::default()
        .verify_password(
            password_candidate.expose_secret().as_bytes(),
            &expected_password_hash,
        )
        .context("Invalid password.")
        .map_err(AuthError::InvalidCredential)
}

/// 计算密码哈希，在阻塞线程池中执行
pub async fn hash_password(password: SecretString) -> Result<SecretString, anyhow::Error> {
    spawn_blocking_with_tracing(move || compute_password_hash(password))
        .await?
        .context("failed to hash password.")
}

fn compute_password_hash(password: SecretString) -> Result<SecretString, anyhow::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let password_hash = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(15000, 2, 1, None).map_err(|e| anyhow::anyhow!(e))?,
    )
    .hash_password(password.expose_secret().as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!(e))?
    .to_string();

    Ok(SecretString::from(password_hash))
}
