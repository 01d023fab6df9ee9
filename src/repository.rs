use anyhow::Context;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::{NewUser, Plan, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    user_active: bool,
    is_admin: bool,
    plan_id: Option<i32>,
    plan_name: Option<String>,
    plan_amount: Option<i32>,
    plan_created_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let plan = match (row.plan_id, row.plan_name, row.plan_amount, row.plan_created_at) {
            (Some(id), Some(plan_name), Some(plan_amount), Some(created_at)) => Some(Plan {
                id,
                plan_name,
                plan_amount,
                created_at,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            is_active: row.user_active,
            is_admin: row.is_admin,
            plan,
        }
    }
}

const USER_SELECT: &str = r#"
    SELECT
        u.id, u.email, u.first_name, u.last_name, u.user_active, u.is_admin,
        p.id AS plan_id, p.plan_name, p.plan_amount, p.created_at AS plan_created_at
    FROM users u
    LEFT JOIN user_plans up ON up.user_id = u.id
    LEFT JOIN plans p ON p.id = up.plan_id
"#;

#[tracing::instrument(skip(pool))]
pub async fn get_user(user_id: Uuid, pool: &PgPool) -> Result<Option<User>, anyhow::Error> {
    let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("failed to perform a query to retrieve a user.")?;

    Ok(row.map(User::from))
}

#[tracing::instrument(skip(pool))]
pub async fn get_user_by_email(email: &str, pool: &PgPool) -> Result<Option<User>, anyhow::Error> {
    let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("failed to perform a query to retrieve a user by email.")?;

    Ok(row.map(User::from))
}

#[tracing::instrument(skip_all)]
pub async fn insert_user(
    executor: &mut PgConnection,
    new_user: &NewUser,
    password_hash: &SecretString,
) -> Result<Uuid, sqlx::Error> {
    let user_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, first_name, last_name, password_hash, user_active)
        VALUES ($1, $2, $3, $4, $5, FALSE)
        "#,
    )
    .bind(user_id)
    .bind(new_user.email.as_ref())
    .bind(new_user.first_name.as_ref())
    .bind(new_user.last_name.as_ref())
    .bind(password_hash.expose_secret())
    .execute(executor)
    .await?;

    Ok(user_id)
}

#[tracing::instrument(skip_all)]
pub async fn store_activation_token(
    executor: &mut PgConnection,
    user_id: Uuid,
    token: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO activation_tokens (token, user_id) VALUES ($1, $2)")
        .bind(token)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// 激活令牌对应的用户，令牌只能使用一次
#[tracing::instrument(skip_all)]
pub async fn activate_user(pool: &PgPool, token: &str) -> Result<Option<Uuid>, sqlx::Error> {
    let mut transaction = pool.begin().await?;
    let user_id: Option<Uuid> =
        sqlx::query_scalar("DELETE FROM activation_tokens WHERE token = $1 RETURNING user_id")
            .bind(token)
            .fetch_optional(&mut *transaction)
            .await?;

    if let Some(user_id) = user_id {
        sqlx::query("UPDATE users SET user_active = TRUE, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *transaction)
            .await?;
    }
    transaction.commit().await?;

    Ok(user_id)
}

#[tracing::instrument(skip(pool))]
pub async fn get_plan(plan_id: i32, pool: &PgPool) -> Result<Option<Plan>, sqlx::Error> {
    sqlx::query_as::<_, Plan>(
        "SELECT id, plan_name, plan_amount, created_at FROM plans WHERE id = $1",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await
}

#[tracing::instrument(skip(pool))]
pub async fn list_plans(pool: &PgPool) -> Result<Vec<Plan>, sqlx::Error> {
    sqlx::query_as::<_, Plan>("SELECT id, plan_name, plan_amount, created_at FROM plans ORDER BY id")
        .fetch_all(pool)
        .await
}

/// 用户同一时间只订阅一个计划
#[tracing::instrument(skip(pool))]
pub async fn subscribe_user_to_plan(
    user_id: Uuid,
    plan_id: i32,
    pool: &PgPool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO user_plans (user_id, plan_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET plan_id = EXCLUDED.plan_id, updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(plan_id)
    .execute(pool)
    .await?;

    Ok(())
}
