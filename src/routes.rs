mod activate;
mod login;
mod logout;
mod members;
mod register;

pub use activate::*;
pub use login::*;
pub use logout::*;
pub use members::*;
pub use register::*;

use actix_web::{http::header::ContentType, middleware::from_fn, web, HttpResponse, Responder};
use actix_web_flash_messages::IncomingFlashMessages;

use crate::{
    authentication::reject_anonymous_user,
    domain::User,
    session_state::TypedSession,
    util::{e500, format_flash_messages},
};

/// 注册全部路由，`/members`下的页面需要登录
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(home))
        .route("/health_check", web::get().to(health_check))
        .route("/login", web::get().to(login_form))
        .route("/login", web::post().to(login))
        .route("/logout", web::get().to(logout))
        .route("/register", web::get().to(register_form))
        .route("/register", web::post().to(register))
        .route("/activate", web::get().to(activate))
        .service(
            web::scope("/members")
                .wrap(from_fn(reject_anonymous_user))
                .route("/plans", web::get().to(plans))
                .route("/subscribe", web::get().to(subscribe_to_plan)),
        );
}

pub async fn home(
    session: TypedSession,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, actix_web::Error> {
    let user = session.get_user().map_err(e500)?;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(format!(
            include_str!("routes/home.html"),
            format_flash_messages(flash_messages),
            greeting(user.as_ref()),
        )))
}

fn greeting(user: Option<&User>) -> String {
    match user {
        None => r#"<p><a href="/login">Log in</a> or <a href="/register">register</a>.</p>"#.into(),
        Some(user) => {
            let plan = match &user.plan {
                Some(plan) => format!(
                    "You are subscribed to <b>{}</b> ({}/month).",
                    plan.plan_name,
                    plan.amount_formatted()
                ),
                None => "You have no plan yet.".into(),
            };
            format!(
                r#"<p>Welcome back, {}. {plan}</p><p><a href="/members/plans">Plans</a> | <a href="/logout">Log out</a></p>"#,
                user.first_name
            )
        }
    }
}

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok()
}
