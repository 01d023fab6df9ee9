use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::{Cookie, Key},
    dev::{Service, ServiceResponse},
    http::{header::LOCATION, StatusCode},
    test, web, App, HttpResponse,
};
use actix_web_flash_messages::{storage::CookieMessageStore, FlashMessagesFramework};
use membership::session_state::TypedSession;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use uuid::Uuid;

use crate::helper::spawn_app;

/// 不依赖数据库与Redis的路由，会话保存在cookie中
macro_rules! init_app {
    () => {{
        let key = Key::generate();
        let message_store = CookieMessageStore::builder(key.clone()).build();
        test::init_service(
            App::new()
                .wrap(FlashMessagesFramework::builder(message_store).build())
                .wrap(SessionMiddleware::new(CookieSessionStore::default(), key))
                .configure(membership::routes::configure),
        )
        .await
    }};
}

/// 带应用上下文与惰性连接池的路由，`/session`写入一个已登录的用户id
macro_rules! init_member_app {
    ($context:expr) => {{
        let key = Key::generate();
        let message_store = CookieMessageStore::builder(key.clone()).build();
        // 从不建立连接，请求一旦访问数据库就会失败
        let pool = PgPoolOptions::new()
            .connect_lazy_with(PgConnectOptions::new().host("127.0.0.1").port(1));
        test::init_service(
            App::new()
                .wrap(FlashMessagesFramework::builder(message_store).build())
                .wrap(SessionMiddleware::new(CookieSessionStore::default(), key))
                .configure(membership::routes::configure)
                .route("/session", web::get().to(start_session))
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new($context)),
        )
        .await
    }};
}

async fn start_session(session: TypedSession) -> HttpResponse {
    session.insert_user_id(Uuid::new_v4()).unwrap();
    HttpResponse::Ok().finish()
}

fn cookie_named<B>(res: &ServiceResponse<B>, name: &str) -> Option<Cookie<'static>> {
    res.response()
        .cookies()
        .find(|c| c.name() == name)
        .map(|c| c.into_owned())
}

fn status_and_location<B>(
    res: Result<ServiceResponse<B>, actix_web::Error>,
) -> (StatusCode, Option<String>) {
    let location = |headers: &actix_web::http::header::HeaderMap| {
        headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    match res {
        Ok(res) => (res.status(), location(res.headers())),
        Err(e) => {
            let res = e.error_response();
            (res.status(), location(res.headers()))
        }
    }
}

#[actix_web::test]
async fn health_check_works() {
    let app = init_app!();

    let req = test::TestRequest::get().uri("/health_check").to_request();
    let res = test::call_service(&app, req).await;

    assert!(res.status().is_success());
}

#[actix_web::test]
async fn login_form_is_rendered() {
    let app = init_app!();

    let res = test::call_service(&app, test::TestRequest::get().uri("/login").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
    assert!(body.contains(r#"<form action="/login" method="post">"#));
    assert!(body.contains(r#"name="email""#));
}

#[actix_web::test]
async fn anonymous_home_page_links_to_login() {
    let app = init_app!();

    let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body = String::from_utf8(test::read_body(res).await.to_vec()).unwrap();
    assert!(body.contains(r#"href="/login""#));
}

#[actix_web::test]
async fn members_area_requires_login() {
    let app = init_app!();

    for uri in ["/members/plans", "/members/subscribe?id=1"] {
        let res = app.call(test::TestRequest::get().uri(uri).to_request()).await;
        let (status, location) = status_and_location(res);

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/login"));
    }
}

#[actix_web::test]
async fn subscribe_with_bad_plan_id_redirects_without_fan_out() {
    let app = spawn_app().await;
    let service = init_member_app!(app.context.clone());

    let req = test::TestRequest::get().uri("/session").to_request();
    let res = test::call_service(&service, req).await;
    let session = cookie_named(&res, "id").expect("session cookie should be set.");

    for uri in ["/members/subscribe", "/members/subscribe?id=abc", "/members/subscribe?id="] {
        let req = test::TestRequest::get()
            .uri(uri)
            .cookie(session.clone())
            .to_request();
        let res = test::call_service(&service, req).await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(
            res.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("/members/plans"),
            "{uri}"
        );
        assert!(cookie_named(&res, "_flash").is_some(), "{uri}");
        assert_eq!(app.context.tracker.in_flight(), 0, "{uri}");
    }

    assert!(app.sink.messages().is_empty());
}

#[actix_web::test]
async fn anonymous_subscribe_never_dispatches() {
    let app = spawn_app().await;
    let service = init_member_app!(app.context.clone());

    let res = service
        .call(test::TestRequest::get().uri("/members/subscribe?id=1").to_request())
        .await;
    let (status, location) = status_and_location(res);

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/login"));
    assert_eq!(app.context.tracker.in_flight(), 0);
}
