use actix_web::{http::header::LOCATION, HttpResponse};
use actix_web_flash_messages::{IncomingFlashMessages, Level};
use std::fmt::Write;

pub fn e500<T>(e: T) -> actix_web::Error
where
    T: std::fmt::Debug + std::fmt::Display + 'static,
{
    actix_web::error::ErrorInternalServerError(e)
}

pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((LOCATION, location))
        .finish()
}

pub fn format_flash_messages(flash_messages: IncomingFlashMessages) -> String {
    let mut html = String::new();
    for m in flash_messages.iter() {
        let class = match m.level() {
            Level::Error | Level::Warning => "alert-danger",
            _ => "alert-success",
        };
        writeln!(html, "<p class=\"{class}\"><i>{}</i></p>", m.content()).unwrap();
    }

    html
}

/// tracing error log
/// 递归调用底层错误信息，显示完整错误链
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    write!(f, "{e}")?;
    let mut current = e.source();
    while let Some(cause) = current {
        write!(f, " Caused by: {cause}")?;
        current = cause.source();
    }
    Ok(())
}
