use std::{fmt::Debug, ops::Deref};

use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    error::InternalError,
    middleware::Next,
    FromRequest, HttpMessage,
};
use actix_web_flash_messages::FlashMessage;
use uuid::Uuid;

use crate::{
    session_state::TypedSession,
    util::{e500, see_other},
};

#[derive(Clone, Copy)]
pub struct UserId(Uuid);

impl Debug for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Deref for UserId {
    type Target = Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// 会员区只对已登录用户开放
pub async fn reject_anonymous_user(
    mut req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let session = {
        let (http_request, payload) = req.parts_mut();
        TypedSession::from_request(http_request, payload)
    }
    .await?;

    match session.get_user_id().map_err(e500)? {
        Some(user_id) => {
            req.extensions_mut().insert(UserId(user_id));
            next.call(req).await
        }
        None => {
            FlashMessage::warning("Log in first!").send();
            let e = anyhow::anyhow!("the user has not logged in.");
            let res = see_other("/login");
            Err(InternalError::from_response(e, res).into())
        }
    }
}
