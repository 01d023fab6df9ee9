use actix_web_flash_messages::FlashMessage;

use crate::{session_state::TypedSession, util::see_other};

pub async fn logout(session: TypedSession) -> Result<actix_web::HttpResponse, actix_web::Error> {
    session.logout();
    FlashMessage::info("You have been logged out.").send();
    Ok(see_other("/login"))
}
