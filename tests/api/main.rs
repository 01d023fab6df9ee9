mod helper;
mod mail_dispatch;
mod purchase;
mod routes;
mod shutdown;
