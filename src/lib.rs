pub mod authentication;
pub mod config;
pub mod context;
pub mod domain;
pub mod error_log;
pub mod invoice;
pub mod mailer;
pub mod manual;
pub mod purchase;
pub mod repository;
pub mod routes;
pub mod session_state;
pub mod shutdown;
pub mod startup;
pub mod telemetry;
pub mod tracker;
mod util;

pub use startup::run;
