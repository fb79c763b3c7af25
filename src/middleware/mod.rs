pub mod auth;
pub mod ip_filter;
pub mod request_logger;

pub use auth::admin_session_auth;
pub use ip_filter::NotifyAllowlistLayer;
pub use request_logger::request_logger_middleware;
