pub mod audit_log;
pub mod session;
pub mod token_refresh;
pub mod token_store;

pub use audit_log::SessionAudit;
pub use session::SessionStore;
pub use token_refresh::TokenRefresher;
pub use token_store::TokenStore;
