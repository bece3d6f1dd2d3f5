pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::Dispatcher;
pub use config::AppConfig;
pub use domain::{Account, AccountError, AccountId};
pub use infrastructure::{
    AccountLedger, AccountStore, JsonFileStore, MemoryStore, Request, Response, Server,
    ServerError, ServerHandle, ServerMetrics,
};
