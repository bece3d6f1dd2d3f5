pub mod connection;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod store;

pub use ledger::AccountLedger;
pub use metrics::ServerMetrics;
pub use protocol::{ProtocolError, Request, Response};
pub use server::{Server, ServerError, ServerHandle};
pub use store::{AccountStore, JsonFileStore, MemoryStore};
