pub mod app;
pub mod domain;
pub mod infra;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{DataClient, Dispatcher, StaticToken, Table, TokenProvider};
pub use domain::{DataAccessError, Envelope, ErrorKind, Registry, ResultEnvelope};
pub use infra::bus::{MemoryBus, MessageBus, NatsBus};
pub use infra::config::DispatcherConfig;
pub use transport::client::{DirectTransport, HttpTransport, Transport};
