pub mod dispatcher;
pub mod facade;
pub mod token;

pub use dispatcher::Dispatcher;
pub use facade::{DataClient, Table};
pub use token::{StaticToken, TokenProvider};
