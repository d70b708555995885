mod handler;
pub mod model;

pub use handler::{broadcast, register_token, send, subscribe, unsubscribe};
