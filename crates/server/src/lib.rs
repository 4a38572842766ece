pub mod config;
pub mod netsrv;

pub use netsrv::{serve, Server, ServerError, ServerOptions, ShutdownReason, ShutdownReport};
