//! Controller-owned playout list, the client handles that share it, and the
//! adapter bridging those handles to wire messages.

pub mod adapter;
pub mod bifrost;
mod client;
mod controller;
pub mod list;

pub use adapter::{Adapter, AdapterExit, AdapterIo};
pub use client::{Client, ShutdownHandle};
pub use controller::{
    Controller, ControllerConfig, DEFAULT_CLIENT_BUFFER, DEFAULT_QUEUE_CAPACITY,
};
pub use list::{List, SelectError};
