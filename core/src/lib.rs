//! Accessory attribute database for a HomeKit Accessory Protocol server.
//!
//! The crate holds the Accessory → Service → Characteristic object graph,
//! renders it to the HAP JSON grammar, applies remote partial updates and
//! fans change notifications out to the connected controller sessions.
//! Network transport, pairing and hardware are left to the host through the
//! traits in [`transport`] and [`storage`].

#[macro_use]
extern crate num_derive;

/// Characteristic and service type definitions
pub mod catalog;
pub mod config;
pub mod constants;
pub mod data_model;
pub mod encoder;
pub mod end_device;
mod error;
pub mod interaction_model;
pub mod session_context;
pub mod storage;
pub mod transport;
pub mod util;

pub use error::{Error, Result};
