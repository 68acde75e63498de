//! Common traits and helpers used across the hostecho library
//!
//! This module contains the server lifecycle trait and the helpers the
//! test suites use to stand up a real server on an ephemeral port.

pub mod test_utils;
pub mod traits;

pub use test_utils::{TestServer, spawn_test_server};
pub use traits::EchoServerTrait;
