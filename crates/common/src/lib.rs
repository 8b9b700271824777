pub mod auth;
pub mod domain;
pub mod garde;
pub mod http;
pub mod postgres;
pub mod telemetry;
pub mod webhook;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
