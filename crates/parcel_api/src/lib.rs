pub mod domain;
pub mod http;
pub mod parcel_api;

pub use domain::*;
pub use http::*;
pub use parcel_api::*;
