mod dto;
pub mod parcel_handler;
pub mod pricing_handler;
mod router;
pub mod tamper_handler;

pub use dto::*;
pub use router::*;
