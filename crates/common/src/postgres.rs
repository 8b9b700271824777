mod client;
mod config;
mod migrations;
mod parcel_repository;
mod pricing_tier_repository;

pub use client::*;
pub use config::*;
pub use migrations::*;
pub use parcel_repository::*;
pub use pricing_tier_repository::*;
