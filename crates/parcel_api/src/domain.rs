mod otp_verifier;
mod parcel_ledger;
mod parcel_lifecycle_service;
mod pricing_service;
mod tamper_workflow;
mod transition;

pub use otp_verifier::*;
pub use parcel_ledger::*;
pub use parcel_lifecycle_service::*;
pub use pricing_service::*;
pub use tamper_workflow::*;
pub use transition::*;

#[cfg(test)]
mod test_support;
