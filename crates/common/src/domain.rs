mod clock;
mod deadline;
mod notification;
mod otp;
mod parcel;
mod parcel_history;
mod parcel_status;
mod pricing_tier;
mod result;
mod tamper_alert;

pub use clock::*;
pub use deadline::*;
pub use notification::*;
pub use otp::*;
pub use parcel::*;
pub use parcel_history::*;
pub use parcel_status::*;
pub use pricing_tier::*;
pub use result::*;
pub use tamper_alert::*;
