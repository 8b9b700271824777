use chrono::{DateTime, Duration, TimeZone, Utc};
use common::domain::{Parcel, ParcelStatus};
use rust_decimal_macros::dec;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

pub fn parcel(tracking_code: &str, status: ParcelStatus) -> Parcel {
    Parcel {
        id: format!("id-{}", tracking_code),
        tracking_code: tracking_code.to_string(),
        sender_id: "sender-1".to_string(),
        sender_email: "sender@example.com".to_string(),
        recipient_email: "recipient@example.com".to_string(),
        description: None,
        weight_kg: dec!(1.5),
        pickup_location: "Depot A".to_string(),
        delivery_location: "12 Harbour Road".to_string(),
        expected_pickup_at: base_time(),
        expected_delivery_at: base_time() + Duration::days(2),
        actual_pickup_at: None,
        actual_delivery_at: None,
        status,
        otp: None,
        pricing_tier_id: None,
        shipping_cost: None,
        version: 0,
        created_at: base_time(),
        updated_at: base_time(),
    }
}
