//! Pure order arithmetic: pickup time, expected totals and the price integrity check.
use chrono::{Duration, Local, NaiveDateTime};
use rand::Rng;

use crate::model::{OrderLine, OrderRequest};

/// minutes between now and the requested pickup
pub const PICKUP_DELAY_MINUTES: i64 = 30;
/// inclusive quantity range of a random order line
pub const QUANTITY_RANGE: std::ops::RangeInclusive<u32> = 1..=3;

/// pickup time for an order placed at `now`, formatted without offset (`YYYY-MM-DDTHH:MM:SS`)
pub fn pickup_time_from(now: NaiveDateTime) -> String {
    (now + Duration::minutes(PICKUP_DELAY_MINUTES))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// pickup time for an order placed now, in local time
pub fn pickup_time() -> String {
    pickup_time_from(Local::now().naive_local())
}

/// random quantity for an order line
pub fn random_quantity<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(QUANTITY_RANGE)
}

/// what the client expects the server to charge
pub fn expected_total(unit_price: f64, quantity: u32) -> f64 {
    unit_price * f64::from(quantity)
}

/// true when the totals agree, or when one of them can't be compared (non positive)
pub fn price_integrity_ok(expected: f64, reported: f64) -> bool {
    expected <= 0.0 || reported <= 0.0 || expected == reported
}

/// single line order, with a freshly computed pickup time
pub fn single_item_order(store_id: &str, menu_id: &str, quantity: u32, note: String) -> OrderRequest {
    OrderRequest {
        store_id: store_id.to_string(),
        order_items: vec![OrderLine {
            menu_id: menu_id.to_string(),
            quantity,
            options: Vec::new(),
        }],
        pickup_time: pickup_time(),
        need_disposables: false,
        request: note,
    }
}
