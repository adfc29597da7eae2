pub const DEFAULT_ALLOCATION_INTERVAL_SECS: u64 = 10;

pub const DEFAULT_SEARCH_RADIUS_STEP_KM: f64 = 2.0;
pub const DEFAULT_MAX_SEARCH_RADIUS_KM: f64 = 20.0;

pub const DEFAULT_RECENT_PAIRING_COOLDOWN_MINUTES: i64 = 30;
pub const DEFAULT_MAX_CANCELLED_RIDES: i32 = 2;

pub const DEFAULT_BASE_FARE: f64 = 20.0;
pub const DEFAULT_RATE_PER_KM: f64 = 10.0;
pub const DEFAULT_RATE_PER_MINUTE: f64 = 2.0;
pub const DEFAULT_WAITING_CHARGE_PER_MINUTE: f64 = 1.0;
