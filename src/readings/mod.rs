pub mod repo;
pub mod repo_types;

use time::{OffsetDateTime, PrimitiveDateTime};

/// Current UTC instant with the offset dropped, as stored in `readings.timestamp`.
pub fn utc_now_naive() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}
