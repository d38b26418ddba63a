use serde::Serialize;
use sqlx::FromRow;
use time::PrimitiveDateTime;

time::serde::format_description!(
    naive_utc,
    PrimitiveDateTime,
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]"
);

/// Temperature reading. `timestamp` carries no offset but is always UTC.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Reading {
    pub id: i32,
    pub value: f64,
    #[serde(with = "naive_utc")]
    pub timestamp: PrimitiveDateTime,
}
