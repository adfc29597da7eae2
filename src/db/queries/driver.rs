//! Driver database queries

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::Result;
use crate::types::{Coordinates, Driver, NewDriver};

#[derive(Debug, FromRow)]
struct DriverRow {
    id: i64,
    name: String,
    latitude: f64,
    longitude: f64,
    available: bool,
    active_ride_id: Option<i64>,
    cancelled_rides_count: i32,
    last_ride_ended_at: Option<DateTime<Utc>>,
}

impl From<DriverRow> for Driver {
    fn from(row: DriverRow) -> Self {
        Driver {
            id: row.id,
            name: row.name,
            location: Coordinates::new(row.latitude, row.longitude),
            available: row.available,
            active_ride_id: row.active_ride_id,
            cancelled_rides_count: row.cancelled_rides_count,
            last_ride_ended_at: row.last_ride_ended_at,
        }
    }
}

/// List available drivers
pub async fn list_available_drivers(pool: &PgPool) -> Result<Vec<Driver>> {
    let rows = sqlx::query_as::<_, DriverRow>(
        r#"
        SELECT id, name, latitude, longitude, available, active_ride_id,
               cancelled_rides_count, last_ride_ended_at
        FROM drivers
        WHERE available = true
        ORDER BY id ASC
        "#
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Driver::from).collect())
}

/// List all drivers
pub async fn list_drivers(pool: &PgPool) -> Result<Vec<Driver>> {
    let rows = sqlx::query_as::<_, DriverRow>(
        r#"
        SELECT id, name, latitude, longitude, available, active_ride_id,
               cancelled_rides_count, last_ride_ended_at
        FROM drivers
        ORDER BY id ASC
        "#
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Driver::from).collect())
}

/// Create a new available driver
pub async fn insert_driver(pool: &PgPool, driver: NewDriver) -> Result<Driver> {
    let row = sqlx::query_as::<_, DriverRow>(
        r#"
        INSERT INTO drivers (name, latitude, longitude)
        VALUES ($1, $2, $3)
        RETURNING id, name, latitude, longitude, available, active_ride_id,
                  cancelled_rides_count, last_ride_ended_at
        "#
    )
    .bind(&driver.name)
    .bind(driver.location.lat)
    .bind(driver.location.lng)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}
