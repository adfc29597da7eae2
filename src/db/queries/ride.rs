//! Ride database queries

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::error::{DispatchError, Result};
use crate::types::{Assignment, Coordinates, FareResult, NewRide, Ride, RideStatus};

const RIDE_COLUMNS: &str = r#"
    id, rider_id, driver_id, pickup_lat, pickup_lng, dropoff_lat, dropoff_lng,
    status, created_at, assigned_at, driver_arrived_at, started_at, ended_at,
    distance_km, fare, base_fare, distance_fare, time_fare, waiting_fare,
    duration_minutes, waiting_minutes
"#;

#[derive(Debug, FromRow)]
struct RideRow {
    id: i64,
    rider_id: i64,
    driver_id: Option<i64>,
    pickup_lat: f64,
    pickup_lng: f64,
    dropoff_lat: f64,
    dropoff_lng: f64,
    status: RideStatus,
    created_at: DateTime<Utc>,
    assigned_at: Option<DateTime<Utc>>,
    driver_arrived_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    distance_km: Option<f64>,
    fare: Option<f64>,
    base_fare: Option<f64>,
    distance_fare: Option<f64>,
    time_fare: Option<f64>,
    waiting_fare: Option<f64>,
    duration_minutes: Option<f64>,
    waiting_minutes: Option<f64>,
}

impl From<RideRow> for Ride {
    fn from(row: RideRow) -> Self {
        let fare_breakdown = match (row.base_fare, row.distance_fare, row.time_fare, row.waiting_fare, row.fare) {
            (Some(base), Some(distance_fare), Some(time_fare), Some(waiting_fare), Some(total)) => {
                Some(FareResult {
                    base,
                    distance_fare,
                    time_fare,
                    waiting_fare,
                    total,
                    distance_km: row.distance_km.unwrap_or(0.0),
                    duration_minutes: row.duration_minutes.unwrap_or(0.0),
                    waiting_minutes: row.waiting_minutes.unwrap_or(0.0),
                })
            }
            _ => None,
        };

        Ride {
            id: row.id,
            rider_id: row.rider_id,
            driver_id: row.driver_id,
            pickup: Coordinates::new(row.pickup_lat, row.pickup_lng),
            dropoff: Coordinates::new(row.dropoff_lat, row.dropoff_lng),
            status: row.status,
            created_at: row.created_at,
            assigned_at: row.assigned_at,
            driver_arrived_at: row.driver_arrived_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
            distance_km: row.distance_km,
            fare: row.fare,
            fare_breakdown,
        }
    }
}

/// List pending rides, oldest first
pub async fn list_pending_rides(pool: &PgPool) -> Result<Vec<Ride>> {
    let sql = format!(
        "SELECT {} FROM rides WHERE status = 'pending' ORDER BY created_at ASC, id ASC",
        RIDE_COLUMNS
    );
    let rows = sqlx::query_as::<_, RideRow>(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(Ride::from).collect())
}

/// List all rides
pub async fn list_rides(pool: &PgPool) -> Result<Vec<Ride>> {
    let sql = format!("SELECT {} FROM rides ORDER BY id ASC", RIDE_COLUMNS);
    let rows = sqlx::query_as::<_, RideRow>(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(Ride::from).collect())
}

/// Get a single ride by ID
pub async fn get_ride(pool: &PgPool, ride_id: i64) -> Result<Option<Ride>> {
    let sql = format!("SELECT {} FROM rides WHERE id = $1", RIDE_COLUMNS);
    let row = sqlx::query_as::<_, RideRow>(&sql)
        .bind(ride_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Ride::from))
}

/// Most recent completed ride of this driver/rider pair that ended after `since`
pub async fn find_recent_completed_ride(
    pool: &PgPool,
    driver_id: i64,
    rider_id: i64,
    since: DateTime<Utc>,
) -> Result<Option<Ride>> {
    let sql = format!(
        r#"
        SELECT {} FROM rides
        WHERE driver_id = $1 AND rider_id = $2 AND status = 'completed' AND ended_at > $3
        ORDER BY ended_at DESC
        LIMIT 1
        "#,
        RIDE_COLUMNS
    );
    let row = sqlx::query_as::<_, RideRow>(&sql)
        .bind(driver_id)
        .bind(rider_id)
        .bind(since)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Ride::from))
}

/// Create a pending ride
pub async fn insert_ride(pool: &PgPool, ride: NewRide) -> Result<Ride> {
    let sql = format!(
        r#"
        INSERT INTO rides (rider_id, pickup_lat, pickup_lng, dropoff_lat, dropoff_lng, created_at, distance_km)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        RIDE_COLUMNS
    );
    let row = sqlx::query_as::<_, RideRow>(&sql)
        .bind(ride.rider_id)
        .bind(ride.pickup.lat)
        .bind(ride.pickup.lng)
        .bind(ride.dropoff.lat)
        .bind(ride.dropoff.lng)
        .bind(ride.created_at)
        .bind(ride.distance_km)
        .fetch_one(pool)
        .await?;
    Ok(row.into())
}

/// Commit every assignment of a pass in one transaction.
///
/// Each ride update only matches a still-pending ride and each driver update
/// only matches a still-available driver; the row lock taken by the driver
/// update serializes concurrent claims on the same driver. Any miss rolls the
/// whole batch back.
pub async fn commit_assignments(pool: &PgPool, assignments: &[Assignment]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for a in assignments {
        let ride_update = sqlx::query(
            r#"
            UPDATE rides SET status = 'assigned', driver_id = $1, assigned_at = $2
            WHERE id = $3 AND status = 'pending' AND driver_id IS NULL
            "#,
        )
        .bind(a.driver_id)
        .bind(a.assigned_at)
        .bind(a.ride_id)
        .execute(&mut *tx)
        .await?;

        let driver_update = sqlx::query(
            r#"
            UPDATE drivers SET available = false, active_ride_id = $1
            WHERE id = $2 AND available AND active_ride_id IS NULL
            "#,
        )
        .bind(a.ride_id)
        .bind(a.driver_id)
        .execute(&mut *tx)
        .await?;

        if ride_update.rows_affected() == 0 || driver_update.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Err(DispatchError::AssignmentConflict {
                ride_id: a.ride_id,
                driver_id: a.driver_id,
            });
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Persist a status transition with its timestamps, guarded by the expected current status
pub async fn advance_ride(pool: &PgPool, ride: &Ride, from: RideStatus) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE rides
        SET status = $1, driver_arrived_at = $2, started_at = $3, ended_at = $4
        WHERE id = $5 AND status = $6
        "#,
    )
    .bind(ride.status)
    .bind(ride.driver_arrived_at)
    .bind(ride.started_at)
    .bind(ride.ended_at)
    .bind(ride.id)
    .bind(from)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DispatchError::invalid_state(
            ride.id,
            format!("ride is no longer in status {}", from.as_str()),
        ));
    }
    Ok(())
}

/// Complete a ride with its fare fields and release its driver in one transaction
pub async fn persist_completion(pool: &PgPool, ride: &Ride) -> Result<bool> {
    let breakdown = ride.fare_breakdown.as_ref();
    let mut tx = pool.begin().await?;

    let ride_update = sqlx::query(
        r#"
        UPDATE rides
        SET status = 'completed', ended_at = $1, distance_km = $2, fare = $3,
            base_fare = $4, distance_fare = $5, time_fare = $6, waiting_fare = $7,
            duration_minutes = $8, waiting_minutes = $9
        WHERE id = $10 AND status = 'in_progress'
        "#,
    )
    .bind(ride.ended_at)
    .bind(ride.distance_km)
    .bind(ride.fare)
    .bind(breakdown.map(|b| b.base))
    .bind(breakdown.map(|b| b.distance_fare))
    .bind(breakdown.map(|b| b.time_fare))
    .bind(breakdown.map(|b| b.waiting_fare))
    .bind(breakdown.map(|b| b.duration_minutes))
    .bind(breakdown.map(|b| b.waiting_minutes))
    .bind(ride.id)
    .execute(&mut *tx)
    .await?;

    if ride_update.rows_affected() == 0 {
        return Err(DispatchError::invalid_state(
            ride.id,
            "ride is not in progress and cannot be completed",
        ));
    }

    let released = match ride.driver_id {
        Some(driver_id) => {
            let driver_update = sqlx::query(
                r#"
                UPDATE drivers
                SET available = true, active_ride_id = NULL, last_ride_ended_at = $1
                WHERE id = $2 AND active_ride_id = $3
                "#,
            )
            .bind(ride.ended_at)
            .bind(driver_id)
            .bind(ride.id)
            .execute(&mut *tx)
            .await?;
            driver_update.rows_affected() > 0
        }
        None => false,
    };

    tx.commit().await?;
    Ok(released)
}
