//! Rider database queries

use sqlx::{FromRow, PgPool};

use crate::error::Result;
use crate::types::{Coordinates, NewRider, Rider};

#[derive(Debug, FromRow)]
struct RiderRow {
    id: i64,
    name: String,
    latitude: f64,
    longitude: f64,
}

impl From<RiderRow> for Rider {
    fn from(row: RiderRow) -> Self {
        Rider {
            id: row.id,
            name: row.name,
            home: Coordinates::new(row.latitude, row.longitude),
        }
    }
}

pub async fn list_riders(pool: &PgPool) -> Result<Vec<Rider>> {
    let rows = sqlx::query_as::<_, RiderRow>(
        "SELECT id, name, latitude, longitude FROM riders ORDER BY id ASC"
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Rider::from).collect())
}

pub async fn get_rider(pool: &PgPool, rider_id: i64) -> Result<Option<Rider>> {
    let row = sqlx::query_as::<_, RiderRow>(
        "SELECT id, name, latitude, longitude FROM riders WHERE id = $1"
    )
    .bind(rider_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Rider::from))
}

pub async fn insert_rider(pool: &PgPool, rider: NewRider) -> Result<Rider> {
    let row = sqlx::query_as::<_, RiderRow>(
        r#"
        INSERT INTO riders (name, latitude, longitude)
        VALUES ($1, $2, $3)
        RETURNING id, name, latitude, longitude
        "#
    )
    .bind(&rider.name)
    .bind(rider.home.lat)
    .bind(rider.home.lng)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}
