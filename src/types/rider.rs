use serde::{Deserialize, Serialize};

use super::location::Coordinates;

/// Rider entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: i64,
    pub name: String,
    pub home: Coordinates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRider {
    pub name: String,
    pub home: Coordinates,
}
