use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, db, trip};

pub use crate::{
    db::trip::{Key, Passenger, Status},
    trip::Manifest,
};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    #[serde(flatten)]
    pub key: Key,
    pub passenger_count: i32,
    pub revenue: Decimal,
    pub status: Status,
    pub registered_by: api::user::Id,
    #[serde(with = "time::serde::rfc3339::option")]
    pub departed_at: Option<OffsetDateTime>,
    pub departed_by: Option<api::user::Id>,
}

impl From<db::Trip> for Trip {
    fn from(trip: db::Trip) -> Self {
        Self {
            key: trip.key,
            passenger_count: trip.passenger_count,
            revenue: trip.revenue,
            status: trip.status,
            registered_by: trip.registered_by,
            departed_at: trip.departed_at,
            departed_by: trip.departed_by,
        }
    }
}

/// A trip as listed for the dispatch board.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listed {
    #[serde(flatten)]
    pub trip: Trip,
    pub driver_name: String,
    pub owner_name: String,
    pub seats: i32,
}

impl From<db::trip::Listed> for Listed {
    fn from(listed: db::trip::Listed) -> Self {
        Self {
            trip: listed.trip.into(),
            driver_name: listed.driver_name,
            owner_name: listed.owner_name,
            seats: listed.seats,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(content = "trip", rename_all = "camelCase", tag = "change")]
pub enum Change {
    Created(Trip),
    Updated(Trip),
    Removed(Key),
}

impl From<trip::Change> for Change {
    fn from(change: trip::Change) -> Self {
        match change {
            trip::Change::Created(trip) => Self::Created(trip.into()),
            trip::Change::Updated(trip) => Self::Updated(trip.into()),
            trip::Change::Removed(key) => Self::Removed(key),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub trip: Trip,
    pub manifest: Manifest,
    pub utilized: u64,
}

impl From<trip::Departure> for Departure {
    fn from(departure: trip::Departure) -> Self {
        Self {
            trip: departure.trip.into(),
            manifest: departure.manifest,
            utilized: departure.utilized,
        }
    }
}
