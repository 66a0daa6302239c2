//! Trip aggregator.
//!
//! A trip is the running total of the live tickets sharing one
//! (date, time, driver) key. It is kept up to date incrementally by the
//! ticket lifecycle and can be rebuilt from the tickets on demand.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    db::{
        self,
        trip::{Delta, Key, Passenger, Status},
        user, Trip, Tx,
    },
    error::{Conflict, Error, Missing},
};

/// What an aggregator operation did to the trip row.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    Created(Trip),
    Updated(Trip),
    Removed(Key),
}

/// Passenger list of a trip, ordered by customer name.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(flatten)]
    pub key: Key,
    pub passengers: Vec<Passenger>,
    pub passenger_count: usize,
    pub revenue: Decimal,
}

impl Manifest {
    pub fn new(key: Key, mut passengers: Vec<Passenger>) -> Self {
        passengers.sort_by(|a, b| {
            (&a.customer_name, a.ticket_number)
                .cmp(&(&b.customer_name, b.ticket_number))
        });
        Self {
            key,
            passenger_count: passengers.len(),
            revenue: passengers.iter().map(|p| p.price).sum(),
            passengers,
        }
    }
}

/// A trip that has just left, with its final passenger list.
#[derive(Clone, Debug)]
pub struct Departure {
    pub trip: Trip,
    pub manifest: Manifest,
    pub utilized: u64,
}

/// Adds `delta` to the trip at `key`, opening it when absent.
///
/// Departed trips accept no more passengers.
pub async fn increment_or_create(
    tx: &mut impl Tx,
    key: &Key,
    delta: Delta,
    agent: user::Id,
) -> Result<Change, Error> {
    if let Some(trip) = tx.trip_for_update(key).await? {
        if trip.status == Status::Departed {
            return Err(Conflict::AlreadyDeparted.into());
        }
    }

    let (trip, created) = tx.add_to_trip(key, delta, agent).await?;
    Ok(if created {
        Change::Created(trip)
    } else {
        Change::Updated(trip)
    })
}

/// Applies a negative `delta` to the trip at `key`, deleting the row once
/// no passenger is left.
pub async fn decrement(
    tx: &mut impl Tx,
    key: &Key,
    delta: Delta,
) -> Result<Change, Error> {
    let trip = tx.shift_trip(key, delta).await?.ok_or(Missing::Trip)?;
    if trip.passenger_count <= 0 {
        tx.delete_trip(key).await?;
        return Ok(Change::Removed(*key));
    }
    Ok(Change::Updated(trip))
}

/// Marks the trip as departed and utilizes every issued ticket on it.
pub async fn depart<T: Tx>(
    mut tx: T,
    agent: user::Id,
    key: &Key,
) -> Result<Departure, Error> {
    let mut trip = tx.trip_for_update(key).await?.ok_or(Missing::Trip)?;
    if trip.status == Status::Departed {
        return Err(Conflict::AlreadyDeparted.into());
    }

    let utilized = tx.utilize_tickets(key).await?;
    trip.status = Status::Departed;
    trip.departed_at = Some(OffsetDateTime::now_utc());
    trip.departed_by = Some(agent);
    tx.write_trip(&trip).await?;

    let manifest = Manifest::new(*key, tx.passengers(key).await?);
    tx.commit().await?;

    tracing::info!(
        date = %key.date,
        time = %key.time,
        driver = %key.driver,
        utilized,
        "trip departed",
    );
    Ok(Departure {
        trip,
        manifest,
        utilized,
    })
}

/// Recomputes the trip at `key` from its live tickets.
pub async fn reconcile<T: Tx>(
    mut tx: T,
    agent: user::Id,
    key: &Key,
) -> Result<Change, Error> {
    let tally = tx.live_totals(key).await?;
    let totals = tally.delta().ok_or(Conflict::TooManyPassengers)?;
    let existing = tx.trip_for_update(key).await?;

    let change = match existing {
        None if totals.passengers <= 0 => return Err(Missing::Trip.into()),
        Some(_) if totals.passengers <= 0 => {
            tx.delete_trip(key).await?;
            Change::Removed(*key)
        }
        Some(mut trip) => {
            trip.passenger_count = totals.passengers;
            trip.revenue = totals.revenue;
            tx.write_trip(&trip).await?;
            Change::Updated(trip)
        }
        None => {
            let mut trip = Trip::open(*key, totals, agent);
            if tally.issued == 0 {
                trip.status = Status::Departed;
                trip.departed_at = Some(OffsetDateTime::now_utc());
                trip.departed_by = Some(agent);
            }
            tx.write_trip(&trip).await?;
            Change::Created(trip)
        }
    };
    tx.commit().await?;

    tracing::info!(
        date = %key.date,
        time = %key.time,
        driver = %key.driver,
        passengers = totals.passengers,
        "trip reconciled",
    );
    Ok(change)
}

/// Current passenger list of the trip at `key`. Never writes.
pub async fn build_manifest(
    client: &db::Client,
    key: &Key,
) -> Result<Manifest, Error> {
    let passengers = client.get_passengers(key).await?;
    Ok(Manifest::new(*key, passengers))
}
