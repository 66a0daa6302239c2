use std::ops::Neg;

use enum_utils::TryFromRepr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use tokio_postgres::{Error, GenericClient, Row};

use super::{
    catalog::DriverId,
    ticket::{self, PaymentMethod},
    user, Client,
};

/// A departure: the van of one driver leaving at one date and time.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    #[serde(with = "crate::format::date")]
    pub date: Date,
    #[serde(with = "crate::format::clock")]
    pub time: Time,
    #[serde(rename = "driverId")]
    pub driver: DriverId,
}

/// Change applied to the running totals of a trip.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Delta {
    pub passengers: i32,
    pub revenue: Decimal,
}

impl Delta {
    /// One more passenger paying `price`.
    pub fn boarding(price: Decimal) -> Self {
        Self {
            passengers: 1,
            revenue: price,
        }
    }

    /// One passenger paying `price` leaves.
    pub fn leaving(price: Decimal) -> Self {
        -Self::boarding(price)
    }
}

/// Non-cancelled tickets on one key, as counted by the store.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Tally {
    pub passengers: i64,
    /// Those not utilized yet.
    pub issued: i64,
    pub revenue: Decimal,
}

impl Tally {
    /// `None` when the count does not fit the trip counter.
    pub fn delta(&self) -> Option<Delta> {
        Some(Delta {
            passengers: i32::try_from(self.passengers).ok()?,
            revenue: self.revenue,
        })
    }
}

impl Neg for Delta {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            passengers: -self.passengers,
            revenue: -self.revenue,
        }
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, TryFromRepr, PartialEq, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// Still boarding; tickets may be issued, moved or cancelled.
    Pending = 1,

    /// The van has left and its tickets are utilized.
    Departed = 2,
}

sql_repr_enum!(Status, "invalid trip status");

#[derive(Clone, Debug, PartialEq)]
pub struct Trip {
    pub key: Key,
    pub passenger_count: i32,
    pub revenue: Decimal,
    pub status: Status,
    pub registered_by: user::Id,
    pub departed_at: Option<OffsetDateTime>,
    pub departed_by: Option<user::Id>,
}

impl Trip {
    /// A fresh pending trip holding `delta`.
    pub fn open(key: Key, delta: Delta, registered_by: user::Id) -> Self {
        Self {
            key,
            passenger_count: delta.passengers,
            revenue: delta.revenue,
            status: Status::Pending,
            registered_by,
            departed_at: None,
            departed_by: None,
        }
    }
}

/// One manifest line.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub ticket_number: ticket::Number,
    pub customer_name: String,
    pub customer_phone: String,
    pub boarding_location: String,
    pub city: String,
    pub price: Decimal,
    pub payment_method: PaymentMethod,
}

/// Trip joined with the names of its driver and the van owner.
#[derive(Clone, Debug)]
pub struct Listed {
    pub trip: Trip,
    pub driver_name: String,
    pub owner_name: String,
    pub seats: i32,
}

const COLUMNS: &str = "\
    trips.travel_date, trips.travel_time, trips.driver_id, \
    trips.passenger_count, trips.revenue, trips.status, \
    trips.registered_by, trips.departed_at, trips.departed_by";

const SELECT_LISTED: &str = constcat::concat!(
    "SELECT ",
    COLUMNS,
    ", d.name AS driver_name, d.seats, o.name AS owner_name \
     FROM trips \
     JOIN drivers d ON d.id = trips.driver_id \
     JOIN owners o ON o.id = d.owner_id"
);

fn listed_from_row(row: &Row) -> Listed {
    Listed {
        trip: from_row(row),
        driver_name: row.get("driver_name"),
        owner_name: row.get("owner_name"),
        seats: row.get("seats"),
    }
}

fn from_row(row: &Row) -> Trip {
    Trip {
        key: Key {
            date: row.get("travel_date"),
            time: row.get("travel_time"),
            driver: row.get("driver_id"),
        },
        passenger_count: row.get("passenger_count"),
        revenue: row.get("revenue"),
        status: row.get("status"),
        registered_by: row.get("registered_by"),
        departed_at: row.get("departed_at"),
        departed_by: row.get("departed_by"),
    }
}

pub(super) async fn fetch_for_update(
    client: &impl GenericClient,
    key: &Key,
) -> Result<Option<Trip>, Error> {
    const SQL: &str = constcat::concat!(
        "SELECT ",
        COLUMNS,
        " FROM trips \
          WHERE travel_date = $1 AND travel_time = $2 AND driver_id = $3 \
          FOR UPDATE"
    );
    Ok(client
        .query_opt(SQL, &[&key.date, &key.time, &key.driver])
        .await?
        .as_ref()
        .map(from_row))
}

/// Creates the trip or adds to it in one statement, so that two issuers
/// racing on a new key both land on the same row.
pub(super) async fn upsert(
    client: &impl GenericClient,
    key: &Key,
    delta: Delta,
    agent: user::Id,
) -> Result<(Trip, bool), Error> {
    const SQL: &str = constcat::concat!(
        "INSERT INTO trips (travel_date, travel_time, driver_id, \
                            passenger_count, revenue, status, registered_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (travel_date, travel_time, driver_id) DO UPDATE \
         SET passenger_count = trips.passenger_count + EXCLUDED.passenger_count, \
             revenue = trips.revenue + EXCLUDED.revenue \
         RETURNING (xmax = 0) AS created, ",
        COLUMNS
    );
    let row = client
        .query_one(
            SQL,
            &[
                &key.date,
                &key.time,
                &key.driver,
                &delta.passengers,
                &delta.revenue,
                &Status::Pending,
                &agent,
            ],
        )
        .await?;
    Ok((from_row(&row), row.get("created")))
}

pub(super) async fn shift(
    client: &impl GenericClient,
    key: &Key,
    delta: Delta,
) -> Result<Option<Trip>, Error> {
    const SQL: &str = constcat::concat!(
        "UPDATE trips \
         SET passenger_count = passenger_count + $4, \
             revenue = revenue + $5 \
         WHERE travel_date = $1 AND travel_time = $2 AND driver_id = $3 \
         RETURNING ",
        COLUMNS
    );
    Ok(client
        .query_opt(
            SQL,
            &[
                &key.date,
                &key.time,
                &key.driver,
                &delta.passengers,
                &delta.revenue,
            ],
        )
        .await?
        .as_ref()
        .map(from_row))
}

pub(super) async fn write(
    client: &impl GenericClient,
    trip: &Trip,
) -> Result<(), Error> {
    const SQL: &str = "\
        INSERT INTO trips (travel_date, travel_time, driver_id, \
                           passenger_count, revenue, status, registered_by, \
                           departed_at, departed_by) \
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
        ON CONFLICT (travel_date, travel_time, driver_id) DO UPDATE \
        SET passenger_count = EXCLUDED.passenger_count, \
            revenue = EXCLUDED.revenue, \
            status = EXCLUDED.status, \
            departed_at = EXCLUDED.departed_at, \
            departed_by = EXCLUDED.departed_by";
    client
        .execute(
            SQL,
            &[
                &trip.key.date,
                &trip.key.time,
                &trip.key.driver,
                &trip.passenger_count,
                &trip.revenue,
                &trip.status,
                &trip.registered_by,
                &trip.departed_at,
                &trip.departed_by,
            ],
        )
        .await
        .map(drop)
}

pub(super) async fn delete(
    client: &impl GenericClient,
    key: &Key,
) -> Result<(), Error> {
    const SQL: &str = "\
        DELETE FROM trips \
        WHERE travel_date = $1 AND travel_time = $2 AND driver_id = $3";
    client
        .execute(SQL, &[&key.date, &key.time, &key.driver])
        .await
        .map(drop)
}

pub(super) async fn passengers(
    client: &impl GenericClient,
    key: &Key,
) -> Result<Vec<Passenger>, Error> {
    const SQL: &str = "\
        SELECT t.number, t.price, t.payment_method, \
               c.name AS customer_name, c.phone AS customer_phone, \
               l.name AS location_name, ci.name AS city_name \
        FROM tickets t \
        JOIN customers c ON c.id = t.customer_id \
        JOIN boarding_locations l ON l.id = t.boarding_location_id \
        JOIN cities ci ON ci.id = l.city_id \
        WHERE t.travel_date = $1 AND t.travel_time = $2 AND t.driver_id = $3 \
          AND t.status <> $4 \
        ORDER BY c.name, t.number";
    Ok(client
        .query(
            SQL,
            &[&key.date, &key.time, &key.driver, &ticket::Status::Cancelled],
        )
        .await?
        .into_iter()
        .map(|row| Passenger {
            ticket_number: row.get("number"),
            customer_name: row.get("customer_name"),
            customer_phone: row.get("customer_phone"),
            boarding_location: row.get("location_name"),
            city: row.get("city_name"),
            price: row.get("price"),
            payment_method: row.get("payment_method"),
        })
        .collect())
}

impl Client {
    pub async fn get_passengers(
        &self,
        key: &Key,
    ) -> Result<Vec<Passenger>, Error> {
        passengers(&*self.0.read().await, key).await
    }

    /// Trips within the optional bounds, newest first.
    pub async fn get_trips(
        &self,
        from: Option<Date>,
        to: Option<Date>,
        driver: Option<DriverId>,
    ) -> Result<Vec<Listed>, Error> {
        const SQL: &str = constcat::concat!(
            SELECT_LISTED,
            " WHERE ($1::DATE IS NULL OR trips.travel_date >= $1) \
                AND ($2::DATE IS NULL OR trips.travel_date <= $2) \
                AND ($3::INT4 IS NULL OR trips.driver_id = $3) \
              ORDER BY trips.travel_date DESC, trips.travel_time DESC, \
                       d.name"
        );
        Ok(self
            .0
            .read()
            .await
            .query(SQL, &[&from, &to, &driver])
            .await?
            .iter()
            .map(listed_from_row)
            .collect())
    }

    /// The last `limit` trips departing on or before `until`.
    pub async fn get_latest_trips(
        &self,
        until: Date,
        limit: i64,
    ) -> Result<Vec<Listed>, Error> {
        const SQL: &str = constcat::concat!(
            SELECT_LISTED,
            " WHERE trips.travel_date <= $1 \
              ORDER BY trips.travel_date DESC, trips.travel_time DESC, \
                       d.name \
              LIMIT $2"
        );
        Ok(self
            .0
            .read()
            .await
            .query(SQL, &[&until, &limit])
            .await?
            .iter()
            .map(listed_from_row)
            .collect())
    }
}
