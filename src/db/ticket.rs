use std::str::FromStr;

use constcat::concat;
use derive_more::Display;
use enum_utils::TryFromRepr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use tokio_postgres::{Error, GenericClient, Row};
use uuid::Uuid;

use super::{
    catalog::{DriverId, LocationId},
    customer, trip, user, Client,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Ticket {
    pub id: Id,
    pub number: Number,
    pub customer: customer::Id,
    pub boarding_location: LocationId,
    pub driver: DriverId,
    pub date: Date,
    pub time: Time,
    /// Fare copied from the boarding location when the ticket was issued.
    pub price: Decimal,
    pub payment_method: PaymentMethod,
    pub status: Status,
    pub pickup_address: Option<String>,
    pub issued_by: user::Id,
    pub issued_at: OffsetDateTime,
    /// Trip the ticket was first issued for, kept from the first alteration.
    pub original: Option<trip::Key>,
    pub alteration: Option<Alteration>,
}

impl Ticket {
    pub fn key(&self) -> trip::Key {
        trip::Key {
            date: self.date,
            time: self.time,
            driver: self.driver,
        }
    }
}

/// Last cancellation or transfer applied to a ticket.
#[derive(Clone, Debug, PartialEq)]
pub struct Alteration {
    pub at: OffsetDateTime,
    pub reason: Option<String>,
    pub by: user::Id,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Id(Uuid::new_v4())
    }
}

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

sql_newtype!(Id, Uuid, UUID);

/// Printed ticket number.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Number(i32);

impl Number {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

sql_newtype!(Number, i32, INT4);

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, TryFromRepr, PartialEq, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// Sold and valid for its trip. Transferred tickets stay here too.
    Issued = 1,

    /// Withdrawn by an attendant; no longer counted anywhere.
    Cancelled = 2,

    /// Its trip has departed.
    Utilized = 3,
}

sql_repr_enum!(Status, "invalid ticket status");

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    TryFromRepr,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum PaymentMethod {
    #[display("CASH")]
    Cash = 1,
    #[display("CARD")]
    Card = 2,
    #[display("INSTANT_TRANSFER")]
    InstantTransfer = 3,
}

sql_repr_enum!(PaymentMethod, "invalid payment method");

impl FromStr for PaymentMethod {
    type Err = ();

    /// Case-insensitive; the office's legacy names are accepted as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "CASH" | "DINHEIRO" => Ok(Self::Cash),
            "CARD" | "CARTAO" => Ok(Self::Card),
            "INSTANT_TRANSFER" | "PIX" => Ok(Self::InstantTransfer),
            _ => Err(()),
        }
    }
}

const COLUMNS: &str = "\
    id, number, customer_id, boarding_location_id, driver_id, \
    travel_date, travel_time, price, payment_method, status, \
    pickup_address, issued_by, issued_at, original_date, original_time, \
    original_driver_id, altered_at, alteration_reason, altered_by";

fn from_row(row: &Row) -> Ticket {
    let original = match (
        row.get::<_, Option<Date>>("original_date"),
        row.get::<_, Option<Time>>("original_time"),
        row.get::<_, Option<DriverId>>("original_driver_id"),
    ) {
        (Some(date), Some(time), Some(driver)) => {
            Some(trip::Key { date, time, driver })
        }
        _ => None,
    };
    let alteration = match (
        row.get::<_, Option<OffsetDateTime>>("altered_at"),
        row.get::<_, Option<user::Id>>("altered_by"),
    ) {
        (Some(at), Some(by)) => Some(Alteration {
            at,
            reason: row.get("alteration_reason"),
            by,
        }),
        _ => None,
    };
    Ticket {
        id: row.get("id"),
        number: row.get("number"),
        customer: row.get("customer_id"),
        boarding_location: row.get("boarding_location_id"),
        driver: row.get("driver_id"),
        date: row.get("travel_date"),
        time: row.get("travel_time"),
        price: row.get("price"),
        payment_method: row.get("payment_method"),
        status: row.get("status"),
        pickup_address: row.get("pickup_address"),
        issued_by: row.get("issued_by"),
        issued_at: row.get("issued_at"),
        original,
        alteration,
    }
}

pub(super) async fn fetch_for_update(
    client: &impl GenericClient,
    id: Id,
) -> Result<Option<Ticket>, Error> {
    const SQL: &str =
        concat!("SELECT ", COLUMNS, " FROM tickets WHERE id = $1 FOR UPDATE");
    Ok(client.query_opt(SQL, &[&id]).await?.as_ref().map(from_row))
}

pub(super) async fn write(
    client: &impl GenericClient,
    ticket: &Ticket,
) -> Result<(), Error> {
    const SQL: &str = concat!(
        "INSERT INTO tickets (",
        COLUMNS,
        ") \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                 $11, $12, $13, $14, $15, $16, $17, $18, $19) \
         ON CONFLICT (id) DO UPDATE \
         SET driver_id = EXCLUDED.driver_id, \
             travel_date = EXCLUDED.travel_date, \
             travel_time = EXCLUDED.travel_time, \
             status = EXCLUDED.status, \
             pickup_address = EXCLUDED.pickup_address, \
             original_date = EXCLUDED.original_date, \
             original_time = EXCLUDED.original_time, \
             original_driver_id = EXCLUDED.original_driver_id, \
             altered_at = EXCLUDED.altered_at, \
             alteration_reason = EXCLUDED.alteration_reason, \
             altered_by = EXCLUDED.altered_by"
    );

    let original = ticket.original.as_ref();
    let alteration = ticket.alteration.as_ref();
    client
        .execute(
            SQL,
            &[
                &ticket.id,
                &ticket.number,
                &ticket.customer,
                &ticket.boarding_location,
                &ticket.driver,
                &ticket.date,
                &ticket.time,
                &ticket.price,
                &ticket.payment_method,
                &ticket.status,
                &ticket.pickup_address,
                &ticket.issued_by,
                &ticket.issued_at,
                &original.map(|k| k.date),
                &original.map(|k| k.time),
                &original.map(|k| k.driver),
                &alteration.map(|a| a.at),
                &alteration.and_then(|a| a.reason.as_deref()),
                &alteration.map(|a| a.by),
            ],
        )
        .await
        .map(drop)
}

/// Bumps the single-row counter. The row lock held until commit keeps
/// concurrent issuers in line, and a rollback gives the number back.
pub(super) async fn next_number(
    client: &impl GenericClient,
    floor: Number,
) -> Result<Number, Error> {
    const SQL: &str = "\
        UPDATE ticket_counter \
        SET last_number = GREATEST(last_number + 1, $1) \
        RETURNING last_number";
    Ok(client.query_one(SQL, &[&floor]).await?.get("last_number"))
}

pub(super) async fn utilize(
    client: &impl GenericClient,
    key: &trip::Key,
) -> Result<u64, Error> {
    const SQL: &str = "\
        UPDATE tickets \
        SET status = $4 \
        WHERE travel_date = $1 AND travel_time = $2 AND driver_id = $3 \
          AND status = $5";
    client
        .execute(
            SQL,
            &[
                &key.date,
                &key.time,
                &key.driver,
                &Status::Utilized,
                &Status::Issued,
            ],
        )
        .await
}

pub(super) async fn live_totals(
    client: &impl GenericClient,
    key: &trip::Key,
) -> Result<trip::Tally, Error> {
    const SQL: &str = "\
        SELECT COUNT(*) AS passengers, \
               COUNT(*) FILTER (WHERE status = $5) AS issued, \
               COALESCE(SUM(price), 0) AS revenue \
        FROM tickets \
        WHERE travel_date = $1 AND travel_time = $2 AND driver_id = $3 \
          AND status <> $4";
    let row = client
        .query_one(
            SQL,
            &[
                &key.date,
                &key.time,
                &key.driver,
                &Status::Cancelled,
                &Status::Issued,
            ],
        )
        .await?;
    Ok(trip::Tally {
        passengers: row.get("passengers"),
        issued: row.get("issued"),
        revenue: row.get("revenue"),
    })
}

/// Ticket joined with the names needed to show or print it.
#[derive(Clone, Debug)]
pub struct Detail {
    pub ticket: Ticket,
    pub customer_name: String,
    pub customer_phone: String,
    pub boarding_location: String,
    pub city: String,
    pub driver_name: String,
    pub owner_name: String,
    pub issued_by_name: String,
}

/// A live ticket as it appears in period and driver reports.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub number: Number,
    #[serde(with = "crate::format::date")]
    pub date: Date,
    #[serde(with = "crate::format::clock")]
    pub time: Time,
    pub customer_name: String,
    #[serde(rename = "driverId")]
    pub driver: DriverId,
    pub driver_name: String,
    pub owner_name: String,
    pub boarding_location: String,
    pub city: String,
    pub price: Decimal,
    pub payment_method: PaymentMethod,
}

const SELECT_DETAIL: &str = concat!(
    "SELECT ",
    "t.id, t.number, t.customer_id, t.boarding_location_id, t.driver_id, \
     t.travel_date, t.travel_time, t.price, t.payment_method, t.status, \
     t.pickup_address, t.issued_by, t.issued_at, t.original_date, \
     t.original_time, t.original_driver_id, t.altered_at, \
     t.alteration_reason, t.altered_by, \
     c.name AS customer_name, c.phone AS customer_phone, \
     l.name AS location_name, ci.name AS city_name, \
     d.name AS driver_name, o.name AS owner_name, u.name AS agent_name \
     FROM tickets t \
     JOIN customers c ON c.id = t.customer_id \
     JOIN boarding_locations l ON l.id = t.boarding_location_id \
     JOIN cities ci ON ci.id = l.city_id \
     JOIN drivers d ON d.id = t.driver_id \
     JOIN owners o ON o.id = d.owner_id \
     JOIN users u ON u.id = t.issued_by"
);

fn detail_from_row(row: &Row) -> Detail {
    Detail {
        ticket: from_row(row),
        customer_name: row.get("customer_name"),
        customer_phone: row.get("customer_phone"),
        boarding_location: row.get("location_name"),
        city: row.get("city_name"),
        driver_name: row.get("driver_name"),
        owner_name: row.get("owner_name"),
        issued_by_name: row.get("agent_name"),
    }
}

const SELECT_SALE: &str = "\
    SELECT t.number, t.travel_date, t.travel_time, t.driver_id, t.price, \
           t.payment_method, c.name AS customer_name, \
           d.name AS driver_name, o.name AS owner_name, \
           l.name AS location_name, ci.name AS city_name \
    FROM tickets t \
    JOIN customers c ON c.id = t.customer_id \
    JOIN boarding_locations l ON l.id = t.boarding_location_id \
    JOIN cities ci ON ci.id = l.city_id \
    JOIN drivers d ON d.id = t.driver_id \
    JOIN owners o ON o.id = d.owner_id";

fn sale_from_row(row: &Row) -> Sale {
    Sale {
        number: row.get("number"),
        date: row.get("travel_date"),
        time: row.get("travel_time"),
        customer_name: row.get("customer_name"),
        driver: row.get("driver_id"),
        driver_name: row.get("driver_name"),
        owner_name: row.get("owner_name"),
        boarding_location: row.get("location_name"),
        city: row.get("city_name"),
        price: row.get("price"),
        payment_method: row.get("payment_method"),
    }
}

impl Client {
    pub async fn get_ticket_detail(
        &self,
        id: Id,
    ) -> Result<Option<Detail>, Error> {
        const SQL: &str = concat!(SELECT_DETAIL, " WHERE t.id = $1");
        Ok(self
            .0
            .read()
            .await
            .query_opt(SQL, &[&id])
            .await?
            .as_ref()
            .map(detail_from_row))
    }

    /// Every ticket travelling on `date`, cancelled ones included.
    pub async fn get_tickets_by_date(
        &self,
        date: Date,
    ) -> Result<Vec<Detail>, Error> {
        const SQL: &str = concat!(
            SELECT_DETAIL,
            " WHERE t.travel_date = $1 ORDER BY t.travel_time, t.number"
        );
        Ok(self
            .0
            .read()
            .await
            .query(SQL, &[&date])
            .await?
            .iter()
            .map(detail_from_row)
            .collect())
    }

    /// Issued and utilized tickets travelling within `[start, end]`,
    /// optionally restricted to one driver.
    pub async fn get_sales(
        &self,
        start: Date,
        end: Date,
        driver: Option<DriverId>,
    ) -> Result<Vec<Sale>, Error> {
        const SQL: &str = concat!(
            SELECT_SALE,
            " WHERE t.travel_date BETWEEN $1 AND $2 \
                AND t.status <> $3 \
                AND ($4::INT4 IS NULL OR t.driver_id = $4) \
              ORDER BY t.travel_date, t.travel_time, c.name, t.number"
        );
        Ok(self
            .0
            .read()
            .await
            .query(SQL, &[&start, &end, &Status::Cancelled, &driver])
            .await?
            .iter()
            .map(sale_from_row)
            .collect())
    }
}
