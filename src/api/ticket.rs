use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};

use crate::{
    api::{self, trip::Change},
    db::{
        self,
        catalog::{DriverId, LocationId},
        customer,
        trip::Key,
    },
};

pub use crate::db::ticket::{Id, Number, PaymentMethod, Status};

/// A ticket with the names a clerk needs to read or print it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Id,
    pub number: Number,
    pub status: Status,
    pub customer_id: customer::Id,
    pub customer_name: String,
    pub customer_phone: String,
    pub boarding_location_id: LocationId,
    pub boarding_location: String,
    pub city: String,
    pub driver_id: DriverId,
    pub driver_name: String,
    pub owner_name: String,
    #[serde(with = "crate::format::date")]
    pub date: Date,
    #[serde(with = "crate::format::clock")]
    pub time: Time,
    pub price: Decimal,
    pub payment_method: PaymentMethod,
    pub pickup_address: Option<String>,
    pub issued_by: api::user::Id,
    pub issued_by_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    pub original: Option<Key>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub altered_at: Option<OffsetDateTime>,
    pub alteration_reason: Option<String>,
    pub altered_by: Option<api::user::Id>,
}

impl From<db::ticket::Detail> for Ticket {
    fn from(detail: db::ticket::Detail) -> Self {
        let ticket = detail.ticket;
        let alteration = ticket.alteration;
        Self {
            id: ticket.id,
            number: ticket.number,
            status: ticket.status,
            customer_id: ticket.customer,
            customer_name: detail.customer_name,
            customer_phone: detail.customer_phone,
            boarding_location_id: ticket.boarding_location,
            boarding_location: detail.boarding_location,
            city: detail.city,
            driver_id: ticket.driver,
            driver_name: detail.driver_name,
            owner_name: detail.owner_name,
            date: ticket.date,
            time: ticket.time,
            price: ticket.price,
            payment_method: ticket.payment_method,
            pickup_address: ticket.pickup_address,
            issued_by: ticket.issued_by,
            issued_by_name: detail.issued_by_name,
            issued_at: ticket.issued_at,
            original: ticket.original,
            altered_at: alteration.as_ref().map(|a| a.at),
            altered_by: alteration.as_ref().map(|a| a.by),
            alteration_reason: alteration.and_then(|a| a.reason),
        }
    }
}

/// Response to a sale. The printout is absent when rendering failed, in
/// which case `print_error` says why; the ticket is sold either way.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issued {
    pub ticket: Ticket,
    pub trip: Change,
    pub printout: Option<api::Printout>,
    pub print_error: Option<String>,
}

/// Response to a cancellation or a transfer.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Altered {
    pub ticket: Ticket,
    pub trips: Vec<Change>,
}
