//! Ticket lifecycle: issue, cancel and transfer.
//!
//! Every operation runs in the transaction it is handed and commits it
//! only after both the ticket and the affected trips are written. Any
//! error drops the transaction, which rolls everything back.

use serde::Deserialize;
use time::{Date, OffsetDateTime, Time};

use crate::{
    config,
    db::{
        catalog::{DriverId, LocationId},
        customer,
        ticket::{self, Alteration, PaymentMethod, Status},
        trip::{Delta, Key},
        user, Ticket, Tx,
    },
    error::{Conflict, Error, Invalid, Missing},
    trip::{self, Change},
};

/// Office-wide settings the lifecycle depends on.
#[derive(Clone, Copy, Debug)]
pub struct Policy {
    /// The lowest number a ticket can get.
    pub first_ticket_number: ticket::Number,
}

impl Default for Policy {
    fn default() -> Self {
        Self::from(&config::Tickets::default())
    }
}

impl From<&config::Tickets> for Policy {
    fn from(config: &config::Tickets) -> Self {
        Self {
            first_ticket_number: config.first_number.into(),
        }
    }
}

/// A request to sell one seat.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "customerId")]
    pub customer: customer::Id,
    #[serde(rename = "boardingLocationId")]
    pub boarding_location: LocationId,
    #[serde(rename = "driverId")]
    pub driver: DriverId,
    #[serde(with = "crate::format::date")]
    pub date: Date,
    #[serde(with = "crate::format::clock")]
    pub time: Time,
    pub payment_method: String,
    #[serde(default)]
    pub pickup_address: Option<String>,
}

/// A ticket after a lifecycle operation, with the trips it touched in
/// the order they were changed.
#[derive(Clone, Debug)]
pub struct Outcome {
    pub ticket: Ticket,
    pub trips: Vec<Change>,
}

pub async fn issue<T: Tx>(
    mut tx: T,
    policy: &Policy,
    agent: user::Id,
    order: Order,
) -> Result<Outcome, Error> {
    let payment_method = order
        .payment_method
        .parse::<PaymentMethod>()
        .map_err(|()| Invalid::PaymentMethod(order.payment_method.clone()))?;

    let customer = tx
        .customer(order.customer)
        .await?
        .ok_or(Missing::Customer)?;
    let location = tx
        .boarding_location(order.boarding_location)
        .await?
        .ok_or(Missing::BoardingLocation)?;
    tx.driver(order.driver).await?.ok_or(Missing::Driver)?;

    let key = Key {
        date: order.date,
        time: order.time,
        driver: order.driver,
    };
    let number = tx.next_ticket_number(policy.first_ticket_number).await?;
    let change = trip::increment_or_create(
        &mut tx,
        &key,
        Delta::boarding(location.price),
        agent,
    )
    .await?;

    let ticket = Ticket {
        id: ticket::Id::new(),
        number,
        customer: customer.id,
        boarding_location: location.id,
        driver: key.driver,
        date: key.date,
        time: key.time,
        price: location.price,
        payment_method,
        status: Status::Issued,
        pickup_address: non_blank(order.pickup_address).or(customer.address),
        issued_by: agent,
        issued_at: OffsetDateTime::now_utc(),
        original: None,
        alteration: None,
    };
    tx.write_ticket(&ticket).await?;
    tx.commit().await?;

    tracing::info!(
        number = %ticket.number,
        customer = %ticket.customer,
        driver = %ticket.driver,
        price = %ticket.price,
        "ticket issued",
    );
    Ok(Outcome {
        ticket,
        trips: vec![change],
    })
}

pub async fn cancel<T: Tx>(
    mut tx: T,
    agent: user::Id,
    id: ticket::Id,
    reason: Option<String>,
) -> Result<Outcome, Error> {
    let mut ticket = tx.ticket_for_update(id).await?.ok_or(Missing::Ticket)?;
    match ticket.status {
        Status::Issued => {}
        Status::Cancelled => return Err(Conflict::AlreadyCancelled.into()),
        Status::Utilized => return Err(Conflict::CancelUtilized.into()),
    }

    let key = ticket.key();
    let change =
        trip::decrement(&mut tx, &key, Delta::leaving(ticket.price)).await?;

    ticket.original.get_or_insert(key);
    ticket.status = Status::Cancelled;
    ticket.alteration = Some(Alteration {
        at: OffsetDateTime::now_utc(),
        reason: non_blank(reason),
        by: agent,
    });
    tx.write_ticket(&ticket).await?;
    tx.commit().await?;

    tracing::info!(number = %ticket.number, "ticket cancelled");
    Ok(Outcome {
        ticket,
        trips: vec![change],
    })
}

pub async fn transfer<T: Tx>(
    mut tx: T,
    agent: user::Id,
    id: ticket::Id,
    to: Key,
    reason: Option<String>,
) -> Result<Outcome, Error> {
    let mut ticket = tx.ticket_for_update(id).await?.ok_or(Missing::Ticket)?;
    match ticket.status {
        Status::Issued => {}
        Status::Cancelled => return Err(Conflict::TransferCancelled.into()),
        Status::Utilized => return Err(Conflict::TransferUtilized.into()),
    }
    tx.driver(to.driver).await?.ok_or(Missing::Driver)?;

    let from = ticket.key();
    if from == to {
        return Err(Invalid::SameTrip.into());
    }

    let left =
        trip::decrement(&mut tx, &from, Delta::leaving(ticket.price)).await?;
    let joined = trip::increment_or_create(
        &mut tx,
        &to,
        Delta::boarding(ticket.price),
        agent,
    )
    .await?;

    ticket.original.get_or_insert(from);
    ticket.date = to.date;
    ticket.time = to.time;
    ticket.driver = to.driver;
    ticket.alteration = Some(Alteration {
        at: OffsetDateTime::now_utc(),
        reason: non_blank(reason),
        by: agent,
    });
    tx.write_ticket(&ticket).await?;
    tx.commit().await?;

    tracing::info!(
        number = %ticket.number,
        from.date = %from.date,
        from.time = %from.time,
        from.driver = %from.driver,
        to.date = %to.date,
        to.time = %to.time,
        to.driver = %to.driver,
        "ticket transferred",
    );
    Ok(Outcome {
        ticket,
        trips: vec![left, joined],
    })
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}
