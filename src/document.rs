//! Printable tickets and manifests.

use std::fmt::{self, Write as _};

use axum::{
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use derive_more::{Display, From};
use time::{macros::format_description, Time};

use crate::{api, config, trip::Manifest};

/// A rendered file ready to be downloaded or embedded.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub file_name: String,
    pub media_type: &'static str,
    pub body: Vec<u8>,
}

impl IntoResponse for Document {
    fn into_response(self) -> Response {
        let disposition = format!("inline; filename=\"{}\"", self.file_name);
        (
            [
                (CONTENT_TYPE, self.media_type.to_string()),
                (CONTENT_DISPOSITION, disposition),
            ],
            self.body,
        )
            .into_response()
    }
}

#[derive(Debug, Display, From)]
pub enum RenderError {
    #[display("failed to write document: {_0}")]
    #[from]
    Write(fmt::Error),
    #[display("failed to format date: {_0}")]
    #[from]
    Format(time::error::Format),
}

/// A departed trip together with its final passenger list.
#[derive(Clone, Copy, Debug)]
pub struct ManifestView<'a> {
    pub trip: &'a api::trip::Listed,
    pub manifest: &'a Manifest,
}

pub trait Render: Send + Sync {
    fn ticket(&self, ticket: &api::Ticket) -> Result<Document, RenderError>;

    fn manifest(
        &self,
        view: ManifestView<'_>,
    ) -> Result<Document, RenderError>;
}

/// Renders fixed-width plain text suitable for receipt printers.
#[derive(Clone, Debug)]
pub struct TextRenderer {
    destination: String,
}

impl TextRenderer {
    const MEDIA_TYPE: &'static str = "text/plain; charset=utf-8";
    const WIDTH: usize = 48;

    pub fn new(config: &config::Tickets) -> Self {
        Self {
            destination: config.destination.clone(),
        }
    }

    fn rule(out: &mut String) -> fmt::Result {
        writeln!(out, "{}", "-".repeat(Self::WIDTH))
    }
}

fn clock(time: Time) -> Result<String, time::error::Format> {
    time.format(format_description!("[hour]:[minute]"))
}

impl Render for TextRenderer {
    fn ticket(&self, ticket: &api::Ticket) -> Result<Document, RenderError> {
        let mut out = String::new();
        writeln!(out, "TICKET No. {}", ticket.number)?;
        Self::rule(&mut out)?;
        writeln!(out, "Passenger:   {}", ticket.customer_name)?;
        writeln!(out, "Phone:       {}", ticket.customer_phone)?;
        writeln!(out, "Destination: {}", self.destination)?;
        writeln!(out, "Date:        {}", ticket.date)?;
        writeln!(out, "Departure:   {}", clock(ticket.time)?)?;
        writeln!(
            out,
            "Driver:      {} ({})",
            ticket.driver_name, ticket.owner_name,
        )?;
        writeln!(
            out,
            "Boarding:    {} - {}",
            ticket.boarding_location, ticket.city,
        )?;
        if let Some(address) = &ticket.pickup_address {
            writeln!(out, "Pickup:      {address}")?;
        }
        writeln!(out, "Price:       {:.2}", ticket.price)?;
        writeln!(out, "Payment:     {}", ticket.payment_method)?;
        Self::rule(&mut out)?;
        writeln!(
            out,
            "Issued by {} on {} {}",
            ticket.issued_by_name,
            ticket.issued_at.date(),
            clock(ticket.issued_at.time())?,
        )?;

        Ok(Document {
            file_name: format!("ticket-{}.txt", ticket.number),
            media_type: Self::MEDIA_TYPE,
            body: out.into_bytes(),
        })
    }

    fn manifest(
        &self,
        view: ManifestView<'_>,
    ) -> Result<Document, RenderError> {
        let key = view.manifest.key;
        let departure = clock(key.time)?;

        let mut out = String::new();
        writeln!(out, "MANIFEST {} {departure} to {}", key.date, self.destination)?;
        writeln!(
            out,
            "Driver: {} ({}), {} seats",
            view.trip.driver_name, view.trip.owner_name, view.trip.seats,
        )?;
        Self::rule(&mut out)?;
        for (i, passenger) in view.manifest.passengers.iter().enumerate() {
            writeln!(
                out,
                "{:>2}. #{} {} ({})",
                i + 1,
                passenger.ticket_number,
                passenger.customer_name,
                passenger.customer_phone,
            )?;
            writeln!(
                out,
                "    {} - {}, {:.2} {}",
                passenger.boarding_location,
                passenger.city,
                passenger.price,
                passenger.payment_method,
            )?;
        }
        Self::rule(&mut out)?;
        writeln!(
            out,
            "Passengers: {}  Revenue: {:.2}",
            view.manifest.passenger_count, view.manifest.revenue,
        )?;

        Ok(Document {
            file_name: format!(
                "manifest-{}-{}-{}.txt",
                key.date,
                departure.replace(':', ""),
                key.driver,
            ),
            media_type: Self::MEDIA_TYPE,
            body: out.into_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use time::macros::{date, datetime, time};

    use super::*;
    use crate::db::{
        ticket::{PaymentMethod, Status},
        trip::{Key, Passenger},
        user,
    };

    fn renderer() -> TextRenderer {
        TextRenderer::new(&config::Tickets::default())
    }

    fn key() -> Key {
        Key {
            date: date!(2024 - 06 - 01),
            time: time!(14:00),
            driver: 7.into(),
        }
    }

    #[test]
    fn prints_ticket() {
        let ticket = api::Ticket {
            id: api::ticket::Id::from(1),
            number: 30000.into(),
            status: Status::Issued,
            customer_id: 1.into(),
            customer_name: "Ana Souza".to_string(),
            customer_phone: "11 99999-0000".to_string(),
            boarding_location_id: 1.into(),
            boarding_location: "Praça Central".to_string(),
            city: "Itapecerica".to_string(),
            driver_id: 7.into(),
            driver_name: "Diego".to_string(),
            owner_name: "Owner".to_string(),
            date: date!(2024 - 06 - 01),
            time: time!(14:00),
            price: Decimal::new(6000, 2),
            payment_method: PaymentMethod::Cash,
            pickup_address: Some("Rua das Flores, 10".to_string()),
            issued_by: user::Id::from(1),
            issued_by_name: "Alice".to_string(),
            issued_at: datetime!(2024-05-30 10:15 UTC),
            original: None,
            altered_at: None,
            alteration_reason: None,
            altered_by: None,
        };

        let document = renderer().ticket(&ticket).unwrap();
        let text = String::from_utf8(document.body).unwrap();

        assert_eq!(document.file_name, "ticket-30000.txt");
        assert!(text.starts_with("TICKET No. 30000\n"));
        assert!(text.contains("Destination: Embu das Artes"));
        assert!(text.contains("Departure:   14:00"));
        assert!(text.contains("Pickup:      Rua das Flores, 10"));
        assert!(text.contains("Price:       60.00"));
        assert!(text.contains("Payment:     CASH"));
        assert!(text.contains("Issued by Alice on 2024-05-30 10:15"));
    }

    #[test]
    fn prints_manifest() {
        let listed = api::trip::Listed {
            trip: api::Trip {
                key: key(),
                passenger_count: 1,
                revenue: Decimal::new(4550, 2),
                status: crate::db::trip::Status::Departed,
                registered_by: user::Id::from(1),
                departed_at: None,
                departed_by: None,
            },
            driver_name: "Diego".to_string(),
            owner_name: "Owner".to_string(),
            seats: 14,
        };
        let manifest = Manifest::new(
            key(),
            vec![Passenger {
                ticket_number: 30001.into(),
                customer_name: "Bruno Lima".to_string(),
                customer_phone: "11 98888-0000".to_string(),
                boarding_location: "Posto Shell".to_string(),
                city: "Itapecerica".to_string(),
                price: Decimal::new(4550, 2),
                payment_method: PaymentMethod::InstantTransfer,
            }],
        );

        let document = renderer()
            .manifest(ManifestView {
                trip: &listed,
                manifest: &manifest,
            })
            .unwrap();
        let text = String::from_utf8(document.body).unwrap();

        assert_eq!(document.file_name, "manifest-2024-06-01-1400-7.txt");
        assert!(text.starts_with("MANIFEST 2024-06-01 14:00 to Embu das Artes\n"));
        assert!(text.contains(" 1. #30001 Bruno Lima (11 98888-0000)"));
        assert!(text.contains("Posto Shell - Itapecerica, 45.50 INSTANT_TRANSFER"));
        assert!(text.contains("Passengers: 1  Revenue: 45.50"));
    }
}
