use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use derive_more::{Display, From};
use time::Date;

use crate::db;

/// Failure of a lifecycle, trip or report operation.
#[derive(Debug, Display, From)]
pub enum Error {
    #[display("database error: {_0}")]
    #[from]
    Db(db::Error),
    #[from]
    NotFound(Missing),
    #[from]
    Conflict(Conflict),
    #[from]
    InvalidArgument(Invalid),
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Missing {
    #[display("customer not found")]
    Customer,
    #[display("driver not found")]
    Driver,
    #[display("boarding location not found")]
    BoardingLocation,
    #[display("ticket not found")]
    Ticket,
    #[display("trip not found")]
    Trip,
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Conflict {
    #[display("ticket is already cancelled")]
    AlreadyCancelled,
    #[display("cannot cancel a utilized ticket")]
    CancelUtilized,
    #[display("cannot transfer a cancelled ticket")]
    TransferCancelled,
    #[display("cannot transfer a utilized ticket")]
    TransferUtilized,
    #[display("trip has already departed")]
    AlreadyDeparted,
    #[display("trip has not departed yet")]
    NotDeparted,
    #[display("trip has more passengers than it can count")]
    TooManyPassengers,
}

#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum Invalid {
    #[display("invalid payment method: {_0}")]
    PaymentMethod(String),
    #[display("ticket is already on this trip")]
    SameTrip,
    #[display("start date {start} is after end date {end}")]
    ReversedRange { start: Date, end: Date },
    #[display("{_0}")]
    Field(&'static str),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Db(e) => {
                tracing::error!("database request failed: {e}");
                status.into_response()
            }
            e => (status, e.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse as _};
    use time::macros::date;

    use super::*;

    #[test]
    fn maps_kinds_to_statuses() {
        assert_eq!(
            Error::from(Missing::Trip).into_response().status(),
            StatusCode::NOT_FOUND,
        );
        assert_eq!(
            Error::from(Conflict::AlreadyDeparted).into_response().status(),
            StatusCode::CONFLICT,
        );
        assert_eq!(
            Error::from(Invalid::SameTrip).into_response().status(),
            StatusCode::BAD_REQUEST,
        );
    }

    #[test]
    fn explains_itself() {
        assert_eq!(
            Error::from(Conflict::AlreadyCancelled).to_string(),
            "ticket is already cancelled",
        );
        assert_eq!(
            Error::from(Invalid::ReversedRange {
                start: date!(2024 - 06 - 02),
                end: date!(2024 - 06 - 01),
            })
            .to_string(),
            "start date 2024-06-02 is after end date 2024-06-01",
        );
    }
}
