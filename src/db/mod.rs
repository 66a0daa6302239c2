/// Implements `FromSql`/`ToSql` for a newtype wrapping a single column.
macro_rules! sql_newtype {
    ($ty:ident, $inner:ty, $pg:ident) => {
        impl ::tokio_postgres::types::FromSql<'_> for $ty {
            ::tokio_postgres::types::accepts!($pg);

            fn from_sql(
                ty: &::tokio_postgres::types::Type,
                raw: &[u8],
            ) -> Result<Self, Box<dyn ::std::error::Error + Sync + Send>>
            {
                <$inner as ::tokio_postgres::types::FromSql>::from_sql(ty, raw)
                    .map(Self)
            }
        }

        impl ::tokio_postgres::types::ToSql for $ty {
            ::tokio_postgres::types::accepts!($pg);

            ::tokio_postgres::types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &::tokio_postgres::types::Type,
                out: &mut ::tokio_postgres::types::private::BytesMut,
            ) -> Result<
                ::tokio_postgres::types::IsNull,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                <$inner as ::tokio_postgres::types::ToSql>::to_sql(
                    &self.0, ty, out,
                )
            }
        }
    };
}

/// Stores a `#[repr(u8)]` enum as an `INT2` column.
macro_rules! sql_repr_enum {
    ($ty:ident, $what:literal) => {
        impl ::tokio_postgres::types::FromSql<'_> for $ty {
            ::tokio_postgres::types::accepts!(INT2);

            fn from_sql(
                ty: &::tokio_postgres::types::Type,
                raw: &[u8],
            ) -> Result<Self, Box<dyn ::std::error::Error + Sync + Send>>
            {
                let repr = <i16 as ::tokio_postgres::types::FromSql>::from_sql(
                    ty, raw,
                )?;
                let repr = u8::try_from(repr)?;
                let value = Self::try_from(repr).map_err(|_| $what)?;
                Ok(value)
            }
        }

        impl ::tokio_postgres::types::ToSql for $ty {
            ::tokio_postgres::types::accepts!(INT2);

            ::tokio_postgres::types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &::tokio_postgres::types::Type,
                out: &mut ::tokio_postgres::types::private::BytesMut,
            ) -> Result<
                ::tokio_postgres::types::IsNull,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                let repr = i16::from((*self) as u8);
                <i16 as ::tokio_postgres::types::ToSql>::to_sql(&repr, ty, out)
            }
        }
    };
}

pub mod catalog;
pub mod customer;
#[cfg(test)]
pub(crate) mod memory;
pub mod ticket;
pub mod trip;
pub mod user;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio_postgres::{tls::NoTlsStream, NoTls, Socket};

use crate::config;

pub use tokio_postgres::Error;

pub use self::{
    catalog::{BoardingLocation, City, Driver},
    customer::Customer,
    ticket::Ticket,
    trip::Trip,
    user::User,
};

pub type Connection = tokio_postgres::Connection<Socket, NoTlsStream>;

pub async fn connect(
    config: config::Db,
) -> Result<(Client, Connection), Error> {
    tokio_postgres::connect(&config.url, NoTls)
        .await
        .map(|(client, connection)| (Client(RwLock::new(client)), connection))
}

/// Shared database connection.
///
/// Plain reads share the connection. A [`Session`] takes it exclusively,
/// which is required to open a [`Transaction`].
pub struct Client(RwLock<tokio_postgres::Client>);

impl Client {
    pub async fn session(&self) -> Session<'_> {
        Session(self.0.write().await)
    }
}

pub struct Session<'a>(RwLockWriteGuard<'a, tokio_postgres::Client>);

impl Session<'_> {
    pub async fn transaction(&mut self) -> Result<Transaction<'_>, Error> {
        self.0.transaction().await.map(Transaction)
    }
}

/// Postgres transaction. Dropping it without [`Tx::commit`] rolls back.
pub struct Transaction<'a>(tokio_postgres::Transaction<'a>);

/// Everything the ticket lifecycle and the trip aggregator need from the
/// store, scoped to a single transaction.
#[async_trait]
pub trait Tx: Send {
    async fn customer(
        &mut self,
        id: customer::Id,
    ) -> Result<Option<Customer>, Error>;

    async fn driver(
        &mut self,
        id: catalog::DriverId,
    ) -> Result<Option<Driver>, Error>;

    async fn boarding_location(
        &mut self,
        id: catalog::LocationId,
    ) -> Result<Option<BoardingLocation>, Error>;

    /// Allocates the next ticket number, never below `floor`.
    async fn next_ticket_number(
        &mut self,
        floor: ticket::Number,
    ) -> Result<ticket::Number, Error>;

    /// Fetches a ticket and locks it until the transaction ends.
    async fn ticket_for_update(
        &mut self,
        id: ticket::Id,
    ) -> Result<Option<Ticket>, Error>;

    async fn write_ticket(&mut self, ticket: &Ticket) -> Result<(), Error>;

    /// Marks every issued ticket of the trip as utilized.
    async fn utilize_tickets(&mut self, key: &trip::Key) -> Result<u64, Error>;

    /// Count and price sum of the non-cancelled tickets of the trip.
    async fn live_totals(
        &mut self,
        key: &trip::Key,
    ) -> Result<trip::Tally, Error>;

    async fn passengers(
        &mut self,
        key: &trip::Key,
    ) -> Result<Vec<trip::Passenger>, Error>;

    async fn trip_for_update(
        &mut self,
        key: &trip::Key,
    ) -> Result<Option<Trip>, Error>;

    /// Adds `delta` to the trip, creating it when absent. The flag tells
    /// whether the row was created.
    async fn add_to_trip(
        &mut self,
        key: &trip::Key,
        delta: trip::Delta,
        agent: user::Id,
    ) -> Result<(Trip, bool), Error>;

    /// Adds `delta` to an existing trip. `None` when there is no such trip.
    async fn shift_trip(
        &mut self,
        key: &trip::Key,
        delta: trip::Delta,
    ) -> Result<Option<Trip>, Error>;

    async fn write_trip(&mut self, trip: &Trip) -> Result<(), Error>;

    async fn delete_trip(&mut self, key: &trip::Key) -> Result<(), Error>;

    async fn commit(self) -> Result<(), Error>;
}

#[async_trait]
impl<'a> Tx for Transaction<'a> {
    async fn customer(
        &mut self,
        id: customer::Id,
    ) -> Result<Option<Customer>, Error> {
        customer::fetch(&self.0, id).await
    }

    async fn driver(
        &mut self,
        id: catalog::DriverId,
    ) -> Result<Option<Driver>, Error> {
        catalog::fetch_driver(&self.0, id).await
    }

    async fn boarding_location(
        &mut self,
        id: catalog::LocationId,
    ) -> Result<Option<BoardingLocation>, Error> {
        catalog::fetch_location(&self.0, id).await
    }

    async fn next_ticket_number(
        &mut self,
        floor: ticket::Number,
    ) -> Result<ticket::Number, Error> {
        ticket::next_number(&self.0, floor).await
    }

    async fn ticket_for_update(
        &mut self,
        id: ticket::Id,
    ) -> Result<Option<Ticket>, Error> {
        ticket::fetch_for_update(&self.0, id).await
    }

    async fn write_ticket(&mut self, ticket: &Ticket) -> Result<(), Error> {
        ticket::write(&self.0, ticket).await
    }

    async fn utilize_tickets(&mut self, key: &trip::Key) -> Result<u64, Error> {
        ticket::utilize(&self.0, key).await
    }

    async fn live_totals(
        &mut self,
        key: &trip::Key,
    ) -> Result<trip::Tally, Error> {
        ticket::live_totals(&self.0, key).await
    }

    async fn passengers(
        &mut self,
        key: &trip::Key,
    ) -> Result<Vec<trip::Passenger>, Error> {
        trip::passengers(&self.0, key).await
    }

    async fn trip_for_update(
        &mut self,
        key: &trip::Key,
    ) -> Result<Option<Trip>, Error> {
        trip::fetch_for_update(&self.0, key).await
    }

    async fn add_to_trip(
        &mut self,
        key: &trip::Key,
        delta: trip::Delta,
        agent: user::Id,
    ) -> Result<(Trip, bool), Error> {
        trip::upsert(&self.0, key, delta, agent).await
    }

    async fn shift_trip(
        &mut self,
        key: &trip::Key,
        delta: trip::Delta,
    ) -> Result<Option<Trip>, Error> {
        trip::shift(&self.0, key, delta).await
    }

    async fn write_trip(&mut self, trip: &Trip) -> Result<(), Error> {
        trip::write(&self.0, trip).await
    }

    async fn delete_trip(&mut self, key: &trip::Key) -> Result<(), Error> {
        trip::delete(&self.0, key).await
    }

    async fn commit(self) -> Result<(), Error> {
        self.0.commit().await
    }
}
