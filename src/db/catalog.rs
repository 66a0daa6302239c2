//! Reference data: cities, boarding locations, owners and their drivers.

use constcat::concat;
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_postgres::{Error, GenericClient, Row};

use super::Client;

macro_rules! serial_id {
    ($($name:ident),+ $(,)?) => {$(
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
        pub struct $name(i32);

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        sql_newtype!($name, i32, INT4);
    )+};
}

serial_id!(CityId, LocationId, OwnerId, DriverId);

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub position: i32,
}

/// A pickup point with the fare charged from it.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardingLocation {
    pub id: LocationId,
    pub city_id: CityId,
    pub city_name: String,
    pub name: String,
    pub price: Decimal,
    pub active: bool,
}

/// A van driver together with the owner of the van.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub owner_id: OwnerId,
    pub owner_name: String,
    pub seats: i32,
    pub active: bool,
}

const SELECT_LOCATION: &str = "\
    SELECT l.id, l.city_id, c.name AS city_name, l.name, l.price, l.active \
    FROM boarding_locations l \
    JOIN cities c ON c.id = l.city_id";

const SELECT_DRIVER: &str = "\
    SELECT d.id, d.name, d.owner_id, o.name AS owner_name, d.seats, d.active \
    FROM drivers d \
    JOIN owners o ON o.id = d.owner_id";

fn location_from_row(row: &Row) -> BoardingLocation {
    BoardingLocation {
        id: row.get("id"),
        city_id: row.get("city_id"),
        city_name: row.get("city_name"),
        name: row.get("name"),
        price: row.get("price"),
        active: row.get("active"),
    }
}

fn driver_from_row(row: &Row) -> Driver {
    Driver {
        id: row.get("id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        owner_name: row.get("owner_name"),
        seats: row.get("seats"),
        active: row.get("active"),
    }
}

pub(super) async fn fetch_location(
    client: &impl GenericClient,
    id: LocationId,
) -> Result<Option<BoardingLocation>, Error> {
    const SQL: &str = concat!(SELECT_LOCATION, " WHERE l.id = $1");
    Ok(client
        .query_opt(SQL, &[&id])
        .await?
        .as_ref()
        .map(location_from_row))
}

pub(super) async fn fetch_driver(
    client: &impl GenericClient,
    id: DriverId,
) -> Result<Option<Driver>, Error> {
    const SQL: &str = concat!(SELECT_DRIVER, " WHERE d.id = $1");
    Ok(client.query_opt(SQL, &[&id]).await?.as_ref().map(driver_from_row))
}

impl Client {
    pub async fn get_cities(&self) -> Result<Vec<City>, Error> {
        const SQL: &str = "SELECT id, name, position \
                           FROM cities \
                           ORDER BY position, name";
        Ok(self
            .0
            .read()
            .await
            .query(SQL, &[])
            .await?
            .into_iter()
            .map(|row| City {
                id: row.get("id"),
                name: row.get("name"),
                position: row.get("position"),
            })
            .collect())
    }

    pub async fn get_locations_by_city(
        &self,
        city: CityId,
    ) -> Result<Vec<BoardingLocation>, Error> {
        const SQL: &str = concat!(
            SELECT_LOCATION,
            " WHERE l.city_id = $1 AND l.active ORDER BY l.name"
        );
        Ok(self
            .0
            .read()
            .await
            .query(SQL, &[&city])
            .await?
            .iter()
            .map(location_from_row)
            .collect())
    }

    pub async fn get_drivers(&self) -> Result<Vec<Driver>, Error> {
        const SQL: &str =
            concat!(SELECT_DRIVER, " WHERE d.active ORDER BY d.name");
        Ok(self
            .0
            .read()
            .await
            .query(SQL, &[])
            .await?
            .iter()
            .map(driver_from_row)
            .collect())
    }

    pub async fn get_driver_by_id(
        &self,
        id: DriverId,
    ) -> Result<Option<Driver>, Error> {
        fetch_driver(&*self.0.read().await, id).await
    }
}
