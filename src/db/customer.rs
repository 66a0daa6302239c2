use constcat::concat;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{types::ToSql, Error, GenericClient, Row};

use super::Client;
use crate::error::Invalid;

/// A registered passenger.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Id,
    pub name: String,
    pub phone: String,
    pub city: String,
    pub district: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

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
pub struct Id(i32);

impl From<i32> for Id {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

sql_newtype!(Id, i32, INT4);

/// Fields of a customer that are set on registration or edited later.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub phone: String,
    pub city: String,
    pub district: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
}

impl Profile {
    /// Checks the fields required to register or keep a customer.
    pub fn check(&self) -> Result<(), Invalid> {
        if self.name.trim().chars().count() < 3 {
            return Err(Invalid::Field("name must have at least 3 characters"));
        }
        if !(8..=20).contains(&self.phone.trim().chars().count()) {
            return Err(Invalid::Field("phone must have 8 to 20 characters"));
        }
        if self.city.trim().is_empty() {
            return Err(Invalid::Field("city is required"));
        }
        Ok(())
    }
}

const COLUMNS: &str = "id, name, phone, city, district, address, \
                       postal_code, active, created_at, updated_at";

const SELECT: &str = concat!("SELECT ", COLUMNS, " FROM customers");

fn from_row(row: &Row) -> Customer {
    Customer {
        id: row.get("id"),
        name: row.get("name"),
        phone: row.get("phone"),
        city: row.get("city"),
        district: row.get("district"),
        address: row.get("address"),
        postal_code: row.get("postal_code"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) async fn fetch(
    client: &impl GenericClient,
    id: Id,
) -> Result<Option<Customer>, Error> {
    const SQL: &str = concat!(SELECT, " WHERE id = $1");
    Ok(client.query_opt(SQL, &[&id]).await?.as_ref().map(from_row))
}

/// `ILIKE` pattern matching `query` literally anywhere in the column.
fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Client {
    pub async fn get_customer_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Customer>, Error> {
        fetch(&*self.0.read().await, id).await
    }

    /// Active customers whose name or phone contains `query`, by name.
    pub async fn search_customers(
        &self,
        query: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Customer>, usize), Error> {
        let pattern = contains_pattern(query.unwrap_or_default());
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        const PAGE_SQL: &str = concat!(
            SELECT,
            " WHERE active \
                AND (name ILIKE $1 ESCAPE '\\' OR phone ILIKE $1 ESCAPE '\\') \
              ORDER BY lower(name), id \
              OFFSET $2 LIMIT $3"
        );
        const COUNT_SQL: &str = "\
            SELECT COUNT(*) \
            FROM customers \
            WHERE active \
              AND (name ILIKE $1 ESCAPE '\\' OR phone ILIKE $1 ESCAPE '\\')";

        let page_params: [&(dyn ToSql + Sync); 3] = [&pattern, &offset, &limit];
        let count_params: [&(dyn ToSql + Sync); 1] = [&pattern];
        let client = self.0.read().await;
        let (rows, count) = tokio::try_join!(
            client.query(PAGE_SQL, &page_params),
            client.query_one(COUNT_SQL, &count_params),
        )?;
        let total = usize::try_from(count.get::<_, i64>(0)).unwrap_or_default();

        Ok((rows.iter().map(from_row).collect(), total))
    }

    pub async fn add_customer(
        &self,
        profile: &Profile,
    ) -> Result<Customer, Error> {
        const SQL: &str = concat!(
            "INSERT INTO customers (name, phone, city, district, address, \
                                    postal_code) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING ",
            COLUMNS
        );
        let row = self
            .0
            .read()
            .await
            .query_one(
                SQL,
                &[
                    &profile.name,
                    &profile.phone,
                    &profile.city,
                    &profile.district,
                    &profile.address,
                    &profile.postal_code,
                ],
            )
            .await?;
        Ok(from_row(&row))
    }

    pub async fn write_customer(&self, customer: &Customer) -> Result<(), Error> {
        const SQL: &str = "\
            UPDATE customers \
            SET name = $2, phone = $3, city = $4, district = $5, \
                address = $6, postal_code = $7, active = $8, \
                updated_at = now() \
            WHERE id = $1";
        self.0
            .read()
            .await
            .execute(
                SQL,
                &[
                    &customer.id,
                    &customer.name,
                    &customer.phone,
                    &customer.city,
                    &customer.district,
                    &customer.address,
                    &customer.postal_code,
                    &customer.active,
                ],
            )
            .await
            .map(drop)
    }
}
