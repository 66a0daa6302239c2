use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use tokio_postgres::{Error, Row};
use uuid::Uuid;

use super::Client;

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub role: Role,
    pub login: String,
    pub password_hash: PasswordHash,
    pub active: bool,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct Id(Uuid);

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

sql_newtype!(Id, Uuid, UUID);

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, TryFromRepr, PartialEq, Serialize,
)]
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Manages the office and may repair derived data.
    Admin = 1,

    /// Sells tickets and dispatches trips.
    Attendant = 2,
}

sql_repr_enum!(Role, "invalid role");

/// Bcrypt hash of a user password.
#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    #[cfg(test)]
    pub fn new(secret: &str) -> Result<Self, bcrypt::BcryptError> {
        bcrypt::hash(secret, bcrypt::DEFAULT_COST).map(Self)
    }

    /// Malformed stored hashes never match.
    pub fn verify(&self, secret: &str) -> bool {
        bcrypt::verify(secret, &self.0).unwrap_or(false)
    }
}

sql_newtype!(PasswordHash, String, TEXT);

fn from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        login: row.get("login"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        active: row.get("active"),
    }
}

impl Client {
    pub async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash, role, active \
                           FROM users \
                           WHERE login = $1 \
                           LIMIT 1";
        Ok(self
            .0
            .read()
            .await
            .query_opt(SQL, &[&login])
            .await?
            .as_ref()
            .map(from_row))
    }

    pub async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash, role, active \
                           FROM users \
                           WHERE id = $1 \
                           LIMIT 1";
        Ok(self
            .0
            .read()
            .await
            .query_opt(SQL, &[&id])
            .await?
            .as_ref()
            .map(from_row))
    }
}
