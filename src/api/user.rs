use serde::{Deserialize, Serialize};

pub use crate::db::user::{Id, Role};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub role: Role,
}

impl From<crate::db::User> for User {
    fn from(user: crate::db::User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            role: user.role,
        }
    }
}
