pub mod ticket;
pub mod trip;
pub mod user;

use serde::{Deserialize, Serialize};

pub use self::{ticket::Ticket, trip::Trip, user::User};

/// One page of a longer listing.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page: usize,
    pub limit: usize,
}

/// A rendered document embedded in a JSON response.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Printout {
    pub file_name: String,
    pub media_type: String,
    pub content: String,
}

impl From<crate::document::Document> for Printout {
    fn from(document: crate::document::Document) -> Self {
        Self {
            file_name: document.file_name,
            media_type: document.media_type.to_string(),
            content: String::from_utf8_lossy(&document.body).into_owned(),
        }
    }
}
