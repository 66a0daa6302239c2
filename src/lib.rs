pub mod api;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod report;
pub mod trip;

pub use self::{config::Config, error::Error};
