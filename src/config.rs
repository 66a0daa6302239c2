use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,
    #[serde(default)]
    pub tickets: Tickets,
}

#[derive(Deserialize)]
pub struct Db {
    pub url: String,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
}

/// Business settings of the ticket office.
#[derive(Clone, Debug, Deserialize)]
pub struct Tickets {
    /// Number given to the very first ticket ever issued.
    #[serde(default = "Tickets::default_first_number")]
    pub first_number: i32,

    /// Destination printed on every ticket.
    #[serde(default = "Tickets::default_destination")]
    pub destination: String,
}

impl Tickets {
    fn default_first_number() -> i32 {
        30000
    }

    fn default_destination() -> String {
        "Embu das Artes".to_string()
    }
}

impl Default for Tickets {
    fn default() -> Self {
        Self {
            first_number: Self::default_first_number(),
            destination: Self::default_destination(),
        }
    }
}
