use constcat::concat;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use time::{macros::date, Duration, Time};
use uuid::Uuid;
use van_office::{api, db::trip::Key};

const BASE_URL: &str = "http://localhost:3000";

pub struct Client {
    inner: reqwest::Client,
    pub auth_token: Option<String>,
}

/// A trip key no other test run is likely to touch.
pub fn fresh_key(driver: i32) -> Key {
    let seed = Uuid::new_v4().as_u128();
    let days = i64::try_from(seed % 20_000).expect("small number of days");
    let minutes = u8::try_from((seed >> 64) % 60).expect("valid minute");
    let hours = u8::try_from((seed >> 96) % 24).expect("valid hour");
    Key {
        date: date!(2030 - 01 - 01) + Duration::days(days),
        time: Time::from_hms(hours, minutes, 0).expect("valid time"),
        driver: driver.into(),
    }
}

pub fn key_json(key: &Key) -> Value {
    serde_json::to_value(key).expect("key serializes")
}

impl Client {
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
            auth_token: None,
        }
    }

    pub async fn auth(mut self, login: &str, password: &str) -> Self {
        const URL: &str = concat!(BASE_URL, "/auth");

        self.auth_token = Some(
            self.inner
                .post(URL)
                .json(&json!({
                    "login": login,
                    "password": password,
                }))
                .send()
                .await
                .expect("failed to send a request")
                .error_for_status()
                .expect("wrong status code")
                .text()
                .await
                .expect("failed to get a response"),
        );

        self
    }

    async fn send<T: DeserializeOwned>(
        &self,
        mut req: RequestBuilder,
    ) -> Result<T, StatusCode> {
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<T>()
            .await
            .expect("failed to get a response"))
    }

    async fn fetch_text(&self, url: String) -> Result<String, StatusCode> {
        let mut req = self.inner.get(url);
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .text()
            .await
            .expect("failed to get a response"))
    }

    pub async fn user(&self) -> Result<api::User, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/user");
        self.send(self.inner.get(URL)).await
    }

    pub async fn add_customer(&self, body: Value) -> Result<Value, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/customer");
        self.send(self.inner.post(URL).json(&body)).await
    }

    pub async fn search_customers(&self, q: &str) -> Result<Value, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/customer");
        self.send(self.inner.get(URL).query(&[("q", q)])).await
    }

    pub async fn edit_customer(
        &self,
        id: i64,
        body: Value,
    ) -> Result<Value, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/customer");
        self.send(self.inner.patch(format!("{URL}/{id}")).json(&body))
            .await
    }

    pub async fn deactivate_customer(&self, id: i64) -> StatusCode {
        const URL: &str = concat!(BASE_URL, "/customer");

        let mut req = self.inner.delete(format!("{URL}/{id}"));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req.send().await.expect("failed to send a request").status()
    }

    pub async fn get_customer(&self, id: i64) -> Result<Value, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/customer");
        self.send(self.inner.get(format!("{URL}/{id}"))).await
    }

    pub async fn issue_ticket(
        &self,
        customer: i32,
        location: i32,
        key: &Key,
        payment_method: &str,
    ) -> Result<api::ticket::Issued, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/ticket");

        let mut body = key_json(key);
        body["customerId"] = json!(customer);
        body["boardingLocationId"] = json!(location);
        body["paymentMethod"] = json!(payment_method);
        self.send(self.inner.post(URL).json(&body)).await
    }

    pub async fn get_ticket(
        &self,
        id: api::ticket::Id,
    ) -> Result<api::Ticket, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/ticket");
        self.send(self.inner.get(format!("{URL}/{id}"))).await
    }

    pub async fn cancel_ticket(
        &self,
        id: api::ticket::Id,
        reason: &str,
    ) -> Result<api::ticket::Altered, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/ticket");
        self.send(self.inner.patch(format!("{URL}/{id}")).json(&json!({
            "op": "cancel",
            "data": {
                "reason": reason,
            }
        })))
        .await
    }

    pub async fn transfer_ticket(
        &self,
        id: api::ticket::Id,
        to: &Key,
    ) -> Result<api::ticket::Altered, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/ticket");
        self.send(self.inner.patch(format!("{URL}/{id}")).json(&json!({
            "op": "transfer",
            "data": key_json(to),
        })))
        .await
    }

    pub async fn ticket_document(
        &self,
        id: api::ticket::Id,
    ) -> Result<String, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/ticket");
        self.fetch_text(format!("{URL}/{id}/document")).await
    }

    pub async fn manifest(
        &self,
        key: &Key,
    ) -> Result<api::trip::Manifest, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/trip/manifest");
        self.send(self.inner.get(URL).query(&key_json(key))).await
    }

    pub async fn trips(
        &self,
        key: &Key,
    ) -> Result<Vec<api::trip::Listed>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/trip");
        let date = key_json(key)["date"].clone();
        self.send(self.inner.get(URL).query(&json!({
            "from": date,
            "to": date,
            "driverId": key.driver,
        })))
        .await
    }

    /// The trip at `key`, if the listing has it.
    pub async fn trip(&self, key: &Key) -> Option<api::trip::Listed> {
        self.trips(key)
            .await
            .expect("trips are listed")
            .into_iter()
            .find(|listed| listed.trip.key == *key)
    }

    pub async fn depart(
        &self,
        key: &Key,
    ) -> Result<api::trip::Departure, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/trip/depart");
        self.send(self.inner.post(URL).json(&key_json(key))).await
    }

    pub async fn trip_document(&self, key: &Key) -> Result<String, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/trip/document");
        let query = key_json(key);
        let url = format!(
            "{URL}?date={}&time={}&driverId={}",
            query["date"].as_str().expect("date"),
            query["time"].as_str().expect("time"),
            key.driver,
        );
        self.fetch_text(url).await
    }

    pub async fn reconcile(
        &self,
        key: &Key,
    ) -> Result<api::trip::Change, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/trip/reconcile");
        self.send(self.inner.post(URL).json(&key_json(key))).await
    }

    pub async fn report(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, StatusCode> {
        self.send(self.inner.get(format!("{BASE_URL}{path}")).query(query))
            .await
    }
}
