pub mod common;

use reqwest::StatusCode;
use serde_json::Value;

fn date_of(key: &van_office::db::trip::Key) -> String {
    common::key_json(key)["date"]
        .as_str()
        .expect("date is a string")
        .to_string()
}

#[tokio::test]
async fn daily_report_counts_live_tickets_only() {
    let bob = common::Client::new().auth("bob", "password").await;
    let key = common::fresh_key(7);
    let day = date_of(&key);
    let before = bob
        .report("/report/daily", &[("date", day.clone())])
        .await
        .unwrap();

    bob.issue_ticket(1, 1, &key, "cash").await.unwrap();
    let cancelled = bob.issue_ticket(2, 1, &key, "cash").await.unwrap();
    bob.cancel_ticket(cancelled.ticket.id, "").await.unwrap();

    let after = bob
        .report("/report/daily", &[("date", day)])
        .await
        .unwrap();
    let count = |report: &Value| report["passengerCount"].as_i64().unwrap();
    assert_eq!(count(&after) - count(&before), 1);
    assert_eq!(
        after["tripCount"].as_u64().unwrap(),
        before["tripCount"].as_u64().unwrap() + 1,
    );
}

#[tokio::test]
async fn period_report_rejects_reversed_range() {
    let bob = common::Client::new().auth("bob", "password").await;
    let status = bob
        .report(
            "/report/period",
            &[
                ("start", "2024-06-02".to_string()),
                ("end", "2024-06-01".to_string()),
            ],
        )
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn period_report_groups_sales() {
    let bob = common::Client::new().auth("bob", "password").await;
    let key = common::fresh_key(8);
    let day = date_of(&key);
    bob.issue_ticket(3, 3, &key, "pix").await.unwrap();

    let report = bob
        .report("/report/period", &[("start", day.clone()), ("end", day)])
        .await
        .unwrap();

    let tickets = report["tickets"].as_array().unwrap();
    assert!(tickets.iter().any(|t| t["customerName"] == "Carla Dias"));
    assert!(report["byDriver"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["driverName"] == "Eduardo Alves"));
    assert!(report["byPaymentMethod"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["paymentMethod"] == "INSTANT_TRANSFER"));
}

#[tokio::test]
async fn driver_report_needs_known_driver() {
    let bob = common::Client::new().auth("bob", "password").await;
    let key = common::fresh_key(3);
    let day = date_of(&key);
    bob.issue_ticket(1, 2, &key, "cash").await.unwrap();

    let report = bob
        .report(
            "/report/driver/3",
            &[("start", day.clone()), ("end", day.clone())],
        )
        .await
        .unwrap();
    assert_eq!(report["driver"]["name"], "Carlos Pereira");
    assert!(report["tripCount"].as_u64().unwrap() >= 1);

    let status = bob
        .report("/report/driver/999999", &[("start", day.clone()), ("end", day)])
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_counts_the_day() {
    let bob = common::Client::new().auth("bob", "password").await;
    let key = common::fresh_key(7);
    let day = date_of(&key);
    let before = bob
        .report("/report/dashboard", &[("date", day.clone())])
        .await
        .unwrap();

    bob.issue_ticket(1, 1, &key, "cash").await.unwrap();
    bob.issue_ticket(2, 1, &key, "card").await.unwrap();

    let after = bob
        .report("/report/dashboard", &[("date", day.clone())])
        .await
        .unwrap();
    let passengers =
        |report: &Value| report["today"]["passengerCount"].as_u64().unwrap();
    assert_eq!(passengers(&after) - passengers(&before), 2);
    assert_eq!(after["date"], day);
    assert!(after["latestTrips"].as_array().unwrap().len() <= 5);
    assert!(after["paymentMethods"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["paymentMethod"] == "CASH"));
    assert!(
        after["month"]["passengerCount"].as_u64().unwrap()
            >= passengers(&after)
    );
}
