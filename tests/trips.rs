pub mod common;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use van_office::api::{self, trip::Change};

#[tokio::test]
async fn lists_manifest_by_customer_name() {
    let bob = common::Client::new().auth("bob", "password").await;
    let key = common::fresh_key(7);
    bob.issue_ticket(3, 1, &key, "cash").await.unwrap();
    bob.issue_ticket(1, 2, &key, "card").await.unwrap();
    let cancelled = bob.issue_ticket(2, 1, &key, "cash").await.unwrap();
    bob.cancel_ticket(cancelled.ticket.id, "").await.unwrap();

    let manifest = bob.manifest(&key).await.unwrap();

    let names = manifest
        .passengers
        .iter()
        .map(|p| p.customer_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, ["Ana Souza", "Carla Dias"]);
    assert_eq!(manifest.passenger_count, 2);
    assert_eq!(manifest.revenue, Decimal::new(10550, 2));
    assert_eq!(
        bob.trip(&key).await.unwrap().trip.revenue,
        manifest.revenue,
    );
}

#[tokio::test]
async fn departs_exactly_once() {
    let bob = common::Client::new().auth("bob", "password").await;
    let key = common::fresh_key(3);
    let issued = bob.issue_ticket(1, 1, &key, "cash").await.unwrap();

    let status = bob.trip_document(&key).await.unwrap_err();
    assert_eq!(status, StatusCode::CONFLICT);

    let departure = bob.depart(&key).await.unwrap();
    assert_eq!(departure.utilized, 1);
    assert_eq!(departure.trip.status, api::trip::Status::Departed);
    assert_eq!(departure.trip.departed_by, Some(api::user::Id::from(2)));
    assert_eq!(departure.manifest.passenger_count, 1);

    let ticket = bob.get_ticket(issued.ticket.id).await.unwrap();
    assert_eq!(ticket.status, api::ticket::Status::Utilized);

    let status = bob.depart(&key).await.unwrap_err();
    assert_eq!(status, StatusCode::CONFLICT);

    let status = bob.issue_ticket(2, 1, &key, "cash").await.unwrap_err();
    assert_eq!(status, StatusCode::CONFLICT);

    let status = bob.cancel_ticket(issued.ticket.id, "").await.unwrap_err();
    assert_eq!(status, StatusCode::CONFLICT);

    let text = bob.trip_document(&key).await.unwrap();
    assert!(text.starts_with("MANIFEST "));
    assert!(text.contains("Ana Souza"));
}

#[tokio::test]
async fn departing_unknown_trip_is_not_found() {
    let bob = common::Client::new().auth("bob", "password").await;
    let status = bob.depart(&common::fresh_key(8)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rolls_back_transfer_into_departed_trip() {
    let bob = common::Client::new().auth("bob", "password").await;
    let from = common::fresh_key(7);
    let to = common::fresh_key(8);
    let moving = bob.issue_ticket(1, 1, &from, "cash").await.unwrap();
    bob.issue_ticket(2, 1, &to, "cash").await.unwrap();
    bob.depart(&to).await.unwrap();

    let status = bob
        .transfer_ticket(moving.ticket.id, &to)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(bob.trip(&from).await.unwrap().trip.passenger_count, 1);
    assert_eq!(bob.trip(&to).await.unwrap().trip.passenger_count, 1);
    let ticket = bob.get_ticket(moving.ticket.id).await.unwrap();
    assert_eq!(ticket.date, from.date);
    assert_eq!(ticket.original, None);
}

#[tokio::test]
async fn only_admins_reconcile() {
    let key = common::fresh_key(7);
    let bob = common::Client::new().auth("bob", "password").await;
    bob.issue_ticket(1, 1, &key, "cash").await.unwrap();

    let status = bob.reconcile(&key).await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    let alice = common::Client::new().auth("alice", "password").await;
    let change = alice.reconcile(&key).await.unwrap();
    assert!(matches!(
        change,
        Change::Updated(ref trip) if trip.passenger_count == 1
    ));
}

#[tokio::test]
async fn concurrent_sales_share_one_new_trip() {
    let bob = common::Client::new().auth("bob", "password").await;
    let key = common::fresh_key(3);

    let (first, second) = tokio::join!(
        bob.issue_ticket(1, 1, &key, "cash"),
        bob.issue_ticket(2, 2, &key, "card"),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    let created = [&first.trip, &second.trip]
        .into_iter()
        .filter(|change| matches!(change, Change::Created(_)))
        .count();
    let updated = [&first.trip, &second.trip]
        .into_iter()
        .filter(|change| matches!(change, Change::Updated(_)))
        .count();
    assert_eq!((created, updated), (1, 1));
    assert_ne!(first.ticket.number, second.ticket.number);

    let trip = bob.trip(&key).await.unwrap().trip;
    assert_eq!(trip.passenger_count, 2);
    assert_eq!(trip.revenue, Decimal::new(10550, 2));
}
