//! Read-only projections over trips and sold tickets.
//!
//! Cancelled tickets never reach these builders: trips only count live
//! tickets and sales are queried without cancelled ones.

use futures::future;
use itertools::Itertools as _;
use rust_decimal::Decimal;
use serde::Serialize;
use time::{Date, Duration};

use crate::{
    db::{
        self,
        catalog::DriverId,
        ticket::{PaymentMethod, Sale},
        trip::{self, Key, Passenger},
        Driver,
    },
    error::{Error, Invalid, Missing},
};

/// Inclusive range of travel dates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Range {
    start: Date,
    end: Date,
}

impl Range {
    pub fn new(start: Date, end: Date) -> Result<Self, Invalid> {
        if start > end {
            return Err(Invalid::ReversedRange { start, end });
        }
        Ok(Self { start, end })
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    #[serde(with = "crate::format::date")]
    pub date: Date,
    pub trips: Vec<DailyTrip>,
    pub trip_count: usize,
    pub passenger_count: i64,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTrip {
    #[serde(flatten)]
    pub key: Key,
    pub driver_name: String,
    pub owner_name: String,
    pub seats: i32,
    pub status: trip::Status,
    pub passenger_count: i32,
    pub revenue: Decimal,
    pub passengers: Vec<Passenger>,
}

impl DailyReport {
    pub fn new(date: Date, trips: Vec<(trip::Listed, Vec<Passenger>)>) -> Self {
        let trips = trips
            .into_iter()
            .sorted_by(|(a, _), (b, _)| {
                (a.trip.key.time, &a.driver_name)
                    .cmp(&(b.trip.key.time, &b.driver_name))
            })
            .map(|(listed, passengers)| DailyTrip {
                key: listed.trip.key,
                driver_name: listed.driver_name,
                owner_name: listed.owner_name,
                seats: listed.seats,
                status: listed.trip.status,
                passenger_count: listed.trip.passenger_count,
                revenue: listed.trip.revenue,
                passengers,
            })
            .collect::<Vec<_>>();

        Self {
            date,
            trip_count: trips.len(),
            passenger_count: trips
                .iter()
                .map(|t| i64::from(t.passenger_count))
                .sum(),
            revenue: trips.iter().map(|t| t.revenue).sum(),
            trips,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodReport {
    #[serde(with = "crate::format::date")]
    pub start: Date,
    #[serde(with = "crate::format::date")]
    pub end: Date,
    pub tickets: Vec<Sale>,
    pub by_driver: Vec<DriverTotal>,
    pub by_payment_method: Vec<PaymentTotal>,
    pub ticket_count: usize,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverTotal {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub owner_name: String,
    pub ticket_count: usize,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTotal {
    pub payment_method: PaymentMethod,
    pub ticket_count: usize,
    pub revenue: Decimal,
}

impl PeriodReport {
    pub fn new(range: Range, tickets: Vec<Sale>) -> Self {
        let by_driver = tickets
            .iter()
            .sorted_by(|a, b| {
                (&a.driver_name, a.driver).cmp(&(&b.driver_name, b.driver))
            })
            .chunk_by(|sale| sale.driver)
            .into_iter()
            .filter_map(|(driver_id, sales)| {
                let sales = sales.collect::<Vec<_>>();
                let first = sales.first()?;
                Some(DriverTotal {
                    driver_id,
                    driver_name: first.driver_name.clone(),
                    owner_name: first.owner_name.clone(),
                    ticket_count: sales.len(),
                    revenue: sales.iter().map(|s| s.price).sum(),
                })
            })
            .collect();

        let by_payment_method = tickets
            .iter()
            .into_group_map_by(|sale| sale.payment_method)
            .into_iter()
            .sorted_by_key(|(method, _)| *method)
            .map(|(payment_method, sales)| PaymentTotal {
                payment_method,
                ticket_count: sales.len(),
                revenue: sales.iter().map(|s| s.price).sum(),
            })
            .collect();

        Self {
            start: range.start,
            end: range.end,
            ticket_count: tickets.len(),
            revenue: tickets.iter().map(|s| s.price).sum(),
            by_driver,
            by_payment_method,
            tickets,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverReport {
    pub driver: Driver,
    #[serde(with = "crate::format::date")]
    pub start: Date,
    #[serde(with = "crate::format::date")]
    pub end: Date,
    pub trips: Vec<DriverTrip>,
    pub trip_count: usize,
    pub passenger_count: usize,
    pub revenue: Decimal,
}

/// The driver's tickets sharing one departure.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverTrip {
    #[serde(with = "crate::format::date")]
    pub date: Date,
    #[serde(with = "crate::format::clock")]
    pub time: time::Time,
    pub passenger_count: usize,
    pub revenue: Decimal,
    pub tickets: Vec<Sale>,
}

impl DriverReport {
    pub fn new(driver: Driver, range: Range, tickets: Vec<Sale>) -> Self {
        let trips = tickets
            .into_iter()
            .filter(|sale| sale.driver == driver.id)
            .sorted_by(|a, b| {
                (a.date, a.time, &a.customer_name, a.number)
                    .cmp(&(b.date, b.time, &b.customer_name, b.number))
            })
            .chunk_by(|sale| (sale.date, sale.time))
            .into_iter()
            .map(|((date, time), sales)| {
                let tickets = sales.collect::<Vec<_>>();
                DriverTrip {
                    date,
                    time,
                    passenger_count: tickets.len(),
                    revenue: tickets.iter().map(|s| s.price).sum(),
                    tickets,
                }
            })
            .collect::<Vec<_>>();

        Self {
            driver,
            start: range.start,
            end: range.end,
            trip_count: trips.len(),
            passenger_count: trips.iter().map(|t| t.passenger_count).sum(),
            revenue: trips.iter().map(|t| t.revenue).sum(),
            trips,
        }
    }
}

/// Office overview around a reference date: running totals for the day,
/// its week (from Monday) and its month, the latest trips, the busiest
/// drivers of the month and the day's payment split.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(with = "crate::format::date")]
    pub date: Date,
    pub today: Totals,
    pub week: Totals,
    pub month: Totals,
    pub latest_trips: Vec<LatestTrip>,
    pub top_drivers: Vec<TopDriver>,
    pub payment_methods: Vec<PaymentShare>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub passenger_count: usize,
    pub revenue: Decimal,
    pub trip_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestTrip {
    #[serde(flatten)]
    pub key: Key,
    pub driver_name: String,
    pub owner_name: String,
    pub status: trip::Status,
    pub passenger_count: i32,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopDriver {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub owner_name: String,
    pub passenger_count: i64,
    pub trip_count: usize,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentShare {
    pub payment_method: PaymentMethod,
    pub ticket_count: usize,
    pub revenue: Decimal,
    /// Share of the day's tickets, in percent with two decimals.
    pub percentage: Decimal,
}

impl Dashboard {
    pub const LATEST_TRIPS: usize = 5;
    pub const TOP_DRIVERS: usize = 5;

    /// First day of the week of `date`, weeks starting on Monday.
    pub fn week_start(date: Date) -> Date {
        date - Duration::days(i64::from(
            date.weekday().number_days_from_monday(),
        ))
    }

    pub fn month_start(date: Date) -> Date {
        date - Duration::days(i64::from(date.day()) - 1)
    }

    /// Earliest travel date any section looks at.
    pub fn first_day(date: Date) -> Date {
        Self::week_start(date).min(Self::month_start(date))
    }

    /// Builds the overview from the live sales and the trips between
    /// [`Dashboard::first_day`] and `date`, plus the latest trips.
    pub fn new(
        date: Date,
        sales: &[Sale],
        trips: &[trip::Listed],
        latest: Vec<trip::Listed>,
    ) -> Self {
        let totals_since = |start: Date| {
            let sold = sales
                .iter()
                .filter(|s| (start..=date).contains(&s.date))
                .collect::<Vec<_>>();
            Totals {
                passenger_count: sold.len(),
                revenue: sold.iter().map(|s| s.price).sum(),
                trip_count: trips
                    .iter()
                    .filter(|t| (start..=date).contains(&t.trip.key.date))
                    .count(),
            }
        };
        let month_start = Self::month_start(date);

        let top_drivers = trips
            .iter()
            .filter(|t| (month_start..=date).contains(&t.trip.key.date))
            .into_group_map_by(|t| t.trip.key.driver)
            .into_iter()
            .filter_map(|(driver_id, trips)| {
                let first = trips.first()?;
                Some(TopDriver {
                    driver_id,
                    driver_name: first.driver_name.clone(),
                    owner_name: first.owner_name.clone(),
                    passenger_count: trips
                        .iter()
                        .map(|t| i64::from(t.trip.passenger_count))
                        .sum(),
                    trip_count: trips.len(),
                    revenue: trips.iter().map(|t| t.trip.revenue).sum(),
                })
            })
            .sorted_by(|a, b| {
                b.passenger_count
                    .cmp(&a.passenger_count)
                    .then_with(|| a.driver_name.cmp(&b.driver_name))
            })
            .take(Self::TOP_DRIVERS)
            .collect();

        let today = sales.iter().filter(|s| s.date == date).collect::<Vec<_>>();
        let payment_methods = today
            .iter()
            .into_group_map_by(|s| s.payment_method)
            .into_iter()
            .map(|(payment_method, sold)| PaymentShare {
                payment_method,
                ticket_count: sold.len(),
                revenue: sold.iter().map(|s| s.price).sum(),
                percentage: (Decimal::from(sold.len() * 100)
                    / Decimal::from(today.len()))
                .round_dp(2),
            })
            .sorted_by(|a, b| {
                b.ticket_count
                    .cmp(&a.ticket_count)
                    .then_with(|| a.payment_method.cmp(&b.payment_method))
            })
            .collect();

        Self {
            date,
            today: totals_since(date),
            week: totals_since(Self::week_start(date)),
            month: totals_since(month_start),
            latest_trips: latest
                .into_iter()
                .take(Self::LATEST_TRIPS)
                .map(|listed| LatestTrip {
                    key: listed.trip.key,
                    driver_name: listed.driver_name,
                    owner_name: listed.owner_name,
                    status: listed.trip.status,
                    passenger_count: listed.trip.passenger_count,
                    revenue: listed.trip.revenue,
                })
                .collect(),
            top_drivers,
            payment_methods,
        }
    }
}

pub async fn dashboard(
    client: &db::Client,
    date: Date,
) -> Result<Dashboard, Error> {
    let first_day = Dashboard::first_day(date);
    let (sales, trips, latest) = tokio::try_join!(
        client.get_sales(first_day, date, None),
        client.get_trips(Some(first_day), Some(date), None),
        client.get_latest_trips(date, Dashboard::LATEST_TRIPS as i64),
    )?;
    Ok(Dashboard::new(date, &sales, &trips, latest))
}

pub async fn daily(client: &db::Client, date: Date) -> Result<DailyReport, Error> {
    let listed = client.get_trips(Some(date), Some(date), None).await?;
    let trips = future::try_join_all(listed.into_iter().map(|listed| async move {
        let passengers = client.get_passengers(&listed.trip.key).await?;
        Ok::<_, db::Error>((listed, passengers))
    }))
    .await?;
    Ok(DailyReport::new(date, trips))
}

pub async fn period(
    client: &db::Client,
    range: Range,
) -> Result<PeriodReport, Error> {
    let sales = client.get_sales(range.start, range.end, None).await?;
    Ok(PeriodReport::new(range, sales))
}

pub async fn driver(
    client: &db::Client,
    id: DriverId,
    range: Range,
) -> Result<DriverReport, Error> {
    let driver = client
        .get_driver_by_id(id)
        .await?
        .ok_or(Missing::Driver)?;
    let sales = client.get_sales(range.start, range.end, Some(id)).await?;
    Ok(DriverReport::new(driver, range, sales))
}
