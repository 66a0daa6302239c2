//! In-memory [`Tx`] used by unit tests. A transaction works on a copy of
//! the state and publishes it on commit.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use super::{
    catalog::{CityId, DriverId, LocationId, OwnerId},
    customer, ticket, trip, user, BoardingLocation, Customer, Driver, Error,
    Ticket, Trip, Tx,
};

#[derive(Clone, Debug, Default)]
pub struct State {
    pub customers: HashMap<customer::Id, Customer>,
    pub drivers: HashMap<DriverId, Driver>,
    pub locations: HashMap<LocationId, BoardingLocation>,
    pub tickets: Vec<Ticket>,
    pub trips: HashMap<trip::Key, Trip>,
    pub last_number: Option<ticket::Number>,
}

impl State {
    pub fn ticket(&self, id: ticket::Id) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == id)
    }

    fn live<'a>(
        &'a self,
        key: &'a trip::Key,
    ) -> impl Iterator<Item = &'a Ticket> + 'a {
        self.tickets.iter().filter(move |t| {
            t.key() == *key && t.status != ticket::Status::Cancelled
        })
    }
}

#[derive(Clone, Default)]
pub struct Store(Arc<Mutex<State>>);

impl Store {
    /// Two customers, drivers 3 and 7, a 60.00 and a 45.50 location.
    pub fn seeded() -> Self {
        let store = Self::default();
        store.add_customer(1, "Ana Souza", Some("Rua das Flores, 10"));
        store.add_customer(2, "Bruno Lima", None);
        store.add_driver(3, "Carlos");
        store.add_driver(7, "Diego");
        store.add_location(1, "Praça Central", Decimal::new(6000, 2));
        store.add_location(2, "Posto Shell", Decimal::new(4550, 2));
        store
    }

    pub fn begin(&self) -> MemoryTx {
        MemoryTx {
            shared: Arc::clone(&self.0),
            state: self.snapshot(),
        }
    }

    pub fn snapshot(&self) -> State {
        self.0.lock().unwrap().clone()
    }

    pub fn add_customer(&self, id: i32, name: &str, address: Option<&str>) {
        let now = OffsetDateTime::now_utc();
        self.0.lock().unwrap().customers.insert(
            id.into(),
            Customer {
                id: id.into(),
                name: name.to_string(),
                phone: "11 99999-0000".to_string(),
                city: "Embu das Artes".to_string(),
                district: None,
                address: address.map(str::to_string),
                postal_code: None,
                active: true,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn add_driver(&self, id: i32, name: &str) {
        self.0.lock().unwrap().drivers.insert(
            id.into(),
            Driver {
                id: id.into(),
                name: name.to_string(),
                owner_id: OwnerId::from(1),
                owner_name: "Owner".to_string(),
                seats: 14,
                active: true,
            },
        );
    }

    pub fn add_location(&self, id: i32, name: &str, price: Decimal) {
        self.0.lock().unwrap().locations.insert(
            id.into(),
            BoardingLocation {
                id: id.into(),
                city_id: CityId::from(1),
                city_name: "Itapecerica".to_string(),
                name: name.to_string(),
                price,
                active: true,
            },
        );
    }

    pub fn set_price(&self, id: i32, price: Decimal) {
        if let Some(location) =
            self.0.lock().unwrap().locations.get_mut(&id.into())
        {
            location.price = price;
        }
    }
}

pub struct MemoryTx {
    shared: Arc<Mutex<State>>,
    state: State,
}

#[async_trait]
impl Tx for MemoryTx {
    async fn customer(
        &mut self,
        id: customer::Id,
    ) -> Result<Option<Customer>, Error> {
        Ok(self.state.customers.get(&id).cloned())
    }

    async fn driver(&mut self, id: DriverId) -> Result<Option<Driver>, Error> {
        Ok(self.state.drivers.get(&id).cloned())
    }

    async fn boarding_location(
        &mut self,
        id: LocationId,
    ) -> Result<Option<BoardingLocation>, Error> {
        Ok(self.state.locations.get(&id).cloned())
    }

    async fn next_ticket_number(
        &mut self,
        floor: ticket::Number,
    ) -> Result<ticket::Number, Error> {
        let number = self
            .state
            .last_number
            .map_or(floor, |last| last.next().max(floor));
        self.state.last_number = Some(number);
        Ok(number)
    }

    async fn ticket_for_update(
        &mut self,
        id: ticket::Id,
    ) -> Result<Option<Ticket>, Error> {
        Ok(self.state.ticket(id).cloned())
    }

    async fn write_ticket(&mut self, ticket: &Ticket) -> Result<(), Error> {
        match self.state.tickets.iter_mut().find(|t| t.id == ticket.id) {
            Some(existing) => *existing = ticket.clone(),
            None => self.state.tickets.push(ticket.clone()),
        }
        Ok(())
    }

    async fn utilize_tickets(&mut self, key: &trip::Key) -> Result<u64, Error> {
        let mut count = 0;
        for ticket in &mut self.state.tickets {
            if ticket.key() == *key && ticket.status == ticket::Status::Issued {
                ticket.status = ticket::Status::Utilized;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn live_totals(
        &mut self,
        key: &trip::Key,
    ) -> Result<trip::Tally, Error> {
        Ok(self
            .state
            .live(key)
            .fold(trip::Tally::default(), |acc, t| trip::Tally {
                passengers: acc.passengers + 1,
                issued: acc.issued
                    + i64::from(t.status == ticket::Status::Issued),
                revenue: acc.revenue + t.price,
            }))
    }

    async fn passengers(
        &mut self,
        key: &trip::Key,
    ) -> Result<Vec<trip::Passenger>, Error> {
        let state = &self.state;
        let mut passengers = state
            .live(key)
            .map(|t| {
                let customer = &state.customers[&t.customer];
                let location = &state.locations[&t.boarding_location];
                trip::Passenger {
                    ticket_number: t.number,
                    customer_name: customer.name.clone(),
                    customer_phone: customer.phone.clone(),
                    boarding_location: location.name.clone(),
                    city: location.city_name.clone(),
                    price: t.price,
                    payment_method: t.payment_method,
                }
            })
            .collect::<Vec<_>>();
        passengers.sort_by(|a, b| {
            (&a.customer_name, a.ticket_number)
                .cmp(&(&b.customer_name, b.ticket_number))
        });
        Ok(passengers)
    }

    async fn trip_for_update(
        &mut self,
        key: &trip::Key,
    ) -> Result<Option<Trip>, Error> {
        Ok(self.state.trips.get(key).cloned())
    }

    async fn add_to_trip(
        &mut self,
        key: &trip::Key,
        delta: trip::Delta,
        agent: user::Id,
    ) -> Result<(Trip, bool), Error> {
        match self.state.trips.get_mut(key) {
            Some(trip) => {
                trip.passenger_count += delta.passengers;
                trip.revenue += delta.revenue;
                Ok((trip.clone(), false))
            }
            None => {
                let trip = Trip::open(*key, delta, agent);
                self.state.trips.insert(*key, trip.clone());
                Ok((trip, true))
            }
        }
    }

    async fn shift_trip(
        &mut self,
        key: &trip::Key,
        delta: trip::Delta,
    ) -> Result<Option<Trip>, Error> {
        Ok(self.state.trips.get_mut(key).map(|trip| {
            trip.passenger_count += delta.passengers;
            trip.revenue += delta.revenue;
            trip.clone()
        }))
    }

    async fn write_trip(&mut self, trip: &Trip) -> Result<(), Error> {
        self.state.trips.insert(trip.key, trip.clone());
        Ok(())
    }

    async fn delete_trip(&mut self, key: &trip::Key) -> Result<(), Error> {
        self.state.trips.remove(key);
        Ok(())
    }

    async fn commit(self) -> Result<(), Error> {
        *self.shared.lock().unwrap() = self.state;
        Ok(())
    }
}
