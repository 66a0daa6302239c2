use std::{error::Error as StdError, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use derive_more::From;
use jsonwebtoken::{
    decode, encode, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use tokio::{fs, net, task};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use van_office::{
    api,
    db::{
        self,
        catalog::{CityId, DriverId},
        customer,
        trip::Key,
    },
    document::{ManifestView, Render, RenderError, TextRenderer},
    error::{Conflict, Invalid, Missing},
    lifecycle, report, trip, Config, Error,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn StdError>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let (db_client, db_connection) = db::connect(config.db).await?;

    task::spawn(async move {
        if let Err(e) = db_connection.await {
            panic!("database connection failed: {e}");
        }
    });

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &config.http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let app = Router::new()
        .route("/auth", post(auth))
        .route("/user", get(get_user))
        .route("/customer", get(list_customers).post(add_customer))
        .route(
            "/customer/:id",
            get(get_customer)
                .patch(edit_customer)
                .delete(deactivate_customer),
        )
        .route("/city", get(list_cities))
        .route("/city/:id/location", get(list_city_locations))
        .route("/driver", get(list_drivers))
        .route("/driver/:id", get(get_driver))
        .route("/ticket", get(list_tickets).post(issue_ticket))
        .route("/ticket/:id", get(get_ticket).patch(edit_ticket))
        .route("/ticket/:id/document", get(get_ticket_document))
        .route("/trip", get(list_trips))
        .route("/trip/manifest", get(get_manifest))
        .route("/trip/depart", post(depart_trip))
        .route("/trip/document", get(get_trip_document))
        .route("/trip/reconcile", post(reconcile_trip))
        .route("/report/dashboard", get(dashboard_report))
        .route("/report/daily", get(daily_report))
        .route("/report/period", get(period_report))
        .route("/report/driver/:id", get(driver_report))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(AppState {
            db_client,
            policy: lifecycle::Policy::from(&config.tickets),
            renderer: Box::new(TextRenderer::new(&config.tickets)),
            jwt_expiration_time: config.jwt.expiration_time,
            jwt_decoding_key: DecodingKey::from_secret(
                config.jwt.secret.as_bytes(),
            ),
            jwt_encoding_key: EncodingKey::from_secret(
                config.jwt.secret.as_bytes(),
            ),
        }));

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    tracing::info!("listening on {}", config.http.server.addr);
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct AuthInput {
    login: String,
    password: String,
}

async fn auth(
    State(state): State<SharedAppState>,
    Json(AuthInput { login, password }): Json<AuthInput>,
) -> Result<String, AuthError> {
    use AuthError as E;

    let user = state
        .db_client
        .get_user_by_login(&login)
        .await?
        .filter(|u| u.active && u.password_hash.verify(&password))
        .ok_or(E::WrongLoginOrPassword)?;

    let expires_at = OffsetDateTime::now_utc() + state.jwt_expiration_time;
    encode(
        &Header::default(),
        &AuthClaims {
            user_id: user.id,
            exp: expires_at.unix_timestamp(),
        },
        &state.jwt_encoding_key,
    )
    .map_err(|_| E::InvalidToken)
}

#[derive(Debug, From)]
pub enum AuthError {
    #[from]
    DbError(db::Error),
    InvalidToken,
    WrongLoginOrPassword,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => {
                tracing::error!("login lookup failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::WrongLoginOrPassword => StatusCode::FORBIDDEN,
        }
        .into_response()
    }
}

async fn get_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::User>, GetUserError> {
    use GetUserError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(my.into()))
}

#[derive(Debug, From)]
pub enum GetUserError {
    #[from]
    DbError(db::Error),
    UserNotFound,
}

impl IntoResponse for GetUserError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
struct ListCustomersInput {
    q: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

async fn list_customers(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(ListCustomersInput { q, page, limit }): Query<ListCustomersInput>,
) -> Result<Json<api::Page<db::Customer>>, Error> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    let query = q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let (items, total_count) = state
        .db_client
        .search_customers(query, (page - 1) * limit, limit)
        .await?;

    Ok(Json(api::Page {
        items,
        total_count,
        page,
        limit,
    }))
}

async fn add_customer(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Json(profile): Json<customer::Profile>,
) -> Result<(StatusCode, Json<db::Customer>), Error> {
    profile.check()?;
    let customer = state.db_client.add_customer(&profile).await?;
    tracing::info!(id = %customer.id, "customer registered");
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn get_customer(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<customer::Id>,
) -> Result<Json<db::Customer>, Error> {
    let customer = state
        .db_client
        .get_customer_by_id(id)
        .await?
        .ok_or(Missing::Customer)?;
    Ok(Json(customer))
}

/// Fields left out stay as they are; an empty optional field is cleared.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditCustomerInput {
    name: Option<String>,
    phone: Option<String>,
    city: Option<String>,
    district: Option<String>,
    address: Option<String>,
    postal_code: Option<String>,
}

async fn edit_customer(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<customer::Id>,
    Json(edit): Json<EditCustomerInput>,
) -> Result<Json<db::Customer>, Error> {
    fn clearable(current: &mut Option<String>, edit: Option<String>) {
        if let Some(value) = edit {
            *current = Some(value).filter(|v| !v.trim().is_empty());
        }
    }

    let mut customer = state
        .db_client
        .get_customer_by_id(id)
        .await?
        .filter(|c| c.active)
        .ok_or(Missing::Customer)?;

    let mut profile = customer::Profile {
        name: edit.name.unwrap_or(customer.name),
        phone: edit.phone.unwrap_or(customer.phone),
        city: edit.city.unwrap_or(customer.city),
        district: customer.district,
        address: customer.address,
        postal_code: customer.postal_code,
    };
    clearable(&mut profile.district, edit.district);
    clearable(&mut profile.address, edit.address);
    clearable(&mut profile.postal_code, edit.postal_code);
    profile.check()?;

    customer.name = profile.name;
    customer.phone = profile.phone;
    customer.city = profile.city;
    customer.district = profile.district;
    customer.address = profile.address;
    customer.postal_code = profile.postal_code;
    state.db_client.write_customer(&customer).await?;

    let customer = state
        .db_client
        .get_customer_by_id(id)
        .await?
        .ok_or(Missing::Customer)?;
    Ok(Json(customer))
}

async fn deactivate_customer(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<customer::Id>,
) -> Result<StatusCode, Error> {
    let mut customer = state
        .db_client
        .get_customer_by_id(id)
        .await?
        .ok_or(Missing::Customer)?;
    customer.active = false;
    state.db_client.write_customer(&customer).await?;
    tracing::info!(id = %customer.id, "customer deactivated");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_cities(
    State(state): State<SharedAppState>,
    _: AuthClaims,
) -> Result<Json<Vec<db::City>>, Error> {
    Ok(Json(state.db_client.get_cities().await?))
}

async fn list_city_locations(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<CityId>,
) -> Result<Json<Vec<db::BoardingLocation>>, Error> {
    Ok(Json(state.db_client.get_locations_by_city(id).await?))
}

async fn list_drivers(
    State(state): State<SharedAppState>,
    _: AuthClaims,
) -> Result<Json<Vec<db::Driver>>, Error> {
    Ok(Json(state.db_client.get_drivers().await?))
}

async fn get_driver(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<DriverId>,
) -> Result<Json<db::Driver>, Error> {
    let driver = state
        .db_client
        .get_driver_by_id(id)
        .await?
        .ok_or(Missing::Driver)?;
    Ok(Json(driver))
}

#[derive(Deserialize)]
struct ListTicketsInput {
    #[serde(with = "van_office::format::date")]
    date: Date,
}

async fn list_tickets(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(ListTicketsInput { date }): Query<ListTicketsInput>,
) -> Result<Json<Vec<api::Ticket>>, Error> {
    let tickets = state.db_client.get_tickets_by_date(date).await?;
    Ok(Json(tickets.into_iter().map(Into::into).collect()))
}

async fn issue_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(order): Json<lifecycle::Order>,
) -> Result<(StatusCode, Json<api::ticket::Issued>), Error> {
    let mut session = state.db_client.session().await;
    let outcome = lifecycle::issue(
        session.transaction().await?,
        &state.policy,
        auth_claims.user_id,
        order,
    )
    .await?;
    drop(session);

    let ticket = load_ticket(&state, outcome.ticket.id).await?;
    let (printout, print_error) = match state.renderer.ticket(&ticket) {
        Ok(document) => (Some(document.into()), None),
        Err(e) => {
            tracing::warn!(number = %ticket.number, "ticket not rendered: {e}");
            (None, Some(e.to_string()))
        }
    };

    let trip = outcome
        .trips
        .into_iter()
        .next()
        .map(api::trip::Change::from)
        .ok_or(Missing::Trip)?;
    Ok((
        StatusCode::CREATED,
        Json(api::ticket::Issued {
            ticket,
            trip,
            printout,
            print_error,
        }),
    ))
}

async fn get_ticket(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<api::Ticket>, Error> {
    Ok(Json(load_ticket(&state, id).await?))
}

#[derive(Deserialize)]
#[serde(content = "data", rename_all = "camelCase", tag = "op")]
enum EditTicketInput {
    Cancel {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Transfer {
        #[serde(with = "van_office::format::date")]
        date: Date,
        #[serde(with = "van_office::format::clock")]
        time: Time,
        driver_id: DriverId,
        #[serde(default)]
        reason: Option<String>,
    },
}

async fn edit_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::ticket::Id>,
    Json(op): Json<EditTicketInput>,
) -> Result<Json<api::ticket::Altered>, Error> {
    use EditTicketInput as Op;

    let agent = auth_claims.user_id;
    let mut session = state.db_client.session().await;
    let tx = session.transaction().await?;
    let outcome = match op {
        Op::Cancel { reason } => lifecycle::cancel(tx, agent, id, reason).await,
        Op::Transfer {
            date,
            time,
            driver_id,
            reason,
        } => {
            let to = Key {
                date,
                time,
                driver: driver_id,
            };
            lifecycle::transfer(tx, agent, id, to, reason).await
        }
    }?;
    drop(session);

    Ok(Json(api::ticket::Altered {
        ticket: load_ticket(&state, outcome.ticket.id).await?,
        trips: outcome.trips.into_iter().map(Into::into).collect(),
    }))
}

async fn get_ticket_document(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<api::ticket::Id>,
) -> Result<Response, DocumentError> {
    let ticket = load_ticket(&state, id).await?;
    Ok(state.renderer.ticket(&ticket)?.into_response())
}

async fn load_ticket(
    state: &AppState,
    id: api::ticket::Id,
) -> Result<api::Ticket, Error> {
    let detail = state
        .db_client
        .get_ticket_detail(id)
        .await?
        .ok_or(Missing::Ticket)?;
    Ok(detail.into())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTripsInput {
    #[serde(default, with = "van_office::format::date::option")]
    from: Option<Date>,
    #[serde(default, with = "van_office::format::date::option")]
    to: Option<Date>,
    driver_id: Option<DriverId>,
}

async fn list_trips(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(ListTripsInput {
        from,
        to,
        driver_id,
    }): Query<ListTripsInput>,
) -> Result<Json<Vec<api::trip::Listed>>, Error> {
    if let (Some(start), Some(end)) = (from, to) {
        report::Range::new(start, end)?;
    }
    let trips = state.db_client.get_trips(from, to, driver_id).await?;
    Ok(Json(trips.into_iter().map(Into::into).collect()))
}

async fn get_manifest(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(key): Query<Key>,
) -> Result<Json<trip::Manifest>, Error> {
    Ok(Json(trip::build_manifest(&state.db_client, &key).await?))
}

async fn depart_trip(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(key): Json<Key>,
) -> Result<Json<api::trip::Departure>, Error> {
    let mut session = state.db_client.session().await;
    let departure =
        trip::depart(session.transaction().await?, auth_claims.user_id, &key)
            .await?;
    Ok(Json(departure.into()))
}

async fn get_trip_document(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(key): Query<Key>,
) -> Result<Response, DocumentError> {
    let listed = state
        .db_client
        .get_trips(Some(key.date), Some(key.date), Some(key.driver))
        .await
        .map_err(Error::from)?
        .into_iter()
        .find(|listed| listed.trip.key == key)
        .map(api::trip::Listed::from)
        .ok_or(Error::from(Missing::Trip))?;
    if listed.trip.status != db::trip::Status::Departed {
        return Err(Error::from(Conflict::NotDeparted).into());
    }

    let manifest = trip::build_manifest(&state.db_client, &key).await?;
    let document = state.renderer.manifest(ManifestView {
        trip: &listed,
        manifest: &manifest,
    })?;
    Ok(document.into_response())
}

#[derive(Debug, From)]
pub enum DocumentError {
    #[from]
    Op(Error),
    #[from]
    Render(RenderError),
}

impl IntoResponse for DocumentError {
    fn into_response(self) -> Response {
        match self {
            Self::Op(e) => e.into_response(),
            Self::Render(e) => {
                tracing::error!("document rendering failed: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                    .into_response()
            }
        }
    }
}

async fn reconcile_trip(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(key): Json<Key>,
) -> Result<Json<api::trip::Change>, ReconcileError> {
    use ReconcileError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await
        .map_err(Error::from)?
        .ok_or(E::UserNotFound)?;
    if my.role != db::user::Role::Admin {
        return Err(E::NotAllowed);
    }

    let mut session = state.db_client.session().await;
    let tx = session.transaction().await.map_err(Error::from)?;
    let change = trip::reconcile(tx, my.id, &key).await?;
    Ok(Json(change.into()))
}

#[derive(Debug, From)]
pub enum ReconcileError {
    #[from]
    Op(Error),
    NotAllowed,
    UserNotFound,
}

impl IntoResponse for ReconcileError {
    fn into_response(self) -> Response {
        match self {
            Self::Op(e) => e.into_response(),
            Self::NotAllowed => StatusCode::FORBIDDEN.into_response(),
            Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[derive(Deserialize)]
struct DashboardInput {
    #[serde(default, with = "van_office::format::date::option")]
    date: Option<Date>,
}

async fn dashboard_report(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(DashboardInput { date }): Query<DashboardInput>,
) -> Result<Json<report::Dashboard>, Error> {
    let date = date.unwrap_or_else(|| OffsetDateTime::now_utc().date());
    Ok(Json(report::dashboard(&state.db_client, date).await?))
}

#[derive(Deserialize)]
struct DailyReportInput {
    #[serde(with = "van_office::format::date")]
    date: Date,
}

async fn daily_report(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(DailyReportInput { date }): Query<DailyReportInput>,
) -> Result<Json<report::DailyReport>, Error> {
    Ok(Json(report::daily(&state.db_client, date).await?))
}

#[derive(Deserialize)]
struct RangeInput {
    #[serde(with = "van_office::format::date")]
    start: Date,
    #[serde(with = "van_office::format::date")]
    end: Date,
}

impl TryFrom<RangeInput> for report::Range {
    type Error = Invalid;

    fn try_from(input: RangeInput) -> Result<Self, Self::Error> {
        Self::new(input.start, input.end)
    }
}

async fn period_report(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Query(range): Query<RangeInput>,
) -> Result<Json<report::PeriodReport>, Error> {
    let range = report::Range::try_from(range)?;
    Ok(Json(report::period(&state.db_client, range).await?))
}

async fn driver_report(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<DriverId>,
    Query(range): Query<RangeInput>,
) -> Result<Json<report::DriverReport>, Error> {
    let range = report::Range::try_from(range)?;
    Ok(Json(report::driver(&state.db_client, id, range).await?))
}

type SharedAppState = Arc<AppState>;

struct AppState {
    db_client: db::Client,

    policy: lifecycle::Policy,

    renderer: Box<dyn Render>,

    jwt_expiration_time: Duration,

    jwt_decoding_key: DecodingKey,

    jwt_encoding_key: EncodingKey,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    user_id: api::user::Id,
    exp: i64,
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::InvalidToken)?;
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }
}
