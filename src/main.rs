mod backend;
mod booking_api;
mod cache;
mod lifecycle;
mod locale;
mod models;
mod room_api;
mod session;
mod stay_api;
mod user_api;
mod validate;

use actix_web::{
    delete, get,
    http::StatusCode,
    middleware::Logger,
    post, put,
    web::{route, Data, Json, Path, Query},
    App, HttpRequest, HttpResponse, HttpServer,
};
use anyhow::Context;
use backend::BackendError;
use booking_api::BookingAppState;
use cache::{CacheKey, CacheStore, Mutation};
use chrono::{NaiveDate, Utc};
use locale::Locale;
use models::{
    CheckOutStayPayload, CreateBookingPayload, CreateRoomPayload, CreateStayRecordPayload,
    UpdateBookingPayload, UpdateProfilePayload, UpdateRoomPayload, UpdateStayRecordPayload,
};
use room_api::RoomAppState;
use serde::Deserialize;
use serde_json::json;
use session::{SessionContext, SessionStore};
use stay_api::StayAppState;
use std::{
    env::var,
    net::{Ipv4Addr, SocketAddrV4},
    time::Duration,
};
use user_api::UserAppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let port: u16 = var("PORT")
        .ok()
        .and_then(|text| text.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);

    let backend_url = var("BACKEND_API_URL").context("BACKEND_API_URL must be set")?;
    let db_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let session_store = SessionStore::new(&db_url)
        .await
        .context("failed to connect to the session database")?;
    let cache_store = CacheStore::new(Duration::from_secs(30));
    let room_app_state = RoomAppState::new(&backend_url);
    let booking_app_state = BookingAppState::new(&backend_url);
    let stay_app_state = StayAppState::new(&backend_url);
    let user_app_state = UserAppState::new(&backend_url);

    log::info!("listening on {addr}, backend at {backend_url}");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(Data::new(session_store.clone()))
            .app_data(Data::new(cache_store.clone()))
            .app_data(Data::new(room_app_state.clone()))
            .app_data(Data::new(booking_app_state.clone()))
            .app_data(Data::new(stay_app_state.clone()))
            .app_data(Data::new(user_app_state.clone()))
            .service(availability_query)
            .service(room_query)
            .service(room_create)
            .service(room_get)
            .service(room_update)
            .service(room_delete)
            .service(booking_query)
            .service(booking_create)
            .service(booking_cancel)
            .service(booking_check_in)
            .service(booking_check_out)
            .service(booking_get)
            .service(booking_update)
            .service(booking_delete)
            .service(stay_stats)
            .service(stay_query)
            .service(stay_create)
            .service(stay_checkout)
            .service(stay_get)
            .service(stay_update)
            .service(user_login)
            .service(user_logout)
            .service(profile_get)
            .service(profile_update)
            .service(user_query)
            .default_service(route().to(fallback))
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}

fn accept_language(req: &HttpRequest) -> Option<&str> {
    req.headers().get("Accept-Language")?.to_str().ok()
}

fn redirect(target: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header(("Location", target.to_string()))
        .finish()
}

fn resolve_locale(req: &HttpRequest, segment: &str) -> Result<Locale, HttpResponse> {
    if let Some(locale) = Locale::parse(segment) {
        return Ok(locale);
    }
    match locale::redirect_target(req.path(), req.query_string(), accept_language(req)) {
        Some(target) => Err(redirect(&target)),
        None => Err(HttpResponse::NotFound().body("unsupported locale")),
    }
}

// guest-only pages bounce to the login page, keeping the original path
async fn page_session(
    req: &HttpRequest,
    sessions: &SessionStore,
    locale: Locale,
) -> Result<SessionContext, HttpResponse> {
    let target = locale::login_redirect(locale, req.path());
    let Some(token) = session::bearer(req) else {
        return Err(redirect(&target));
    };
    match sessions.lookup(token).await {
        Ok(Some(ctx)) => Ok(ctx),
        Ok(None) => Err(redirect(&target)),
        Err(_) => Err(HttpResponse::InternalServerError().body("session lookup failed")),
    }
}

async fn api_session(
    req: &HttpRequest,
    sessions: &SessionStore,
) -> Result<SessionContext, HttpResponse> {
    let Some(token) = session::bearer(req) else {
        return Err(
            HttpResponse::Unauthorized().json(json!({ "error": "authentication required" }))
        );
    };
    match sessions.lookup(token).await {
        Ok(Some(ctx)) => Ok(ctx),
        Ok(None) => {
            Err(HttpResponse::Unauthorized().json(json!({ "error": "authentication required" })))
        }
        Err(_) => Err(HttpResponse::InternalServerError().body("session lookup failed")),
    }
}

// upstream 401 clears the local session; other statuses pass the upstream
// message through; everything is recoverable by a user-initiated retry
// the users directory is admin-only; the upstream enforces this too, but the
// gate here saves the round trip and keeps the list out of shared cache
fn forbid_non_admin(ctx: &SessionContext) -> Option<HttpResponse> {
    if ctx.role == models::UserRole::Admin {
        None
    } else {
        Some(HttpResponse::Forbidden().json(json!({ "error": "admin access required" })))
    }
}

async fn backend_failure(
    err: BackendError,
    sessions: &SessionStore,
    token: Option<&str>,
) -> HttpResponse {
    match err {
        BackendError::Unauthorized => {
            if let Some(token) = token {
                log::warn!("backend answered 401, clearing local session");
                if let Err(err) = sessions.invalidate(token).await {
                    log::error!("failed to clear session: {err}");
                }
            }
            HttpResponse::Unauthorized()
                .json(json!({ "error": "session expired, please log in again" }))
        }
        BackendError::Status { status, message } => {
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            HttpResponse::build(code).json(json!({ "error": message }))
        }
        BackendError::Transport(_) | BackendError::Parse => {
            log::error!("backend call failed: {err}");
            HttpResponse::BadGateway()
                .json(json!({ "error": "the booking service is unavailable, please try again" }))
        }
    }
}

// ---- rooms ----

#[derive(Debug, Deserialize)]
struct RoomListQuery {
    #[serde(rename = "type")]
    room_type: Option<String>,
    status: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl RoomListQuery {
    fn to_query(&self) -> String {
        cache::query_string(&[
            ("type", self.room_type.clone().unwrap_or_default()),
            ("status", self.status.clone().unwrap_or_default()),
            ("page", self.page.map(|n| n.to_string()).unwrap_or_default()),
            ("limit", self.limit.map(|n| n.to_string()).unwrap_or_default()),
        ])
    }
}

#[get("/{locale}/rooms")]
async fn room_query(
    req: HttpRequest,
    path: Path<String>,
    query: Query<RoomListQuery>,
    rooms: Data<RoomAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    if let Err(res) = resolve_locale(&req, &path) {
        return res;
    }

    let qs = query.to_query();
    let key = CacheKey::Rooms(qs.clone());
    if let Some(hit) = cache_store.get(&key) {
        return HttpResponse::Ok().json(hit);
    }

    // room browsing is public; the bearer is only attached when present
    let ctx = match session::bearer(&req) {
        Some(token) => sessions.lookup(token).await.ok().flatten(),
        None => None,
    };

    match rooms.room_query(ctx.as_ref().map(|c| c.bearer.as_str()), &qs).await {
        Ok(chunk) => {
            if let Ok(value) = serde_json::to_value(&chunk) {
                cache_store.put(key, value);
            }
            HttpResponse::Ok().json(chunk)
        }
        Err(err) => backend_failure(err, &sessions, ctx.as_ref().map(|c| c.token.as_str())).await,
    }
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    check_in_date: Option<String>,
    check_out_date: Option<String>,
    guests: Option<u32>,
}

impl AvailabilityQuery {
    fn to_query(&self) -> String {
        cache::query_string(&[
            ("check_in_date", self.check_in_date.clone().unwrap_or_default()),
            ("check_out_date", self.check_out_date.clone().unwrap_or_default()),
            ("guests", self.guests.map(|n| n.to_string()).unwrap_or_default()),
        ])
    }
}

#[get("/{locale}/rooms/availability")]
async fn availability_query(
    req: HttpRequest,
    path: Path<String>,
    query: Query<AvailabilityQuery>,
    rooms: Data<RoomAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    if let Err(res) = resolve_locale(&req, &path) {
        return res;
    }

    let qs = query.to_query();
    let key = CacheKey::RoomAvailability(qs.clone());
    if let Some(hit) = cache_store.get(&key) {
        return HttpResponse::Ok().json(hit);
    }

    match rooms.availability_query(None, &qs).await {
        Ok(items) => {
            if let Ok(value) = serde_json::to_value(&items) {
                cache_store.put(key, value);
            }
            HttpResponse::Ok().json(items)
        }
        Err(err) => backend_failure(err, &sessions, None).await,
    }
}

#[get("/{locale}/rooms/{id}")]
async fn room_get(
    req: HttpRequest,
    path: Path<(String, String)>,
    rooms: Data<RoomAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }

    let key = CacheKey::RoomDetail(id.clone());
    if let Some(hit) = cache_store.get(&key) {
        return HttpResponse::Ok().json(hit);
    }

    match rooms.room_get(None, &id).await {
        Ok(room) => {
            if let Ok(value) = serde_json::to_value(&room) {
                cache_store.put(key, value);
            }
            HttpResponse::Ok().json(room)
        }
        Err(err) => backend_failure(err, &sessions, None).await,
    }
}

#[post("/{locale}/rooms")]
async fn room_create(
    req: HttpRequest,
    path: Path<String>,
    payload: Json<CreateRoomPayload>,
    rooms: Data<RoomAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    if let Err(res) = resolve_locale(&req, &path) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let errors = validate::validate_room_form(&payload);
    if !errors.is_empty() {
        return HttpResponse::BadRequest().json(json!({ "errors": errors }));
    }

    match rooms.room_create(&ctx.bearer, &payload).await {
        Ok(room) => {
            cache_store.invalidate(&Mutation::Room(None));
            HttpResponse::Created().json(room)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[put("/{locale}/rooms/{id}")]
async fn room_update(
    req: HttpRequest,
    path: Path<(String, String)>,
    payload: Json<UpdateRoomPayload>,
    rooms: Data<RoomAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    match rooms.room_update(&ctx.bearer, &id, &payload).await {
        Ok(room) => {
            cache_store.invalidate(&Mutation::Room(Some(id)));
            HttpResponse::Ok().json(room)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[delete("/{locale}/rooms/{id}")]
async fn room_delete(
    req: HttpRequest,
    path: Path<(String, String)>,
    rooms: Data<RoomAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    match rooms.room_delete(&ctx.bearer, &id).await {
        Ok(()) => {
            cache_store.invalidate(&Mutation::Room(Some(id)));
            HttpResponse::NoContent().finish()
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

// ---- bookings ----

#[derive(Debug, Deserialize)]
struct BookingListQuery {
    status: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl BookingListQuery {
    fn to_query(&self) -> String {
        cache::query_string(&[
            ("status", self.status.clone().unwrap_or_default()),
            ("page", self.page.map(|n| n.to_string()).unwrap_or_default()),
            ("limit", self.limit.map(|n| n.to_string()).unwrap_or_default()),
        ])
    }
}

#[get("/{locale}/bookings")]
async fn booking_query(
    req: HttpRequest,
    path: Path<String>,
    query: Query<BookingListQuery>,
    bookings: Data<BookingAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let locale = match resolve_locale(&req, &path) {
        Ok(locale) => locale,
        Err(res) => return res,
    };
    let ctx = match page_session(&req, &sessions, locale).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let qs = query.to_query();
    let key = CacheKey::Bookings {
        user: ctx.user_id.clone(),
        query: qs.clone(),
    };
    // the cache holds the canonical chunk; labels are derived per request so
    // a hit in one locale never serves another
    if let Some(hit) = cache_store.get(&key) {
        if let Ok(chunk) = serde_json::from_value::<models::BookingChunk>(hit) {
            return HttpResponse::Ok().json(lifecycle::view_chunk(chunk, locale));
        }
    }

    match bookings.booking_query(&ctx.bearer, &qs).await {
        Ok(chunk) => {
            if let Ok(value) = serde_json::to_value(&chunk) {
                cache_store.put(key, value);
            }
            HttpResponse::Ok().json(lifecycle::view_chunk(chunk, locale))
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[get("/{locale}/bookings/{id}")]
async fn booking_get(
    req: HttpRequest,
    path: Path<(String, String)>,
    bookings: Data<BookingAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    let locale = match resolve_locale(&req, &segment) {
        Ok(locale) => locale,
        Err(res) => return res,
    };
    let ctx = match page_session(&req, &sessions, locale).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let key = CacheKey::BookingDetail {
        user: ctx.user_id.clone(),
        id: id.clone(),
    };
    if let Some(hit) = cache_store.get(&key) {
        if let Ok(booking) = serde_json::from_value::<models::Booking>(hit) {
            return HttpResponse::Ok().json(lifecycle::view(booking, locale));
        }
    }

    match bookings.booking_get(&ctx.bearer, &id).await {
        Ok(booking) => {
            if let Ok(value) = serde_json::to_value(&booking) {
                cache_store.put(key, value);
            }
            HttpResponse::Ok().json(lifecycle::view(booking, locale))
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[derive(Debug, Deserialize)]
struct BookingForm {
    room_id: String,
    check_in_date: NaiveDate,
    check_out_date: NaiveDate,
    guests: u32,
    special_requests: Option<String>,
}

#[post("/{locale}/bookings")]
async fn booking_create(
    req: HttpRequest,
    path: Path<String>,
    form: Json<BookingForm>,
    rooms: Data<RoomAppState>,
    bookings: Data<BookingAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    if let Err(res) = resolve_locale(&req, &path) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let room = match rooms.room_get(Some(&ctx.bearer), &form.room_id).await {
        Ok(room) => room,
        Err(err) => return backend_failure(err, &sessions, Some(&ctx.token)).await,
    };

    let errors = validate::validate_booking_form(
        Some(&room),
        Some(form.check_in_date),
        Some(form.check_out_date),
        form.guests,
        Utc::now().date_naive(),
    );
    if !errors.is_empty() {
        return HttpResponse::BadRequest().json(json!({ "errors": errors }));
    }

    // booked days run from 14:00 arrival to 11:00 departure
    let check_in = form.check_in_date.and_hms_opt(14, 0, 0).map(|t| t.and_utc());
    let check_out = form.check_out_date.and_hms_opt(11, 0, 0).map(|t| t.and_utc());
    let (Some(check_in), Some(check_out)) = (check_in, check_out) else {
        return HttpResponse::BadRequest().json(json!({ "error": "invalid dates" }));
    };

    let (_, total_amount) = lifecycle::quote(check_in, check_out, room.price_per_night);

    let payload = CreateBookingPayload {
        room_id: form.room_id.clone(),
        guest_id: ctx.user_id.clone(),
        check_in_date: check_in,
        check_out_date: check_out,
        guests: form.guests,
        special_requests: form.special_requests.clone(),
        total_amount,
    };

    match bookings.booking_create(&ctx.bearer, &payload).await {
        Ok(booking) => {
            cache_store.invalidate(&Mutation::Booking(booking.id.clone()));
            HttpResponse::Created().json(booking)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[put("/{locale}/bookings/{id}")]
async fn booking_update(
    req: HttpRequest,
    path: Path<(String, String)>,
    payload: Json<UpdateBookingPayload>,
    bookings: Data<BookingAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    // a payment update may never push paid over total
    if let Some(paid) = payload.paid_amount {
        let booking = match bookings.booking_get(&ctx.bearer, &id).await {
            Ok(booking) => booking,
            Err(err) => return backend_failure(err, &sessions, Some(&ctx.token)).await,
        };
        if let Some(message) = validate::validate_payment(booking.total_amount, paid) {
            return HttpResponse::BadRequest().json(json!({ "errors": { "paid_amount": message } }));
        }
    }

    match bookings.booking_update(&ctx.bearer, &id, &payload).await {
        Ok(booking) => {
            cache_store.invalidate(&Mutation::Booking(id));
            HttpResponse::Ok().json(booking)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[derive(Debug, Default, Deserialize)]
struct CancelBody {
    reason: Option<String>,
}

#[post("/{locale}/bookings/{id}/cancel")]
async fn booking_cancel(
    req: HttpRequest,
    path: Path<(String, String)>,
    body: Option<Json<CancelBody>>,
    bookings: Data<BookingAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let booking = match bookings.booking_get(&ctx.bearer, &id).await {
        Ok(booking) => booking,
        Err(err) => return backend_failure(err, &sessions, Some(&ctx.token)).await,
    };

    if let Err(err) = lifecycle::apply(booking.status, lifecycle::BookingAction::Cancel) {
        return HttpResponse::Conflict().json(json!({ "error": err.to_string() }));
    }

    let reason = body.as_ref().and_then(|body| body.reason.as_deref());
    match bookings.booking_cancel(&ctx.bearer, &id, reason).await {
        Ok(booking) => {
            cache_store.invalidate(&Mutation::Booking(id));
            HttpResponse::Ok().json(booking)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[post("/{locale}/bookings/{id}/check-in")]
async fn booking_check_in(
    req: HttpRequest,
    path: Path<(String, String)>,
    bookings: Data<BookingAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let booking = match bookings.booking_get(&ctx.bearer, &id).await {
        Ok(booking) => booking,
        Err(err) => return backend_failure(err, &sessions, Some(&ctx.token)).await,
    };

    if let Err(err) = lifecycle::apply(booking.status, lifecycle::BookingAction::CheckIn) {
        return HttpResponse::Conflict().json(json!({ "error": err.to_string() }));
    }

    match bookings.booking_check_in(&ctx.bearer, &id).await {
        Ok(booking) => {
            cache_store.invalidate(&Mutation::Booking(id));
            HttpResponse::Ok().json(booking)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[post("/{locale}/bookings/{id}/check-out")]
async fn booking_check_out(
    req: HttpRequest,
    path: Path<(String, String)>,
    bookings: Data<BookingAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let booking = match bookings.booking_get(&ctx.bearer, &id).await {
        Ok(booking) => booking,
        Err(err) => return backend_failure(err, &sessions, Some(&ctx.token)).await,
    };

    if let Err(err) = lifecycle::apply(booking.status, lifecycle::BookingAction::CheckOut) {
        return HttpResponse::Conflict().json(json!({ "error": err.to_string() }));
    }

    match bookings.booking_check_out(&ctx.bearer, &id).await {
        Ok(booking) => {
            cache_store.invalidate(&Mutation::Booking(id));
            HttpResponse::Ok().json(booking)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[delete("/{locale}/bookings/{id}")]
async fn booking_delete(
    req: HttpRequest,
    path: Path<(String, String)>,
    bookings: Data<BookingAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    match bookings.booking_delete(&ctx.bearer, &id).await {
        Ok(()) => {
            cache_store.invalidate(&Mutation::Booking(id));
            HttpResponse::NoContent().finish()
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

// ---- stay records ----

#[derive(Debug, Deserialize)]
struct StayListQuery {
    booking_id: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl StayListQuery {
    fn to_query(&self) -> String {
        cache::query_string(&[
            ("booking_id", self.booking_id.clone().unwrap_or_default()),
            ("page", self.page.map(|n| n.to_string()).unwrap_or_default()),
            ("limit", self.limit.map(|n| n.to_string()).unwrap_or_default()),
        ])
    }
}

#[get("/{locale}/stay_records")]
async fn stay_query(
    req: HttpRequest,
    path: Path<String>,
    query: Query<StayListQuery>,
    stays: Data<StayAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let locale = match resolve_locale(&req, &path) {
        Ok(locale) => locale,
        Err(res) => return res,
    };
    let ctx = match page_session(&req, &sessions, locale).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let qs = query.to_query();
    let key = CacheKey::StayRecords {
        user: ctx.user_id.clone(),
        query: qs.clone(),
    };
    if let Some(hit) = cache_store.get(&key) {
        return HttpResponse::Ok().json(hit);
    }

    match stays.stay_query(&ctx.bearer, &qs).await {
        Ok(chunk) => {
            if let Ok(value) = serde_json::to_value(&chunk) {
                cache_store.put(key, value);
            }
            HttpResponse::Ok().json(chunk)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[get("/{locale}/stay_records/stats")]
async fn stay_stats(
    req: HttpRequest,
    path: Path<String>,
    stays: Data<StayAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let locale = match resolve_locale(&req, &path) {
        Ok(locale) => locale,
        Err(res) => return res,
    };
    let ctx = match page_session(&req, &sessions, locale).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let key = CacheKey::StayStats {
        user: ctx.user_id.clone(),
    };
    if let Some(hit) = cache_store.get(&key) {
        return HttpResponse::Ok().json(hit);
    }

    match stays.stay_stats(&ctx.bearer).await {
        Ok(stats) => {
            if let Ok(value) = serde_json::to_value(&stats) {
                cache_store.put(key, value);
            }
            HttpResponse::Ok().json(stats)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[get("/{locale}/stay_records/{id}")]
async fn stay_get(
    req: HttpRequest,
    path: Path<(String, String)>,
    stays: Data<StayAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    let locale = match resolve_locale(&req, &segment) {
        Ok(locale) => locale,
        Err(res) => return res,
    };
    let ctx = match page_session(&req, &sessions, locale).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let key = CacheKey::StayRecordDetail {
        user: ctx.user_id.clone(),
        id: id.clone(),
    };
    if let Some(hit) = cache_store.get(&key) {
        return HttpResponse::Ok().json(hit);
    }

    match stays.stay_get(&ctx.bearer, &id).await {
        Ok(record) => {
            if let Ok(value) = serde_json::to_value(&record) {
                cache_store.put(key, value);
            }
            HttpResponse::Ok().json(record)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[post("/{locale}/stay_records")]
async fn stay_create(
    req: HttpRequest,
    path: Path<String>,
    payload: Json<CreateStayRecordPayload>,
    stays: Data<StayAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    if let Err(res) = resolve_locale(&req, &path) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    match stays.stay_create(&ctx.bearer, &payload).await {
        Ok(record) => {
            cache_store.invalidate(&Mutation::StayRecord(Some(record.id.clone())));
            HttpResponse::Created().json(record)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[put("/{locale}/stay_records/{id}")]
async fn stay_update(
    req: HttpRequest,
    path: Path<(String, String)>,
    payload: Json<UpdateStayRecordPayload>,
    stays: Data<StayAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    match stays.stay_update(&ctx.bearer, &id, &payload).await {
        Ok(record) => {
            cache_store.invalidate(&Mutation::StayRecord(Some(id)));
            HttpResponse::Ok().json(record)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[post("/{locale}/stay_records/{id}/checkout")]
async fn stay_checkout(
    req: HttpRequest,
    path: Path<(String, String)>,
    payload: Option<Json<CheckOutStayPayload>>,
    stays: Data<StayAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let (segment, id) = path.into_inner();
    if let Err(res) = resolve_locale(&req, &segment) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    let payload = payload.map(|body| body.into_inner()).unwrap_or_default();
    match stays.stay_checkout(&ctx.bearer, &id, &payload).await {
        Ok(record) => {
            cache_store.invalidate(&Mutation::StayRecord(Some(id)));
            HttpResponse::Ok().json(record)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

// ---- auth & users ----

#[derive(Debug, Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

#[post("/{locale}/login")]
async fn user_login(
    req: HttpRequest,
    path: Path<String>,
    form: Json<LoginForm>,
    users: Data<UserAppState>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    if let Err(res) = resolve_locale(&req, &path) {
        return res;
    }

    let (bearer, user) = match users.login(&form.email, &form.password).await {
        Ok(result) => result,
        Err(err) => return backend_failure(err, &sessions, None).await,
    };

    let Ok(token) = sessions.create(&bearer, &user).await else {
        return HttpResponse::InternalServerError().body("failed to open session");
    };

    HttpResponse::Ok().json(json!({ "token": token, "user": user }))
}

#[post("/{locale}/logout")]
async fn user_logout(
    req: HttpRequest,
    path: Path<String>,
    users: Data<UserAppState>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    if let Err(res) = resolve_locale(&req, &path) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    // the local session dies even if the upstream logout fails
    if let Err(err) = users.logout(&ctx.bearer).await {
        log::warn!("upstream logout failed: {err}");
    }
    let Ok(()) = sessions.invalidate(&ctx.token).await else {
        return HttpResponse::InternalServerError().body("failed to close session");
    };

    HttpResponse::Ok().json(json!({ "message": "logged out" }))
}

#[get("/{locale}/profile")]
async fn profile_get(
    req: HttpRequest,
    path: Path<String>,
    users: Data<UserAppState>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let locale = match resolve_locale(&req, &path) {
        Ok(locale) => locale,
        Err(res) => return res,
    };
    let ctx = match page_session(&req, &sessions, locale).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    match users.me(&ctx.bearer).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[put("/{locale}/profile")]
async fn profile_update(
    req: HttpRequest,
    path: Path<String>,
    payload: Json<UpdateProfilePayload>,
    users: Data<UserAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    if let Err(res) = resolve_locale(&req, &path) {
        return res;
    }
    let ctx = match api_session(&req, &sessions).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };

    match users.update_profile(&ctx.bearer, &payload).await {
        Ok(user) => {
            cache_store.invalidate(&Mutation::User);
            HttpResponse::Ok().json(user)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

#[derive(Debug, Deserialize)]
struct UserListQuery {
    role: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl UserListQuery {
    fn to_query(&self) -> String {
        cache::query_string(&[
            ("role", self.role.clone().unwrap_or_default()),
            ("page", self.page.map(|n| n.to_string()).unwrap_or_default()),
            ("limit", self.limit.map(|n| n.to_string()).unwrap_or_default()),
        ])
    }
}

#[get("/{locale}/users")]
async fn user_query(
    req: HttpRequest,
    path: Path<String>,
    query: Query<UserListQuery>,
    users: Data<UserAppState>,
    cache_store: Data<CacheStore>,
    sessions: Data<SessionStore>,
) -> HttpResponse {
    let locale = match resolve_locale(&req, &path) {
        Ok(locale) => locale,
        Err(res) => return res,
    };
    let ctx = match page_session(&req, &sessions, locale).await {
        Ok(ctx) => ctx,
        Err(res) => return res,
    };
    if let Some(res) = forbid_non_admin(&ctx) {
        return res;
    }

    let qs = query.to_query();
    let key = CacheKey::Users {
        user: ctx.user_id.clone(),
        query: qs.clone(),
    };
    if let Some(hit) = cache_store.get(&key) {
        return HttpResponse::Ok().json(hit);
    }

    match users.user_query(&ctx.bearer, &qs).await {
        Ok(chunk) => {
            if let Ok(value) = serde_json::to_value(&chunk) {
                cache_store.put(key, value);
            }
            HttpResponse::Ok().json(chunk)
        }
        Err(err) => backend_failure(err, &sessions, Some(&ctx.token)).await,
    }
}

// unprefixed paths get their locale, everything else is a miss
async fn fallback(req: HttpRequest) -> HttpResponse {
    match locale::redirect_target(req.path(), req.query_string(), accept_language(&req)) {
        Some(target) => redirect(&target),
        None => HttpResponse::NotFound().body("no such endpoint"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn test_fallback_redirects_unprefixed_paths() {
        let req = TestRequest::get().uri("/rooms?page=2").to_http_request();
        let res = fallback(req).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        let location = res.headers().get("Location").unwrap().to_str().unwrap();
        assert_eq!(location, "/en/rooms?page=2");
    }

    #[actix_web::test]
    async fn test_fallback_misses_static_paths() {
        let req = TestRequest::get().uri("/favicon.ico").to_http_request();
        let res = fallback(req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_resolve_locale_accepts_supported_prefix() {
        let req = TestRequest::get().uri("/my/rooms").to_http_request();
        assert_eq!(resolve_locale(&req, "my").unwrap(), Locale::My);
    }

    #[test]
    fn test_users_gate_requires_admin() {
        let ctx = SessionContext {
            token: "t".to_string(),
            bearer: "b".to_string(),
            user_id: "u1".to_string(),
            role: models::UserRole::Staff,
        };
        assert!(forbid_non_admin(&ctx).is_some());

        let ctx = SessionContext {
            role: models::UserRole::Admin,
            ..ctx
        };
        assert!(forbid_non_admin(&ctx).is_none());
    }

    #[test]
    fn test_resolve_locale_bounces_unknown_prefix() {
        let req = TestRequest::get().uri("/fr/rooms").to_http_request();
        let res = resolve_locale(&req, "fr").unwrap_err();
        assert_eq!(res.status(), StatusCode::FOUND);
        let location = res.headers().get("Location").unwrap().to_str().unwrap();
        assert_eq!(location, "/en/rooms");
    }
}
