use std::convert::Infallible;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::error::QueryError;
use crate::geo::{Geodetic, NominatimClient};
use crate::query::QueryEngine;

/// Everything a request handler needs, injected per route.
#[derive(Clone)]
pub struct ApiContext {
    pub engine: Arc<QueryEngine>,
    /// Absent in offline deployments and tests; handlers degrade to the
    /// "Unknown" address sentinel.
    pub geocoder: Option<Arc<NominatimClient>>,
}

/// Serve the HTTP API until the process is shut down.
pub async fn run(ctx: ApiContext, addr: std::net::SocketAddr) {
    info!(%addr, "orbitrack API listening");
    warp::serve(routes(ctx)).run(addr).await;
}

/// The full route table.
///
/// Longest paths first so `/epochs/{e}/speed` never falls through to the
/// single-record route.
pub fn routes(
    ctx: ApiContext,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let speed = warp::path!("epochs" / String / "speed")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_speed);

    let location = warp::path!("epochs" / String / "location")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_location);

    let single = warp::path!("epochs" / String)
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_single);

    let list = warp::path!("epochs")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_list);

    let now = warp::path!("now")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_now);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_ctx(ctx))
        .and_then(handle_health);

    speed
        .or(location)
        .unify()
        .or(single)
        .unify()
        .or(list)
        .unify()
        .or(now)
        .unify()
        .or(health)
        .unify()
}

fn with_ctx(ctx: ApiContext) -> impl Filter<Extract = (ApiContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    limit: Option<usize>,
    offset: Option<i64>,
}

/// Map the closed error set onto HTTP statuses. Clients branch on status,
/// never on message text.
fn error_response(err: &QueryError) -> Response {
    let status = match err {
        QueryError::Range { .. } => StatusCode::BAD_REQUEST,
        QueryError::NotFound(_) => StatusCode::NOT_FOUND,
        QueryError::InvalidRecord(_) => StatusCode::UNPROCESSABLE_ENTITY,
        QueryError::LocationUnavailable(_) => StatusCode::BAD_GATEWAY,
        QueryError::NoData | QueryError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    warp::reply::with_status(format!("Error: {err}\n"), status).into_response()
}

// --- ROUTE HANDLERS ---

async fn handle_list(query: PageQuery, ctx: ApiContext) -> Result<Response, Infallible> {
    let offset = query.offset.unwrap_or(0);
    Ok(match ctx.engine.list_epochs(offset, query.limit) {
        Ok(records) => warp::reply::json(&records).into_response(),
        Err(e) => error_response(&e),
    })
}

async fn handle_single(epoch: String, ctx: ApiContext) -> Result<Response, Infallible> {
    Ok(match ctx.engine.get_epoch(&epoch) {
        Ok(record) => record.summary().into_response(),
        Err(e) => error_response(&e),
    })
}

async fn handle_speed(epoch: String, ctx: ApiContext) -> Result<Response, Infallible> {
    let record = match ctx.engine.get_epoch(&epoch) {
        Ok(r) => r,
        Err(e) => return Ok(error_response(&e)),
    };
    Ok(match ctx.engine.speed_of(&record) {
        Ok(speed) => format!("Instantaneous speed: {speed} (km/s)\n").into_response(),
        Err(e) => error_response(&e),
    })
}

async fn handle_location(epoch: String, ctx: ApiContext) -> Result<Response, Infallible> {
    let record = match ctx.engine.get_epoch(&epoch) {
        Ok(r) => r,
        Err(e) => return Ok(error_response(&e)),
    };
    let geodetic = match ctx.engine.locate(&record) {
        Ok(g) => g,
        Err(e) => return Ok(error_response(&e)),
    };

    let address = address_for(&ctx, &geodetic).await;
    Ok(warp::reply::json(&json!({
        "latitude": geodetic.latitude,
        "longitude": geodetic.longitude,
        "altitude": geodetic.altitude,
        "address": address,
    }))
    .into_response())
}

async fn handle_now(ctx: ApiContext) -> Result<Response, Infallible> {
    let (speed, record) = match ctx.engine.closest_to(Utc::now()) {
        Ok(hit) => hit,
        Err(e) => return Ok(error_response(&e)),
    };

    let readable = record
        .timestamp()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| record.epoch.clone());

    let mut body = format!(
        "Closest time: {readable}\n\
         Closest position as a vector: {} i + {} j + {} k (km)\n\
         Closest velocity as a vector: {} i + {} j + {} k (km/s)\n\
         Instantaneous speed: {speed} (km/s)\n",
        record.x.value,
        record.y.value,
        record.z.value,
        record.x_dot.value,
        record.y_dot.value,
        record.z_dot.value,
    );

    // Location is best-effort: speed still goes out when the transform or
    // the geocoder cannot answer.
    match ctx.engine.locate(&record) {
        Ok(geodetic) => {
            let address = address_for(&ctx, &geodetic).await;
            body.push_str(&format!(
                "Latitude: {}\nLongitude: {}\nAltitude: {} km\nGeolocation: {}\n",
                geodetic.latitude, geodetic.longitude, geodetic.altitude, address
            ));
        }
        Err(e) => {
            warn!("location unavailable for nearest epoch: {e}");
            body.push_str("Geolocation: Unknown\n");
        }
    }

    Ok(body.into_response())
}

async fn handle_health(ctx: ApiContext) -> Result<Response, Infallible> {
    let probe = ctx.engine.list_epochs(0, Some(0)).map(|_| ()).err();
    let (state, status) = match probe {
        None => ("populated", StatusCode::OK),
        Some(QueryError::NoData) => ("empty", StatusCode::OK),
        Some(_) => ("unavailable", StatusCode::SERVICE_UNAVAILABLE),
    };
    Ok(
        warp::reply::with_status(warp::reply::json(&json!({ "store": state })), status)
            .into_response(),
    )
}

/// Resolve a ground address, degrading to the sentinel on any failure.
async fn address_for(ctx: &ApiContext, geodetic: &Geodetic) -> String {
    match &ctx.geocoder {
        Some(client) => client
            .reverse(geodetic.latitude, geodetic.longitude)
            .await
            .unwrap_or_else(|| "Unknown".to_string()),
        None => "Unknown".to_string(),
    }
}
