//! HTTP surface.
//!
//! JSON routes under `/api/cart`. Every success is wrapped as
//! `{ success: true, message, data }`; errors are `{ success: false, message }`
//! with the status derived from the error kind (400 validation, 404
//! not-found, 409 conflict).

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use validator::Validate;

use crate::error::CartError;
use crate::service::{CartService, IncomingItem};
use crate::sink::EventSink;
use crate::store::{CartStore, CatalogReader};

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.to_string(),
        }
    }

    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        let status = match &err {
            CartError::Validation(_) => StatusCode::BAD_REQUEST,
            CartError::NotFound(_) => StatusCode::NOT_FOUND,
            CartError::Conflict(_) => StatusCode::CONFLICT,
            CartError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Storage details stay in the logs, not the response body.
        let message = match &err {
            CartError::Store(detail) => {
                tracing::error!(error = %detail, "cart storage failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "message": self.message }));
        (self.status, body).into_response()
    }
}

fn envelope<T: Serialize>(message: &str, data: T) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "message": message, "data": data }))
}

/// Caller identity. Authenticated requests carry `x-user-id`; guests carry
/// `x-session-id` and are keyed under a `guest:` prefix so a later login
/// merge can find the guest cart.
#[derive(Clone, Debug)]
pub struct Identity {
    pub user_id: String,
    pub authenticated: bool,
}

pub fn guest_key(session_id: &str) -> String {
    format!("guest:{session_id}")
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        if let Some(user_id) = header("x-user-id") {
            return Ok(Self {
                user_id,
                authenticated: true,
            });
        }
        if let Some(session_id) = header("x-session-id") {
            return Ok(Self {
                user_id: guest_key(&session_id),
                authenticated: false,
            });
        }
        Err(ApiError::bad_request(
            "missing x-user-id or x-session-id header".to_string(),
        ))
    }
}

/// Batch payload. Quantities are deliberately not validated here: the batch
/// paths clamp instead of rejecting.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsRequest {
    pub items: Vec<IncomingItem>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1, max = 100))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub items: Vec<IncomingItem>,
    pub guest_id: Option<String>,
}

fn validated<T: Validate>(req: &T) -> Result<(), ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

type Service<S, C, E> = Arc<CartService<S, C, E>>;

pub fn router<S, C, E>(service: Service<S, C, E>) -> Router
where
    S: CartStore + 'static,
    C: CatalogReader + 'static,
    E: EventSink + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/cart",
            get(get_cart::<S, C, E>).delete(clear_cart::<S, C, E>),
        )
        .route("/api/cart/add", post(add_item::<S, C, E>))
        .route("/api/cart/sync", post(sync_cart::<S, C, E>))
        .route("/api/cart/replace", put(replace_cart::<S, C, E>))
        .route(
            "/api/cart/items/:item_id",
            patch(update_quantity::<S, C, E>).delete(remove_item::<S, C, E>),
        )
        .route("/api/cart/save", post(save_cart::<S, C, E>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "sipstream-cart" }))
}

async fn get_cart<S: CartStore, C: CatalogReader, E: EventSink>(
    State(svc): State<Service<S, C, E>>,
    identity: Identity,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cart = svc.get_cart(&identity.user_id).await?;
    Ok(envelope("cart fetched", json!({ "cart": cart })))
}

async fn add_item<S: CartStore, C: CatalogReader, E: EventSink>(
    State(svc): State<Service<S, C, E>>,
    identity: Identity,
    Json(req): Json<IncomingItem>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validated(&req)?;
    let (cart, item) = svc.add_item(&identity.user_id, req).await?;
    Ok(envelope("item added to cart", json!({ "cart": cart, "item": item })))
}

async fn sync_cart<S: CartStore, C: CatalogReader, E: EventSink>(
    State(svc): State<Service<S, C, E>>,
    identity: Identity,
    Json(req): Json<ItemsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (cart, results) = svc.sync_cart(&identity.user_id, req.items).await?;
    Ok(envelope("cart synced", json!({ "cart": cart, "results": results })))
}

async fn replace_cart<S: CartStore, C: CatalogReader, E: EventSink>(
    State(svc): State<Service<S, C, E>>,
    identity: Identity,
    Json(req): Json<ItemsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (cart, results) = svc.replace_cart(&identity.user_id, req.items).await?;
    Ok(envelope("cart replaced", json!({ "cart": cart, "results": results })))
}

async fn update_quantity<S: CartStore, C: CatalogReader, E: EventSink>(
    State(svc): State<Service<S, C, E>>,
    identity: Identity,
    Path(item_id): Path<Uuid>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validated(&req)?;
    let cart = svc
        .update_quantity(&identity.user_id, item_id, req.quantity)
        .await?;
    Ok(envelope("quantity updated", json!({ "cart": cart })))
}

async fn remove_item<S: CartStore, C: CatalogReader, E: EventSink>(
    State(svc): State<Service<S, C, E>>,
    identity: Identity,
    Path(item_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cart = svc.remove_item(&identity.user_id, item_id).await?;
    Ok(envelope("item removed", json!({ "cart": cart })))
}

async fn clear_cart<S: CartStore, C: CatalogReader, E: EventSink>(
    State(svc): State<Service<S, C, E>>,
    identity: Identity,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cart = svc.clear_cart(&identity.user_id).await?;
    Ok(envelope("cart cleared", json!({ "cart": cart })))
}

async fn save_cart<S: CartStore, C: CatalogReader, E: EventSink>(
    State(svc): State<Service<S, C, E>>,
    identity: Identity,
    Json(req): Json<SaveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !identity.authenticated {
        return Err(ApiError::unauthorized("authentication required"));
    }
    let guest = req.guest_id.as_deref().map(guest_key);
    let (cart, results) = svc
        .save_cart(&identity.user_id, req.items, guest.as_deref())
        .await?;
    Ok(envelope("cart saved", json!({ "cart": cart, "results": results })))
}
