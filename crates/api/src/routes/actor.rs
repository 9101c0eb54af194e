//! Actor extraction from request headers.
//!
//! Authentication lives upstream; the proxy injects the identity it
//! established as headers, and this module only translates them into a
//! [`domain::capability::Actor`].

use axum::http::HeaderMap;
use common::{ShopId, UserId};
use domain::capability::Actor;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated customer id.
pub const USER_HEADER: &str = "x-user-id";

/// Header carrying the shop a staff account manages.
pub const SHOP_HEADER: &str = "x-shop-id";

fn header_uuid(headers: &HeaderMap, name: &'static str) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("{name} is not valid text")))?;
    let uuid = Uuid::parse_str(text)
        .map_err(|_| ApiError::BadRequest(format!("{name} is not a valid id")))?;
    Ok(Some(uuid))
}

/// Resolves the acting identity from request headers.
pub fn from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = header_uuid(headers, USER_HEADER)?;
    let shop_id = header_uuid(headers, SHOP_HEADER)?;

    match (user_id, shop_id) {
        (Some(user), Some(shop)) => Ok(Actor::ShopOwner {
            user_id: UserId::from_uuid(user),
            shop_id: ShopId::from_uuid(shop),
        }),
        (Some(user), None) => Ok(Actor::Customer(UserId::from_uuid(user))),
        (None, _) => Err(ApiError::Unauthorized(
            "no authenticated identity on the request".to_string(),
        )),
    }
}

/// Requires the actor to be a customer and returns their id.
pub fn require_customer(actor: &Actor) -> Result<UserId, ApiError> {
    match actor {
        Actor::Customer(user_id) => Ok(*user_id),
        _ => Err(ApiError::Forbidden(
            "this endpoint is for customer accounts".to_string(),
        )),
    }
}
