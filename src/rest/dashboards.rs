//! Role dashboards and the unread-message notification endpoints.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use super::SharedState;
use crate::analytics::{self, AdminAnalytics, AgentAnalytics, LandlordAnalytics};
use crate::auth::require_role;
use crate::error::ApiError;
use crate::models::{Claims, Role};
use crate::notifications::NotificationFeed;

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandlordQuery {
    /// Admins may inspect any landlord; landlords always see themselves.
    pub landlord_id: Option<String>,
}

pub(super) async fn agent_handler(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<AgentAnalytics>, ApiError> {
    require_role(&claims, &[Role::Agent, Role::Admin])?;
    Ok(Json(analytics::agent_analytics(&state.storage)?))
}

pub(super) async fn landlord_handler(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LandlordQuery>,
) -> Result<Json<LandlordAnalytics>, ApiError> {
    require_role(&claims, &[Role::Landlord, Role::Admin])?;
    let landlord_id = match (claims.role, query.landlord_id) {
        (Role::Admin, Some(id)) => id,
        _ => claims.sub.clone(),
    };
    Ok(Json(analytics::landlord_analytics(&state.storage, &landlord_id)?))
}

pub(super) async fn admin_handler(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<AdminAnalytics>, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    Ok(Json(analytics::admin_analytics(&state.storage)?))
}

pub(super) async fn unread_handler(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UnreadCount>, ApiError> {
    Ok(Json(UnreadCount {
        unread: state.storage.unread_total(&claims.sub)?,
    }))
}

/// Server-sent `unread` events: the current count first, then every change.
/// The feed is stopped when the client disconnects and the stream is dropped.
pub(super) async fn unread_stream_handler(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let mut feed = NotificationFeed::new(state.storage.clone(), claims.sub.clone());
    feed.start()?;
    let receiver = feed
        .subscribe()
        .ok_or_else(|| ApiError::Internal("notification feed did not start".to_string()))?;

    let events = stream::unfold((feed, receiver, true), |(feed, mut receiver, first)| async move {
        if !first && receiver.changed().await.is_err() {
            return None;
        }
        let count = *receiver.borrow_and_update();
        let event = Event::default().event("unread").data(count.to_string());
        Some((Ok(event), (feed, receiver, false)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
