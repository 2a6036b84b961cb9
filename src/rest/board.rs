//! Per-property community board and rent payment records.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::properties::ensure_manager;
use super::SharedState;
use crate::auth::require_role;
use crate::error::ApiError;
use crate::models::{Claims, CommunityPost, Payment, Property, Role};
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: f64,
    pub method: String,
    pub reference: Option<String>,
}

/// Managers of the listing plus its housed tenants.
fn ensure_member(state: &SharedState, claims: &Claims, property: &Property) -> Result<(), ApiError> {
    if claims.role == Role::Tenant {
        if state.storage.is_tenant_of(&property.id, &claims.sub)? {
            return Ok(());
        }
        return Err(ApiError::forbidden("only tenants of this property may do this"));
    }
    ensure_manager(claims, property)
}

pub(super) async fn create_post(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(property_id): Path<String>,
    Json(payload): Json<PostRequest>,
) -> Result<(StatusCode, Json<CommunityPost>), ApiError> {
    let property = state.storage.require_property(&property_id)?;
    ensure_manager(&claims, &property)?;
    let author = state.storage.require_user(&claims.sub)?;

    let post = CommunityPost {
        id: uuid::Uuid::new_v4().to_string(),
        property_id,
        author_id: author.uid,
        author_name: author.name,
        title: validation::required("title", &payload.title)?,
        body: validation::required("body", &payload.body)?,
        created_at: Utc::now(),
    };
    state.storage.add_community_post(&post)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub(super) async fn list_posts(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(property_id): Path<String>,
) -> Result<Json<Vec<CommunityPost>>, ApiError> {
    let property = state.storage.require_property(&property_id)?;
    ensure_member(&state, &claims, &property)?;
    Ok(Json(state.storage.community_posts(&property_id)?))
}

pub(super) async fn record_payment(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(property_id): Path<String>,
    Json(payload): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    require_role(&claims, &[Role::Tenant])?;
    let property = state.storage.require_property(&property_id)?;
    ensure_member(&state, &claims, &property)?;
    if !payload.amount.is_finite() || payload.amount <= 0.0 {
        return Err(ApiError::bad_request("amount must be a positive number"));
    }

    let payment = Payment {
        id: uuid::Uuid::new_v4().to_string(),
        property_id,
        tenant_id: claims.sub.clone(),
        amount: payload.amount,
        method: validation::required("method", &payload.method)?,
        reference: payload.reference.filter(|r| !r.trim().is_empty()),
        paid_at: Utc::now(),
    };
    state.storage.record_payment(&payment)?;
    tracing::info!(payment_id = %payment.id, property_id = %payment.property_id, amount = payment.amount, "payment recorded");
    Ok((StatusCode::CREATED, Json(payment)))
}

pub(super) async fn list_payments(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(property_id): Path<String>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let property = state.storage.require_property(&property_id)?;
    ensure_manager(&claims, &property)?;
    Ok(Json(state.storage.payments_for_property(&property_id)?))
}

pub(super) async fn my_payments(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.storage.payments_for_tenant(&claims.sub)?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use crate::models::{Application, ApplicationStatus};
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;

    /// A verified listing with one confirmed tenant; returns the tokens and property id.
    async fn housed() -> (TestApp, String, String, String) {
        let app = TestApp::new();
        let (_, landlord) = app.register("Lara", "landlord").await;
        let (tenant_id, tenant) = app.register("Tess", "tenant").await;
        let (_, property) = app
            .json(
                "POST",
                "/properties",
                Some(&landlord),
                Some(json!({ "title": "Loft", "price": "₱9,000", "location": "GenSan" })),
            )
            .await;
        let property_id = property["id"].as_str().unwrap().to_string();

        let now = Utc::now();
        let application = Application {
            id: "app-1".into(),
            property_id: property_id.clone(),
            property_title: "Loft".into(),
            tenant_id,
            tenant_name: "Tess".into(),
            message: String::new(),
            move_in_date: None,
            status: ApplicationStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        app.storage.create_application(&application).unwrap();
        for next in [
            ApplicationStatus::Approved,
            ApplicationStatus::AwaitingTenantConfirmation,
            ApplicationStatus::Confirmed,
        ] {
            app.storage
                .transition_application(&property_id, "app-1", next, now)
                .unwrap();
        }
        (app, landlord, tenant, property_id)
    }

    #[tokio::test]
    async fn board_is_written_by_managers_and_read_by_tenants() {
        let (app, landlord, tenant, property_id) = housed().await;
        let (_, stranger) = app.register("Omar", "tenant").await;
        let uri = format!("/properties/{property_id}/community-board");

        let (status, _) = app
            .json("POST", &uri, Some(&tenant), Some(json!({ "title": "Hi", "body": "x" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, post) = app
            .json("POST", &uri, Some(&landlord), Some(json!({ "title": "Water interruption", "body": "Saturday 8-12" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(post["authorName"], "Lara");

        let (status, posts) = app.json("GET", &uri, Some(&tenant), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posts[0]["title"], "Water interruption");

        let (status, _) = app.json("GET", &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn housed_tenants_record_payments() {
        let (app, landlord, tenant, property_id) = housed().await;
        let (_, stranger) = app.register("Omar", "tenant").await;
        let uri = format!("/properties/{property_id}/payments");

        let (status, _) = app
            .json("POST", &uri, Some(&tenant), Some(json!({ "amount": -5.0, "method": "gcash" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, payment) = app
            .json("POST", &uri, Some(&tenant), Some(json!({ "amount": 9000.0, "method": "gcash", "reference": "GC-1" })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{payment}");

        let (status, _) = app
            .json("POST", &uri, Some(&stranger), Some(json!({ "amount": 1.0, "method": "cash" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, ledger) = app.json("GET", &uri, Some(&landlord), None).await;
        assert_eq!(ledger.as_array().unwrap().len(), 1);
        let (_, mine) = app.json("GET", "/payments/mine", Some(&tenant), None).await;
        assert_eq!(mine[0]["reference"], "GC-1");
    }
}
