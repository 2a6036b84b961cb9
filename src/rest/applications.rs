//! Rental applications: tenants apply, landlords decide, tenants confirm.

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
use crate::models::{Application, ApplicationStatus, Claims, PropertyStatus, Role};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[serde(default)]
    pub message: String,
    pub move_in_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,
}

pub(super) async fn apply_handler(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(property_id): Path<String>,
    Json(payload): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    require_role(&claims, &[Role::Tenant])?;
    let property = state.storage.require_property(&property_id)?;
    if property.status != PropertyStatus::Verified {
        return Err(ApiError::Conflict(
            "property is not open for applications".to_string(),
        ));
    }
    let tenant = state.storage.require_user(&claims.sub)?;

    let now = Utc::now();
    let application = Application {
        id: uuid::Uuid::new_v4().to_string(),
        property_id: property.id,
        property_title: property.title,
        tenant_id: tenant.uid,
        tenant_name: tenant.name,
        message: payload.message.trim().to_string(),
        move_in_date: payload.move_in_date.filter(|d| !d.trim().is_empty()),
        status: ApplicationStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    state.storage.create_application(&application)?;
    tracing::info!(
        application_id = %application.id,
        property_id = %application.property_id,
        tenant_id = %application.tenant_id,
        "application submitted"
    );
    Ok((StatusCode::CREATED, Json(application)))
}

pub(super) async fn list_for_property(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(property_id): Path<String>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let property = state.storage.require_property(&property_id)?;
    ensure_manager(&claims, &property)?;
    Ok(Json(state.storage.applications_for_property(&property_id)?))
}

pub(super) async fn my_applications(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Application>>, ApiError> {
    require_role(&claims, &[Role::Tenant])?;
    let mut applications = state.storage.applications_for_tenant(&claims.sub)?;
    applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(applications))
}

/// Landlord-side decisions belong to the property's managers; the final
/// confirm or decline belongs to the applicant alone.
pub(super) async fn update_status_handler(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path((property_id, application_id)): Path<(String, String)>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Application>, ApiError> {
    let application = state
        .storage
        .get_application(&property_id, &application_id)?
        .ok_or_else(|| ApiError::NotFound(format!("application not found: {application_id}")))?;

    if payload.status.decided_by_tenant() {
        if application.tenant_id != claims.sub {
            return Err(ApiError::forbidden("only the applicant may answer an offer"));
        }
    } else {
        let property = state.storage.require_property(&property_id)?;
        ensure_manager(&claims, &property)?;
    }

    let updated = state.storage.transition_application(
        &property_id,
        &application_id,
        payload.status,
        Utc::now(),
    )?;
    tracing::info!(
        application_id = %application_id,
        from = %application.status,
        to = %updated.status,
        actor = %claims.sub,
        "application status changed"
    );
    Ok(Json(updated))
}
