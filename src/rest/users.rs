//! Profile endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::SharedState;
use crate::error::ApiError;
use crate::models::{Address, Claims, PublicUser};
use crate::validation;

/// Email and role are fixed at registration.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub profile_picture: Option<String>,
}

pub(super) async fn me_handler(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state.storage.require_user(&claims.sub)?;
    Ok(Json(PublicUser::from(&user)))
}

pub(super) async fn update_me_handler(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let mut user = state.storage.require_user(&claims.sub)?;
    if let Some(name) = payload.name {
        user.name = validation::required("name", &name)?;
    }
    if let Some(phone) = payload.phone {
        user.phone = Some(phone.trim().to_string()).filter(|p| !p.is_empty());
    }
    if let Some(address) = payload.address {
        user.address = address;
    }
    if let Some(picture) = payload.profile_picture {
        user.profile_picture = Some(picture.trim().to_string()).filter(|p| !p.is_empty());
    }
    user.updated_at = Utc::now();
    state.storage.update_user(&user)?;
    Ok(Json(PublicUser::from(&user)))
}

pub(super) async fn get_user_handler(
    State(state): State<SharedState>,
    Path(uid): Path<String>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state.storage.require_user(&uid)?;
    Ok(Json(PublicUser::from(&user)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn profile_updates_keep_email_and_role() {
        let app = TestApp::new();
        let (uid, token) = app.register("Tess", "tenant").await;

        let (status, me) = app
            .json(
                "PUT",
                "/users/me",
                Some(&token),
                Some(json!({
                    "name": "Tess Cruz",
                    "phone": "0917 000 0000",
                    "address": { "city": "General Santos", "barangay": "Lagao" },
                    "email": "ignored@domuseye.test",
                    "role": "admin",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["name"], "Tess Cruz");
        assert_eq!(me["address"]["barangay"], "Lagao");
        assert_eq!(me["email"], "tess@domuseye.test");
        assert_eq!(me["role"], "tenant");

        let (status, public) = app.json("GET", &format!("/users/{uid}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(public["phone"], "0917 000 0000");

        let (status, _) = app.json("PUT", "/users/me", Some(&token), Some(json!({ "name": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
