//! Listing, searching and managing properties.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::SharedState;
use crate::auth::require_role;
use crate::error::ApiError;
use crate::models::{normalize_amenities, Claims, Property, PropertyStatus, PropertyTenant, Role};
use crate::nearby::{rank_by_distance, Coordinate};
use crate::query::{search, Page, PropertyQuery};
use crate::validation;

pub const DEFAULT_NEARBY_LIMIT: usize = 6;

/// Agents and admins manage every listing; landlords only their own.
pub(super) fn ensure_manager(claims: &Claims, property: &Property) -> Result<(), ApiError> {
    match claims.role {
        Role::Agent | Role::Admin => Ok(()),
        Role::Landlord if property.landlord_id == claims.sub => Ok(()),
        _ => Err(ApiError::forbidden("only the listing's landlord may do this")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub beds: u32,
    #[serde(default)]
    pub baths: u32,
    #[serde(default)]
    pub sqft: u32,
    #[serde(default)]
    pub parking: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePropertyRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub beds: Option<u32>,
    pub baths: Option<u32>,
    pub sqft: Option<u32>,
    pub parking: Option<u32>,
    pub images: Option<Vec<String>>,
    pub amenities: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PropertyStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NearbyParams {
    /// Reference latitude in degrees.
    pub lat: f64,
    /// Reference longitude in degrees.
    pub lng: f64,
    /// Maximum results, default 6.
    pub limit: Option<usize>,
    /// Listing status to consider, default `verified`.
    pub status: Option<PropertyStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NearbyProperty {
    #[serde(flatten)]
    pub property: Property,
    /// Rounded to one decimal place.
    pub distance_km: f64,
    /// e.g. `"1.2 km away"`.
    pub distance_label: String,
}

#[utoipa::path(
    get,
    path = "/properties",
    params(PropertyQuery),
    responses((status = 200, description = "One page of matching properties, newest first"))
)]
pub(super) async fn search_properties(
    State(state): State<SharedState>,
    Query(mut query): Query<PropertyQuery>,
) -> Result<Json<Page<Property>>, ApiError> {
    // Unreviewed listings only show up when asked for by status
    query.status.get_or_insert(PropertyStatus::Verified);
    let properties = state.storage.all_properties()?;
    Ok(Json(search(properties, &query)))
}

#[utoipa::path(
    get,
    path = "/properties/nearby",
    params(NearbyParams),
    responses(
        (status = 200, description = "Closest listings first", body = Vec<NearbyProperty>),
        (status = 400, description = "Reference point out of range")
    )
)]
pub(super) async fn nearby_properties(
    State(state): State<SharedState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<NearbyProperty>>, ApiError> {
    let origin = Coordinate::new(params.lat, params.lng);
    origin.validate().map_err(ApiError::BadRequest)?;
    let status = params.status.unwrap_or(PropertyStatus::Verified);
    let limit = params.limit.unwrap_or(DEFAULT_NEARBY_LIMIT);

    let candidates = state
        .storage
        .all_properties()?
        .into_iter()
        .filter(|p| p.status == status);

    let nearby = rank_by_distance(origin, candidates)
        .into_iter()
        .take(limit)
        .map(|ranked| NearbyProperty {
            distance_km: ranked.rounded_km(),
            distance_label: ranked.label(),
            property: ranked.item,
        })
        .collect();
    Ok(Json(nearby))
}

#[utoipa::path(
    get,
    path = "/properties/{id}",
    params(("id" = String, Path, description = "Property id")),
    responses(
        (status = 200, description = "The property; its view counter is incremented", body = Property),
        (status = 404, description = "No such property")
    )
)]
pub(super) async fn get_property(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Property>, ApiError> {
    Ok(Json(state.storage.record_property_view(&id)?))
}

pub(super) async fn create_property(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<Property>), ApiError> {
    require_role(&claims, &[Role::Landlord, Role::Admin])?;
    let title = validation::required("title", &payload.title)?;
    let price = validation::required("price", &payload.price)?;
    let location = validation::required("location", &payload.location)?;
    validation::coordinates(payload.latitude, payload.longitude)?;

    let landlord = state.storage.require_user(&claims.sub)?;
    let now = Utc::now();
    let property = Property {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        description: payload.description.trim().to_string(),
        price,
        location,
        latitude: payload.latitude,
        longitude: payload.longitude,
        beds: payload.beds,
        baths: payload.baths,
        sqft: payload.sqft,
        parking: payload.parking,
        images: payload.images,
        amenities: normalize_amenities(payload.amenities),
        landlord_id: landlord.uid,
        landlord_name: landlord.name,
        status: PropertyStatus::Pending,
        views: 0,
        inquiries: 0,
        created_at: now,
        updated_at: now,
    };
    state.storage.insert_property(&property)?;
    tracing::info!(property_id = %property.id, landlord_id = %property.landlord_id, "property listed");
    Ok((StatusCode::CREATED, Json(property)))
}

pub(super) async fn update_property(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePropertyRequest>,
) -> Result<Json<Property>, ApiError> {
    let property = state.storage.require_property(&id)?;
    match claims.role {
        Role::Admin => {}
        Role::Landlord if property.landlord_id == claims.sub => {}
        _ => return Err(ApiError::forbidden("only the listing's landlord may edit it")),
    }

    // Validate everything before touching the stored record
    let title = payload
        .title
        .as_deref()
        .map(|title| validation::required("title", title))
        .transpose()?;
    let price = payload
        .price
        .as_deref()
        .map(|price| validation::required("price", price))
        .transpose()?;
    let location = payload
        .location
        .as_deref()
        .map(|location| validation::required("location", location))
        .transpose()?;
    let description = payload.description.as_deref().map(|d| d.trim().to_string());
    let coordinates = if payload.latitude.is_some() || payload.longitude.is_some() {
        validation::coordinates(payload.latitude, payload.longitude)?;
        Some((payload.latitude, payload.longitude))
    } else {
        None
    };
    let amenities = payload.amenities.map(normalize_amenities);
    let now = Utc::now();

    let updated = state.storage.modify_property(&id, |property| {
        if let Some(title) = &title {
            property.title = title.clone();
        }
        if let Some(price) = &price {
            property.price = price.clone();
        }
        if let Some(location) = &location {
            property.location = location.clone();
        }
        if let Some(description) = &description {
            property.description = description.clone();
        }
        if let Some((latitude, longitude)) = coordinates {
            property.latitude = latitude;
            property.longitude = longitude;
        }
        property.beds = payload.beds.unwrap_or(property.beds);
        property.baths = payload.baths.unwrap_or(property.baths);
        property.sqft = payload.sqft.unwrap_or(property.sqft);
        property.parking = payload.parking.unwrap_or(property.parking);
        if let Some(images) = &payload.images {
            property.images = images.clone();
        }
        if let Some(amenities) = &amenities {
            property.amenities = amenities.clone();
        }
        property.updated_at = now;
    })?;
    Ok(Json(updated))
}

pub(super) async fn set_property_status(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Property>, ApiError> {
    require_role(&claims, &[Role::Agent, Role::Admin])?;
    let previous = state.storage.require_property(&id)?.status;
    let now = Utc::now();
    let property = state.storage.modify_property(&id, |property| {
        property.status = payload.status;
        property.updated_at = now;
    })?;
    tracing::info!(property_id = %id, from = %previous, to = %property.status, reviewer = %claims.sub, "property reviewed");
    Ok(Json(property))
}

pub(super) async fn list_tenants(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PropertyTenant>>, ApiError> {
    let property = state.storage.require_property(&id)?;
    ensure_manager(&claims, &property)?;
    Ok(Json(state.storage.tenants_for_property(&id)?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    async fn list(app: &TestApp, token: &str, title: &str, lat: f64, lng: f64) -> String {
        let (status, body) = app
            .json(
                "POST",
                "/properties",
                Some(token),
                Some(json!({
                    "title": title,
                    "price": "₱10,000",
                    "location": "General Santos City",
                    "latitude": lat,
                    "longitude": lng,
                    "beds": 2,
                    "amenities": ["WiFi", " Parking ", "WiFi"],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["status"], "pending");
        body["id"].as_str().unwrap().to_string()
    }

    async fn verify(app: &TestApp, agent: &str, id: &str) {
        let (status, body) = app
            .json(
                "PUT",
                &format!("/properties/{id}/status"),
                Some(agent),
                Some(json!({ "status": "verified" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    #[tokio::test]
    async fn landlord_lists_and_agent_verifies() {
        let app = TestApp::new();
        let (landlord_id, landlord) = app.register("Lara", "landlord").await;
        let (_, agent) = app.register("Aldo", "agent").await;
        let (_, tenant) = app.register("Tess", "tenant").await;

        let (status, _) = app
            .json("POST", "/properties", Some(&tenant), Some(json!({ "title": "x", "price": "1", "location": "y" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let id = list(&app, &landlord, "Loft", 6.1164, 125.1716).await;
        let stored = app.storage.require_property(&id).unwrap();
        assert_eq!(stored.landlord_id, landlord_id);
        assert_eq!(stored.amenities, vec!["Parking".to_string(), "WiFi".to_string()]);

        let (status, _) = app
            .json("PUT", &format!("/properties/{id}/status"), Some(&landlord), Some(json!({ "status": "verified" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        verify(&app, &agent, &id).await;
        assert_eq!(
            app.storage.require_property(&id).unwrap().status,
            crate::models::PropertyStatus::Verified
        );
    }

    #[tokio::test]
    async fn create_rejects_half_coordinates_and_blank_fields() {
        let app = TestApp::new();
        let (_, landlord) = app.register("Lara", "landlord").await;
        let (status, body) = app
            .json(
                "POST",
                "/properties",
                Some(&landlord),
                Some(json!({ "title": "Loft", "price": "₱1", "location": "GenSan", "latitude": 6.1 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "latitude and longitude must be provided together");

        let (status, body) = app
            .json("POST", "/properties", Some(&landlord), Some(json!({ "title": " ", "price": "₱1", "location": "GenSan" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "title is required");
    }

    #[tokio::test]
    async fn only_the_owner_edits() {
        let app = TestApp::new();
        let (_, owner) = app.register("Lara", "landlord").await;
        let (_, other) = app.register("Liam", "landlord").await;
        let id = list(&app, &owner, "Loft", 6.1, 125.1).await;
        app.json("GET", &format!("/properties/{id}"), None, None).await;

        let (status, _) = app
            .json("PUT", &format!("/properties/{id}"), Some(&other), Some(json!({ "title": "Mine now" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .json("PUT", &format!("/properties/{id}"), Some(&owner), Some(json!({ "title": "Sunny Loft", "beds": 3 })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Sunny Loft");
        assert_eq!(body["beds"], 3);
        assert_eq!(body["location"], "General Santos City");
        // Counters written by others survive the edit
        assert_eq!(body["views"], 1);
    }

    #[tokio::test]
    async fn viewing_increments_views() {
        let app = TestApp::new();
        let (_, landlord) = app.register("Lara", "landlord").await;
        let id = list(&app, &landlord, "Loft", 6.1, 125.1).await;

        app.json("GET", &format!("/properties/{id}"), None, None).await;
        let (status, body) = app.json("GET", &format!("/properties/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["views"], 2);

        let (status, _) = app.json("GET", "/properties/missing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn nearby_ranks_verified_listings_by_distance() {
        let app = TestApp::new();
        let (_, landlord) = app.register("Lara", "landlord").await;
        let (_, agent) = app.register("Aldo", "agent").await;

        let far = list(&app, &landlord, "Far", 6.2000, 125.2000).await;
        let near = list(&app, &landlord, "Near", 6.1200, 125.1750).await;
        let unverified = list(&app, &landlord, "Hidden", 6.1165, 125.1717).await;
        verify(&app, &agent, &far).await;
        verify(&app, &agent, &near).await;

        let (status, body) = app
            .json("GET", "/properties/nearby?lat=6.1164&lng=125.1716", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![near.as_str(), far.as_str()]);
        assert!(!ids.contains(&unverified.as_str()));

        let first: &Value = &body[0];
        assert!(first["distanceKm"].as_f64().unwrap() < 1.0);
        assert!(first["distanceLabel"].as_str().unwrap().ends_with(" km away"));

        let (_, limited) = app
            .json("GET", "/properties/nearby?lat=6.1164&lng=125.1716&limit=1", None, None)
            .await;
        assert_eq!(limited.as_array().unwrap().len(), 1);

        let (status, _) = app
            .json("GET", "/properties/nearby?lat=95&lng=0", None, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn search_filters_and_paginates() {
        let app = TestApp::new();
        let (_, landlord) = app.register("Lara", "landlord").await;
        let (_, agent) = app.register("Aldo", "agent").await;
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(list(&app, &landlord, &format!("Unit {i}"), 6.1, 125.1).await);
        }
        for id in &ids[..3] {
            verify(&app, &agent, id).await;
        }

        let (status, body) = app
            .json("GET", "/properties?q=unit&perPage=2", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);

        let (_, body) = app.json("GET", "/properties?status=pending", None, None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["id"], ids[3].as_str());
    }
}
