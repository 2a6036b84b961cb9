//! Property search: linear-scan filtering plus page arithmetic.
//!
//! The candidate set is small (tens to low hundreds of listings), so every
//! query walks the whole collection.

use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::models::{Property, PropertyStatus};

pub const DEFAULT_PER_PAGE: usize = 9;
pub const MAX_PER_PAGE: usize = 50;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PropertyQuery {
    /// Free text matched against title, location and description.
    pub q: Option<String>,
    pub status: Option<PropertyStatus>,
    pub landlord_id: Option<String>,
    pub min_beds: Option<u32>,
    pub amenity: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// 1-based.
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Slices one page out of `items`. Pages past the end come back empty.
pub fn paginate<T>(items: Vec<T>, page: Option<usize>, per_page: Option<usize>) -> Page<T> {
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let page = page.unwrap_or(1).max(1);
    let total = items.len();
    let total_pages = total.div_ceil(per_page);

    let start = (page - 1).saturating_mul(per_page);
    let items = items.into_iter().skip(start).take(per_page).collect();

    Page {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}

/// Reads a display price such as `"₱12,500.50/mo"` as a number.
///
/// Keeps digits and the first decimal point; returns `None` when no digit is present.
pub fn parse_price(raw: &str) -> Option<f64> {
    let mut cleaned = String::new();
    let mut seen_dot = false;
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            cleaned.push(ch);
        } else if ch == '.' && !seen_dot && !cleaned.is_empty() {
            seen_dot = true;
            cleaned.push(ch);
        } else if ch == '/' {
            // "₱8,000/month": the rest is a unit
            break;
        }
    }
    cleaned.trim_end_matches('.').parse().ok()
}

impl PropertyQuery {
    pub fn matches(&self, property: &Property) -> bool {
        if let Some(status) = self.status {
            if property.status != status {
                return false;
            }
        }
        if let Some(landlord_id) = &self.landlord_id {
            if &property.landlord_id != landlord_id {
                return false;
            }
        }
        if let Some(min_beds) = self.min_beds {
            if property.beds < min_beds {
                return false;
            }
        }
        if let Some(amenity) = self.amenity.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            if !property
                .amenities
                .iter()
                .any(|a| a.eq_ignore_ascii_case(amenity))
            {
                return false;
            }
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            let Some(price) = parse_price(&property.price) else {
                return false;
            };
            if self.min_price.is_some_and(|min| price < min) {
                return false;
            }
            if self.max_price.is_some_and(|max| price > max) {
                return false;
            }
        }
        if let Some(text) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = text.to_lowercase();
            let hit = [&property.title, &property.location, &property.description]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Filters, orders newest first and paginates.
pub fn search(properties: Vec<Property>, query: &PropertyQuery) -> Page<Property> {
    let mut hits: Vec<Property> = properties
        .into_iter()
        .filter(|p| query.matches(p))
        .collect();
    hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    paginate(hits, query.page, query.per_page)
}
