//! Dashboard aggregates for agents, landlords and admins.
//!
//! Each figure comes from its own scan; there is no snapshot tying them together.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::StorageResult;
use crate::models::{ApplicationStatus, Property, PropertyStatus, Role};
use crate::storage::Storage;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub verified: usize,
    pub pending: usize,
    pub rejected: usize,
}

impl StatusCounts {
    fn tally<'a>(properties: impl IntoIterator<Item = &'a Property>) -> Self {
        let mut counts = Self::default();
        for property in properties {
            match property.status {
                PropertyStatus::Verified => counts.verified += 1,
                PropertyStatus::Pending => counts.pending += 1,
                PropertyStatus::Rejected => counts.rejected += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentAnalytics {
    pub total_properties: usize,
    pub by_status: StatusCounts,
    pub total_views: u64,
    pub total_inquiries: u64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LandlordAnalytics {
    pub total_properties: usize,
    pub by_status: StatusCounts,
    pub total_views: u64,
    pub total_inquiries: u64,
    pub applications: BTreeMap<ApplicationStatus, usize>,
    pub tenants_housed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminAnalytics {
    pub total_users: usize,
    pub users_by_role: BTreeMap<Role, usize>,
    pub total_properties: usize,
    pub by_status: StatusCounts,
}

/// Inquiry conversion rate as the agent dashboard has always reported it.
///
/// NOTE: `(inquiries * 0.15) / inquiries` is the constant 0.15 whenever there
/// is any inquiry. Kept verbatim until the intended business rule is known.
pub fn conversion_rate(inquiries: u64) -> f64 {
    if inquiries > 0 {
        (inquiries as f64 * 0.15) / inquiries as f64
    } else {
        0.0
    }
}

pub fn agent_analytics(storage: &Storage) -> StorageResult<AgentAnalytics> {
    let properties = storage.all_properties()?;
    let total_views = properties.iter().map(|p| p.views).sum();
    let total_inquiries = properties.iter().map(|p| p.inquiries).sum();

    Ok(AgentAnalytics {
        total_properties: properties.len(),
        by_status: StatusCounts::tally(&properties),
        total_views,
        total_inquiries,
        conversion_rate: conversion_rate(total_inquiries),
    })
}

pub fn landlord_analytics(storage: &Storage, landlord_id: &str) -> StorageResult<LandlordAnalytics> {
    let properties = storage.properties_by_landlord(landlord_id)?;

    let mut applications: BTreeMap<ApplicationStatus, usize> =
        ApplicationStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut tenants_housed = 0;
    for property in &properties {
        for application in storage.applications_for_property(&property.id)? {
            *applications.entry(application.status).or_insert(0) += 1;
        }
        tenants_housed += storage.tenants_for_property(&property.id)?.len();
    }

    Ok(LandlordAnalytics {
        total_properties: properties.len(),
        by_status: StatusCounts::tally(&properties),
        total_views: properties.iter().map(|p| p.views).sum(),
        total_inquiries: properties.iter().map(|p| p.inquiries).sum(),
        applications,
        tenants_housed,
    })
}

pub fn admin_analytics(storage: &Storage) -> StorageResult<AdminAnalytics> {
    let users = storage.all_users()?;
    let mut users_by_role: BTreeMap<Role, usize> = Role::ALL.iter().map(|r| (*r, 0)).collect();
    for user in &users {
        *users_by_role.entry(user.role).or_insert(0) += 1;
    }
    let properties = storage.all_properties()?;

    Ok(AdminAnalytics {
        total_users: users.len(),
        users_by_role,
        total_properties: properties.len(),
        by_status: StatusCounts::tally(&properties),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, Application, User};
    use chrono::Utc;

    #[test]
    fn conversion_rate_matches_dashboard_formula() {
        assert_eq!(conversion_rate(0), 0.0);
        assert!((conversion_rate(1) - 0.15).abs() < f64::EPSILON);
        assert!((conversion_rate(250) - 0.15).abs() < f64::EPSILON);
    }

    fn seed(storage: &Storage) {
        let now = Utc::now();
        for (id, landlord, status) in [
            ("p1", "l1", PropertyStatus::Verified),
            ("p2", "l1", PropertyStatus::Pending),
            ("p3", "l2", PropertyStatus::Rejected),
        ] {
            storage
                .insert_property(&Property {
                    id: id.into(),
                    title: id.into(),
                    description: String::new(),
                    price: "₱1".into(),
                    location: "GenSan".into(),
                    latitude: None,
                    longitude: None,
                    beds: 1,
                    baths: 1,
                    sqft: 1,
                    parking: 0,
                    images: vec![],
                    amenities: vec![],
                    landlord_id: landlord.into(),
                    landlord_name: "L".into(),
                    status,
                    views: 10,
                    inquiries: 0,
                    created_at: now,
                    updated_at: now,
                })
                .unwrap();
        }
        storage
            .create_application(&Application {
                id: "a1".into(),
                property_id: "p1".into(),
                property_title: "p1".into(),
                tenant_id: "t1".into(),
                tenant_name: "T".into(),
                message: String::new(),
                move_in_date: None,
                status: ApplicationStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        for (uid, role) in [("t1", Role::Tenant), ("l1", Role::Landlord), ("l2", Role::Landlord)] {
            storage
                .create_user(&User {
                    uid: uid.into(),
                    name: uid.into(),
                    email: format!("{uid}@example.com"),
                    phone: None,
                    role,
                    address: Address::default(),
                    profile_picture: None,
                    password_hash: String::new(),
                    created_at: now,
                    updated_at: now,
                })
                .unwrap();
        }
    }

    #[test]
    fn agent_totals_cover_all_properties() {
        let storage = Storage::temporary().unwrap();
        seed(&storage);
        let stats = agent_analytics(&storage).unwrap();
        assert_eq!(stats.total_properties, 3);
        assert_eq!(
            stats.by_status,
            StatusCounts {
                verified: 1,
                pending: 1,
                rejected: 1
            }
        );
        assert_eq!(stats.total_views, 30);
        assert_eq!(stats.total_inquiries, 1);
    }

    #[test]
    fn landlord_totals_only_cover_own_listings() {
        let storage = Storage::temporary().unwrap();
        seed(&storage);
        let stats = landlord_analytics(&storage, "l1").unwrap();
        assert_eq!(stats.total_properties, 2);
        assert_eq!(stats.applications[&ApplicationStatus::Pending], 1);
        assert_eq!(stats.applications[&ApplicationStatus::Confirmed], 0);
        assert_eq!(stats.tenants_housed, 0);
    }

    #[test]
    fn admin_counts_users_by_role() {
        let storage = Storage::temporary().unwrap();
        seed(&storage);
        let stats = admin_analytics(&storage).unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.users_by_role[&Role::Landlord], 2);
        assert_eq!(stats.users_by_role[&Role::Admin], 0);
    }
}
