//! Seed script for DomusEye.
//!
//! Populates the store with one account per role and a handful of listings
//! around General Santos City, most of them already verified so the nearby
//! and search endpoints have something to show.
//! Run: cargo run --bin load_data

use chrono::Utc;

use domuseye::auth::hash_password;
use domuseye::config::AppConfig;
use domuseye::models::{normalize_amenities, Property, PropertyStatus, Role, User};
use domuseye::storage::Storage;

const SEED_PASSWORD: &str = "domuseye123";

// (title, price, location, lat, lng, beds, amenities)
const LISTINGS: &[(&str, &str, &str, f64, f64, u32, &[&str])] = &[
    ("Lagao Studio near KCC", "₱8,500", "Lagao, General Santos City", 6.1283, 125.1903, 1, &["WiFi", "Aircon"]),
    ("Family House in Dadiangas", "₱18,000", "Dadiangas West, General Santos City", 6.1164, 125.1716, 3, &["Parking", "Garden"]),
    ("City Heights Apartment", "₱12,000", "City Heights, General Santos City", 6.1210, 125.1780, 2, &["WiFi", "Security"]),
    ("Calumpang Seaside Unit", "₱10,500", "Calumpang, General Santos City", 6.0850, 125.1500, 2, &["Parking", "Sea view"]),
    ("Bula Bedspace", "₱3,000", "Bula, General Santos City", 6.1010, 125.1420, 1, &["WiFi"]),
    ("San Isidro Townhouse", "₱15,500", "San Isidro, General Santos City", 6.1420, 125.1850, 3, &["Parking", "Pet friendly"]),
    ("Apopong Loft", "₱9,800", "Apopong, General Santos City", 6.1400, 125.1500, 1, &["Aircon"]),
    ("Koronadal Transient Room", "₱5,500", "Koronadal City", 6.5008, 124.8469, 1, &["WiFi"]),
];

fn seed_user(storage: &Storage, name: &str, role: Role) -> Result<User, Box<dyn std::error::Error>> {
    let email = format!("{}@domuseye.local", role.as_str());
    if let Some(existing) = storage.find_user_by_email(&email)? {
        return Ok(existing);
    }
    let now = Utc::now();
    let user = User {
        uid: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        email,
        phone: None,
        role,
        address: Default::default(),
        profile_picture: None,
        password_hash: hash_password(SEED_PASSWORD)?,
        created_at: now,
        updated_at: now,
    };
    storage.create_user(&user)?;
    Ok(user)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let storage = Storage::open(&config.data_dir)?;

    let landlord = seed_user(&storage, "Lorna Landlord", Role::Landlord)?;
    for (name, role) in [
        ("Tomas Tenant", Role::Tenant),
        ("Alma Agent", Role::Agent),
        ("Ador Admin", Role::Admin),
    ] {
        seed_user(&storage, name, role)?;
    }

    let existing = storage.properties_by_landlord(&landlord.uid)?.len();
    if existing > 0 {
        println!("Store already seeded ({existing} listings); nothing to do");
        return Ok(());
    }

    for (i, (title, price, location, lat, lng, beds, amenities)) in LISTINGS.iter().enumerate() {
        let now = Utc::now();
        let property = Property {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: format!("{title}. Contact the landlord through DomusEye to arrange a viewing."),
            price: price.to_string(),
            location: location.to_string(),
            latitude: Some(*lat),
            longitude: Some(*lng),
            beds: *beds,
            baths: 1,
            sqft: 250 + 150 * beds,
            parking: u32::from(amenities.contains(&"Parking")),
            images: vec![],
            amenities: normalize_amenities(amenities.iter().map(|a| a.to_string()).collect()),
            landlord_id: landlord.uid.clone(),
            landlord_name: landlord.name.clone(),
            // Every fourth listing waits for agent review
            status: if i % 4 == 3 {
                PropertyStatus::Pending
            } else {
                PropertyStatus::Verified
            },
            views: 0,
            inquiries: 0,
            created_at: now,
            updated_at: now,
        };
        storage.insert_property(&property)?;
        println!("Listed {} ({})", property.title, property.status);
    }

    storage.flush().await?;
    println!(
        "Seeded {} listings. Sign in as <role>@domuseye.local / {SEED_PASSWORD}",
        LISTINGS.len()
    );
    Ok(())
}
