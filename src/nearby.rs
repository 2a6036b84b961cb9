//! Great-circle distance ranking for "nearby properties".
//!
//! Haversine on a spherical Earth: good enough at city scale, not geodesically exact.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use utoipa::ToSchema;

use crate::models::Property;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Range check for user-supplied reference points.
    pub fn validate(&self) -> Result<(), String> {
        if !self.is_finite() {
            return Err("coordinates must be finite numbers".into());
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude {} out of range", self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("longitude {} out of range", self.longitude));
        }
        Ok(())
    }
}

/// Distance between two points in kilometres.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Anything that may carry a position.
pub trait Located {
    fn coordinate(&self) -> Option<Coordinate>;
}

impl Located for Coordinate {
    fn coordinate(&self) -> Option<Coordinate> {
        Some(*self)
    }
}

impl Located for Property {
    fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
            _ => None,
        }
    }
}

impl<T: Located> Located for &T {
    fn coordinate(&self) -> Option<Coordinate> {
        (**self).coordinate()
    }
}

/// A candidate annotated with its distance from the reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub item: T,
    pub distance_km: f64,
}

impl<T> Ranked<T> {
    /// Distance rounded to one decimal place.
    pub fn rounded_km(&self) -> f64 {
        round_km(self.distance_km)
    }

    /// e.g. `"3.2 km away"`.
    pub fn label(&self) -> String {
        format!("{:.1} km away", self.rounded_km())
    }
}

impl<T: Located> Located for Ranked<T> {
    fn coordinate(&self) -> Option<Coordinate> {
        self.item.coordinate()
    }
}

pub fn round_km(km: f64) -> f64 {
    (km * 10.0).round() / 10.0
}

/// Ranks candidates by ascending distance from `origin`.
///
/// Candidates without a finite coordinate are dropped. Equal distances keep
/// their input order.
pub fn rank_by_distance<T, I>(origin: Coordinate, candidates: I) -> Vec<Ranked<T>>
where
    T: Located,
    I: IntoIterator<Item = T>,
{
    let mut ranked: Vec<Ranked<T>> = candidates
        .into_iter()
        .filter_map(|item| {
            let point = item.coordinate().filter(Coordinate::is_finite)?;
            let distance_km = haversine_km(origin, point);
            Some(Ranked { item, distance_km })
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENSAN: Coordinate = Coordinate {
        latitude: 6.1164,
        longitude: 125.1716,
    };

    #[derive(Debug, Clone, PartialEq)]
    struct Pin {
        name: &'static str,
        lat: Option<f64>,
        lng: Option<f64>,
    }

    impl Located for Pin {
        fn coordinate(&self) -> Option<Coordinate> {
            Some(Coordinate::new(self.lat?, self.lng?))
        }
    }

    fn pin(name: &'static str, lat: Option<f64>, lng: Option<f64>) -> Pin {
        Pin { name, lat, lng }
    }

    #[test]
    fn same_point_is_zero_and_first() {
        let candidates = vec![
            pin("far", Some(6.2164), Some(125.1716)),
            pin("here", Some(6.1164), Some(125.1716)),
        ];
        let ranked = rank_by_distance(GENSAN, candidates);
        assert_eq!(ranked[0].item.name, "here");
        assert_eq!(ranked[0].distance_km, 0.0);
        assert_eq!(ranked[0].label(), "0.0 km away");
    }

    #[test]
    fn increasing_offsets_rank_ascending() {
        let candidates = vec![
            pin("0.1", Some(GENSAN.latitude + 0.1), Some(GENSAN.longitude)),
            pin("0.01", Some(GENSAN.latitude + 0.01), Some(GENSAN.longitude)),
            pin("0.05", Some(GENSAN.latitude + 0.05), Some(GENSAN.longitude)),
        ];
        let ranked = rank_by_distance(GENSAN, candidates);
        let names: Vec<&str> = ranked.iter().map(|r| r.item.name).collect();
        assert_eq!(names, vec!["0.01", "0.05", "0.1"]);

        // 0.1 degree of latitude is roughly 11.1 km
        assert_eq!(ranked[2].rounded_km(), 11.1);
        assert_eq!(ranked[2].label(), "11.1 km away");
    }

    #[test]
    fn label_agrees_with_rounded_distance_at_half_steps() {
        for (km, expected) in [(0.25, "0.3 km away"), (0.75, "0.8 km away"), (2.25, "2.3 km away")] {
            let ranked = Ranked { item: (), distance_km: km };
            assert_eq!(ranked.label(), expected);
            assert_eq!(ranked.label(), format!("{:.1} km away", ranked.rounded_km()));
        }
    }

    #[test]
    fn missing_coordinates_are_excluded() {
        let candidates = vec![
            pin("a", Some(6.12), Some(125.17)),
            pin("no-lng", Some(6.13), None),
            pin("b", Some(6.14), Some(125.18)),
            pin("nan", Some(f64::NAN), Some(125.0)),
        ];
        let ranked = rank_by_distance(GENSAN, candidates);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.item.name != "no-lng" && r.item.name != "nan"));
    }

    #[test]
    fn ties_keep_input_order() {
        let candidates = vec![
            pin("first", Some(6.2), Some(125.1716)),
            pin("second", Some(6.2), Some(125.1716)),
        ];
        let ranked = rank_by_distance(GENSAN, candidates);
        assert_eq!(ranked[0].item.name, "first");
        assert_eq!(ranked[1].item.name, "second");
    }

    #[test]
    fn antipodal_distance_is_half_circumference() {
        let d = haversine_km(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert!(GENSAN.validate().is_ok());
        assert!(Coordinate::new(91.0, 0.0).validate().is_err());
        assert!(Coordinate::new(0.0, -181.0).validate().is_err());
        assert!(Coordinate::new(f64::INFINITY, 0.0).validate().is_err());
    }
}
