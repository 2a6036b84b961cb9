use domuseye::nearby::{haversine_km, rank_by_distance, Coordinate, Located};
use proptest::prelude::*;
use proptest::test_runner::Config;

#[derive(Debug, Clone, PartialEq)]
struct Listing {
    id: usize,
    at: Option<Coordinate>,
}

impl Located for Listing {
    fn coordinate(&self) -> Option<Coordinate> {
        self.at
    }
}

fn coordinate() -> impl Strategy<Value = Coordinate> {
    (-90.0_f64..=90.0, -180.0_f64..=180.0).prop_map(|(lat, lng)| Coordinate::new(lat, lng))
}

fn listings() -> impl Strategy<Value = Vec<Listing>> {
    prop::collection::vec(prop::option::weighted(0.8, coordinate()), 0..40).prop_map(|points| {
        points
            .into_iter()
            .enumerate()
            .map(|(id, at)| Listing { id, at })
            .collect()
    })
}

proptest! {
    #![proptest_config(Config::with_cases(256))]

    #[test]
    fn distance_is_symmetric_and_non_negative(a in coordinate(), b in coordinate()) {
        let ab = haversine_km(a, b);
        let ba = haversine_km(b, a);
        prop_assert!(ab >= 0.0);
        prop_assert!((ab - ba).abs() < 1e-6);
        // Half the Earth's circumference bounds every great-circle distance
        prop_assert!(ab <= std::f64::consts::PI * 6371.0 + 1e-6);
    }

    #[test]
    fn distance_to_self_is_zero(a in coordinate()) {
        prop_assert!(haversine_km(a, a).abs() < 1e-9);
    }

    #[test]
    fn triangle_inequality_holds(a in coordinate(), b in coordinate(), c in coordinate()) {
        prop_assert!(haversine_km(a, c) <= haversine_km(a, b) + haversine_km(b, c) + 1e-6);
    }

    #[test]
    fn ranking_is_sorted_and_drops_unlocated(origin in coordinate(), items in listings()) {
        let located = items.iter().filter(|l| l.at.is_some()).count();
        let ranked = rank_by_distance(origin, items.clone());

        prop_assert_eq!(ranked.len(), located);
        prop_assert!(ranked.iter().all(|r| r.item.at.is_some()));
        prop_assert!(ranked.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
        for r in &ranked {
            let expected = haversine_km(origin, r.item.at.unwrap());
            prop_assert!((r.distance_km - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn ranking_is_stable_and_idempotent(origin in coordinate(), items in listings()) {
        let once = rank_by_distance(origin, items);
        let twice = rank_by_distance(origin, once.iter().map(|r| r.item.clone()).collect::<Vec<_>>());
        let ids = |v: &[domuseye::nearby::Ranked<Listing>]| v.iter().map(|r| r.item.id).collect::<Vec<_>>();
        prop_assert_eq!(ids(&once), ids(&twice));

        // Ties keep input order
        for w in once.windows(2) {
            if w[0].distance_km == w[1].distance_km {
                prop_assert!(w[0].item.id < w[1].item.id);
            }
        }
    }
}

#[test]
fn non_finite_coordinates_are_excluded() {
    let origin = Coordinate::new(6.1164, 125.1716);
    let items = vec![
        Listing { id: 0, at: Some(Coordinate::new(f64::NAN, 125.0)) },
        Listing { id: 1, at: Some(Coordinate::new(6.12, 125.18)) },
        Listing { id: 2, at: Some(Coordinate::new(6.0, f64::INFINITY)) },
        Listing { id: 3, at: None },
    ];
    let ranked = rank_by_distance(origin, items);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].item.id, 1);
    assert!(ranked[0].label().ends_with(" km away"));
}

#[test]
fn same_point_lists_as_zero_km() {
    let origin = Coordinate::new(6.1164, 125.1716);
    let ranked = rank_by_distance(origin, vec![Listing { id: 7, at: Some(origin) }]);
    assert_eq!(ranked[0].rounded_km(), 0.0);
    assert_eq!(ranked[0].label(), "0.0 km away");
}
