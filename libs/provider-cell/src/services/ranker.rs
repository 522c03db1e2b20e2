use serde::Serialize;

use crate::geo::{haversine_km, Coordinate};
use crate::models::Provider;

/// Anything that may sit somewhere on the map.
pub trait Located {
    fn coordinate(&self) -> Option<Coordinate>;
}

impl Located for Provider {
    fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }
}

impl Located for Coordinate {
    fn coordinate(&self) -> Option<Coordinate> {
        Some(*self)
    }
}

/// An entity paired with its distance from the reference point, or `None`
/// when either side is unlocated.
#[derive(Debug, Clone, Serialize)]
pub struct Ranked<T> {
    #[serde(flatten)]
    pub item: T,
    pub distance_km: Option<f64>,
}

pub struct ProximityRanker;

impl ProximityRanker {
    /// Stable ascending sort by distance; unlocated entities keep their
    /// relative order after every located one. Without a reference point the
    /// input order is returned untouched.
    pub fn rank<T: Located>(reference: Option<Coordinate>, items: Vec<T>) -> Vec<Ranked<T>> {
        let mut ranked: Vec<Ranked<T>> = items
            .into_iter()
            .map(|item| {
                let distance_km = match (reference, item.coordinate()) {
                    (Some(origin), Some(at)) => Some(haversine_km(origin, at)),
                    _ => None,
                };
                Ranked { item, distance_km }
            })
            .collect();

        if reference.is_some() {
            ranked.sort_by(|a, b| {
                let a = a.distance_km.unwrap_or(f64::INFINITY);
                let b = b.distance_km.unwrap_or(f64::INFINITY);
                a.total_cmp(&b)
            });
        }

        ranked
    }

    /// Like [`rank`](Self::rank) but drops entities farther than `max_km`.
    /// Unlocated entities cannot satisfy a distance bound and are dropped
    /// too. The bound is ignored without a reference point.
    pub fn rank_within<T: Located>(
        reference: Option<Coordinate>,
        items: Vec<T>,
        max_km: Option<f64>,
    ) -> Vec<Ranked<T>> {
        let ranked = Self::rank(reference, items);
        match (reference, max_km) {
            (Some(_), Some(limit)) => ranked
                .into_iter()
                .filter(|r| r.distance_km.map(|d| d <= limit).unwrap_or(false))
                .collect(),
            _ => ranked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Place {
        name: &'static str,
        at: Option<Coordinate>,
    }

    impl Located for Place {
        fn coordinate(&self) -> Option<Coordinate> {
            self.at
        }
    }

    fn places() -> Vec<Place> {
        vec![
            Place { name: "nowhere-1", at: None },
            Place { name: "alexandria", at: Some(Coordinate::new(31.2001, 29.9187)) },
            Place { name: "giza", at: Some(Coordinate::new(30.0131, 31.2089)) },
            Place { name: "nowhere-2", at: None },
            Place { name: "aswan", at: Some(Coordinate::new(24.0889, 32.8998)) },
        ]
    }

    fn names<T>(ranked: &[Ranked<T>], name: impl Fn(&T) -> &'static str) -> Vec<&'static str> {
        ranked.iter().map(|r| name(&r.item)).collect()
    }

    #[test]
    fn no_reference_keeps_input_order() {
        let ranked = ProximityRanker::rank(None, places());
        assert_eq!(
            names(&ranked, |p| p.name),
            vec!["nowhere-1", "alexandria", "giza", "nowhere-2", "aswan"]
        );
        assert!(ranked.iter().all(|r| r.distance_km.is_none()));
    }

    #[test]
    fn sorted_ascending_with_unlocated_last_in_order() {
        let cairo = Coordinate::new(30.0444, 31.2357);
        let ranked = ProximityRanker::rank(Some(cairo), places());

        assert_eq!(
            names(&ranked, |p| p.name),
            vec!["giza", "alexandria", "aswan", "nowhere-1", "nowhere-2"]
        );

        let distances: Vec<f64> = ranked.iter().filter_map(|r| r.distance_km).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn equal_distances_keep_relative_order() {
        let here = Coordinate::new(10.0, 10.0);
        let items = vec![
            Place { name: "first", at: Some(here) },
            Place { name: "second", at: Some(here) },
        ];
        let ranked = ProximityRanker::rank(Some(here), items);
        assert_eq!(names(&ranked, |p| p.name), vec!["first", "second"]);
    }

    #[test]
    fn rank_within_drops_far_and_unlocated() {
        let cairo = Coordinate::new(30.0444, 31.2357);
        let ranked = ProximityRanker::rank_within(Some(cairo), places(), Some(200.0));
        assert_eq!(names(&ranked, |p| p.name), vec!["giza", "alexandria"]);

        let unbounded = ProximityRanker::rank_within(None, places(), Some(1.0));
        assert_eq!(unbounded.len(), 5);
    }
}
