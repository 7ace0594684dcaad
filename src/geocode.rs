//! Static place lookup used for map navigation and for filling in agent
//! coordinates. Not a geocoder: unknown places simply return `None`.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub place_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
}

// (key, display name, lat, lng, zoom). Longer keys first so "staten island"
// wins over shorter keys it contains.
const PLACES: &[(&str, &str, f64, f64, u8)] = &[
    ("staten island", "Staten Island, NY", 40.5795, -74.1502, 12),
    ("long island city", "Long Island City, NY", 40.7447, -73.9485, 14),
    ("long island", "Long Island, NY", 40.7891, -73.1350, 9),
    ("jersey city", "Jersey City, NJ", 40.7178, -74.0431, 13),
    ("new york city", "New York, NY", 40.7128, -74.0060, 10),
    ("westchester", "Westchester County, NY", 41.1220, -73.7949, 10),
    ("manhattan", "Manhattan, NY", 40.7831, -73.9712, 12),
    ("brooklyn", "Brooklyn, NY", 40.6782, -73.9442, 12),
    ("hoboken", "Hoboken, NJ", 40.7440, -74.0324, 14),
    ("new york", "New York, NY", 40.7128, -74.0060, 10),
    ("queens", "Queens, NY", 40.7282, -73.7949, 12),
    ("bronx", "The Bronx, NY", 40.8448, -73.8648, 12),
    ("newark", "Newark, NJ", 40.7357, -74.1724, 12),
    ("harlem", "Harlem, NY", 40.8116, -73.9465, 14),
    ("nyc", "New York, NY", 40.7128, -74.0060, 10),
];

/// Exact key match first, then the first key contained in the query.
pub fn lookup(query: &str) -> Option<Location> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }

    PLACES
        .iter()
        .find(|(key, ..)| *key == q)
        .or_else(|| PLACES.iter().find(|(key, ..)| q.contains(key)))
        .map(|&(_, name, latitude, longitude, zoom)| Location {
            place_name: name.to_string(),
            latitude,
            longitude,
            zoom,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manhattan_coordinates() {
        let loc = lookup("manhattan").unwrap();
        assert!((40.7..=40.8).contains(&loc.latitude));
        assert!((-74.1..=-73.9).contains(&loc.longitude));
    }

    #[test]
    fn test_contained_key_and_case() {
        assert_eq!(lookup("  Manhattan, NY ").unwrap().place_name, "Manhattan, NY");
        assert_eq!(lookup("STATEN ISLAND").unwrap().place_name, "Staten Island, NY");
        assert_eq!(
            lookup("homes in long island city").unwrap().place_name,
            "Long Island City, NY"
        );
    }

    #[test]
    fn test_unknown_and_blank() {
        assert!(lookup("Atlantis").is_none());
        assert!(lookup("   ").is_none());
    }
}
