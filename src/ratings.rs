//! Rating scale helpers over the configured levels.

use serde_json::{json, Map, Value};

use crate::config::DirectoryConfig;

/// `{ key: { label, description, color, value } }` as served by
/// `GET /api/rating-levels`.
pub fn levels_by_key(directory: &DirectoryConfig) -> Map<String, Value> {
    directory
        .rating_levels
        .iter()
        .map(|level| {
            (
                level.key.clone(),
                json!({
                    "label": level.label,
                    "description": level.description,
                    "color": level.color,
                    "value": level.value,
                }),
            )
        })
        .collect()
}

/// Keys whose value is at least that of `min_key`, or `None` when
/// `min_key` is not a configured level.
pub fn keys_at_or_above(directory: &DirectoryConfig, min_key: &str) -> Option<Vec<String>> {
    let floor = directory.rating_level(min_key)?.value;
    Some(
        directory
            .rating_levels
            .iter()
            .filter(|level| level.value >= floor)
            .map(|level| level.key.clone())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_by_key_has_all_fields() {
        let directory = DirectoryConfig::default();
        let levels = levels_by_key(&directory);
        for key in ["exceptional", "great", "average", "poor", "blacklist"] {
            let level = levels.get(key).unwrap();
            for field in ["label", "description", "color", "value"] {
                assert!(level.get(field).is_some(), "{} missing {}", key, field);
            }
        }
    }

    #[test]
    fn test_keys_at_or_above() {
        let directory = DirectoryConfig::default();
        let mut keys = keys_at_or_above(&directory, "great").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["exceptional", "great"]);
        assert_eq!(keys_at_or_above(&directory, "blacklist").unwrap().len(), 5);
        assert!(keys_at_or_above(&directory, "legendary").is_none());
    }
}
