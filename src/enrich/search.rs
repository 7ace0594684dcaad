//! Secondary image lookup used when the agent's own website yields nothing.

use async_trait::async_trait;

/// A provider that can find an image for a free-text query.
///
/// Implementations must return an absolute URL or `None`, and must swallow
/// their own failures.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    async fn find_image(&self, query: &str) -> Option<String>;
}

/// Placeholder provider. Always finds nothing.
pub struct NoImageSearch;

#[async_trait]
impl ImageSearch for NoImageSearch {
    fn name(&self) -> &str {
        "none"
    }

    async fn find_image(&self, _query: &str) -> Option<String> {
        None
    }
}

/// Builds the query sent to the search provider.
pub fn search_query(full_name: &str, locality: &str) -> String {
    format!("{} realtor {}", full_name, locality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_shape() {
        assert_eq!(
            search_query("Jane Smith", "Brooklyn"),
            "Jane Smith realtor Brooklyn"
        );
    }

    #[tokio::test]
    async fn test_stub_finds_nothing() {
        assert_eq!(NoImageSearch.find_image("anything").await, None);
    }
}
