use super::Catalog;
use crate::error::{ServiceError, ServiceResult};

/// Catalog compiled into the binary
pub const SEED_CATALOG: &str = include_str!("../../catalog/game_data.json");

/// Parse a catalog document
pub fn parse_catalog(json: &str) -> ServiceResult<Catalog> {
    serde_json::from_str(json).map_err(|e| ServiceError::InvalidCatalog {
        message: e.to_string(),
    })
}

pub fn seed_catalog() -> ServiceResult<Catalog> {
    parse_catalog(SEED_CATALOG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_parses() {
        let catalog = seed_catalog().unwrap();
        assert!(catalog.champions.len() > 30);
        assert!(catalog.items.len() > 30);
        assert!(!catalog.matchups.is_empty());
    }

    #[test]
    fn test_malformed_catalog_is_rejected() {
        let err = parse_catalog("{\"champions\": 3}").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCatalog { .. }));
    }
}
