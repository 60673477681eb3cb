use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Credits, CrewCredit, HitKind, MediaMetadataProvider, ProviderError, SearchHit};
use crate::protocol::{MediaType, PersonLink};

/// One title of a static catalog file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: u64,
    pub media_type: MediaType,
    pub title: String,
    /// Release or first-air date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub cast: Vec<PersonLink>,
    #[serde(default)]
    pub crew: Vec<CrewCredit>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    titles: Vec<CatalogEntry>,
}

/// In-process provider over a fixed list of titles.
///
/// Search is a case-insensitive substring match on the title, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Load a `{"titles": [...]}` JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|error| {
            ProviderError::Catalog(format!("failed to read {}: {error}", path.display()))
        })?;
        let file: CatalogFile = serde_json::from_str(&contents).map_err(|error| {
            ProviderError::Catalog(format!("failed to parse {}: {error}", path.display()))
        })?;
        Ok(Self::new(file.titles))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, id: u64, media_type: MediaType) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.id == id && entry.media_type == media_type)
    }
}

#[async_trait]
impl MediaMetadataProvider for StaticCatalog {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.title.to_lowercase().contains(&needle))
            .map(|entry| SearchHit {
                id: entry.id,
                kind: match entry.media_type {
                    MediaType::Movie => HitKind::Movie,
                    MediaType::Tv => HitKind::Tv,
                },
                title: Some(entry.title.clone()),
                date: entry.date.clone(),
            })
            .collect())
    }

    async fn credits(&self, id: u64, media_type: MediaType) -> Result<Credits, ProviderError> {
        let entry = self
            .find(id, media_type)
            .ok_or(ProviderError::NotFound { id, media_type })?;
        Ok(Credits {
            cast: entry.cast.clone(),
            crew: entry.crew.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG: &str = r#"{
        "titles": [
            {
                "id": 157336,
                "mediaType": "movie",
                "title": "Interstellar",
                "date": "2014-11-05",
                "cast": [{"id": 1892, "name": "Matt Damon"}],
                "crew": [{"id": 525, "name": "Christopher Nolan", "jobs": ["Director"]}]
            },
            {
                "id": 1399,
                "mediaType": "tv",
                "title": "Game of Thrones",
                "date": "2011-04-17"
            }
        ]
    }"#;

    #[tokio::test]
    async fn loads_catalog_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let catalog = StaticCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        let hits = catalog.search("stell").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, HitKind::Movie);

        let credits = catalog.credits(157336, MediaType::Movie).await.unwrap();
        assert_eq!(credits.linkable_people().len(), 2);
    }

    #[tokio::test]
    async fn credits_are_keyed_by_media_type() {
        let catalog: CatalogFile = serde_json::from_str(CATALOG).unwrap();
        let catalog = StaticCatalog::new(catalog.titles);
        let error = catalog.credits(1399, MediaType::Movie).await.unwrap_err();
        assert!(matches!(
            error,
            ProviderError::NotFound {
                id: 1399,
                media_type: MediaType::Movie
            }
        ));
        assert!(catalog.credits(1399, MediaType::Tv).await.is_ok());
    }

    #[test]
    fn missing_file_is_a_catalog_error() {
        let error = StaticCatalog::load("/nonexistent/catalog.json").unwrap_err();
        assert!(matches!(error, ProviderError::Catalog(_)));
    }

    #[tokio::test]
    async fn blank_query_matches_nothing() {
        let catalog = StaticCatalog::new(vec![CatalogEntry {
            id: 1,
            media_type: MediaType::Movie,
            title: "Heat".into(),
            date: Some("1995-12-15".into()),
            cast: vec![],
            crew: vec![],
        }]);
        assert!(catalog.search("   ").await.unwrap().is_empty());
        assert_eq!(catalog.search("HEAT").await.unwrap().len(), 1);
    }
}
