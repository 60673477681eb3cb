//! Media metadata provider
//!
//! Search and credit lookup live outside this server. [`MediaMetadataProvider`]
//! is the seam: [`TmdbClient`] talks to the TMDB v3 HTTP API and
//! [`StaticCatalog`] serves a local JSON catalog for offline play and tests.
//!
//! Provider results are shaped here so every implementation follows the same
//! rules: people and undated titles never reach the board, and only cast plus
//! a small crew whitelist can link two moves.

mod catalog;
mod tmdb;

pub use catalog::{CatalogEntry, StaticCatalog};
pub use tmdb::TmdbClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{MediaCandidate, MediaType, PersonId, PersonLink};

/// Crew jobs that count as a link besides the cast.
const LINKABLE_JOBS: [&str; 3] = ["Director", "Writer", "Director of Photography"];

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to media provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("media provider answered with status {0}")]
    Status(u16),
    #[error("invalid media provider url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("{media_type} {id} not found")]
    NotFound { id: u64, media_type: MediaType },
    #[error("catalog error: {0}")]
    Catalog(String),
}

/// Kind of a search hit as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Movie,
    Tv,
    Person,
    #[serde(other)]
    Unknown,
}

impl HitKind {
    fn media_type(self) -> Option<MediaType> {
        match self {
            Self::Movie => Some(MediaType::Movie),
            Self::Tv => Some(MediaType::Tv),
            Self::Person | Self::Unknown => None,
        }
    }
}

/// Provider-neutral search result. `date` is a release or first-air date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: u64,
    pub kind: HitKind,
    pub title: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrewCredit {
    pub id: PersonId,
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<String>,
}

/// Credits of one title, in provider order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<PersonLink>,
    #[serde(default)]
    pub crew: Vec<CrewCredit>,
}

impl Credits {
    /// Cast followed by whitelisted crew. A person may appear more than once.
    pub fn linkable_people(&self) -> Vec<PersonLink> {
        let crew = self
            .crew
            .iter()
            .filter(|member| member.jobs.iter().any(|job| is_job_linkable(job)))
            .map(|member| PersonLink {
                id: member.id,
                name: member.name.clone(),
            });
        self.cast.iter().cloned().chain(crew).collect()
    }
}

pub fn is_job_linkable(job: &str) -> bool {
    LINKABLE_JOBS.contains(&job) || job.contains("Composer")
}

/// Turn raw hits into board candidates: movies and series only, dated, titled,
/// labelled `Title (Year)`, at most `limit` of them.
pub fn shape_results(hits: Vec<SearchHit>, limit: usize) -> Vec<MediaCandidate> {
    hits.into_iter()
        .filter_map(|hit| {
            let media_type = hit.kind.media_type()?;
            let title = hit.title.filter(|title| !title.is_empty())?;
            let date = hit.date.filter(|date| !date.is_empty())?;
            let year = date.get(..4).unwrap_or(&date);
            Some(MediaCandidate {
                key: media_type.board_key(hit.id),
                id: hit.id,
                label: format!("{title} ({year})"),
                media_type,
            })
        })
        .take(limit)
        .collect()
}

#[async_trait]
pub trait MediaMetadataProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError>;

    /// Movies use plain credits, series use credits aggregated over all seasons.
    async fn credits(&self, id: u64, media_type: MediaType) -> Result<Credits, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: u64, kind: HitKind, title: &str, date: Option<&str>) -> SearchHit {
        SearchHit {
            id,
            kind,
            title: Some(title.to_string()),
            date: date.map(str::to_string),
        }
    }

    #[test]
    fn job_whitelist() {
        assert!(is_job_linkable("Director"));
        assert!(is_job_linkable("Writer"));
        assert!(is_job_linkable("Director of Photography"));
        assert!(is_job_linkable("Original Music Composer"));
        assert!(is_job_linkable("Composer"));
        assert!(!is_job_linkable("Producer"));
        assert!(!is_job_linkable("director"));
    }

    #[test]
    fn linkable_people_puts_cast_before_crew() {
        let credits = Credits {
            cast: vec![PersonLink {
                id: 1,
                name: "Actor".into(),
            }],
            crew: vec![
                CrewCredit {
                    id: 2,
                    name: "Producer".into(),
                    jobs: vec!["Executive Producer".into()],
                },
                CrewCredit {
                    id: 3,
                    name: "Composer".into(),
                    jobs: vec!["Producer".into(), "Original Music Composer".into()],
                },
            ],
        };
        let ids: Vec<_> = credits.linkable_people().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn shape_results_filters_and_labels() {
        let hits = vec![
            hit(1, HitKind::Person, "Christopher Nolan", None),
            hit(157336, HitKind::Movie, "Interstellar", Some("2014-11-05")),
            hit(2, HitKind::Movie, "Unreleased", None),
            hit(3, HitKind::Movie, "Blank Date", Some("")),
            hit(1399, HitKind::Tv, "Game of Thrones", Some("2011-04-17")),
            hit(4, HitKind::Unknown, "Collection", Some("2000-01-01")),
        ];
        let results = shape_results(hits, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].key, "movie-157336");
        assert_eq!(results[0].label, "Interstellar (2014)");
        assert_eq!(results[1].key, "tv-1399");
        assert_eq!(results[1].label, "Game of Thrones (2011)");
        assert_eq!(results[1].media_type, MediaType::Tv);
    }

    #[test]
    fn shape_results_caps_after_filtering() {
        let mut hits = vec![hit(0, HitKind::Person, "Someone", None)];
        hits.extend((1..=8).map(|id| hit(id, HitKind::Movie, "Film", Some("1999-01-01"))));
        let results = shape_results(hits, 5);
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].id, 1);
    }
}
