use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{Credits, CrewCredit, HitKind, MediaMetadataProvider, ProviderError, SearchHit};
use crate::protocol::{MediaType, PersonId, PersonLink};

/// TMDB v3 API client authenticated with a read access token.
#[derive(Clone)]
pub struct TmdbClient {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl std::fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl TmdbClient {
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last path segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        debug!(path = url.path(), "Requesting media provider");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MediaMetadataProvider for TmdbClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let url = self.endpoint("search/multi", &[("query", query)])?;
        let page: SearchPage = self.get_json(url).await?;
        Ok(page.results.into_iter().map(SearchHit::from).collect())
    }

    async fn credits(&self, id: u64, media_type: MediaType) -> Result<Credits, ProviderError> {
        let result = match media_type {
            MediaType::Movie => {
                let url = self.endpoint(&format!("movie/{id}/credits"), &[])?;
                self.get_json::<MovieCredits>(url).await.map(Credits::from)
            }
            MediaType::Tv => {
                let url = self.endpoint(&format!("tv/{id}/aggregate_credits"), &[])?;
                self.get_json::<AggregateCredits>(url).await.map(Credits::from)
            }
        };
        match result {
            Err(ProviderError::Status(404)) => Err(ProviderError::NotFound { id, media_type }),
            other => other,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<RawSearchResult>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResult {
    id: u64,
    media_type: HitKind,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

impl From<RawSearchResult> for SearchHit {
    fn from(raw: RawSearchResult) -> Self {
        let (title, date) = match raw.media_type {
            HitKind::Movie => (raw.title, raw.release_date),
            HitKind::Tv => (raw.name, raw.first_air_date),
            HitKind::Person | HitKind::Unknown => (raw.name.or(raw.title), None),
        };
        Self {
            id: raw.id,
            kind: raw.media_type,
            title,
            date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MovieCredits {
    #[serde(default)]
    cast: Vec<PersonLink>,
    #[serde(default)]
    crew: Vec<MovieCrewMember>,
}

#[derive(Debug, Deserialize)]
struct MovieCrewMember {
    id: PersonId,
    name: String,
    job: String,
}

impl From<MovieCredits> for Credits {
    fn from(raw: MovieCredits) -> Self {
        Self {
            cast: raw.cast,
            crew: raw
                .crew
                .into_iter()
                .map(|member| CrewCredit {
                    id: member.id,
                    name: member.name,
                    jobs: vec![member.job],
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AggregateCredits {
    #[serde(default)]
    cast: Vec<PersonLink>,
    #[serde(default)]
    crew: Vec<AggregateCrewMember>,
}

#[derive(Debug, Deserialize)]
struct AggregateCrewMember {
    id: PersonId,
    name: String,
    #[serde(default)]
    jobs: Vec<AggregateJob>,
}

#[derive(Debug, Deserialize)]
struct AggregateJob {
    job: String,
}

impl From<AggregateCredits> for Credits {
    fn from(raw: AggregateCredits) -> Self {
        Self {
            cast: raw.cast,
            crew: raw
                .crew
                .into_iter()
                .map(|member| CrewCredit {
                    id: member.id,
                    name: member.name,
                    jobs: member.jobs.into_iter().map(|job| job.job).collect(),
                })
                .collect(),
        }
    }
}
