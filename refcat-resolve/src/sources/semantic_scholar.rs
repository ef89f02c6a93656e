//! Semantic Scholar graph API client (secondary index)
//!
//! A single client instance owns the rate limiter, so every task sharing the client
//! (through `Arc<dyn SecondaryIndex>`) draws from one global request budget.
//!
//! API Documentation: https://api.semanticscholar.org/api-docs/graph

use super::{PaperQuery, SecondaryIndex};
use crate::types::{CandidateAuthor, ResolveError, ResolveResult, SecondaryPaper};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use refcat_common::config::SecondaryIndexConfig;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

/// Fields requested for every paper
const PAPER_FIELDS: &str = "title,year,authors.name,authors.affiliations";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<Vec<S2Paper>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    #[serde(default)]
    paper_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    authors: Option<Vec<S2Author>>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    affiliations: Option<Vec<String>>,
}

impl From<S2Paper> for SecondaryPaper {
    fn from(paper: S2Paper) -> Self {
        SecondaryPaper {
            paper_id: paper.paper_id,
            title: paper.title.unwrap_or_default(),
            year: paper.year,
            authors: paper
                .authors
                .unwrap_or_default()
                .into_iter()
                .map(|a| CandidateAuthor {
                    name: a.name.unwrap_or_default(),
                    affiliations: a
                        .affiliations
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|s| !s.trim().is_empty())
                        .collect(),
                })
                .collect(),
        }
    }
}

pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    user_agent: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl SemanticScholarClient {
    pub fn new(config: &SecondaryIndexConfig) -> ResolveResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ResolveError::Source(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.usable_api_key().map(str::to_string),
            user_agent: refcat_common::config::get_user_agent(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    pub fn query_params(query: &PaperQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("query", query.query.clone()),
            ("limit", query.limit.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];
        if let Some(year) = query.year {
            params.push(("year", year.to_string()));
        }
        params
    }
}

#[async_trait]
impl SecondaryIndex for SemanticScholarClient {
    fn name(&self) -> &'static str {
        "Semantic Scholar"
    }

    async fn search_papers(&self, query: &PaperQuery) -> ResolveResult<Vec<SecondaryPaper>> {
        // Wait for a permit from the shared budget
        self.rate_limiter.until_ready().await;

        let url = format!("{}/paper/search", self.base_url);
        let params = Self::query_params(query);

        tracing::debug!(?params, "Querying Semantic Scholar");

        let mut request = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .query(&params);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            ResolveError::Source(format!("Semantic Scholar request failed: {}", e))
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ResolveError::RateLimited(
                "Semantic Scholar returned 429".to_string(),
            ));
        } else if !status.is_success() {
            return Err(ResolveError::Source(format!(
                "Semantic Scholar returned error status: {}",
                status
            )));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            ResolveError::Source(format!("Failed to parse Semantic Scholar response: {}", e))
        })?;

        Ok(body
            .data
            .unwrap_or_default()
            .into_iter()
            .map(SecondaryPaper::from)
            .collect())
    }
}
