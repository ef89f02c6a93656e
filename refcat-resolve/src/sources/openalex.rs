//! OpenAlex works API client (primary index)
//!
//! API Documentation: https://docs.openalex.org/api-entities/works

use super::{PrimaryIndex, WorkQuery};
use crate::types::{CandidateAuthor, CandidateWork, ResolveError, ResolveResult};
use async_trait::async_trait;
use refcat_common::config::PrimaryIndexConfig;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const WORK_ID_PREFIX: &str = "https://openalex.org/";

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Option<Vec<OAWork>>,
}

#[derive(Debug, Deserialize)]
struct OAWork {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    publication_year: Option<i32>,
    #[serde(rename = "type", default)]
    work_type: Option<String>,
    #[serde(default)]
    authorships: Option<Vec<OAAuthorship>>,
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    #[serde(default)]
    author: Option<OAAuthor>,
    #[serde(default)]
    institutions: Option<Vec<OAInstitution>>,
}

#[derive(Debug, Deserialize)]
struct OAAuthor {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAInstitution {
    #[serde(default)]
    display_name: Option<String>,
}

impl From<OAWork> for CandidateWork {
    fn from(work: OAWork) -> Self {
        let authors = work
            .authorships
            .unwrap_or_default()
            .into_iter()
            .map(|a| CandidateAuthor {
                name: a
                    .author
                    .and_then(|au| au.display_name)
                    .unwrap_or_default(),
                affiliations: a
                    .institutions
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|i| i.display_name)
                    .filter(|n| !n.trim().is_empty())
                    .collect(),
            })
            .collect();

        CandidateWork {
            id: short_work_id(&work.id.unwrap_or_default()),
            title: work.title.unwrap_or_default(),
            publication_year: work.publication_year,
            work_type: work.work_type.unwrap_or_default(),
            authors,
        }
    }
}

/// `https://openalex.org/W123` -> `W123`
pub fn short_work_id(id: &str) -> String {
    id.strip_prefix(WORK_ID_PREFIX).unwrap_or(id).to_string()
}

pub struct OpenAlexClient {
    client: Client,
    base_url: String,
    /// Contact address for the polite pool
    mailto: String,
    user_agent: String,
}

impl OpenAlexClient {
    pub fn new(config: &PrimaryIndexConfig) -> ResolveResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ResolveError::Source(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            user_agent: refcat_common::config::get_user_agent(),
        })
    }

    /// Query-string parameters for one cascade stage
    pub fn query_params(&self, query: &WorkQuery) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if !self.mailto.trim().is_empty() {
            params.push(("mailto", self.mailto.clone()));
        }
        params.push(("per_page", query.per_page.to_string()));
        if query.sort_by_citations {
            params.push(("sort", "cited_by_count:desc".to_string()));
        }
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }

        let mut filters = Vec::new();
        if let Some(title) = &query.title_search {
            filters.push(format!("title.search:{}", title));
        }
        if let Some(work_type) = query.work_type {
            filters.push(format!("type:{}", work_type.as_str()));
        }
        if let Some(window) = query.year_window {
            filters.push(format!("from_publication_date:{}-01-01", window.from));
            filters.push(format!("to_publication_date:{}-12-31", window.to));
        }
        if !filters.is_empty() {
            params.push(("filter", filters.join(",")));
        }

        params
    }
}

#[async_trait]
impl PrimaryIndex for OpenAlexClient {
    fn name(&self) -> &'static str {
        "OpenAlex"
    }

    async fn search_works(&self, query: &WorkQuery) -> ResolveResult<Vec<CandidateWork>> {
        let url = format!("{}/works", self.base_url);
        let params = self.query_params(query);

        tracing::debug!(?params, "Querying OpenAlex works");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .query(&params)
            .send()
            .await
            .map_err(|e| ResolveError::Source(format!("OpenAlex request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ResolveError::RateLimited("OpenAlex returned 429".to_string()));
        } else if !status.is_success() {
            return Err(ResolveError::Source(format!(
                "OpenAlex returned error status: {}",
                status
            )));
        }

        let body: WorksResponse = response.json().await.map_err(|e| {
            ResolveError::Source(format!("Failed to parse OpenAlex response: {}", e))
        })?;

        Ok(body
            .results
            .unwrap_or_default()
            .into_iter()
            .map(CandidateWork::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::YearWindow;
    use crate::types::WorkType;

    fn client(mailto: &str) -> OpenAlexClient {
        OpenAlexClient::new(&PrimaryIndexConfig {
            mailto: mailto.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_title_stage_params() {
        let params = client("me@example.org").query_params(&WorkQuery {
            title_search: Some("Some Title".to_string()),
            search: None,
            work_type: Some(WorkType::Book),
            year_window: None,
            sort_by_citations: true,
            per_page: 10,
        });

        assert_eq!(param(&params, "mailto"), Some("me@example.org"));
        assert_eq!(param(&params, "per_page"), Some("10"));
        assert_eq!(param(&params, "sort"), Some("cited_by_count:desc"));
        assert_eq!(param(&params, "filter"), Some("title.search:Some Title,type:book"));
        assert_eq!(param(&params, "search"), None);
    }

    #[test]
    fn test_keyword_stage_params() {
        let params = client("").query_params(&WorkQuery {
            title_search: None,
            search: Some("Some Title Hill".to_string()),
            work_type: None,
            year_window: Some(YearWindow::around(1979, 3)),
            sort_by_citations: false,
            per_page: 10,
        });

        assert_eq!(param(&params, "mailto"), None, "blank contact is omitted");
        assert_eq!(param(&params, "sort"), None);
        assert_eq!(param(&params, "search"), Some("Some Title Hill"));
        assert_eq!(
            param(&params, "filter"),
            Some("from_publication_date:1976-01-01,to_publication_date:1982-12-31")
        );
    }

    #[test]
    fn test_work_conversion_tolerates_nulls() {
        let json = r#"{
            "results": [{
                "id": "https://openalex.org/W42",
                "title": null,
                "publication_year": 1979,
                "type": "book",
                "authorships": [
                    {"author": {"display_name": "John Hill"},
                     "institutions": [{"display_name": "MIT"}, {"display_name": null}]},
                    {"author": null, "institutions": null}
                ]
            }]
        }"#;
        let body: WorksResponse = serde_json::from_str(json).unwrap();
        let works: Vec<CandidateWork> = body
            .results
            .unwrap()
            .into_iter()
            .map(CandidateWork::from)
            .collect();

        assert_eq!(works[0].id, "W42");
        assert_eq!(works[0].title, "");
        assert_eq!(works[0].authors[0].name, "John Hill");
        assert_eq!(works[0].authors[0].affiliations, vec!["MIT"]);
        assert_eq!(works[0].authors[1], CandidateAuthor::default());
    }

    #[test]
    fn test_null_results_is_empty() {
        let body: WorksResponse = serde_json::from_str(r#"{"results": null}"#).unwrap();
        assert!(body.results.unwrap_or_default().is_empty());
    }
}
