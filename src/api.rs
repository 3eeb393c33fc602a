//! News API access behind a small trait.
//!
//! # Architecture
//!
//! - [`NewsSource`]: the one call the crawler needs, the `/everything` search
//! - [`NewsApiClient`]: the HTTP implementation backed by `reqwest`
//!
//! The crawler only depends on the trait, so tests drive it with canned
//! responses instead of the network.
//!
//! # Known constraint
//!
//! The free tier only serves the first page of results, so every request
//! asks for `page=1` and coverage comes from varying the query and the
//! date window instead of paginating.

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::utils::truncate_for_log;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Parameters for one `/everything` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EverythingRequest {
    pub query: String,
    pub language: String,
    pub page_size: u32,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub page: u32,
}

impl EverythingRequest {
    /// Query-string pairs, excluding the API key.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("q", self.query.clone()),
            ("language", self.language.clone()),
            ("pageSize", self.page_size.to_string()),
            ("from", self.from.format("%Y-%m-%d").to_string()),
            ("to", self.to.format("%Y-%m-%d").to_string()),
            ("sortBy", "publishedAt".to_string()),
            ("page", self.page.to_string()),
        ]
    }
}

/// Body of an `/everything` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EverythingResponse {
    pub status: String,
    #[serde(rename = "totalResults", default)]
    pub total_results: u64,
    #[serde(default)]
    pub articles: Vec<ApiArticle>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiArticle {
    #[serde(default)]
    pub source: Option<ApiSource>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "urlToImage", default)]
    pub url_to_image: Option<String>,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSource {
    #[serde(default)]
    pub name: Option<String>,
}

/// A searchable news provider.
pub trait NewsSource {
    /// Run one search. Transport failures, non-`ok` statuses, and malformed
    /// bodies all surface as errors.
    async fn everything(&self, request: &EverythingRequest) -> Result<EverythingResponse>;
}

impl<T: NewsSource> NewsSource for &T {
    async fn everything(&self, request: &EverythingRequest) -> Result<EverythingResponse> {
        (**self).everything(request).await
    }
}

/// HTTP client for the NewsAPI `/everything` endpoint.
#[derive(Debug, Clone)]
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Decode a response body, turning a non-`ok` status into [`PipelineError::Api`].
pub fn parse_everything(body: &str) -> Result<EverythingResponse> {
    let response: EverythingResponse = serde_json::from_str(body)?;
    if response.status != "ok" {
        return Err(PipelineError::Api {
            code: response.code.unwrap_or_else(|| "unknown".to_string()),
            message: response.message.unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    Ok(response)
}

impl NewsSource for NewsApiClient {
    #[instrument(
        level = "info",
        skip_all,
        fields(query = %request.query, from = %request.from, to = %request.to)
    )]
    async fn everything(&self, request: &EverythingRequest) -> Result<EverythingResponse> {
        let t0 = Instant::now();
        let mut params = request.params();
        params.push(("apiKey", self.api_key.clone()));

        let res = self
            .http
            .get(format!("{}/everything", self.base_url))
            .query(&params)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        let response = match res {
            Ok(r) => r,
            Err(e) => {
                warn!(elapsed_ms = t0.elapsed().as_millis(), error = %e, "API request failed");
                return Err(e.into());
            }
        };

        let body = response.text().await?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis(),
            bytes = body.len(),
            preview = %truncate_for_log(&body, 200),
            "API response received"
        );
        parse_everything(&body)
    }
}

/// Canned [`NewsSource`] for exercising the crawler without a network.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued responses in order, then answers with empty `ok` pages.
    #[derive(Default)]
    pub struct FakeSource {
        responses: Mutex<VecDeque<Result<EverythingResponse>>>,
        requests: Mutex<Vec<EverythingRequest>>,
    }

    impl FakeSource {
        pub fn with(responses: Vec<Result<EverythingResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            }
        }

        pub fn requests(&self) -> Vec<EverythingRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl NewsSource for FakeSource {
        async fn everything(&self, request: &EverythingRequest) -> Result<EverythingResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ok_response(&[])))
        }
    }

    pub fn api_article(url: &str) -> ApiArticle {
        ApiArticle {
            source: Some(ApiSource { name: Some("Reuters".to_string()) }),
            author: Some("Jane Doe".to_string()),
            title: Some(format!("Title for {url}")),
            description: Some("Markets moved today".to_string()),
            url: Some(url.to_string()),
            url_to_image: None,
            published_at: Some("2024-03-05T14:30:00Z".to_string()),
        }
    }

    pub fn ok_response(urls: &[&str]) -> EverythingResponse {
        EverythingResponse {
            status: "ok".to_string(),
            total_results: 500,
            articles: urls.iter().map(|u| api_article(u)).collect(),
            code: None,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EverythingRequest {
        EverythingRequest {
            query: "stock market".to_string(),
            language: "en".to_string(),
            page_size: 100,
            from: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            page: 1,
        }
    }

    #[test]
    fn test_params() {
        let params = request().params();
        assert!(params.contains(&("q", "stock market".to_string())));
        assert!(params.contains(&("pageSize", "100".to_string())));
        assert!(params.contains(&("from", "2024-03-01".to_string())));
        assert!(params.contains(&("to", "2024-03-08".to_string())));
        assert!(params.contains(&("sortBy", "publishedAt".to_string())));
        assert!(params.contains(&("page", "1".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "apiKey"));
    }

    #[test]
    fn test_parse_ok_response() {
        let body = r#"{
            "status": "ok",
            "totalResults": 42,
            "articles": [{
                "source": {"id": null, "name": "Reuters"},
                "author": "Jane Doe",
                "title": "Stocks rise",
                "description": "Markets up",
                "url": "https://www.reuters.com/a",
                "urlToImage": null,
                "publishedAt": "2024-03-05T14:30:00Z",
                "content": "..."
            }]
        }"#;
        let response = parse_everything(body).unwrap();
        assert_eq!(response.total_results, 42);
        assert_eq!(response.articles.len(), 1);
        let article = &response.articles[0];
        assert_eq!(article.source.as_ref().and_then(|s| s.name.as_deref()), Some("Reuters"));
        assert_eq!(article.url_to_image, None);
        assert_eq!(article.published_at.as_deref(), Some("2024-03-05T14:30:00Z"));
    }

    #[test]
    fn test_parse_error_status() {
        let body = r#"{"status": "error", "code": "rateLimited", "message": "Too many requests"}"#;
        match parse_everything(body) {
            Err(PipelineError::Api { code, message }) => {
                assert_eq!(code, "rateLimited");
                assert_eq!(message, "Too many requests");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(matches!(parse_everything("<html>"), Err(PipelineError::Json(_))));
    }
}
