//! HTTP implementation of [`Backend`] for the vROps suite-api
//!
//! vROps appliances ship with self-signed certificates, so certificate
//! verification is disabled. Every request carries the configured timeout;
//! an expired request surfaces as a connectivity failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::models::{
    self, PropertyQuery, RelationshipQuery, StatQuery, TokenRequest, ADAPTER_KIND_KEY,
    AUTH_SOURCE, RESOURCE_ADAPTER_KIND, RESOURCE_PAGE_SIZE,
};
use super::{
    AdapterDescriptor, AncestorLink, AncestorQuery, Backend, FetchError, FetchOutcome,
    PropertyValue, ResourceKind, ResourceRef, StatValue, Token,
};
use crate::config::{self, Credentials};

const TOKEN_SCHEME: &str = "vRealizeOpsToken";
const LOGGED_BODY_LIMIT: usize = 512;

/// Configuration for the suite-api client
#[derive(Clone, Debug)]
pub struct VropsClientConfig {
    /// URL scheme used to reach targets
    pub scheme: String,

    /// Timeout applied to every request
    pub timeout: Duration,
}

impl Default for VropsClientConfig {
    fn default() -> Self {
        VropsClientConfig {
            scheme: "https".to_string(),
            timeout: Duration::from_secs(config::DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl VropsClientConfig {
    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the URL scheme (plain `http` is only useful against local test servers)
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }
}

/// Stateless suite-api client shared by all targets
pub struct VropsClient {
    config: VropsClientConfig,
    client: Client,
}

impl VropsClient {
    pub fn new(config: VropsClientConfig) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.timeout)
            .build()
            .context("failed to create HTTP client")?;

        Ok(VropsClient { config, client })
    }

    fn url(&self, target: &str, path: &str) -> String {
        format!(
            "{}://{}{}{}",
            self.config.scheme,
            target,
            config::API_ROOT,
            path
        )
    }

    fn authorized(&self, request: RequestBuilder, token: &Token) -> RequestBuilder {
        request
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("{} {}", TOKEN_SCHEME, token.as_str()))
    }

    /// Send a request and return the body of a 200 response
    async fn execute(&self, target: &str, request: RequestBuilder) -> Result<String, FetchError> {
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Connectivity {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Connectivity {
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        if status != StatusCode::OK {
            return Err(FetchError::Status {
                target: target.to_string(),
                status: status.as_u16(),
                body: body.chars().take(LOGGED_BODY_LIMIT).collect(),
            });
        }
        Ok(body)
    }

    /// Run `request`, decode its body with `parse` and classify the result
    async fn fetch_list<T>(
        &self,
        target: &str,
        what: &str,
        request: RequestBuilder,
        parse: impl FnOnce(&str) -> serde_json::Result<Vec<T>>,
    ) -> FetchOutcome<Vec<T>> {
        let body = match self.execute(target, request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(target = %target, what = %what, error = %e, "suite-api request failed");
                return FetchOutcome::Failed(e);
            }
        };

        match parse(&body) {
            Ok(items) => {
                if items.is_empty() {
                    debug!(target = %target, what = %what, "suite-api returned no entries");
                }
                FetchOutcome::from_items(items)
            }
            Err(e) => {
                warn!(target = %target, what = %what, error = %e, "cannot decode suite-api response");
                FetchOutcome::Failed(FetchError::Malformed {
                    target: target.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl Backend for VropsClient {
    async fn acquire_token(&self, target: &str, credentials: &Credentials) -> FetchOutcome<Token> {
        debug!(target = %target, "Acquiring token");
        let request = self
            .client
            .post(self.url(target, config::TOKEN_PATH))
            .header(ACCEPT, "application/json")
            .json(&TokenRequest {
                username: &credentials.username,
                auth_source: AUTH_SOURCE,
                password: &credentials.password,
            });

        let body = match self.execute(target, request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(target = %target, error = %e, "problem getting token");
                return FetchOutcome::Failed(e);
            }
        };

        match models::parse_token(&body) {
            Ok(token) => FetchOutcome::Data(token),
            Err(e) => {
                warn!(target = %target, error = %e, "token response without token");
                FetchOutcome::Failed(FetchError::Malformed {
                    target: target.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn list_adapters(
        &self,
        target: &str,
        token: &Token,
    ) -> FetchOutcome<Vec<AdapterDescriptor>> {
        let request = self.authorized(
            self.client
                .get(self.url(target, config::ADAPTERS_PATH))
                .query(&[("adapterKindKey", ADAPTER_KIND_KEY)]),
            token,
        );
        self.fetch_list(target, "adapters", request, models::parse_adapters)
            .await
    }

    async fn list_resources(
        &self,
        target: &str,
        token: &Token,
        kind: ResourceKind,
        parent_id: Option<&str>,
    ) -> FetchOutcome<Vec<ResourceRef>> {
        let mut query = vec![
            ("adapterKind", RESOURCE_ADAPTER_KIND),
            ("resourceKind", kind.as_str()),
            ("pageSize", RESOURCE_PAGE_SIZE),
        ];
        if let Some(parent) = parent_id {
            query.push(("parentId", parent));
        }
        let request = self.authorized(
            self.client
                .get(self.url(target, config::RESOURCES_PATH))
                .query(&query),
            token,
        );

        match self
            .fetch_list(target, kind.as_str(), request, models::parse_resources)
            .await
        {
            // an undecodable listing is reported as an empty one
            FetchOutcome::Failed(FetchError::Malformed { .. }) => FetchOutcome::Empty,
            outcome => outcome,
        }
    }

    async fn latest_stats(
        &self,
        target: &str,
        token: &Token,
        uuids: &[String],
        stat_key: &str,
    ) -> FetchOutcome<Vec<StatValue>> {
        let request = self.authorized(
            self.client
                .post(self.url(target, config::STATS_QUERY_PATH))
                .json(&StatQuery {
                    resource_id: uuids,
                    stat_key: [stat_key],
                }),
            token,
        );
        self.fetch_list(target, stat_key, request, |body| {
            models::parse_stats(body, stat_key)
        })
        .await
    }

    async fn latest_properties(
        &self,
        target: &str,
        token: &Token,
        uuids: &[String],
        property_key: &str,
    ) -> FetchOutcome<Vec<PropertyValue>> {
        let request = self.authorized(
            self.client
                .post(self.url(target, config::PROPERTIES_QUERY_PATH))
                .json(&PropertyQuery {
                    resource_ids: uuids,
                    property_keys: [property_key],
                }),
            token,
        );
        self.fetch_list(target, property_key, request, |body| {
            models::parse_properties(body, property_key)
        })
        .await
    }

    async fn ancestor_relationships(
        &self,
        target: &str,
        token: &Token,
        uuids: &[String],
        query: &AncestorQuery,
    ) -> FetchOutcome<Vec<AncestorLink>> {
        let request = self.authorized(
            self.client
                .post(self.url(target, config::RELATIONSHIPS_PATH))
                .json(&RelationshipQuery::ancestors(uuids, query)),
            token,
        );
        self.fetch_list(target, "relationships", request, models::parse_relationships)
            .await
    }
}
