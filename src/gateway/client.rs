//! Subgraph transport
//! This module contains the client that talks to subgraph services: SDL
//! acquisition during bootstrap and routed subqueries at serve time

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::subgraph::SubgraphEndpoint;
use crate::{GatewayError, Result};

/// Fixed identifying header attached to SDL acquisition requests
pub const GATEWAY_USER_AGENT: &str = "FederationGateway/0.1.0";

/// Trace header forwarded on routed subqueries, as the original gateway
/// forwarded federation trace requests to its subgraphs
const TRACE_HEADER: &str = "apollo-federation-include-trace";
const TRACE_VALUE: &str = "ftv1";

/// Federation SDL query answered by every subgraph
const SDL_QUERY: &str = "{ _service { sdl } }";

/// One GraphQL request routed to a subgraph
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubgraphRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

/// Transport seam between the aggregation layer and the subgraphs.
///
/// The production implementation is [`HttpSubgraphClient`]; tests supply
/// in-memory implementations so composition and dispatch are exercised
/// without a network.
#[async_trait]
pub trait SubgraphClient: Send + Sync {
    /// Fetch the subgraph's schema SDL
    async fn fetch_sdl(&self, endpoint: &SubgraphEndpoint) -> Result<String>;

    /// Execute a routed subquery, returning the raw GraphQL response body
    async fn execute(&self, endpoint: &SubgraphEndpoint, request: &SubgraphRequest)
        -> Result<Value>;
}

/// HTTP transport over reqwest
pub struct HttpSubgraphClient {
    client: reqwest::Client,
}

impl HttpSubgraphClient {
    /// Create a client. No per-request timeout is imposed beyond what the
    /// transport enforces; the bootstrap bound is purely on attempt count.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn introspection_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(GATEWAY_USER_AGENT));
        headers
    }
}

impl Default for HttpSubgraphClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubgraphClient for HttpSubgraphClient {
    async fn fetch_sdl(&self, endpoint: &SubgraphEndpoint) -> Result<String> {
        debug!("📡 Fetching SDL from subgraph '{}'", endpoint.name);

        let response = self
            .client
            .post(endpoint.url.clone())
            .headers(Self::introspection_headers())
            .json(&json!({ "query": SDL_QUERY }))
            .send()
            .await
            .map_err(|e| schema_fetch_error(&endpoint.name, GatewayError::from_transport(e)))?;

        let status = response.status();
        if !status.is_success() {
            // Carry any server-supplied retry hint into the error text so
            // the backoff scheduler can honor it
            let mut detail = status.to_string();
            if let Some(seconds) = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
            {
                detail.push_str(&format!(", retry-after: {}", seconds));
            }
            return Err(GatewayError::SchemaFetch {
                name: endpoint.name.clone(),
                detail,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| schema_fetch_error(&endpoint.name, GatewayError::from_transport(e)))?;

        match body.pointer("/data/_service/sdl").and_then(Value::as_str) {
            Some(sdl) => Ok(sdl.to_string()),
            None => Err(GatewayError::SchemaFetch {
                name: endpoint.name.clone(),
                detail: "response did not contain _service.sdl".to_string(),
            }),
        }
    }

    async fn execute(
        &self,
        endpoint: &SubgraphEndpoint,
        request: &SubgraphRequest,
    ) -> Result<Value> {
        let response = self
            .client
            .post(endpoint.url.clone())
            .header(TRACE_HEADER, TRACE_VALUE)
            .json(request)
            .send()
            .await
            .map_err(GatewayError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Network(format!(
                "subgraph '{}' returned {}",
                endpoint.name, status
            )));
        }

        response.json().await.map_err(GatewayError::from_transport)
    }
}

/// Wrap a transport failure in the schema-fetch marker so the classifier
/// treats SDL acquisition problems as availability, not validity
fn schema_fetch_error(name: &str, cause: GatewayError) -> GatewayError {
    GatewayError::SchemaFetch {
        name: name.to_string(),
        detail: cause.to_string(),
    }
}
