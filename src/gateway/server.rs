//! Gateway HTTP server
//! One startup attempt builds a [`ComposedGateway`]: subgraph SDL is
//! fetched, the routing table composed, and the listener bound. Serving
//! (and the schema-refresh poller) only begins after the orchestrator has
//! declared startup successful, so failed attempts own neither sockets nor
//! timers - dropping the attempt drops everything it built.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::gateway::client::{HttpSubgraphClient, SubgraphClient};
use crate::gateway::executor::{GraphQLHttpRequest, QueryExecutor};
use crate::gateway::schema::{compose, RoutingTable, SubgraphSchema};
use crate::subgraph::SubgraphEndpoint;
use crate::{GatewayError, Result};

/// Gateway server factory: holds everything needed to run one startup
/// attempt end to end
pub struct GatewayServer {
    config: GatewayConfig,
    endpoints: Vec<SubgraphEndpoint>,
    client: Arc<dyn SubgraphClient>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, endpoints: Vec<SubgraphEndpoint>) -> Self {
        Self {
            config,
            endpoints,
            client: Arc::new(HttpSubgraphClient::new()),
        }
    }

    /// Swap the transport (tests inject in-memory clients here)
    pub fn with_client(mut self, client: Arc<dyn SubgraphClient>) -> Self {
        self.client = client;
        self
    }

    /// Run one full initialization pass: acquire every subgraph's schema,
    /// compose the routing table, and bind the listening socket.
    ///
    /// Binding comes last: an attempt that fails schema acquisition or
    /// composition never owns a socket, so there is nothing to roll back
    /// between attempts.
    pub async fn build(&self) -> Result<ComposedGateway> {
        let table = fetch_and_compose(&self.client, &self.endpoints).await?;
        info!("🧩 Composed routing table with {} root fields", table.len());

        let executor = Arc::new(QueryExecutor::new(
            self.endpoints.clone(),
            self.client.clone(),
            table,
        ));
        let app = build_router(executor.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let server = axum::Server::from_tcp(listener)
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .serve(app.into_make_service());
        let serve_future: BoxFuture<'static, Result<()>> = Box::pin(async move {
            server
                .await
                .map_err(|e| GatewayError::Internal(e.to_string()))
        });

        Ok(ComposedGateway {
            local_addr,
            executor,
            serve_future,
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
            poll_interval: self.config.poll_interval,
        })
    }
}

/// A fully initialized gateway: schemas composed, socket bound, not yet
/// serving
pub struct ComposedGateway {
    local_addr: SocketAddr,
    executor: Arc<QueryExecutor>,
    serve_future: BoxFuture<'static, Result<()>>,
    client: Arc<dyn SubgraphClient>,
    endpoints: Vec<SubgraphEndpoint>,
    poll_interval: Duration,
}

impl ComposedGateway {
    /// The bound listening address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the future completes or `shutdown` resolves.
    ///
    /// Shutdown is immediate: the server future is dropped, connection
    /// cleanup is left to the transport underneath. The schema-refresh
    /// poller starts here and is aborted on the way out.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let ComposedGateway {
            serve_future,
            executor,
            client,
            endpoints,
            poll_interval,
            local_addr: _,
        } = self;

        let poller = tokio::spawn(refresh_schemas(client, endpoints, executor, poll_interval));

        tokio::pin!(shutdown);
        let result = tokio::select! {
            result = serve_future => result,
            _ = &mut shutdown => {
                info!("🛑 Gateway stopped accepting requests");
                Ok(())
            }
        };
        poller.abort();
        result
    }
}

/// Fetch every subgraph's SDL and compose the routing table
pub(crate) async fn fetch_and_compose(
    client: &Arc<dyn SubgraphClient>,
    endpoints: &[SubgraphEndpoint],
) -> Result<RoutingTable> {
    let mut schemas = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let sdl = client.fetch_sdl(endpoint).await?;
        schemas.push(SubgraphSchema::parse(&endpoint.name, &sdl)?);
    }
    compose(&schemas)
}

/// Re-fetch subgraph schemas on an interval and swap the routing table.
/// A failed refresh keeps the previous table; the gateway keeps serving.
async fn refresh_schemas(
    client: Arc<dyn SubgraphClient>,
    endpoints: Vec<SubgraphEndpoint>,
    executor: Arc<QueryExecutor>,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval fires immediately; the composed table is already fresh
    ticker.tick().await;
    loop {
        ticker.tick().await;
        refresh_once(&client, &endpoints, &executor).await;
    }
}

/// One refresh pass: re-fetch and re-compose, swapping the routing table
/// only on success
async fn refresh_once(
    client: &Arc<dyn SubgraphClient>,
    endpoints: &[SubgraphEndpoint],
    executor: &QueryExecutor,
) {
    match fetch_and_compose(client, endpoints).await {
        Ok(table) => {
            debug!("🔁 Schema refresh swapped in {} root fields", table.len());
            executor.swap_table(table).await;
        }
        Err(e) => warn!("⚠️ Schema refresh failed, keeping previous table: {}", e),
    }
}

fn build_router(executor: Arc<QueryExecutor>) -> Router {
    Router::new()
        .route("/", get(playground).post(graphql_handler))
        .route("/graphql", post(graphql_handler))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(executor)
}

// GraphQL handler
async fn graphql_handler(
    State(executor): State<Arc<QueryExecutor>>,
    Json(request): Json<GraphQLHttpRequest>,
) -> Json<Value> {
    info!(
        "📊 Query: {}",
        request.operation_name.as_deref().unwrap_or("Anonymous")
    );
    Json(executor.execute(&request).await)
}

// GraphiQL interface pointed at the gateway's own endpoint
async fn playground() -> impl IntoResponse {
    Html(
        r#"
<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="robots" content="noindex">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="referrer" content="origin">
    <title>Federation Gateway</title>
    <style>
      body {
        height: 100%;
        margin: 0;
        width: 100%;
        overflow: hidden;
      }
      #graphiql {
        height: 100vh;
      }
    </style>
    <script crossorigin src="https://unpkg.com/react@18/umd/react.development.js"></script>
    <script crossorigin src="https://unpkg.com/react-dom@18/umd/react-dom.development.js"></script>
    <link rel="icon" href="https://graphql.org/favicon.ico">
    <link rel="stylesheet" href="https://unpkg.com/graphiql@3/graphiql.min.css" />
  </head>
  <body>
    <div id="graphiql">Loading...</div>
    <script src="https://unpkg.com/graphiql@3/graphiql.min.js" type="application/javascript"></script>
    <script>
      const root = ReactDOM.createRoot(document.getElementById('graphiql'));

      const fetcher = GraphiQL.createFetcher({
        url: '/graphql',
      });

      root.render(React.createElement(GraphiQL, {
        fetcher: fetcher,
        defaultEditorToolsVisibility: true,
      }));
    </script>
  </body>
</html>
"#,
    )
}

// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Federation Gateway is running!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use std::collections::HashMap;
    use tower::ServiceExt;
    use url::Url;

    /// SDL-only transport backed by a map
    struct SdlClient {
        sdl: HashMap<String, String>,
    }

    #[async_trait]
    impl SubgraphClient for SdlClient {
        async fn fetch_sdl(&self, endpoint: &SubgraphEndpoint) -> Result<String> {
            self.sdl
                .get(&endpoint.name)
                .cloned()
                .ok_or_else(|| GatewayError::SchemaFetch {
                    name: endpoint.name.clone(),
                    detail: "503 Service Unavailable".to_string(),
                })
        }

        async fn execute(
            &self,
            _endpoint: &SubgraphEndpoint,
            _request: &crate::gateway::client::SubgraphRequest,
        ) -> Result<Value> {
            Ok(json!({ "data": {} }))
        }
    }

    fn endpoint(name: &str, port: u16) -> SubgraphEndpoint {
        SubgraphEndpoint {
            name: name.to_string(),
            url: Url::parse(&format!("http://{}:{}/query", name, port)).unwrap(),
            port,
        }
    }

    #[tokio::test]
    async fn test_fetch_and_compose_builds_the_routing_table() {
        let client: Arc<dyn SubgraphClient> = Arc::new(SdlClient {
            sdl: HashMap::from([
                (
                    "products".to_string(),
                    "type Query { products: [String!]! }".to_string(),
                ),
                (
                    "users".to_string(),
                    "type Query { users: [String!]! }".to_string(),
                ),
            ]),
        });
        let endpoints = vec![endpoint("products", 4001), endpoint("users", 4002)];

        let table = fetch_and_compose(&client, &endpoints).await.unwrap();

        use async_graphql_parser::types::OperationType;
        assert_eq!(table.owner(OperationType::Query, "products"), Some("products"));
        assert_eq!(table.owner(OperationType::Query, "users"), Some("users"));
    }

    #[tokio::test]
    async fn test_fetch_and_compose_propagates_schema_fetch_failures() {
        let client: Arc<dyn SubgraphClient> = Arc::new(SdlClient {
            sdl: HashMap::new(),
        });
        let endpoints = vec![endpoint("orders", 4003)];

        let result = fetch_and_compose(&client, &endpoints).await;
        match result {
            Err(GatewayError::SchemaFetch { name, detail }) => {
                assert_eq!(name, "orders");
                assert!(detail.contains("503"));
            }
            other => panic!("expected SchemaFetch, got {:?}", other),
        }
    }

    fn graphql_request(query: &str) -> GraphQLHttpRequest {
        GraphQLHttpRequest {
            query: query.to_string(),
            variables: None,
            operation_name: None,
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_table_until_a_success_swaps_it() {
        let initial = compose(&[SubgraphSchema {
            name: "products".to_string(),
            query_fields: vec!["products".to_string()],
            mutation_fields: vec![],
        }])
        .unwrap();
        let transport: Arc<dyn SubgraphClient> = Arc::new(SdlClient {
            sdl: HashMap::new(),
        });
        let endpoints = vec![endpoint("products", 4001), endpoint("users", 4002)];
        let executor = QueryExecutor::new(endpoints.clone(), transport, initial);

        // Every fetch fails: the previous table must keep answering, and
        // fields it never knew stay unknown
        let failing: Arc<dyn SubgraphClient> = Arc::new(SdlClient {
            sdl: HashMap::new(),
        });
        refresh_once(&failing, &endpoints, &executor).await;
        let served = executor.execute(&graphql_request("{ products }")).await;
        assert!(served.get("errors").is_none());
        let rejected = executor.execute(&graphql_request("{ users }")).await;
        assert!(rejected["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("users"));

        // A later successful refresh swaps the wider table in
        let healthy: Arc<dyn SubgraphClient> = Arc::new(SdlClient {
            sdl: HashMap::from([
                (
                    "products".to_string(),
                    "type Query { products: [String!]! }".to_string(),
                ),
                (
                    "users".to_string(),
                    "type Query { users: [String!]! }".to_string(),
                ),
            ]),
        });
        refresh_once(&healthy, &endpoints, &executor).await;
        let served = executor.execute(&graphql_request("{ users }")).await;
        assert!(served.get("errors").is_none());
    }

    fn test_router() -> Router {
        let client: Arc<dyn SubgraphClient> = Arc::new(SdlClient {
            sdl: HashMap::new(),
        });
        let executor = Arc::new(QueryExecutor::new(
            vec![],
            client,
            RoutingTable::default(),
        ));
        build_router(executor)
    }

    #[tokio::test]
    async fn test_playground_is_served_at_the_root() {
        let response = test_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("graphiql"));
    }

    #[tokio::test]
    async fn test_health_endpoint_responds() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_endpoint_returns_graphql_errors_for_unknown_fields() {
        let request = Request::builder()
            .method("POST")
            .uri("/graphql")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query":"{ anything }"}"#))
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("anything"));
    }
}
