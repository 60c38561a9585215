// Federation Gateway - Rust Edition
// A front-door aggregator exposing one GraphQL endpoint over independently
// deployed subgraph services, with a retry-hardened startup path

//! # Federation Gateway Library
//!
//! This is the main library crate for the federation gateway. The gateway
//! composes the schemas of several subgraph services (products, users,
//! orders) into a single queryable surface and routes each top-level field
//! to the subgraph that owns it.
//!
//! ## Core Components
//!
//! ### Subgraph Endpoints
//! - [`SubgraphEndpoint`]: the resolved network address of one subgraph
//! - [`resolve`]: three-tier endpoint resolution (full URL override,
//!   host:port override, compose-network DNS fallback)
//!
//! ### Resilient Bootstrap
//! The subgraphs routinely start later than the gateway, restart, move
//! between hosted and local environments, and rate-limit during startup.
//! The bootstrap subsystem absorbs all of that:
//! - [`bootstrap::is_transient`]: decides whether a failure is worth
//!   retrying (closed allow-list; unknown errors fail fast)
//! - [`bootstrap::next_delay`]: exponential backoff with jitter, honoring
//!   server-supplied retry hints verbatim
//! - [`bootstrap::StartupOrchestrator`]: drives bounded sequential startup
//!   attempts and decides terminal success or failure
//!
//! ### Aggregation Layer
//! Schema acquisition, routing-table composition, and per-field query
//! dispatch live in [`gateway`]. A failing subgraph at serve time nulls out
//! its own fields only; it never takes down queries to its siblings.
//!
//! ### Lifecycle
//! [`LifecycleController`] owns shutdown: SIGINT and SIGTERM both trigger
//! the same immediate, idempotent exit.

// Gateway configuration loaded from the environment
pub mod config;

// Subgraph endpoint resolution (pure, no network I/O)
pub mod subgraph;

// Resilient startup: classifier, backoff scheduler, orchestrator
pub mod bootstrap;

// Aggregation layer: schema acquisition, composition, query routing, server
pub mod gateway;

// Process lifecycle: signal handling and idempotent shutdown
pub mod lifecycle;

// Re-export core types for easy access
// This creates a "flat" API - users can import directly from the crate root
// instead of navigating the module hierarchy
pub use bootstrap::{is_transient, next_delay, StartupOrchestrator};
pub use config::{GatewayConfig, RetryPolicy};
pub use gateway::{
    client::{HttpSubgraphClient, SubgraphClient, SubgraphRequest},
    executor::QueryExecutor,
    schema::{compose, RoutingTable, SubgraphSchema},
    server::{ComposedGateway, GatewayServer},
};
pub use lifecycle::LifecycleController;
pub use subgraph::{resolve, ResolutionTier, SubgraphEndpoint};

// Core error types
// Using the `thiserror` crate to make error handling easier
use thiserror::Error;

/// Custom error types for gateway operations
///
/// The Display text of these variants doubles as the classification surface:
/// [`bootstrap::is_transient`] inspects rendered messages for markers such
/// as status codes and os-level network error text, so variants that wrap
/// transport failures embed their full source chain.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Error when configuration values are missing or malformed.
    /// A bad config never fixes itself by waiting, so this is permanent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error when a resolved endpoint is not a valid URL
    #[error("Invalid endpoint for subgraph '{name}': {detail}")]
    Endpoint { name: String, detail: String },

    /// Error when a subgraph's SDL could not be acquired.
    /// The detail carries the HTTP status (and any `retry-after: <secs>`
    /// hint from the subgraph) or the transport error chain.
    #[error("schema fetch failed for subgraph '{name}': {detail}")]
    SchemaFetch { name: String, detail: String },

    /// Error when the fetched schemas cannot be composed into one routing
    /// table (duplicate root fields, unparseable SDL). Permanent.
    #[error("Invalid schema: {0}")]
    Composition(String),

    /// Transport-level error talking to a subgraph.
    /// Embeds the source chain so markers like "Connection refused" or
    /// "dns error" survive into the message.
    #[error("network error: {0}")]
    Network(String),

    /// Error binding or running the listening socket
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),

    /// Error in an inbound GraphQL request (parse failure, unknown field,
    /// unsupported construct). Surfaces as a GraphQL error response.
    #[error("GraphQL error: {0}")]
    GraphQL(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal gateway error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Render a transport error with its full source chain.
    ///
    /// reqwest's top-level Display is just "error sending request for url";
    /// the interesting part ("Connection refused", "dns error", "operation
    /// timed out") lives further down the chain, and the transient-failure
    /// classifier needs to see it.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let mut detail = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        GatewayError::Network(detail)
    }
}

/// Type alias for Results that use our custom error type
pub type Result<T> = std::result::Result<T, GatewayError>;
