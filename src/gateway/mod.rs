// Federation Gateway Aggregation Layer
// This composes the subgraphs' schemas into one routing table and serves
// the combined query surface over HTTP

//! # Aggregation Layer
//!
//! The aggregation layer sits between inbound GraphQL requests and the
//! subgraph services:
//! ```text
//! Client (any language)
//!        ↓ HTTP/GraphQL
//! Gateway Server (`server` module) ← axum router, playground, health
//!        ↓ function calls
//! Query Executor (`executor` module) ← splits queries per owning subgraph
//!        ↓ HTTP POST
//! Subgraph Client (`client` module) ← reqwest transport, trait seam
//! ```
//!
//! Composition happens once per startup attempt ([`schema`] module): each
//! subgraph's SDL is fetched and its root fields claimed. At serve time the
//! executor re-prints each top-level field as a standalone subquery from the
//! parsed AST ([`query`] module) - static query shape and substituted
//! identifiers never meet as strings, so there is no injection surface.

/// Subgraph transport: the `SubgraphClient` trait and its reqwest impl
pub mod client;

/// Query dispatch and response merging
pub mod executor;

/// Parameterized subquery construction from parsed documents
pub mod query;

/// SDL parsing and routing-table composition
pub mod schema;

/// HTTP server, playground, and the schema-refresh poller
pub mod server;

// Re-export the main aggregation types for easy access
pub use client::{HttpSubgraphClient, SubgraphClient, SubgraphRequest};
pub use executor::{GraphQLHttpRequest, QueryExecutor};
pub use schema::{compose, RoutingTable, SubgraphSchema};
pub use server::{ComposedGateway, GatewayServer};
