//! Subgraph endpoint resolution
//! This module computes the network address to contact for each named
//! subgraph across the three deployment topologies the gateway supports

use crate::{GatewayError, Result};
use std::env;
use tracing::debug;
use url::Url;

/// The resolved network address of one subgraph
///
/// Immutable once computed for a process lifetime. Created at startup by
/// [`resolve`], owned by the orchestrator, and borrowed by the aggregation
/// layer for every outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphEndpoint {
    /// Subgraph name ("products", "users", "orders")
    pub name: String,
    /// Fully resolved address including the query sub-path
    pub url: Url,
    /// Default port used by the compose-network fallback tier
    pub port: u16,
}

/// Which precedence tier produced an endpoint (diagnostic only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// `<NAME>_URL` - hosted deployment with a full external base URL
    ExternalUrl,
    /// `<NAME>_HOSTPORT` - private-network host:port pair
    HostPort,
    /// No overrides - compose-network DNS (`http://<name>:<port>`)
    ComposeDns,
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionTier::ExternalUrl => write!(f, "external URL override"),
            ResolutionTier::HostPort => write!(f, "host:port override"),
            ResolutionTier::ComposeDns => write!(f, "compose-network DNS fallback"),
        }
    }
}

/// Resolve the address of a named subgraph from the process environment.
///
/// Resolution precedence, first match wins:
/// 1. `<NAME>_URL` - full external base URL (e.g. a hosted deployment);
///    used as the base with the query sub-path appended
/// 2. `<NAME>_HOSTPORT` - composed into `http://host:port<path>`
/// 3. fallback `http://<name>:<default_port><path>`, relying on
///    compose-network DNS to resolve the bare service name
///
/// Pure string composition over configuration lookups - no network I/O ever
/// happens here.
pub fn resolve(name: &str, default_port: u16, path: &str) -> Result<SubgraphEndpoint> {
    let upper = name.to_uppercase();
    let lookup = |key: &str| env::var(format!("{}_{}", upper, key)).ok();
    resolve_with(lookup, name, default_port, path)
}

/// Resolve against an explicit configuration lookup.
///
/// `lookup` receives the override kind (`"URL"` or `"HOSTPORT"`) and returns
/// the configured value, if any. [`resolve`] wires this to environment
/// variables; tests supply a map.
pub fn resolve_with<F>(
    lookup: F,
    name: &str,
    default_port: u16,
    path: &str,
) -> Result<SubgraphEndpoint>
where
    F: Fn(&str) -> Option<String>,
{
    let (raw, tier) = if let Some(full) = lookup("URL") {
        // Hosted deployment: the override is the base, sub-path appended
        (format!("{}{}", full.trim_end_matches('/'), path), ResolutionTier::ExternalUrl)
    } else if let Some(hostport) = lookup("HOSTPORT") {
        // Private network: compose the full URL here
        (format!("http://{}{}", hostport, path), ResolutionTier::HostPort)
    } else {
        // Local compose network: service names resolve via DNS
        (
            format!("http://{}:{}{}", name, default_port, path),
            ResolutionTier::ComposeDns,
        )
    };

    debug!("🔍 Resolved subgraph '{}' via {} -> {}", name, tier, raw);

    let url = Url::parse(&raw).map_err(|e| GatewayError::Endpoint {
        name: name.to_string(),
        detail: format!("'{}' is not a valid URL: {}", raw, e),
    })?;

    Ok(SubgraphEndpoint {
        name: name.to_string(),
        url,
        port: default_port,
    })
}
