//! Transient-failure classification
//! Decides whether a startup failure is worth retrying by inspecting its
//! rendered message for a closed set of markers

/// Markers that identify a failure as transient.
///
/// This is a closed, extensible allow-list, not a deny-list: anything not
/// matching defaults to permanent so the gateway fails fast on
/// unrecoverable conditions (malformed configuration, incompatible
/// schemas) instead of retrying them forever.
///
/// All entries are lowercase; matching lowercases the message first. The
/// list covers three families:
/// - rate-limiting / upstream-unavailable status indicators
/// - os- and Node-style network error codes (subgraph error bodies are
///   forwarded verbatim, so both spellings appear in practice)
/// - the gateway's own schema-fetch-failed marker
const TRANSIENT_MARKERS: &[&str] = &[
    // upstream status indicators
    "429",
    "502",
    "503",
    "504",
    // network error codes
    "econnrefused",
    "enotfound",
    "etimedout",
    "econnreset",
    "socket hang up",
    // os / reqwest error chain text for the same conditions
    "connection refused",
    "connection reset",
    "dns error",
    "timed out",
    // schema acquisition failure (availability, not validity)
    "schema fetch failed",
];

/// Returns true when the failure message matches a transient marker.
///
/// Pure function of the message text; the orchestrator feeds it rendered
/// [`crate::GatewayError`] values.
pub fn is_transient(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}
