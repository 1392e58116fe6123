//! Global shared resources
//!
//! This module provides singleton instances of expensive-to-create resources:
//! - HTTP client with connection pooling and compression

use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

/// Global HTTP client - reuses connections across requests
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get or create the global HTTP client
///
/// Features:
/// - Connection pooling (reuses TCP connections to the registry)
/// - Gzip/Brotli decompression
/// - TCP keepalive
/// - Proper User-Agent
///
/// No request timeout is configured: a pending fetch waits for whatever the
/// transport decides, and a newer request supersedes it instead.
pub fn get_http_client() -> &'static Client {
    HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .connect_timeout(Duration::from_secs(10))
            // Connection pooling
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(120))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            // Compression
            .gzip(true)
            .brotli(true)
            // The registry serves an empty shell to clients without a browser-like agent
            .user_agent(concat!(
                "Mozilla/5.0 (compatible; drug-search/",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()
            .expect("Failed to create HTTP client")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_singleton() {
        let client1 = get_http_client();
        let client2 = get_http_client();
        assert!(std::ptr::eq(client1, client2));
    }
}
