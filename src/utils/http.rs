//! HTTP utility functions for extracting request information.

use actix_web::HttpRequest;

/// Identifier used when no client address can be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Extract client IP address from request headers
///
/// Proxy headers are consulted in order, the first address of
/// `X-Forwarded-For` winning. Falls back to the socket peer address.
pub fn extract_client_ip(req: &HttpRequest) -> String {
    const IP_HEADERS: [&str; 3] = ["X-Forwarded-For", "X-Real-IP", "CF-Connecting-IP"];

    for header_name in IP_HEADERS {
        let candidate = req
            .headers()
            .get(header_name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        if let Some(ip) = candidate {
            return ip.to_string();
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Extract user agent from request headers, truncated to `max_chars`
pub fn extract_user_agent(req: &HttpRequest, max_chars: usize) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.chars().take(max_chars).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_forwarded_for_takes_first_address() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .to_http_request();
        assert_eq!(extract_client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn test_header_precedence() {
        let req = TestRequest::default()
            .insert_header(("CF-Connecting-IP", "192.0.2.9"))
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .to_http_request();
        assert_eq!(extract_client_ip(&req), "198.51.100.2");
    }

    #[test]
    fn test_unknown_without_headers_or_peer() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(extract_client_ip(&req), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_user_agent_truncation() {
        let long = "a".repeat(600);
        let req = TestRequest::default()
            .insert_header(("User-Agent", long.as_str()))
            .to_http_request();
        assert_eq!(extract_user_agent(&req, 500).map(|s| s.len()), Some(500));
    }
}
