//! Client identity resolution from request headers.
//!
//! Precedence, first non-empty value wins:
//! 1. the trusted edge-proxy header (configurable, `X-Fly-Client-IP` by default)
//! 2. `X-Forwarded-For`, first entry
//! 3. `X-Real-IP`
//! 4. the connection's remote address, port stripped

use std::net::SocketAddr;

/// Default trusted edge-proxy header.
pub const DEFAULT_TRUSTED_PROXY_HEADER: &str = "X-Fly-Client-IP";

/// Standard forwarded-for header.
pub const FORWARDED_FOR: &str = "X-Forwarded-For";

/// Real-IP header set by nginx and similar proxies.
pub const REAL_IP: &str = "X-Real-IP";

/// Case-insensitive header access.
pub trait HeaderLookup {
    /// Returns the first value of header `name`, if present.
    fn header(&self, name: &str) -> Option<&str>;
}

impl<K: AsRef<str>, V: AsRef<str>> HeaderLookup for [(K, V)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.as_ref().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_ref())
    }
}

/// Resolve the identity a request is rate limited under.
///
/// `trusted_header` of `None` (or an empty name) skips the edge-proxy step.
/// `remote_addr` is used verbatim when it does not parse as `ip:port`.
pub fn resolve_client_identity<H>(
    headers: &H,
    trusted_header: Option<&str>,
    remote_addr: &str,
) -> String
where
    H: HeaderLookup + ?Sized,
{
    if let Some(name) = trusted_header.filter(|n| !n.is_empty())
        && let Some(ip) = non_empty(headers.header(name))
    {
        return ip.to_string();
    }

    if let Some(ip) = non_empty(
        headers
            .header(FORWARDED_FOR)
            .and_then(|list| list.split(',').next()),
    ) {
        return ip.to_string();
    }

    if let Some(ip) = non_empty(headers.header(REAL_IP)) {
        return ip.to_string();
    }

    strip_port(remote_addr)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn strip_port(remote_addr: &str) -> String {
    remote_addr
        .parse::<SocketAddr>()
        .map_or_else(|_| remote_addr.to_string(), |addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMOTE: &str = "10.0.0.9:51234";

    fn resolve(headers: &[(&str, &str)]) -> String {
        resolve_client_identity(headers, Some(DEFAULT_TRUSTED_PROXY_HEADER), REMOTE)
    }

    #[test]
    fn trusted_header_wins() {
        let headers = [
            ("X-Real-IP", "3.3.3.3"),
            ("X-Forwarded-For", "2.2.2.2"),
            ("X-Fly-Client-IP", "1.1.1.1"),
        ];
        assert_eq!(resolve(&headers), "1.1.1.1");
    }

    #[test]
    fn forwarded_for_takes_first_entry() {
        let headers = [
            ("x-forwarded-for", " 2.2.2.2 , 9.9.9.9"),
            ("x-real-ip", "3.3.3.3"),
        ];
        assert_eq!(resolve(&headers), "2.2.2.2");
    }

    #[test]
    fn real_ip_before_remote() {
        assert_eq!(resolve(&[("X-REAL-IP", " 3.3.3.3 ")]), "3.3.3.3");
    }

    #[test]
    fn empty_values_fall_through() {
        let headers = [
            ("X-Fly-Client-IP", ""),
            ("X-Forwarded-For", " , 2.2.2.2"),
            ("X-Real-IP", "   "),
        ];
        assert_eq!(resolve(&headers), "10.0.0.9");
    }

    #[test]
    fn remote_address_loses_port() {
        assert_eq!(resolve(&[]), "10.0.0.9");
        let v6 = resolve_client_identity(&[] as &[(&str, &str)], None, "[::1]:8080");
        assert_eq!(v6, "::1");
    }

    #[test]
    fn unparseable_remote_is_verbatim() {
        let id = resolve_client_identity(&[] as &[(&str, &str)], None, "unix-socket");
        assert_eq!(id, "unix-socket");
    }

    #[test]
    fn disabled_trusted_header_is_ignored() {
        let headers = [("X-Fly-Client-IP", "1.1.1.1"), ("X-Real-IP", "3.3.3.3")];
        assert_eq!(resolve_client_identity(&headers[..], None, REMOTE), "3.3.3.3");
        assert_eq!(
            resolve_client_identity(&headers[..], Some(""), REMOTE),
            "3.3.3.3"
        );
    }

    #[test]
    fn custom_trusted_header() {
        let headers = [("CF-Connecting-IP", "4.4.4.4"), ("X-Real-IP", "3.3.3.3")];
        assert_eq!(
            resolve_client_identity(&headers[..], Some("cf-connecting-ip"), REMOTE),
            "4.4.4.4"
        );
    }

    #[test]
    fn slice_lookup_is_case_insensitive() {
        let headers = [("x-real-ip", "3.3.3.3")];
        assert_eq!(headers[..].header("X-Real-IP"), Some("3.3.3.3"));
        assert_eq!(headers[..].header("X-Forwarded-For"), None);
    }
}
