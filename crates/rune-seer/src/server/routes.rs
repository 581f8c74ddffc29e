//! Request routing.
//!
//! | Route       | Methods   | Rate limited |
//! |-------------|-----------|--------------|
//! | `/`         | GET, HEAD | yes          |
//! | `/analyze`  | POST      | yes          |
//! | `/details`  | GET, POST | yes          |
//! | `/healthz`  | GET, HEAD | no           |

use rune_seer_core::batch;
use rune_seer_core::ratelimit::{Decision, RateLimiter, resolve_client_identity};
use tracing::{debug, info};

use super::http::{Form, Head, Request, Response, Status};
use super::render;

/// Body sent with every `429`.
pub const RATE_LIMITED_BODY: &str = "Rate limit exceeded";

/// Paths exempt from rate limiting.
const UNLIMITED_PATHS: &[&str] = &["/healthz"];

/// Gate a request on its client's bucket. `Some` is the `429` to send.
pub fn admit(
    limiter: &RateLimiter,
    trusted_header: Option<&str>,
    head: &Head,
    remote_addr: &str,
) -> Option<Response> {
    if UNLIMITED_PATHS.contains(&head.path.as_str()) {
        return None;
    }
    let identity = resolve_client_identity(head, trusted_header, remote_addr);
    match limiter.check(&identity) {
        Decision::Allow => None,
        Decision::Deny => {
            info!(%identity, path = %head.path, "rate limit exceeded");
            Some(Response::text(Status::TooManyRequests, RATE_LIMITED_BODY))
        }
    }
}

/// Dispatch an admitted request.
pub fn route(request: &Request) -> Response {
    let method = request.head.method.as_str();
    debug!(method, path = %request.head.path, "routing request");
    match (request.head.path.as_str(), method) {
        ("/", "GET" | "HEAD") => Response::html(render::INDEX_PAGE.to_string()),
        ("/", _) => Response::method_not_allowed("GET, HEAD"),

        ("/analyze", "POST") => analyze(&request.form()),
        ("/analyze", _) => Response::method_not_allowed("POST"),

        ("/details", "GET") => details(&request.query()),
        ("/details", "POST") => details(&request.form()),
        ("/details", _) => Response::method_not_allowed("GET, POST"),

        ("/healthz", "GET" | "HEAD") => Response::text(Status::Ok, "ok"),
        ("/healthz", _) => Response::method_not_allowed("GET, HEAD"),

        _ => Response::text(Status::NotFound, "Not found"),
    }
}

fn analyze(form: &Form) -> Response {
    let input = form.get("input").unwrap_or_default();
    let reports = batch::analyze_bytes(input);
    Response::html(render::analyze_fragment(&reports))
}

fn details(form: &Form) -> Response {
    let Some(raw) = form.get("char").filter(|v| !v.is_empty()) else {
        return Response::text(Status::BadRequest, "Character not provided");
    };
    let Ok(text) = std::str::from_utf8(raw) else {
        return Response::text(Status::BadRequest, "Invalid UTF-8 character");
    };
    match batch::detail(text) {
        Some(report) => Response::html(render::details_fragment(&report)),
        None => Response::text(Status::BadRequest, "Character not provided"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rune_seer_core::config::RateLimitConfig;

    fn request(method: &str, path: &str, query: &str, body: &str) -> Request {
        Request {
            head: Head {
                method: method.to_string(),
                path: path.to_string(),
                query: query.to_string(),
                headers: Vec::new(),
            },
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn index_serves_form() {
        let res = route(&request("GET", "/", "", ""));
        assert_eq!(res.status, Status::Ok);
        assert!(res.body.contains(r#"action="/analyze""#));
        assert!(res.content_type.starts_with("text/html"));
    }

    #[test]
    fn analyze_renders_fragment() {
        let res = route(&request("POST", "/analyze", "", "input=Hi"));
        assert_eq!(res.status, Status::Ok);
        assert_eq!(res.body.matches(r#"class="rune""#).count(), 2);
    }

    #[test]
    fn analyze_without_input_is_empty() {
        let res = route(&request("POST", "/analyze", "", ""));
        assert_eq!(res.status, Status::Ok);
        assert!(res.body.is_empty());
    }

    #[test]
    fn analyze_replaces_malformed_bytes() {
        let res = route(&request("POST", "/analyze", "", "input=a%FFb"));
        assert_eq!(res.status, Status::Ok);
        assert!(res.body.contains("replaces malformed bytes FF"));
    }

    #[test]
    fn details_via_query_and_form() {
        let get = route(&request("GET", "/details", "char=%F0%9F%98%80", ""));
        assert_eq!(get.status, Status::Ok);
        assert!(get.body.contains("11110xxx"));

        let post = route(&request("POST", "/details", "", "char=A"));
        assert_eq!(post.status, Status::Ok);
        assert!(post.body.contains("U+0041"));
    }

    #[test]
    fn details_requires_char() {
        for (method, query, body) in [
            ("GET", "", ""),
            ("GET", "char=", ""),
            ("POST", "", "other=x"),
        ] {
            let res = route(&request(method, "/details", query, body));
            assert_eq!(res.status, Status::BadRequest);
            assert_eq!(res.body, "Character not provided");
        }
    }

    #[test]
    fn details_rejects_invalid_utf8() {
        let res = route(&request("GET", "/details", "char=%C3", ""));
        assert_eq!(res.status, Status::BadRequest);
    }

    #[test]
    fn unknown_path_and_wrong_method() {
        assert_eq!(route(&request("GET", "/nope", "", "")).status, Status::NotFound);
        let res = route(&request("GET", "/analyze", "", ""));
        assert_eq!(res.status, Status::MethodNotAllowed);
        assert_eq!(res.allow, Some("POST"));
        assert_eq!(
            route(&request("DELETE", "/details", "", "")).status,
            Status::MethodNotAllowed
        );
    }

    #[test]
    fn healthz_is_ok() {
        let res = route(&request("GET", "/healthz", "", ""));
        assert_eq!((res.status, res.body.as_str()), (Status::Ok, "ok"));
    }

    #[test]
    fn admit_denies_after_burst() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 2,
            refill_per_second: 0.001,
            ..RateLimitConfig::default()
        });
        let head = request("GET", "/", "", "").head;
        assert!(admit(&limiter, None, &head, "10.0.0.1:5000").is_none());
        assert!(admit(&limiter, None, &head, "10.0.0.1:5001").is_none());
        let denied = admit(&limiter, None, &head, "10.0.0.1:5002").unwrap();
        assert_eq!(denied.status, Status::TooManyRequests);
        assert_eq!(denied.body, RATE_LIMITED_BODY);
        // another client is unaffected
        assert!(admit(&limiter, None, &head, "10.0.0.2:5000").is_none());
    }

    #[test]
    fn admit_uses_trusted_header() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 1,
            refill_per_second: 0.001,
            ..RateLimitConfig::default()
        });
        let mut head = request("GET", "/", "", "").head;
        head.headers
            .push(("X-Fly-Client-IP".to_string(), "203.0.113.9".to_string()));
        assert!(admit(&limiter, Some("X-Fly-Client-IP"), &head, "10.0.0.1:1").is_none());
        assert!(admit(&limiter, Some("X-Fly-Client-IP"), &head, "10.0.0.2:1").is_some());
        assert!(limiter.is_tracked("203.0.113.9"));
        assert!(!limiter.is_tracked("10.0.0.1"));
    }

    #[test]
    fn healthz_is_never_limited() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 1,
            refill_per_second: 0.001,
            ..RateLimitConfig::default()
        });
        let head = request("GET", "/healthz", "", "").head;
        for _ in 0..10 {
            assert!(admit(&limiter, None, &head, "10.0.0.1:1").is_none());
        }
        assert!(limiter.is_empty());
    }
}
