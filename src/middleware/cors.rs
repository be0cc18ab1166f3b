//! Origin allow-list gate: CORS headers for origins whose host matches an active tenant domain.

use crate::directory::TenantDirectory;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, ORIGIN, VARY,
};
use axum::http::{Method, Request, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub const DEFAULT_CORS_TTL: Duration = Duration::from_secs(180);
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(180);
pub const MAX_MAX_AGE: Duration = Duration::from_secs(600);

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const DEFAULT_ALLOW_HEADERS: &str = "Content-Type, Authorization";
const EXPOSE_HEADERS: &str = "X-Tenant-Resolved-By";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedDomain {
    pub domain: String,
    /// Stored as `*.domain`: matches the bare domain and any subdomain.
    pub wildcard: bool,
}

/// Trim, lowercase and split off the `*.` wildcard prefix. Blank entries are dropped.
pub fn parse_allowed_domains(raw: &[String]) -> Vec<AllowedDomain> {
    raw.iter()
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .map(|d| match d.strip_prefix("*.") {
            Some(rest) => AllowedDomain {
                domain: rest.to_string(),
                wildcard: true,
            },
            None => AllowedDomain {
                domain: d,
                wildcard: false,
            },
        })
        .collect()
}

pub fn is_allowed_origin(host: &str, allowed: &[AllowedDomain]) -> bool {
    allowed.iter().any(|a| {
        if a.wildcard {
            host == a.domain
                || host
                    .strip_suffix(a.domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        } else {
            host == a.domain
        }
    })
}

/// Lowercased host of an `Origin` value; `None` unless it reads as `scheme://host[:port]`.
pub fn origin_host(origin: &str) -> Option<String> {
    let uri: Uri = origin.parse().ok()?;
    uri.scheme()?;
    let host = uri.host()?.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    Some(host.to_lowercase())
}

#[derive(Clone, Copy, Debug)]
pub struct CorsOptions {
    pub ttl: Duration,
    pub max_age: Duration,
}

impl Default for CorsOptions {
    fn default() -> Self {
        CorsOptions {
            ttl: DEFAULT_CORS_TTL,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

#[derive(Default)]
struct AllowList {
    domains: Arc<Vec<AllowedDomain>>,
    fetched_at: Option<Instant>,
}

impl AllowList {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.is_some_and(|t| t.elapsed() < ttl)
    }
}

pub struct CorsGate {
    directory: Arc<TenantDirectory>,
    ttl: Duration,
    max_age: HeaderValue,
    cache: RwLock<AllowList>,
}

impl CorsGate {
    pub fn new(directory: Arc<TenantDirectory>, opts: CorsOptions) -> Self {
        let ttl = if opts.ttl.is_zero() { DEFAULT_CORS_TTL } else { opts.ttl };
        let max_age = opts.max_age.min(MAX_MAX_AGE).as_secs();
        CorsGate {
            directory,
            ttl,
            max_age: HeaderValue::from(max_age),
            cache: RwLock::new(AllowList::default()),
        }
    }

    /// Cached allow-list, refreshed from the directory once stale. A failed refresh keeps the
    /// last known list and leaves it stale so the next request retries.
    pub async fn allowed_domains(&self) -> Arc<Vec<AllowedDomain>> {
        {
            let cache = self.cache.read().await;
            if cache.is_fresh(self.ttl) {
                return cache.domains.clone();
            }
        }

        let mut cache = self.cache.write().await;
        if cache.is_fresh(self.ttl) {
            return cache.domains.clone();
        }
        match self.directory.list_domains().await {
            Ok(raw) => {
                cache.domains = Arc::new(parse_allowed_domains(&raw));
                cache.fetched_at = Some(Instant::now());
                tracing::debug!(count = cache.domains.len(), "cors allow-list refreshed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "cors: failed to refresh allowed domains, serving last known list");
            }
        }
        cache.domains.clone()
    }

    fn cors_headers(&self, origin: &HeaderValue, requested: Option<&HeaderValue>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
        let allow_headers = requested
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ALLOW_HEADERS));
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static(EXPOSE_HEADERS));
        headers.insert(ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        headers
    }
}

impl std::fmt::Debug for CorsGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorsGate")
            .field("ttl", &self.ttl)
            .field("max_age", &self.max_age)
            .finish()
    }
}

fn vary_origin(mut response: Response) -> Response {
    response.headers_mut().append(VARY, HeaderValue::from_static("origin"));
    response
}

/// Axum middleware; install with `axum::middleware::from_fn_with_state(gate, cors_gate)`.
pub async fn cors_gate(State(gate): State<Arc<CorsGate>>, request: Request<Body>, next: Next) -> Response {
    let Some(origin) = request.headers().get(ORIGIN).cloned() else {
        return vary_origin(next.run(request).await);
    };
    let Some(host) = origin.to_str().ok().and_then(origin_host) else {
        tracing::warn!(origin = ?origin, "cors: invalid origin");
        return vary_origin(next.run(request).await);
    };

    let preflight = request.method() == Method::OPTIONS;
    if !is_allowed_origin(&host, &gate.allowed_domains().await) {
        tracing::warn!(origin = ?origin, "cors: blocked origin");
        if preflight {
            return vary_origin(StatusCode::FORBIDDEN.into_response());
        }
        return vary_origin(next.run(request).await);
    }

    let cors = gate.cors_headers(&origin, request.headers().get(ACCESS_CONTROL_REQUEST_HEADERS));
    let mut response = if preflight {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };
    response.headers_mut().extend(cors);
    vary_origin(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryOptions;
    use crate::error::StoreError;
    use crate::store::TenantStore;
    use crate::tenant::Tenant;
    use async_trait::async_trait;
    use axum::{middleware::from_fn_with_state, routing::get, Router};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[derive(Default)]
    struct DomainStore {
        domains: Vec<String>,
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl TenantStore for DomainStore {
        async fn get_by_namespace(&self, _: &str) -> Result<Option<Tenant>, StoreError> {
            Ok(None)
        }

        async fn get_by_domain(&self, _: &str) -> Result<Option<Tenant>, StoreError> {
            Ok(None)
        }

        async fn list_domains(&self) -> Result<Vec<String>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Other("connection refused".into()));
            }
            Ok(self.domains.clone())
        }
    }

    fn store(domains: &[&str]) -> Arc<DomainStore> {
        Arc::new(DomainStore {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        })
    }

    fn gate(store: Arc<DomainStore>, opts: CorsOptions) -> Arc<CorsGate> {
        let directory = Arc::new(TenantDirectory::new(store, None, DirectoryOptions::default()));
        Arc::new(CorsGate::new(directory, opts))
    }

    fn app(gate: Arc<CorsGate>) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(gate, cors_gate))
    }

    fn request(method: Method, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_parse_allowed_domains() {
        let raw = vec![" *.Partner.io ".to_string(), "shop.acme.com".to_string(), "  ".to_string()];
        assert_eq!(
            parse_allowed_domains(&raw),
            vec![
                AllowedDomain {
                    domain: "partner.io".into(),
                    wildcard: true
                },
                AllowedDomain {
                    domain: "shop.acme.com".into(),
                    wildcard: false
                },
            ]
        );
    }

    #[test]
    fn test_matching() {
        let allowed = parse_allowed_domains(&["*.partner.io".to_string(), "acme.com".to_string()]);
        assert!(is_allowed_origin("partner.io", &allowed));
        assert!(is_allowed_origin("sub.partner.io", &allowed));
        assert!(is_allowed_origin("a.b.partner.io", &allowed));
        assert!(!is_allowed_origin("evilpartner.io", &allowed));
        assert!(is_allowed_origin("acme.com", &allowed));
        assert!(!is_allowed_origin("www.acme.com", &allowed));
    }

    #[test]
    fn test_origin_host() {
        assert_eq!(origin_host("https://Sub.Partner.io:8443").as_deref(), Some("sub.partner.io"));
        assert_eq!(origin_host("http://[::1]:3000").as_deref(), Some("::1"));
        assert_eq!(origin_host("partner.io"), None);
        assert_eq!(origin_host("null"), None);
    }

    #[test]
    fn test_max_age_is_capped() {
        let g = gate(
            store(&[]),
            CorsOptions {
                ttl: Duration::ZERO,
                max_age: Duration::from_secs(3600),
            },
        );
        assert_eq!(g.max_age, "600");
        assert_eq!(g.ttl, DEFAULT_CORS_TTL);
    }

    #[tokio::test]
    async fn test_allowed_wildcard_origin() {
        let resp = app(gate(store(&["*.partner.io"]), CorsOptions::default()))
            .oneshot(request(Method::GET, &[("Origin", "https://sub.partner.io")]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let h = resp.headers();
        assert_eq!(h[ACCESS_CONTROL_ALLOW_ORIGIN], "https://sub.partner.io");
        assert_eq!(h[ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(h[ACCESS_CONTROL_ALLOW_HEADERS], DEFAULT_ALLOW_HEADERS);
        assert_eq!(h[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(h[ACCESS_CONTROL_EXPOSE_HEADERS], "X-Tenant-Resolved-By");
        assert_eq!(h[ACCESS_CONTROL_MAX_AGE], "180");
        assert_eq!(h[VARY], "origin");
    }

    #[tokio::test]
    async fn test_preflight() {
        let g = gate(store(&["acme.com"]), CorsOptions::default());
        let resp = app(g.clone())
            .oneshot(request(
                Method::OPTIONS,
                &[
                    ("Origin", "https://acme.com"),
                    ("Access-Control-Request-Headers", "X-Tenant, Content-Type"),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_HEADERS], "X-Tenant, Content-Type");

        let resp = app(g)
            .oneshot(request(Method::OPTIONS, &[("Origin", "https://evil.com")]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(resp.headers()[VARY], "origin");
    }

    #[tokio::test]
    async fn test_disallowed_and_missing_origin_pass_through() {
        let g = gate(store(&["acme.com"]), CorsOptions::default());
        for headers in [&[("Origin", "https://evil.com")][..], &[("Origin", "garbage")][..], &[][..]] {
            let resp = app(g.clone()).oneshot(request(Method::GET, headers)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert!(resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
            assert_eq!(resp.headers()[VARY], "origin");
        }
    }

    #[tokio::test]
    async fn test_refresh_is_cached_and_stale_list_survives_failure() {
        let s = store(&["acme.com"]);
        let g = gate(
            s.clone(),
            CorsOptions {
                ttl: Duration::from_millis(20),
                ..Default::default()
            },
        );
        assert_eq!(g.allowed_domains().await.len(), 1);
        assert_eq!(g.allowed_domains().await.len(), 1);
        assert_eq!(s.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        s.failing.store(true, Ordering::SeqCst);
        assert_eq!(g.allowed_domains().await[0].domain, "acme.com");
        // Timestamp not advanced: the next call retries.
        assert_eq!(g.allowed_domains().await.len(), 1);
        assert_eq!(s.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_hits_store_once() {
        let s = store(&["acme.com"]);
        let g = gate(s.clone(), CorsOptions::default());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let g = g.clone();
                tokio::spawn(async move { g.allowed_domains().await.len() })
            })
            .collect();
        for t in tasks {
            assert_eq!(t.await.unwrap(), 1);
        }
        assert_eq!(s.calls.load(Ordering::SeqCst), 1);
    }
}
