use std::net::{IpAddr, SocketAddr};
use std::task::{Context, Poll};

use axum::extract::connect_info::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::config::AllowedIps;

/// Restricts the gateway notify endpoint to the configured source networks.
#[derive(Clone, Debug)]
pub struct NotifyAllowlistLayer {
    allowed: AllowedIps,
    trusted_proxy_depth: usize,
}

impl NotifyAllowlistLayer {
    pub fn new(allowed: AllowedIps, trusted_proxy_depth: usize) -> Self {
        Self {
            allowed,
            trusted_proxy_depth,
        }
    }
}

impl<S> Layer<S> for NotifyAllowlistLayer {
    type Service = NotifyAllowlist<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NotifyAllowlist {
            inner,
            allowed: self.allowed.clone(),
            trusted_proxy_depth: self.trusted_proxy_depth,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NotifyAllowlist<S> {
    inner: S,
    allowed: AllowedIps,
    trusted_proxy_depth: usize,
}

impl<S, B> Service<Request<B>> for NotifyAllowlist<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        if let AllowedIps::Cidrs(networks) = &self.allowed {
            let peer = client_ip(req.headers(), req.extensions(), self.trusted_proxy_depth);
            let permitted = peer
                .map(|ip| networks.iter().any(|net| net.contains(&ip)))
                .unwrap_or(false);

            if !permitted {
                tracing::warn!(client_ip = ?peer, uri = %req.uri(), "notify rejected by source allowlist");
                return Box::pin(async { Ok(StatusCode::FORBIDDEN.into_response()) });
            }
        }

        // poll_ready was driven on self.inner; swap so the ready service handles this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await })
    }
}

/// Client address as seen behind `trusted_proxy_depth` reverse proxies.
/// Each trusted proxy appends one entry to `X-Forwarded-For`; entries further
/// left are client-controlled.
fn client_ip(
    headers: &HeaderMap,
    extensions: &axum::http::Extensions,
    trusted_proxy_depth: usize,
) -> Option<IpAddr> {
    if trusted_proxy_depth > 0 {
        if let Some(ip) = forwarded_for(headers, trusted_proxy_depth) {
            return Some(ip);
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn forwarded_for(headers: &HeaderMap, trusted_proxy_depth: usize) -> Option<IpAddr> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let hops: Vec<IpAddr> = raw
        .split(',')
        .map(str::trim)
        .filter_map(|entry| {
            entry
                .parse::<IpAddr>()
                .ok()
                .or_else(|| entry.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
        })
        .collect();

    hops.len()
        .checked_sub(trusted_proxy_depth)
        .and_then(|index| hops.get(index))
        .copied()
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;
    use ipnet::IpNet;
    use tower::{service_fn, ServiceExt};

    fn gateway_only() -> AllowedIps {
        AllowedIps::Cidrs(vec!["203.0.113.0/24".parse::<IpNet>().expect("valid cidr")])
    }

    fn notify_request(xff: Option<&'static str>, peer: Option<[u8; 4]>) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/payments/notify")
            .body(Body::empty())
            .expect("request");
        if let Some(xff) = xff {
            req.headers_mut()
                .insert("x-forwarded-for", HeaderValue::from_static(xff));
        }
        if let Some(peer) = peer {
            req.extensions_mut()
                .insert(ConnectInfo(SocketAddr::from((peer, 443))));
        }
        req
    }

    async fn status_for(layer: NotifyAllowlistLayer, req: Request<Body>) -> StatusCode {
        let service = layer.layer(service_fn(|_req: Request<Body>| async move {
            Ok::<Response, Infallible>(StatusCode::OK.into_response())
        }));
        service.oneshot(req).await.expect("response").status()
    }

    #[test]
    fn forwarded_for_skips_trusted_hops() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.1, 203.0.113.10, 198.51.100.7"),
        );

        assert_eq!(
            forwarded_for(&headers, 2),
            Some(IpAddr::from([203, 0, 113, 10]))
        );
        assert_eq!(
            forwarded_for(&headers, 1),
            Some(IpAddr::from([198, 51, 100, 7]))
        );
    }

    #[test]
    fn forwarded_for_too_short_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.10"));
        assert_eq!(forwarded_for(&headers, 2), None);
    }

    #[tokio::test]
    async fn gateway_address_behind_proxy_passes() {
        let layer = NotifyAllowlistLayer::new(gateway_only(), 1);
        let req = notify_request(Some("203.0.113.55"), Some([10, 0, 0, 2]));
        assert_eq!(status_for(layer, req).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn spoofed_header_without_trusted_proxy_is_ignored() {
        let layer = NotifyAllowlistLayer::new(gateway_only(), 0);
        let req = notify_request(Some("203.0.113.55"), Some([198, 51, 100, 9]));
        assert_eq!(status_for(layer, req).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn direct_peer_inside_range_passes() {
        let layer = NotifyAllowlistLayer::new(gateway_only(), 0);
        let req = notify_request(None, Some([203, 0, 113, 44]));
        assert_eq!(status_for(layer, req).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_peer_is_forbidden() {
        let layer = NotifyAllowlistLayer::new(gateway_only(), 0);
        assert_eq!(status_for(layer, notify_request(None, None)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn any_allows_everyone() {
        let layer = NotifyAllowlistLayer::new(AllowedIps::Any, 0);
        let req = notify_request(None, Some([198, 51, 100, 9]));
        assert_eq!(status_for(layer, req).await, StatusCode::OK);
    }
}
