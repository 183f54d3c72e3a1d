//! Per-connector route rotation: direct first, then each configured proxy.

use tracing::warn;

use crate::domain::ExchangeId;
use crate::port::{ProxyEndpoint, Route};

/// Ordered routes with a cursor that only moves on connect failure.
#[derive(Debug, Clone)]
pub struct ProxyRotation {
    routes: Vec<Route>,
    index: usize,
}

impl ProxyRotation {
    /// Build the rotation for one exchange.
    ///
    /// Proxies rejected by `supports` are dropped with a logged reason. With
    /// `prefer_proxy` the direct route is left out unless no proxy survives.
    pub fn new<F>(
        exchange: &ExchangeId,
        proxies: &[ProxyEndpoint],
        prefer_proxy: bool,
        supports: F,
    ) -> Self
    where
        F: Fn(&ProxyEndpoint) -> Result<(), String>,
    {
        let mut routes = Vec::with_capacity(proxies.len() + 1);
        if !prefer_proxy {
            routes.push(Route::Direct);
        }
        for proxy in proxies {
            match supports(proxy) {
                Ok(()) => routes.push(Route::Proxy(proxy.clone())),
                Err(reason) => {
                    warn!(exchange = %exchange, proxy = %proxy, reason = %reason, "Skipping proxy");
                }
            }
        }
        if routes.is_empty() {
            warn!(exchange = %exchange, "No usable proxy, falling back to direct connection");
            routes.push(Route::Direct);
        }
        Self { routes, index: 0 }
    }

    #[must_use]
    pub fn current(&self) -> &Route {
        &self.routes[self.index]
    }

    /// Position of the current route.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of routes in one full pass.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Move to the next route, wrapping at the end.
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.routes.len();
    }

    /// Go back to the first route.
    pub fn rewind(&mut self) {
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn proxy(url: &str) -> ProxyEndpoint {
        ProxyEndpoint::new(Url::parse(url).unwrap())
    }

    fn http_only(proxy: &ProxyEndpoint) -> Result<(), String> {
        if proxy.scheme() == "http" {
            Ok(())
        } else {
            Err(format!("{} cannot tunnel", proxy.scheme()))
        }
    }

    #[test]
    fn test_direct_then_proxies() {
        let proxies = vec![proxy("http://a:1"), proxy("http://b:2")];
        let mut rotation = ProxyRotation::new(&"binance".into(), &proxies, false, http_only);

        assert_eq!(rotation.len(), 3);
        assert_eq!(rotation.current(), &Route::Direct);
        rotation.advance();
        assert_eq!(rotation.current(), &Route::Proxy(proxies[0].clone()));
        assert_eq!(rotation.index(), 1);
        rotation.advance();
        rotation.advance();
        assert_eq!(rotation.current(), &Route::Direct);
    }

    #[test]
    fn test_unsupported_schemes_are_skipped() {
        let proxies = vec![proxy("socks5://a:1"), proxy("http://b:2")];
        let rotation = ProxyRotation::new(&"okx".into(), &proxies, false, http_only);
        assert_eq!(rotation.len(), 2);
    }

    #[test]
    fn test_prefer_proxy_skips_direct() {
        let proxies = vec![proxy("http://a:1")];
        let rotation = ProxyRotation::new(&"bybit".into(), &proxies, true, http_only);
        assert_eq!(rotation.len(), 1);
        assert!(matches!(rotation.current(), Route::Proxy(_)));

        let unusable = vec![proxy("socks5://a:1")];
        let rotation = ProxyRotation::new(&"bybit".into(), &unusable, true, http_only);
        assert_eq!(rotation.current(), &Route::Direct);
    }
}
