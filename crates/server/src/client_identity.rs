//! Caller identity extraction for admission control.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use config::IdentitySource;
use http::Request;

/// Identity of the caller for the configured source, if the request carries one.
pub(crate) fn caller_identity<B>(req: &Request<B>, source: &IdentitySource) -> Option<String> {
    match source {
        IdentitySource::ClientAddress => client_address(req).map(|ip| ip.to_string()),
        IdentitySource::HttpHeader(name) => {
            let value = req.headers().get(name.as_str())?.to_str().ok()?.trim();

            (!value.is_empty()).then(|| value.to_string())
        }
    }
}

/// Client address from `X-Real-IP`, then the first `X-Forwarded-For` hop, then the peer address.
fn client_address<B>(req: &Request<B>) -> Option<IpAddr> {
    let from_header = |name: &str| {
        let value = req.headers().get(name)?.to_str().ok()?;
        value.split(',').next()?.trim().parse::<IpAddr>().ok()
    };

    from_header("x-real-ip")
        .or_else(|| from_header("x-forwarded-for"))
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|connect_info| connect_info.0.ip())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)], peer: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/rl");

        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let mut req = builder.body(()).unwrap();

        if let Some(peer) = peer {
            req.extensions_mut()
                .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        }

        req
    }

    #[test]
    fn real_ip_wins_over_forwarded_for() {
        let req = request(
            &[("x-forwarded-for", "10.0.0.1, 10.0.0.2"), ("x-real-ip", "192.168.1.7")],
            Some("127.0.0.1:5000"),
        );

        let identity = caller_identity(&req, &IdentitySource::ClientAddress);

        assert_eq!(identity.as_deref(), Some("192.168.1.7"));
    }

    #[test]
    fn first_forwarded_hop_is_used() {
        let req = request(&[("x-forwarded-for", " 10.0.0.1 , 10.0.0.2")], Some("127.0.0.1:5000"));

        let identity = caller_identity(&req, &IdentitySource::ClientAddress);

        assert_eq!(identity.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn peer_address_is_the_fallback() {
        let req = request(&[("x-forwarded-for", "not-an-ip")], Some("[::1]:5000"));

        let identity = caller_identity(&req, &IdentitySource::ClientAddress);

        assert_eq!(identity.as_deref(), Some("::1"));
    }

    #[test]
    fn no_address_at_all() {
        let req = request(&[], None);

        assert_eq!(caller_identity(&req, &IdentitySource::ClientAddress), None);
    }

    #[test]
    fn header_source() {
        let source = IdentitySource::HttpHeader("X-Client-Id".to_string());

        let req = request(&[("x-client-id", " tenant-42 ")], Some("127.0.0.1:5000"));
        assert_eq!(caller_identity(&req, &source).as_deref(), Some("tenant-42"));

        let req = request(&[("x-client-id", "  ")], Some("127.0.0.1:5000"));
        assert_eq!(caller_identity(&req, &source), None);

        let req = request(&[], Some("127.0.0.1:5000"));
        assert_eq!(caller_identity(&req, &source), None);
    }
}
