// Local API v1 HTTP client
//
// Wraps `reqwest::Client` with device URL construction and status-code
// translation. Endpoint methods live in `endpoints.rs` as inherent
// methods so this module stays focused on transport mechanics.

use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// HTTP client bound to one HomeWizard device on the local network.
///
/// One instance owns one connection pool. Call [`close`](Self::close)
/// when the owning config entry unloads; requests made afterwards fail
/// with [`Error::Closed`] instead of reopening connections.
#[derive(Debug)]
pub struct HomeWizardClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    closed: AtomicBool,
}

impl HomeWizardClient {
    /// Create a client for the device at `host`.
    ///
    /// `host` is an IP address or hostname, optionally with a port
    /// (`192.168.1.50`, `p1meter.local:80`, `fe80::1`).
    pub fn new(host: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let mut client = Self::with_client(http, base_url_for(host)?);
        client.timeout = transport.timeout;
        Ok(client)
    }

    /// Create a client with a pre-built `reqwest::Client` and base URL.
    ///
    /// Mostly useful for tests that point the client at a mock server.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout: TransportConfig::default().timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Release the client. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(url = %self.base_url, "closing device client");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request for `path` (relative to the device root) and
    /// decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let url = self.base_url.join(path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout: self.timeout,
                }
            } else {
                Error::Transport(e)
            }
        })?;

        self.parse_response(path, resp).await
    }

    /// Translate the HTTP status and decode the body.
    ///
    /// 403 is how the firmware says "local API switched off"; 404 means
    /// the endpoint does not exist on this firmware.
    async fn parse_response<T: DeserializeOwned>(
        &self,
        path: &str,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        trace!(%status, path, "device response");

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Disabled);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                path: format!("/{path}"),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Request {
                message: format!("HTTP {status}: {}", preview(&body)),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })
    }
}

/// Build `http://{host}/`, bracketing bare IPv6 literals.
fn base_url_for(host: &str) -> Result<Url, Error> {
    let host = host.trim().trim_end_matches('/');
    let authority = if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]")
    } else {
        host.to_owned()
    };
    Ok(Url::parse(&format!("http://{authority}/"))?)
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_accepts_ip_host_and_port() {
        assert_eq!(
            base_url_for("192.168.1.50").expect("valid").as_str(),
            "http://192.168.1.50/"
        );
        assert_eq!(
            base_url_for("p1meter.local:8080").expect("valid").as_str(),
            "http://p1meter.local:8080/"
        );
        assert_eq!(
            base_url_for("fe80::1").expect("valid").as_str(),
            "http://[fe80::1]/"
        );
    }

    #[test]
    fn base_url_rejects_garbage() {
        assert!(base_url_for("not a host").is_err());
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        let cut = preview(&body);
        assert!(cut.len() <= 200);
        assert!(body.starts_with(cut));
    }

    #[test]
    fn close_is_idempotent() {
        let client = HomeWizardClient::new("127.0.0.1", &TransportConfig::default())
            .expect("client builds");
        assert!(!client.is_closed());
        client.close();
        client.close();
        assert!(client.is_closed());
    }
}
