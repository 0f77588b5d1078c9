//! Hand-rolled TLS-verified HTTP/1.1 client for the provider API.
//!
//! Mirrors `fos_network::client::HttpClient`'s manual
//! `rustls` + `tokio-rustls` + `hyper::client::conn::http1` handshake rather
//! than pulling in a pooled client: a fresh TCP+TLS connection is opened per
//! request, same as the teacher. TLS certificate validation against the
//! system trust store is mandatory and not configurable (spec.md 4.2).

use crate::error::NetError;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use rustls::ClientConfig;
use std::sync::Arc;
use tokio_rustls::TlsConnector;
use tracing::warn;

const USER_AGENT_STRING: &str = "pia-wg-ctl/0.1";

pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Authorization header to attach, if any. Never `Debug`/`Display`-ed;
/// the caller is responsible for building this from a `Redacted` value.
pub(crate) enum Auth {
    None,
    Basic(String),
    Bearer(String),
}

pub(crate) struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }

    /// One attempt at `method host:port path` with an optional JSON body.
    /// Higher-level retry-once-on-transport-error policy lives in
    /// `ProviderClient`, not here (spec.md 4.2).
    pub async fn request(
        &self,
        method: Method,
        host: &str,
        port: u16,
        path: &str,
        auth: Auth,
        json_body: Option<Vec<u8>>,
    ) -> Result<RawResponse, NetError> {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("https://{host}:{port}{path}"))
            .header(USER_AGENT, USER_AGENT_STRING)
            .header("Host", host);

        builder = match auth {
            Auth::None => builder,
            Auth::Basic(value) => builder.header(AUTHORIZATION, format!("Basic {value}")),
            Auth::Bearer(value) => builder.header(AUTHORIZATION, format!("Bearer {value}")),
        };

        let body = json_body.unwrap_or_default();
        if !body.is_empty() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }

        let request = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| NetError(e.to_string()))?;

        let stream = tokio::net::TcpStream::connect((host, port))
            .await
            .map_err(|e| NetError(format!("connect failed: {e}")))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(tls_config));
        let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
            .map_err(|_| NetError("invalid server name".to_string()))?;

        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| NetError(format!("TLS handshake failed: {e}")))?;

        let io = hyper_util::rt::TokioIo::new(tls_stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| NetError(format!("HTTP handshake failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                warn!(error = %e, "provider connection closed with error");
            }
        });

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| NetError(format!("request failed: {e}")))?;

        let status = response.status();
        let collected = response
            .into_body()
            .collect()
            .await
            .map_err(|e| NetError(format!("body read failed: {e}")))?;

        Ok(RawResponse {
            status,
            body: collected.to_bytes().to_vec(),
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}
