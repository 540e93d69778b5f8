// File: ./src/client/core.rs
// HTTP plumbing shared by the auth and document gateways: one TLS-capable
// hyper client, JSON request/response handling, and error extraction.
use http::{Method, Request, StatusCode};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::future::poll_fn;
use tower_http::auth::AddAuthorization;
use tower_service::Service;

use http_body_util::BodyExt;
use rustls_native_certs;

const USER_AGENT: &str = concat!("studysync/", env!("CARGO_PKG_VERSION"));

type HttpsTransport = Client<
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    String,
>;

/// Thin wrapper over the hyper client. All gateway traffic goes through
/// `request_json`; the Authorization header is attached per request since
/// the bearer token rotates.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: HttpsTransport,
}

impl HttpClient {
    pub fn new() -> Result<Self, String> {
        let mut root_store = rustls::RootCertStore::empty();
        let result = rustls_native_certs::load_native_certs();
        root_store.add_parsable_certificates(result.certs);
        if root_store.is_empty() {
            return Err("No valid system certificates found.".to_string());
        }
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        // https_or_http so emulators and mock servers on localhost work.
        let https_connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();

        let inner = Client::builder(TokioExecutor::new()).build(https_connector);
        Ok(Self { inner })
    }

    /// Sends a JSON request and returns the status plus the parsed body.
    /// An empty body parses as `Value::Null`.
    pub async fn request_json(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), String> {
        let payload = body.map(|v| v.to_string()).unwrap_or_default();
        let req = Request::builder()
            .method(method)
            .uri(url)
            .header(http::header::USER_AGENT, USER_AGENT)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .map_err(|e| e.to_string())?;

        let response = match bearer {
            Some(token) => {
                let mut svc = AddAuthorization::bearer(self.inner.clone(), token);
                poll_fn(|cx| svc.poll_ready(cx))
                    .await
                    .map_err(|e| e.to_string())?;
                svc.call(req).await.map_err(|e| e.to_string())?
            }
            None => {
                let mut svc = self.inner.clone();
                poll_fn(|cx| svc.poll_ready(cx))
                    .await
                    .map_err(|e| e.to_string())?;
                svc.call(req).await.map_err(|e| e.to_string())?
            }
        };

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| e.to_string())?
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| format!("Invalid JSON response: {}", e))?
        };
        Ok((status, value))
    }

    /// The token endpoint wants a form body, not JSON.
    pub async fn post_form(&self, url: &str, form: String) -> Result<(StatusCode, Value), String> {
        let req = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(http::header::USER_AGENT, USER_AGENT)
            .header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form)
            .map_err(|e| e.to_string())?;

        let mut svc = self.inner.clone();
        poll_fn(|cx| svc.poll_ready(cx))
            .await
            .map_err(|e| e.to_string())?;
        let response = svc.call(req).await.map_err(|e| e.to_string())?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| e.to_string())?
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| format!("Invalid JSON response: {}", e))?
        };
        Ok((status, value))
    }
}

/// The backend wraps failures as `{"error": {"message": ...}}`; pull that
/// message out when present.
pub fn error_message(body: &Value) -> Option<&str> {
    body.get("error")?.get("message")?.as_str()
}

/// Uniform transport-level error string for a failed call.
pub fn response_error(op: &str, status: StatusCode, body: &Value) -> String {
    match error_message(body) {
        Some(msg) => format!("{} failed: HTTP {}: {}", op, status.as_u16(), msg),
        None => format!("{} failed: HTTP {}", op, status.as_u16()),
    }
}
