use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::api::{ApiFuture, ApiRequest, Method, Transport};
use crate::error::Error;
use crate::profile::WalletKeys;
use crate::targets;

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// reqwest-backed transport that signs each call with the wallet key its
/// credential class asks for.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    keys: WalletKeys,
}

impl HttpTransport {
    pub fn new(server_url: &str, keys: WalletKeys, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| Error::Transport {
                path: server_url.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base: base_url(server_url)?,
            keys,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url_for(&self, path: &str) -> Result<Url, Error> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|source| Error::InvalidUrl {
                value: path.to_string(),
                source,
            })
    }

    async fn execute(&self, request: ApiRequest) -> Result<Value, Error> {
        let ApiRequest {
            method,
            path,
            credential,
            body,
        } = request;
        let key = self
            .keys
            .key_for(credential)
            .ok_or(Error::MissingCredential { credential })?;
        let url = self.url_for(&path)?;

        let mut builder = self
            .client
            .request(reqwest_method(method), url)
            .header(API_KEY_HEADER, key);
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|source| Error::Transport {
            path: path.clone(),
            source,
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|source| Error::Transport {
            path: path.clone(),
            source,
        })?;

        if !status.is_success() {
            let message = error_message(&text);
            warn!(
                target: targets::API,
                method = %method,
                path = %path,
                status = status.as_u16(),
                message = %message,
                "API call rejected"
            );
            return Err(Error::Api {
                method: method.to_string(),
                path,
                status: status.as_u16(),
                message,
            });
        }

        debug!(target: targets::API, method = %method, path = %path, status = status.as_u16(), "API call ok");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|error| Error::Decode {
            path,
            details: error.to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> ApiFuture<Value> {
        let transport = self.clone();
        Box::pin(async move { transport.execute(request).await })
    }
}

/// Parses the server URL, forcing a trailing slash so relative joins keep any
/// path prefix.
pub fn base_url(value: &str) -> Result<Url, Error> {
    let trimmed = value.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalized).map_err(|source| Error::InvalidUrl {
        value: value.to_string(),
        source,
    })
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Server failures carry a FastAPI `detail`; anything else falls back to the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => body.trim().to_string(),
        },
        _ => body.trim().to_string(),
    }
}
