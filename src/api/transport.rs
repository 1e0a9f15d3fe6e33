//! Transport for remote procedure calls.
//!
//! The [`Transport`] trait is the single dynamic boundary of the client: a
//! procedure name plus positional, named arguments go in, a decoded value
//! comes out. [`SoapTransport`] is the production implementation over HTTP.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use super::endpoint::Endpoint;
use super::error::{ApiError, Result};
use super::soap;

/// Connection establishment timeout. No per-call timeout is applied.
const CONNECT_TIMEOUT_SECS: u64 = 15;

/// Positional procedure arguments, each with its wire name.
pub type Args = Vec<(&'static str, Value)>;

/// A handle able to invoke remote procedures.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke a remote procedure and return its decoded result.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Protocol` when the service answers with a fault,
    /// `ApiError::Connectivity` when it cannot be reached, and a network or
    /// decoding error when the call cannot be completed otherwise.
    async fn invoke(&self, procedure: &'static str, args: Args) -> Result<Value>;

    /// Fetch and check the service contract.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Connectivity` when the contract cannot be fetched or
    /// does not list any remote procedure.
    async fn validate(&self) -> Result<()>;

    /// The raw payload of the last request sent.
    fn last_request(&self) -> Option<String>;

    /// The raw payload of the last response received.
    fn last_response(&self) -> Option<String>;
}

/// Raw payloads of the most recent exchange.
#[derive(Debug, Default)]
struct Exchange {
    request: Option<String>,
    response: Option<String>,
}

/// SOAP 1.1 transport over HTTP.
#[derive(Debug)]
pub struct SoapTransport {
    /// The HTTP client.
    client: Client,
    /// The resolved endpoint.
    endpoint: Endpoint,
    /// Diagnostics for the last call.
    exchange: Mutex<Exchange>,
}

impl SoapTransport {
    /// Create a transport bound to an endpoint.
    ///
    /// Nothing is sent until the first call or [`Transport::validate`].
    pub fn new(endpoint: Endpoint, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            client,
            endpoint,
            exchange: Mutex::new(Exchange::default()),
        })
    }

    /// The endpoint this transport talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Failures to connect or to get an answer in time mean the service is
    /// unreachable; anything else stays a network error.
    fn send_error(&self, procedure: &str, err: reqwest::Error) -> ApiError {
        if err.is_connect() || err.is_timeout() {
            error!(procedure, error = %err, "Web service unreachable");
            ApiError::Connectivity(format!("'{}': {}", self.endpoint.soap_url, err))
        } else {
            ApiError::Network(err)
        }
    }

    fn record_request(&self, payload: String) {
        let mut exchange = self.exchange.lock().unwrap_or_else(PoisonError::into_inner);
        exchange.request = Some(payload);
        exchange.response = None;
    }

    fn record_response(&self, payload: &str) {
        let mut exchange = self.exchange.lock().unwrap_or_else(PoisonError::into_inner);
        exchange.response = Some(payload.to_string());
    }
}

#[async_trait]
impl Transport for SoapTransport {
    #[instrument(skip(self, args), fields(endpoint = %self.endpoint.soap_url))]
    async fn invoke(&self, procedure: &'static str, args: Args) -> Result<Value> {
        debug!(procedure, "Invoking remote procedure");

        let envelope = soap::build_envelope(procedure, &args);
        self.record_request(envelope.clone());

        let response = self
            .client
            .post(&self.endpoint.soap_url)
            .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", soap::soap_action(procedure))
            .body(envelope)
            .send()
            .await
            .map_err(|e| self.send_error(procedure, e))?;

        let status = response.status();
        let body = response.text().await?;
        self.record_response(&body);

        // Faults are delivered with HTTP 500, so the body is decoded first.
        match soap::parse_response(&body) {
            Ok(value) => Ok(value),
            Err(e) if e.is_fault() => {
                debug!(procedure, error = %e, "Remote procedure returned a fault");
                Err(e)
            }
            Err(e) if !status.is_success() => {
                error!(procedure, %status, "Unexpected HTTP response");
                Err(ApiError::InvalidResponse(format!(
                    "HTTP {} from {}: {}",
                    status, self.endpoint.soap_url, e
                )))
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint.soap_url))]
    async fn validate(&self) -> Result<()> {
        let connectivity = |reason: String| {
            ApiError::Connectivity(format!("'{}': {}", self.endpoint.soap_url, reason))
        };

        let response = self
            .client
            .get(self.endpoint.wsdl_url())
            .send()
            .await
            .map_err(|e| connectivity(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Service contract not available");
            return Err(connectivity(format!("HTTP {}", response.status())));
        }

        let wsdl = response.text().await.map_err(|e| connectivity(e.to_string()))?;
        let operations =
            soap::wsdl_operations(&wsdl).map_err(|e| connectivity(e.to_string()))?;

        if operations.is_empty() {
            return Err(connectivity("no remote procedures advertised".to_string()));
        }

        debug!(count = operations.len(), "Service contract validated");
        Ok(())
    }

    fn last_request(&self) -> Option<String> {
        self.exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .request
            .clone()
    }

    fn last_response(&self) -> Option<String> {
        self.exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .response
            .clone()
    }
}
