use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::channel::{Fault, Param, RpcChannel};
use super::envelope::{decode_response, encode_request};

/// The default schema namespace the reporting service publishes its operations under.
pub const DEFAULT_NAMESPACE: &str = "urn:Reporting";

/// Fault code for failures that happened before the service could answer.
pub const TRANSPORT_FAULT: &str = "Client.Transport";

/// Fault code for answers that were not a readable SOAP envelope.
pub const DECODE_FAULT: &str = "Client.Decode";

/// Where and how to reach the service.
#[derive(Debug, Clone)]
pub struct SoapConfig {
    /// The SOAP endpoint, e.g. `https://reports.example.com/soap/server.php`.
    pub endpoint: Url,
    /// Namespace bound to the `ns1` prefix and used in `SOAPAction`.
    pub namespace: String,
    /// Whole-request timeout enforced by the HTTP client.
    pub timeout: Duration,
    pub user_agent: String,
}

impl SoapConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("reportctl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// SOAP 1.1 over HTTP(S).
#[derive(Debug, Clone)]
pub struct SoapChannel {
    client: reqwest::Client,
    config: SoapConfig,
}

impl SoapChannel {
    pub fn new(config: SoapConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SoapConfig {
        &self.config
    }
}

fn transport_fault(error: reqwest::Error) -> Fault {
    let message = if error.is_timeout() {
        "request timed out"
    } else if error.is_connect() {
        "unable to connect"
    } else {
        "request failed"
    };
    Fault::new(TRANSPORT_FAULT, message, error.to_string())
}

#[async_trait]
impl RpcChannel for SoapChannel {
    async fn call(&self, operation: &str, params: &[Param]) -> Result<Value, Fault> {
        let envelope = encode_request(&self.config.namespace, operation, params);

        let response = self
            .client
            .post(self.config.endpoint.clone())
            // SOAP 1.1 wants XML and a quoted action naming the operation.
            .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header(
                "SOAPAction",
                format!("\"{}#{}\"", self.config.namespace, operation),
            )
            .body(envelope)
            .send()
            .await
            .map_err(transport_fault)?;

        // Faults arrive as 500 responses, so the body is decoded regardless of status.
        let status = response.status();
        let body = response.text().await.map_err(transport_fault)?;
        debug!(operation, %status, bytes = body.len(), "received SOAP response");

        match decode_response(&body) {
            Ok(outcome) => outcome,
            Err(_) if !status.is_success() => Err(Fault::new(
                TRANSPORT_FAULT,
                format!("HTTP {status}"),
                body,
            )),
            Err(error) => Err(Fault::new(DECODE_FAULT, error.to_string(), body)),
        }
    }
}
