//! HTTP probe implementation.

use std::time::{Duration, Instant};

use reqwest::{Client, Method, Response, StatusCode};

use super::{Probe, ProbeError};

/// HTTP prober sharing one client across every target.
///
/// Certificate errors are ignored: this is a liveness check, not a TLS audit.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .user_agent(concat!("devpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        Ok(Self { client, timeout })
    }
}

impl Probe for HttpProber {
    async fn probe(&self, url: &str) -> Result<Duration, ProbeError> {
        run_http_probe(&self.client, url, self.timeout).await
    }
}

/// Run an HTTP probe against the given URL.
///
/// Sends `HEAD`, falling back to a single `GET` whenever the `HEAD` status is
/// outside `[200, 400)`; many servers and CDNs reject `HEAD` with 403, 404 or
/// 405 while serving `GET`. The final status decides, and the elapsed time
/// runs from the first request until the body was drained.
pub async fn run_http_probe(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<Duration, ProbeError> {
    let start = Instant::now();

    let status = tokio::time::timeout(timeout, async {
        let mut response = send(client, Method::HEAD, url, timeout).await?;

        if !is_success(response.status()) {
            response = send(client, Method::GET, url, timeout).await?;
        }

        let status = response.status();

        // Drain the body so latency covers the complete transfer
        response
            .bytes()
            .await
            .map_err(|e| classify(e, timeout))?;

        Ok::<_, ProbeError>(status)
    })
    .await
    .map_err(|_| ProbeError::Timeout(timeout))??;

    let elapsed = start.elapsed();

    if !is_success(status) {
        return Err(ProbeError::Status(status.as_u16()));
    }

    Ok(elapsed)
}

fn is_success(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

async fn send(
    client: &Client,
    method: Method,
    url: &str,
    timeout: Duration,
) -> Result<Response, ProbeError> {
    client
        .request(method, url)
        .send()
        .await
        .map_err(|e| classify(e, timeout))
}

fn classify(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else {
        ProbeError::Network(e.to_string())
    }
}
