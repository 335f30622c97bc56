use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use tracing::debug;

use crate::config::Endpoint;
use crate::http::urls;

/// The parts of an outbound response filters need.
#[derive(Debug, Clone)]
pub struct HttpResponse {
	pub status: u16,
	pub body: Vec<u8>,
}

/// Outbound HTTP client used to reach the IdP token endpoint.
///
/// Returns `None` on transport failure; HTTP-level rejections surface
/// through the response status.
#[async_trait]
pub trait HttpClient: Send + Sync {
	async fn post(&self, endpoint: &Endpoint, headers: HeaderMap, body: String)
	-> Option<HttpResponse>;
}

/// Production client with pooled connections and a per-request deadline.
pub struct ReqwestHttpClient {
	client: reqwest::Client,
}

impl ReqwestHttpClient {
	pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
		let client = reqwest::Client::builder().timeout(timeout).build()?;
		Ok(Self { client })
	}
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
	async fn post(
		&self,
		endpoint: &Endpoint,
		headers: HeaderMap,
		body: String,
	) -> Option<HttpResponse> {
		let url = urls::to_url(endpoint);
		let response = match self.client.post(&url).headers(headers).body(body).send().await {
			Ok(response) => response,
			Err(err) => {
				debug!("token endpoint request failed: {err}");
				return None;
			},
		};
		let status = response.status().as_u16();
		let body = match response.bytes().await {
			Ok(body) => body.to_vec(),
			Err(err) => {
				debug!("failed reading token endpoint response body: {err}");
				return None;
			},
		};
		Some(HttpResponse { status, body })
	}
}
