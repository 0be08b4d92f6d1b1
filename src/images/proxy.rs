use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use thiserror::Error;

use crate::images::tools::{self, FetchedImage};

/// Outcome of a fetch, shared by every caller waiting on the same key.
pub type FetchResult = Result<FetchedImage, FetchError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Image request failed with status: {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else if let Some(status) = error.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Other(error.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Response contained no image data")]
    EmptyData,

    #[error("URL did not point to a decodable image")]
    BadUrl,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Image decode error: {0}")]
    Decode(String),
}

/// What the transport handed back for a single GET: either part may be missing.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub body: Option<Vec<u8>>,
    pub error: Option<TransportError>,
}

impl RawResponse {
    pub fn body(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: Some(body.into()),
            error: None,
        }
    }

    pub fn error(error: TransportError) -> Self {
        Self {
            body: None,
            error: Some(error),
        }
    }
}

/// Performs the byte transfer for a URL.
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, RawResponse>;
}

/// Turn a raw response into the outcome delivered to callers.
///
/// A transport error wins over the empty-data and bad-url classifications
/// whenever the body does not decode.
pub fn classify(response: RawResponse) -> FetchResult {
    let RawResponse { body, error } = response;

    let body = match body {
        Some(body) if !body.is_empty() => body,
        _ => {
            return Err(match error {
                Some(error) => FetchError::Transport(error),
                None => FetchError::EmptyData,
            })
        }
    };

    match tools::decode(body) {
        Ok(image) => Ok(image),
        Err(e) => {
            log::debug!("Fetched body is not an image: {}", e);
            Err(match error {
                Some(error) => FetchError::Transport(error),
                None => FetchError::BadUrl,
            })
        }
    }
}

/// Plain HTTP GET transport backed by one reusable client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: u64, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to build client: {}", e)))?;

        Ok(Self { client })
    }

    // Make actual HTTP request
    async fn make_request(&self, url: &str) -> RawResponse {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Image request to {} failed: {}", url, e);
                return RawResponse::error(e.into());
            }
        };

        let status = response.status();
        let error = if status.is_success() {
            None
        } else {
            log::error!("Image request failed with status: {}", status);
            Some(TransportError::Status(status.as_u16()))
        };

        match response.bytes().await {
            Ok(bytes) => {
                log::debug!("Received {} bytes from {}", bytes.len(), url);
                RawResponse {
                    body: Some(bytes.to_vec()),
                    error,
                }
            }
            Err(e) => RawResponse::error(error.unwrap_or_else(|| e.into())),
        }
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, RawResponse> {
        self.make_request(url).boxed()
    }
}
