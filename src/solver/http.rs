//! Trait abstraction for the solver HTTP exchange to enable testing

use async_trait::async_trait;

use super::error::TransportError;

/// A JSON POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Trait for the HTTP operations solver clients need
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest` backed transport
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.post(&request.url).body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock transport for testing
    #[derive(Clone)]
    pub struct MockTransport {
        pub requests: Arc<Mutex<Vec<HttpRequest>>>,
        pub response: Arc<Mutex<HttpResponse>>,
        pub connection_error: Arc<Mutex<Option<String>>>,
        pub delay: Arc<Mutex<Option<Duration>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::responding(200, "{}")
        }

        pub fn responding(status: u16, body: &str) -> Self {
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                response: Arc::new(Mutex::new(HttpResponse {
                    status,
                    body: body.to_string(),
                })),
                connection_error: Arc::new(Mutex::new(None)),
                delay: Arc::new(Mutex::new(None)),
            }
        }

        pub fn get_requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn set_response(&self, status: u16, body: &str) {
            *self.response.lock().unwrap() = HttpResponse {
                status,
                body: body.to_string(),
            };
        }

        pub fn set_connection_error(&self, message: &str) {
            *self.connection_error.lock().unwrap() = Some(message.to_string());
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = Some(delay);
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = self.connection_error.lock().unwrap().clone() {
                return Err(TransportError::Connection(message));
            }
            Ok(self.response.lock().unwrap().clone())
        }
    }
}
