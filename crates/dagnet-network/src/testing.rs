//! Scripted transport for tests
//!
//! [`MockTransport`] lets every network-facing test run without a network.
//! Responses are either scripted as a FIFO queue or routed by URL substring.
//! Routes win over the queue so concurrent requests stay deterministic; a
//! route with several responses serves them in order and then keeps serving
//! the last one, which makes polling loops easy to script.

use crate::error::NetworkError;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

type Scripted = Result<HttpResponse, NetworkError>;

struct Route {
    pattern: String,
    responses: VecDeque<Scripted>,
}

/// In-memory transport with scripted responses
#[derive(Default)]
pub struct MockTransport {
    queue: Mutex<VecDeque<Scripted>>,
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create an empty mock behind an `Arc`, ready to hand to a client
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a JSON response; non-2xx statuses become `HttpStatus` errors
    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.queue.lock().push_back(scripted_json(status, body));
    }

    /// Queue an error response
    pub fn push_error(&self, error: NetworkError) {
        self.queue.lock().push_back(Err(error));
    }

    /// Serve a JSON body to requests whose URL contains `pattern`.
    ///
    /// Repeated calls with the same pattern build a sequence; the final
    /// response of a sequence repeats forever.
    pub fn route_json(&self, pattern: impl Into<String>, status: u16, body: serde_json::Value) {
        self.add_route(pattern.into(), scripted_json(status, body));
    }

    /// Serve an error to requests whose URL contains `pattern`
    pub fn route_error(&self, pattern: impl Into<String>, error: NetworkError) {
        self.add_route(pattern.into(), Err(error));
    }

    /// Every request seen so far, in arrival order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    fn add_route(&self, pattern: String, response: Scripted) {
        let mut routes = self.routes.lock();
        if let Some(route) = routes.iter_mut().find(|r| r.pattern == pattern) {
            route.responses.push_back(response);
        } else {
            routes.push(Route {
                pattern,
                responses: VecDeque::from([response]),
            });
        }
    }
}

fn scripted_json(status: u16, body: serde_json::Value) -> Scripted {
    let bytes = body.to_string().into_bytes();
    if (200..300).contains(&status) {
        Ok(HttpResponse {
            status,
            body: bytes,
        })
    } else {
        Err(NetworkError::HttpStatus {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        self.requests.lock().push(request.clone());

        let routed = {
            let mut routes = self.routes.lock();
            routes
                .iter_mut()
                .find(|route| request.url.contains(&route.pattern))
                .map(|route| {
                    if route.responses.len() > 1 {
                        route.responses.pop_front().expect("non-empty route")
                    } else {
                        route.responses.front().cloned().expect("non-empty route")
                    }
                })
        };
        if let Some(response) = routed {
            return response;
        }

        self.queue.lock().pop_front().unwrap_or_else(|| {
            Err(NetworkError::ConnectionFailed(format!(
                "no scripted response for {}",
                request.url
            )))
        })
    }
}
