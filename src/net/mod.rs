//! Wire-level request/response snapshots and the network seam.
//!
//! Everything the worker caches or replays is expressed as a [`Request`] /
//! [`Response`] pair so the same value can travel to the network, into the
//! on-disk cache, and back out byte-for-byte.

pub mod error;
pub mod gateway;

pub use error::FetchError;
pub use gateway::{Gateway, HttpGateway};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Headers that participate in cache identity. Responses vary on who is
/// asking and what representation they asked for; the rest is noise.
const CACHE_KEY_HEADERS: [&str; 2] = ["accept", "authorization"];

/// Snapshot of an outgoing request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", format!("Bearer {}", token))
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// The path portion of the URL, without scheme, host, or query.
    /// Used for request classification.
    pub fn path(&self) -> &str {
        let after_host = match self.url.find("://") {
            Some(idx) => {
                let rest = &self.url[idx + 3..];
                match rest.find('/') {
                    Some(slash) => &rest[slash..],
                    None => "/",
                }
            }
            None => self.url.as_str(),
        };
        match after_host.find('?') {
            Some(q) => &after_host[..q],
            None => after_host,
        }
    }

    /// Stable, filename-safe cache key over the request identity:
    /// method + URL + the headers a response may vary on.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn canonical(&self) -> String {
        let mut relevant: Vec<String> = self
            .headers
            .iter()
            .filter(|(name, _)| {
                CACHE_KEY_HEADERS
                    .iter()
                    .any(|h| name.eq_ignore_ascii_case(h))
            })
            .map(|(name, value)| format!("{}:{}", name.to_ascii_lowercase(), value))
            .collect();
        relevant.sort();

        format!(
            "{} {}\n{}",
            self.method.to_ascii_uppercase(),
            self.url,
            relevant.join("\n")
        )
    }
}

/// Snapshot of a network response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Canned-response gateway for exercising retrieval policies without a
    //! network.

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{FetchError, Gateway, Request, Response};

    #[derive(Default)]
    pub struct FakeGateway {
        routes: Mutex<HashMap<String, Response>>,
        down: Mutex<HashSet<String>>,
        fail_matching: Mutex<Vec<String>>,
        calls: Mutex<Vec<Request>>,
    }

    impl FakeGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: &str, response: Response) {
            self.routes.lock().unwrap().insert(url.to_string(), response);
        }

        pub fn respond_ok(&self, url: &str, body: &[u8]) {
            self.respond(
                url,
                Response {
                    status: 200,
                    headers: vec![("content-type".to_string(), "application/json".to_string())],
                    body: body.to_vec(),
                },
            );
        }

        /// Simulate a network-level rejection for this URL.
        pub fn fail(&self, url: &str) {
            self.down.lock().unwrap().insert(url.to_string());
        }

        /// Reject any request whose body contains the needle. Lets tests fail
        /// one record out of a batch that all hits the same endpoint.
        pub fn fail_bodies_containing(&self, needle: &str) {
            self.fail_matching.lock().unwrap().push(needle.to_string());
        }

        pub fn clear_body_failures(&self) {
            self.fail_matching.lock().unwrap().clear();
        }

        pub fn calls(&self) -> Vec<Request> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls_to(&self, url: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url == url)
                .count()
        }
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        async fn send(&self, request: &Request) -> Result<Response, FetchError> {
            self.calls.lock().unwrap().push(request.clone());

            if self.down.lock().unwrap().contains(&request.url) {
                return Err(FetchError::Offline);
            }
            if let Some(body) = &request.body {
                let text = String::from_utf8_lossy(body);
                if self
                    .fail_matching
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|needle| text.contains(needle.as_str()))
                {
                    return Err(FetchError::Offline);
                }
            }

            match self.routes.lock().unwrap().get(&request.url) {
                Some(response) => Ok(response.clone()),
                None => Ok(Response {
                    status: 404,
                    headers: Vec::new(),
                    body: Vec::new(),
                }),
            }
        }
    }
}
