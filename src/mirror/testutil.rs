//! Network-free [`Fetcher`] stub shared by the mirror and runner tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::fetch::{FetchError, Fetcher};

/// Serves canned bodies by URL; unknown URLs fail as an exhausted fetch.
/// Counts every call so tests can assert on network traffic.
pub(crate) struct StubFetcher {
    bodies: HashMap<String, Bytes>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self { bodies: HashMap::new(), calls: AtomicUsize::new(0) }
    }

    pub(crate) fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), Bytes::from(body));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.bodies.get(url) {
            Some(body) => Ok(body.clone()),
            None => Err(FetchError::Exhausted {
                url: url.to_string(),
                attempts: 5,
                source: Box::new(io::Error::new(io::ErrorKind::NotFound, "no stub body")),
            }),
        }
    }
}
