/// Scripted in-memory HTTP client for engine and orchestrator tests.
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use mirror_shared::errors::FetchError;

use crate::fetch::{HttpClient, HttpResponse};

type Reply = Result<HttpResponse, FetchError>;

/// Replies per URL in order; the last reply repeats once the script runs out.
/// Unknown URLs fail with a DNS error.
#[derive(Default)]
pub struct ScriptedClient {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
        self
    }

    /// Every requested URL, in request order.
    pub fn requested(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut routes = self.routes.lock().unwrap();
        let Some(replies) = routes.get_mut(url) else {
            return Err(FetchError::Dns(format!("failed to lookup address for {}", url)));
        };
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap()
        }
    }
}

/// A 200 response carrying media.
pub fn image(content_type: &str, body: &[u8]) -> HttpResponse {
    HttpResponse {
        status: StatusCode::OK,
        content_type: Some(content_type.to_string()),
        body: body.to_vec(),
    }
}

/// An HTML error page with the given status.
pub fn page(status: u16) -> HttpResponse {
    HttpResponse {
        status: StatusCode::from_u16(status).unwrap(),
        content_type: Some("text/html".to_string()),
        body: b"<html>error</html>".to_vec(),
    }
}
