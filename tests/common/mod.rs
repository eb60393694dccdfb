use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use framequery::{Client, ClientBuilder, ProcessOptions};
use serde_json::{json, Value};
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

pub const API_KEY: &str = "fq_test_key";

pub fn client_for(server: &MockServer) -> Client {
    ClientBuilder::new()
        .api_key(API_KEY)
        .base_url(server.uri())
        .build()
        .expect("build client")
}

/// Short poll interval so tests never wait on the default 5s cadence.
#[allow(dead_code)]
pub fn fast_poll() -> ProcessOptions {
    ProcessOptions::default().poll_interval(Duration::from_millis(10))
}

#[allow(dead_code)]
pub fn job_json(id: &str, status: &str) -> Value {
    json!({
        "jobId": id,
        "status": status,
        "originalFilename": "clip.mp4",
        "createdAt": "2024-05-01T10:00:00Z"
    })
}

/// Plays back responses in order, repeating the last one forever.
#[allow(dead_code)]
pub struct Sequence {
    responses: Vec<ResponseTemplate>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl Sequence {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(!responses.is_empty(), "sequence needs at least one response");
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }

    /// Enveloped 200 responses, one per job body.
    pub fn jobs(bodies: Vec<Value>) -> Self {
        Self::new(
            bodies
                .into_iter()
                .map(|body| ResponseTemplate::new(200).set_body_json(json!({ "data": body })))
                .collect(),
        )
    }
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses[call.min(self.responses.len() - 1)].clone()
    }
}
