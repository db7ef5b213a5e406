//! Scripted transport shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cypher_api::{Error, Result};
use neohttp::{ClientConfig, Database, HttpRequest, HttpResponse, Transport};

pub const URI: &str = "http://localhost:7474";
pub const ENDPOINT: &str = "http://localhost:7474/db/neo4j/tx";

pub const DISCOVERY: &str = r#"{
    "bolt_routing": "neo4j://localhost:7687",
    "transaction": "http://localhost:7474/db/{databaseName}/tx",
    "bolt_direct": "bolt://localhost:7687",
    "neo4j_version": "4.4.12",
    "neo4j_edition": "community"
}"#;

pub const EMPTY: &str = r#"{"results":[],"errors":[]}"#;

enum Reply {
    Response {
        status: u16,
        location: Option<String>,
        body: String,
    },
    Fail(String),
}

/// Transport that replays queued replies in order and records every request.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mock whose first reply is a successful discovery.
    pub fn discovered() -> Arc<Self> {
        let mock = Self::new();
        mock.reply(DISCOVERY);
        mock
    }

    pub fn reply(&self, body: &str) -> &Self {
        self.push(Reply::Response {
            status: 200,
            location: None,
            body: body.to_owned(),
        })
    }

    pub fn reply_with_location(&self, body: &str, location: &str) -> &Self {
        self.push(Reply::Response {
            status: 201,
            location: Some(location.to_owned()),
            body: body.to_owned(),
        })
    }

    pub fn reply_status(&self, status: u16, body: &str) -> &Self {
        self.push(Reply::Response {
            status,
            location: None,
            body: body.to_owned(),
        })
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.push(Reply::Fail(message.to_owned()))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `METHOD url` of every request after discovery.
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .skip(1)
            .map(|r| format!("{} {}", r.method, r.url))
            .collect()
    }

    fn push(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }
}

impl Transport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Response {
                status,
                location,
                body,
            }) => Ok(HttpResponse {
                status,
                location,
                body: Box::new(Cursor::new(body.into_bytes())),
            }),
            Some(Reply::Fail(message)) => Err(Error::transport(message)),
            None => Err(Error::transport("no scripted reply left")),
        }
    }
}

/// Config with retries that do not sleep.
pub fn config() -> ClientConfig {
    ClientConfig::new(URI).retry(4, Duration::ZERO)
}

pub fn connect(mock: &Arc<MockTransport>) -> Database {
    Database::connect_with(&config(), mock.clone()).unwrap()
}
