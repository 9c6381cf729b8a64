//! In-memory collaborators for tests
//!
//! Compiled for unit tests and behind the `test-utils` feature.
//!
//! `ScriptedTransport` answers each URL from a queue of scripted responses.
//! The last response of a queue repeats forever, so a single `fail` entry
//! models a permanently unreachable page.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::infrastructure::http_client::{Transport, TransportError, TransportFactory};

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Scripted {
    Body(String),
    Fail(String),
}

impl Scripted {
    pub fn body(body: impl Into<String>) -> Self {
        Self::Body(body.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    responses: HashMap<String, VecDeque<Scripted>>,
    calls: HashMap<String, usize>,
    order: Vec<String>,
}

/// Transport that replays scripted responses per URL.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    state: Mutex<ScriptState>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        // A panicking test thread must not hide the script from the others
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replace the script for `url`.
    pub fn script<I>(&self, url: &str, responses: I)
    where
        I: IntoIterator<Item = Scripted>,
    {
        self.state()
            .responses
            .insert(url.to_string(), responses.into_iter().collect());
    }

    /// Shorthand for a page that always renders `body`.
    pub fn page(&self, url: &str, body: impl Into<String>) {
        self.script(url, [Scripted::body(body)]);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.state().calls.get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state().order.len()
    }

    /// URLs in request order.
    pub fn requested(&self) -> Vec<String> {
        self.state().order.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let next = {
            let mut state = self.state();
            *state.calls.entry(url.to_string()).or_insert(0) += 1;
            state.order.push(url.to_string());
            match state.responses.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        // Yield so concurrently issued requests interleave like real I/O
        tokio::task::yield_now().await;

        match next {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Fail(message)) => Err(TransportError::request(url, message)),
            None => Err(TransportError::request(url, "no scripted response")),
        }
    }
}

/// Factory handing out the same scripted transport, counting sessions.
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    transport: Arc<ScriptedTransport>,
    opened: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self {
            transport,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl TransportFactory for ScriptedFactory {
    fn open(&self) -> Result<Arc<dyn Transport>, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.transport.clone())
    }
}
