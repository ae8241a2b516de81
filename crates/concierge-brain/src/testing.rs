//! Test doubles shared by the unit tests in this crate.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

use async_trait::async_trait;
use concierge_core::error::{ConciergeError, Result};
use concierge_llm::provider::EmbeddingProvider;
use parking_lot::Mutex;

use crate::service::messenger::Messenger;

/// Deterministic bag-of-words embedder: each token hashes into one bucket.
pub struct HashEmbedder {
    dim: usize,
    calls: AtomicUsize,
    failing: AtomicBool,
    http_status: AtomicU16,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            http_status: AtomicU16::new(0),
        }
    }

    /// Number of `embed` requests served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Answer every request with this HTTP status instead of vectors; 0 clears it.
    pub fn set_http_status(&self, status: u16) {
        self.http_status.store(status, Ordering::SeqCst);
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut h: u64 = 1469598103934665603;
            for b in token.as_bytes() {
                h ^= *b as u64;
                h = h.wrapping_mul(1099511628211);
            }
            v[(h as usize) % self.dim] += 1.0;
        }
        v
    }
}

impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ConciergeError::ModelUnavailable("connection refused".to_string()));
        }
        let status = self.http_status.load(Ordering::SeqCst);
        if status != 0 {
            return Err(ConciergeError::Http {
                status,
                body: "oops!".to_string(),
            });
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Records every outbound message as `(chat_id, text)`.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(i64, String)>>,
    failing_replies: AtomicBool,
}

impl RecordingMessenger {
    /// Make `send_reply` fail without recording anything.
    pub fn set_failing_replies(&self, failing: bool) {
        self.failing_replies.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().clone()
    }

    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_reply(&self, chat_id: i64, text: &str, _reply_to: i64) -> Result<()> {
        if self.failing_replies.load(Ordering::SeqCst) {
            return Err(ConciergeError::Telegram("message to be replied not found".to_string()));
        }
        self.sent.lock().push((chat_id, text.to_string()));
        Ok(())
    }
}
