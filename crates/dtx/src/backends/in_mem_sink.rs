//! # Previously, on dtx...
//!
//! 🎬 The documents needed somewhere to land. Not a cluster. Not a disk.
//! Somewhere they could be counted, inspected, and judged by a test harness.
//!
//! [`InMemorySink`] collects accepted documents behind an `Arc<Mutex<...>>`
//! so callers can inspect what arrived. It can also be told to reject certain
//! `sample_code`s with a chosen status and body, which is how we rehearse the
//! worst night of a sink's life without actually having one.
//!
//! ✅ No network calls. No disk I/O. Just vibes and heap memory. 🦆

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::backends::{Sink, SinkResponse, SinkSession};
use crate::common::Document;

/// 📋 Which documents to refuse, and how rudely.
#[derive(Debug, Deserialize, Clone)]
pub struct InMemorySinkConfig {
    /// 🚫 `sample_code`s that get bounced at the door.
    #[serde(default)]
    pub reject_codes: Vec<String>,
    #[serde(default = "default_reject_status")]
    pub reject_status: u16,
    #[serde(default = "default_reject_body")]
    pub reject_body: String,
}

fn default_reject_status() -> u16 {
    500
}

fn default_reject_body() -> String {
    "rejected by in-memory sink".to_string()
}

impl Default for InMemorySinkConfig {
    fn default() -> Self {
        Self {
            reject_codes: Vec::new(),
            reject_status: default_reject_status(),
            reject_body: default_reject_body(),
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    accepted: Mutex<Vec<Document>>,
    attempts: AtomicUsize,
    sessions_opened: AtomicUsize,
}

/// 📦 A sink that never forgets.
///
/// Clone-able because tests need to peek inside after handing a copy off to the
/// pipeline. The `Arc` means every clone shares the same ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    config: InMemorySinkConfig,
    ledger: Arc<Ledger>,
}

impl InMemorySink {
    pub fn new(config: InMemorySinkConfig) -> Self {
        Self {
            config,
            ledger: Arc::default(),
        }
    }

    /// 📄 Every document the sink said yes to, in arrival order.
    pub async fn accepted(&self) -> Vec<Document> {
        self.ledger.accepted.lock().await.clone()
    }

    /// 🔢 Every submission, accepted or not.
    pub fn attempts(&self) -> usize {
        self.ledger.attempts.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.ledger.sessions_opened.load(Ordering::SeqCst)
    }
}

/// 🔌 A session is just another handle on the same ledger.
#[derive(Debug)]
pub struct InMemorySession {
    config: InMemorySinkConfig,
    ledger: Arc<Ledger>,
}

#[async_trait]
impl Sink for InMemorySink {
    type Session = InMemorySession;

    async fn open_session(&self) -> Result<InMemorySession> {
        self.ledger.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(InMemorySession {
            config: self.config.clone(),
            ledger: Arc::clone(&self.ledger),
        })
    }
}

#[async_trait]
impl SinkSession for InMemorySession {
    async fn submit(&self, document: &Document) -> Result<SinkResponse> {
        self.ledger.attempts.fetch_add(1, Ordering::SeqCst);
        if self.config.reject_codes.iter().any(|code| code == &document.sample_code) {
            return Ok(SinkResponse {
                status: self.config.reject_status,
                body: self.config.reject_body.clone(),
            });
        }
        // 🔒 The one place concurrent tasks collide. The Mutex is load-bearing.
        self.ledger.accepted.lock().await.push(document.clone());
        Ok(SinkResponse {
            status: 201,
            body: String::new(),
        })
    }
}
