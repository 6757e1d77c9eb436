//! 🚀 The Dispatcher — one chunk in, every document fired at once, one verdict out.
//!
//! 🎬 *[five thousand documents line up at the starting gate]*
//! *[the session opens. the gun fires. they all leave at once.]*
//! *[one trips. the race is called. the others keep running, but nobody is timing them.]*
//!
//! 🧠 Knowledge graph:
//! - One [`SinkSession`] per chunk, shared behind an `Arc` by every document task.
//! - One `tokio::spawn` per document. Chunk size IS the concurrency bound.
//! - Fan-in via `FuturesUnordered` in completion order. The first failure wins,
//!   whatever order the responses arrive in.
//! - On failure, the remaining `JoinHandle`s are dropped, which detaches (does not abort)
//!   the siblings. They may still land at the sink. They are not counted.
//! - A rejection is logged with the full document and the sink's body at the moment it
//!   is seen, and the same context is packed into [`DispatchError::Rejected`].
//!
//! 🦆

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::backends::{Sink, SinkSession};
use crate::common::Document;

/// 💀 Why a chunk did not make it.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The sink answered, and the answer was no.
    #[error("sink rejected document with status {status}: {document_json}\nsink said: {body}")]
    Rejected {
        status: u16,
        document: Box<Document>,
        document_json: String,
        body: String,
    },
    /// The request never got an answer.
    #[error("could not deliver document {document_json}: {reason}")]
    Transport {
        document: Box<Document>,
        document_json: String,
        reason: String,
    },
    #[error("could not open a sink session: {reason}")]
    SessionUnavailable { reason: String },
    #[error("a document task died before reporting back: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl DispatchError {
    /// 📄 The document that caused the trouble, when there is one.
    pub fn document(&self) -> Option<&Document> {
        match self {
            DispatchError::Rejected { document, .. } | DispatchError::Transport { document, .. } => {
                Some(&**document)
            }
            DispatchError::SessionUnavailable { .. } | DispatchError::TaskFailed(_) => None,
        }
    }
}

fn render(document: &Document) -> String {
    serde_json::to_string(document).unwrap_or_else(|_| format!("{:?}", document))
}

/// 📡 Submit one document and judge the answer.
async fn submit_one<S>(session: Arc<S>, document: Document) -> Result<u16, DispatchError>
where
    S: SinkSession + ?Sized,
{
    let response = match session.submit(&document).await {
        Ok(response) => response,
        Err(err) => {
            let document_json = render(&document);
            error!(
                "💀 The following item could not be delivered: {}\nError message:\n({:#})",
                document_json, err
            );
            return Err(DispatchError::Transport {
                document: Box::new(document),
                document_json,
                reason: format!("{:#}", err),
            });
        }
    };

    if response.is_rejection() {
        // 📜 Log first, then fail. This text does not exist anywhere else.
        let document_json = render(&document);
        error!(
            "💀 The following item failed: {}\nError message:\n({})",
            document_json, response.body
        );
        return Err(DispatchError::Rejected {
            status: response.status,
            document: Box::new(document),
            document_json,
            body: response.body,
        });
    }
    Ok(response.status)
}

/// 🚀 Dispatch one chunk: every document concurrently, one verdict for the lot.
///
/// Returns the accepted status codes (completion order, one per document) or the
/// first failure observed. An empty chunk opens no session and makes no calls.
pub async fn dispatch<K>(sink: &K, documents: Vec<Document>) -> Result<Vec<u16>, DispatchError>
where
    K: Sink + ?Sized,
{
    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let session = Arc::new(sink.open_session().await.map_err(|err| {
        DispatchError::SessionUnavailable {
            reason: format!("{:#}", err),
        }
    })?);

    let expected = documents.len();
    let mut in_flight: FuturesUnordered<JoinHandle<Result<u16, DispatchError>>> = documents
        .into_iter()
        .map(|document| tokio::spawn(submit_one(Arc::clone(&session), document)))
        .collect();
    debug!("🚀 {} documents in flight", expected);

    let mut accepted = Vec::with_capacity(expected);
    while let Some(joined) = in_flight.next().await {
        // ⚠️ An early return drops `in_flight`, detaching whatever is still running.
        let status = joined??;
        accepted.push(status);
    }
    Ok(accepted)
}
