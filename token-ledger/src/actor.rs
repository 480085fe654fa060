//! Actor-based serialization of ledger operations
//!
//! A single task owns the mailbox and runs invocations one at a time, so
//! no two operations ever interleave on the store. Settlement awaits the
//! marketplace inside the actor; the next invocation waits for it.
//!
//! ```text
//!   LedgerHandle (Clone) ──mpsc (bounded)──► LedgerActor ──► TokenLedger
//!          ▲                                     │
//!          └──────────── oneshot reply ──────────┘
//! ```

use crate::{
    invoke::{invoke, Function},
    ledger::TokenLedger,
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Run one public operation
    Invoke {
        /// Operation
        function: Function,
        /// Positional arguments
        args: Vec<String>,
        /// Reply channel for the rendered payload
        response: oneshot::Sender<Result<String>>,
    },

    /// Stop after the messages already queued ahead of this one
    Shutdown,
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    ledger: Arc<TokenLedger>,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(ledger: Arc<TokenLedger>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Invoke {
                    function,
                    args,
                    response,
                } => {
                    let result = invoke(&self.ledger, function, &args).await;
                    if let Err(e) = &result {
                        tracing::debug!(function = %function, error = %e, "Invocation failed");
                    }
                    if response.send(result).is_err() {
                        tracing::warn!(function = %function, "Caller dropped before reply");
                    }
                }
                LedgerMessage::Shutdown => break,
            }
        }
        tracing::info!("Ledger actor stopped");
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Run an operation and wait for its payload
    pub async fn invoke(&self, function: Function, args: Vec<String>) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Invoke {
                function,
                args,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Run an operation by its wire name
    pub async fn call(&self, function: &str, args: Vec<String>) -> Result<String> {
        self.invoke(function.parse()?, args).await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor with a bounded mailbox
pub fn spawn_ledger_actor(ledger: Arc<TokenLedger>, mailbox_capacity: usize) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
    let actor = LedgerActor::new(ledger, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
