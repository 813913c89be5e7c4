//! Account balance resync queue.
//!
//! Linking or unlinking an offset changes how the accounts of both sides
//! are reported, so after every committed mutation the engine enqueues a
//! [`ResyncRequest`] per account. Delivery is fire-and-forget: the engine
//! never waits for the worker and never learns its outcome.

use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::Engine;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResyncRequest {
    pub account_id: Uuid,
}

/// Sending half of the resync queue, handed to the engine builder.
#[derive(Clone, Debug)]
pub struct ResyncQueue {
    sender: UnboundedSender<ResyncRequest>,
}

impl ResyncQueue {
    pub fn channel() -> (Self, UnboundedReceiver<ResyncRequest>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn schedule(&self, account_id: Uuid) {
        if self.sender.send(ResyncRequest { account_id }).is_err() {
            tracing::error!(%account_id, "resync queue closed, balance resync dropped");
        }
    }
}

/// Spawns a worker recomputing account balances until every
/// [`ResyncQueue`] handle is dropped.
///
/// Requests for the same account may arrive in any order; recomputation is
/// idempotent and the last write wins.
pub fn spawn_resync_worker(
    engine: Engine,
    mut receiver: UnboundedReceiver<ResyncRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = receiver.recv().await {
            match engine.recompute_account_balance(request.account_id).await {
                Ok(balance_minor) => {
                    tracing::debug!(account_id = %request.account_id, balance_minor, "account resynced");
                }
                Err(err) => {
                    tracing::error!(account_id = %request.account_id, "account resync failed: {err}");
                }
            }
        }
    })
}
