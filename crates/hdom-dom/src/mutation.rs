//! Mutation tracking
//!
//! Every DOM-mutating operation pushes a [`Mutation`] snapshot onto a
//! bounded queue. Pushing never blocks: when the queue is full the record
//! is dropped, since the queue only signals that something changed. The
//! session drains the queue from another thread with an idle timeout.

use std::fmt;
use std::time::{Duration, SystemTime};

use smol::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use smol::future::FutureExt;
use smol::Timer;

use crate::node::Attribute;
use crate::NodeId;

/// Queue capacity used by sessions unless configured otherwise
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Value,
    ChangeAttr,
    RemoveAttr,
    Remove,
    Move,
    Insert,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Value => "Value",
            MutationKind::ChangeAttr => "Attr",
            MutationKind::RemoveAttr => "RmAttr",
            MutationKind::Remove => "Rm",
            MutationKind::Move => "Mv",
            MutationKind::Insert => "Insert",
        })
    }
}

/// Snapshot of a changed node, taken when the change happened
#[derive(Debug, Clone)]
pub struct Mutation {
    pub time: SystemTime,
    pub kind: MutationKind,
    pub node: NodeId,
    /// Whether the node was part of the main document at the time
    pub connected: bool,
    /// Lowercase tag of the affected node, `None` for non-elements
    pub tag: Option<String>,
    pub attributes: Vec<Attribute>,
    /// Rendered inner HTML; not captured for attribute changes
    pub inner_html: Option<String>,
}

impl Mutation {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// An inserted or changed `<script>` element
    pub fn is_script(&self) -> bool {
        self.tag.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("script"))
    }
}

/// Producer half, cloned into every script host of a session
#[derive(Debug, Clone)]
pub struct MutationSender {
    tx: Sender<Mutation>,
}

impl MutationSender {
    /// Queue a mutation, dropping it when the queue is full or closed
    pub fn push(&self, mutation: Mutation) {
        match self.tx.try_send(mutation) {
            Ok(()) => {}
            Err(TrySendError::Full(m)) => {
                tracing::trace!("mutation queue full, dropping {} record", m.kind);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Consumer half, owned by the session
#[derive(Debug)]
pub struct MutationReceiver {
    rx: Receiver<Mutation>,
}

impl MutationReceiver {
    /// Wait up to `timeout` for the next mutation
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Mutation> {
        smol::block_on(
            async { self.rx.recv().await.ok() }.or(async {
                Timer::after(timeout).await;
                None
            }),
        )
    }

    pub fn try_pop(&self) -> Option<Mutation> {
        match self.rx.try_recv() {
            Ok(m) => Some(m),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Discard everything queued, returning how many records were dropped
    pub fn drain(&self) -> usize {
        let mut n = 0;
        while self.try_pop().is_some() {
            n += 1;
        }
        n
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create a mutation queue holding at most `capacity` records
pub fn queue(capacity: usize) -> (MutationSender, MutationReceiver) {
    let (tx, rx) = channel::bounded(capacity.max(1));
    (MutationSender { tx }, MutationReceiver { rx })
}
