//! DOM errors

use crate::NodeId;

/// Errors raised by tree editing and fragment operations
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("node {0:?} does not exist")]
    NoSuchNode(NodeId),

    #[error("cannot insert {child:?} into {parent:?}")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("{0}")]
    Structural(String),

    #[error("event has already been dispatched")]
    EventConsumed,
}
