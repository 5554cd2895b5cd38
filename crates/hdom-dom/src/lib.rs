//! hdom DOM - Document Object Model
//!
//! Arena-backed node tree plus the pieces of the object model that do not
//! depend on a scripting engine:
//! - node tree editing and HTML serialization
//! - the element identity registry and document fragments
//! - events, listener tables and the dispatch/bubbling algorithm
//! - the bounded mutation queue

mod error;
mod events;
mod listeners;
mod mutation;
mod node;
mod registry;
mod serialize;
mod tree;

pub use error::DomError;
pub use events::{dispatch, dispatch_window, DispatchHost, Event, EventArena, EventId, HandlerOutcome, Target};
pub use listeners::ListenerTable;
pub use mutation::{queue, Mutation, MutationKind, MutationReceiver, MutationSender, DEFAULT_CAPACITY};
pub use node::{AttrChange, Attribute, ElementData, Node, NodeData, NodeType};
pub use registry::{ElementId, Fragment, FragmentId, Registry};
pub use serialize::{render, render_inner};
pub use tree::{Children, DomTree};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID, the main document
    pub const ROOT: NodeId = NodeId(0);

    /// Raw arena index, used as the identity handed to script wrappers
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Rebuild an id from [`NodeId::as_u32`]. Lookups on ids that were never
    /// allocated simply miss.
    #[inline]
    pub fn from_u32(raw: u32) -> Self {
        Self(raw)
    }
}
