//! hdom JavaScript host
//!
//! QuickJS-based script host that runs page scripts against the hdom DOM.
//!
//! Features:
//! - Host object wrappers for nodes, documents, fragments, collections,
//!   attributes, inline style and events
//! - Event dispatch with property, listener and inline attribute handlers
//! - Window globals: location, history, storage, timers, animation frames
//! - Console API routed to `tracing`
//! - XMLHttpRequest and fetch over an embedder-provided transport

mod bindings;
mod bridge;
mod callbacks;
mod dispatch;
mod error;
mod host;
mod page;
mod realm;
mod window;

pub use callbacks::{normalize_uri, Callbacks, GeomFn, QueryFn, XhrFn, XhrRequest, XhrResponse};
pub use error::{excerpt, JsError};
pub use host::{HostOptions, Scheduler, ScriptHost, Task};
pub use page::{CollectionKind, NodeRef, Page, ReadyState};
pub use realm::JsHandle;
pub use window::timers::TimerManager;
pub use window::xhr::XhrResult;
