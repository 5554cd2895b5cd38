//! hdom Engine
//!
//! Session runner for the headless DOM: one script thread per page,
//! change tracking over the mutation queue, body-relative path access and
//! the line-oriented control protocol used by the `hdom` binary.
//!
//! # Example
//! ```rust,ignore
//! use hdom_engine::{Config, Session};
//!
//! let mut session = Session::new(r#"<p id="demo">x</p>"#, Config::default(), Default::default());
//! session.start()?;
//! session.exec("document.getElementById('demo').innerHTML = 'y'", true)?;
//! let html = session.track_changes()?;
//! ```

mod config;
mod error;
mod session;
pub mod control;
pub mod path;
pub mod transport;

pub use config::Config;
pub use hdom_js::{Callbacks, XhrRequest, XhrResponse};
pub use control::{Command, Controller};
pub use error::{ControlError, SessionError};
pub use path::DocPath;
pub use session::Session;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
