//! Serialized GAP calls and event delivery over one controller link.
//!
//! This is the "just works" layer. Open a [`Session`] on a serial port or
//! socket bridge, call GAP operations from any thread, and subscribe to
//! the events the controller sends back.
//!
//! ```no_run
//! use gaprpc_session::{Session, SessionConfig};
//! use gaprpc_transport::{LinkAddr, LinkConfig};
//!
//! let addr: LinkAddr = "/dev/ttyACM0".parse()?;
//! let session = Session::open(&addr, &LinkConfig::default(), SessionConfig::default())?;
//! let version = session.get_version()?;
//! println!("controller version {}", version.version_number);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gap;
pub mod lesc;
pub mod pending;
pub mod security;
pub mod session;

pub use config::SessionConfig;
pub use dispatcher::{SessionStats, SubscriptionId};
pub use error::{Result, RpcError};
pub use gap::SEC_STATUS_SUCCESS;
pub use lesc::LescKeypair;
pub use pending::PendingReply;
pub use security::{ContextLease, SecurityContext, SecurityContextStore};
pub use session::Session;

#[cfg(feature = "async")]
pub use session::EventStream;
