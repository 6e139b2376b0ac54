//! # Ember Tree
//!
//! Element tree model of an Ember+-style remote control protocol.
//!
//! This crate provides:
//! - `ElementTree` - arena of addressable elements with owned children
//! - `Contents` - closed set of payloads decoded through a `ContentRegistry`
//! - `CommandCode` / `FieldFlags` - directory and subscription commands
//! - `MatrixState` - signal routing carried by matrix elements
//! - `RootElement` - message framing for top-level elements
//! - `SharedTree` - lock-guarded resident tree
//!
//! ## Flow
//!
//! ```text
//!   caller                      peer
//!     │ get_directory_msg(E, L)   │
//!     │ ── RootElement bytes ───► │
//!     │                           │ builds response
//!     │ ◄── RootElement bytes ─── │
//!     │ apply / update at E       │
//!     │ L.receive(E, None)        │
//! ```
//!
//! Encoding writes one level of children below the element being encoded;
//! deeper levels are fetched with further directory requests.

pub mod command;
pub mod contents;
pub mod directory;
pub mod element;
pub mod encode;
pub mod error;
pub mod listener;
pub mod matrix;
pub mod root;
pub mod shared;
pub mod tags;
pub mod update;

pub use command::*;
pub use contents::*;
pub use element::*;
pub use error::*;
pub use listener::*;
pub use matrix::*;
pub use root::*;
pub use shared::*;

pub use ember_codec::{RelativeOid, Tag};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::command::{CommandCode, CommandContents, FieldFlags};
    pub use crate::contents::{ContentRegistry, Contents, NodeContents};
    pub use crate::element::{ElementId, ElementTree};
    pub use crate::error::{Result, TreeError};
    pub use crate::listener::{ChannelListener, Listener, Notification};
    pub use crate::matrix::{Connection, ConnectionOperation, MatrixState, Signal};
    pub use crate::root::RootElement;
    pub use crate::shared::SharedTree;
    pub use crate::tags;
    pub use ember_codec::{RelativeOid, Tag};
}
