//! # Ember Codec
//!
//! Nested tagged-record framing used by the Ember tree protocol.
//!
//! Every value on the wire is a tag-length-value record. Containers are
//! constructed records whose value is a sequence of further records:
//!
//! ```text
//!   APP(3) ─┬─ CTX(0) ── INTEGER 7
//!           ├─ CTX(1) ── <contents>
//!           └─ CTX(2) ── APP(4) ─┬─ CTX(0) ── APP(3) ...
//!                                └─ CTX(0) ── APP(3) ...
//! ```
//!
//! [`TagWriter`] builds records with an explicit open/close discipline and
//! [`TagReader`] walks them back without copying.

pub mod error;
pub mod oid;
pub mod reader;
pub mod tag;
pub mod writer;

pub use error::*;
pub use oid::RelativeOid;
pub use reader::TagReader;
pub use tag::{Tag, TagClass};
pub use writer::TagWriter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{CodecError, Result};
    pub use crate::oid::RelativeOid;
    pub use crate::reader::TagReader;
    pub use crate::tag::{Tag, TagClass};
    pub use crate::writer::TagWriter;
}
