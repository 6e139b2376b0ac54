//! Message framing for top-level elements
//!
//! ```text
//!   APP(0) ── APP(11) ─┬─ CTX(0) ── <element>
//!                      └─ CTX(0) ── <element>
//! ```

use bytes::Bytes;
use ember_codec::{TagReader, TagWriter};

use crate::contents::ContentRegistry;
use crate::element::{ElementId, ElementTree};
use crate::error::{Result, ResultExt};
use crate::tags;

/// Ordered collection of top-level elements framed as one message
///
/// The message owns the arena its elements live in. It is a framing
/// container only and takes no part in addressing.
#[derive(Debug, Default)]
pub struct RootElement {
    tree: ElementTree,
    elements: Vec<ElementId>,
}

impl RootElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a top-level element of [`tree`](Self::tree)
    pub fn add_element(&mut self, id: ElementId) {
        self.elements.push(id);
    }

    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ElementTree {
        &mut self.tree
    }

    pub fn into_parts(self) -> (ElementTree, Vec<ElementId>) {
        (self.tree, self.elements)
    }

    /// Write the framed message
    pub fn encode_into(&self, writer: &mut TagWriter) -> Result<()> {
        writer.start_sequence(tags::ROOT)?;
        writer.start_sequence(tags::ROOT_ELEMENT_COLLECTION)?;
        for (index, id) in self.elements.iter().enumerate() {
            writer.start_sequence(tags::ITEM)?;
            self.tree
                .encode(*id, writer)
                .frame(|| format!("encoding root element {}", index))?;
            writer.end_sequence()?;
        }
        writer.end_sequence()?;
        writer.end_sequence()?;
        Ok(())
    }

    /// Encode the message to bytes
    pub fn encode(&self) -> Result<Bytes> {
        let mut writer = TagWriter::new();
        self.encode_into(&mut writer)?;
        Ok(writer.finish()?)
    }

    /// Decode a framed message
    ///
    /// Root payloads other than the element collection are skipped.
    pub fn decode(data: &[u8], registry: &ContentRegistry) -> Result<Self> {
        let mut message = Self::new();
        let mut reader = TagReader::new(data);
        let mut root = reader
            .enter_sequence(tags::ROOT)
            .frame(|| "decoding root")?;

        while let Some(tag) = root.peek_tag()? {
            if tag != tags::ROOT_ELEMENT_COLLECTION {
                root.skip()?;
                tracing::trace!(%tag, "skipping root payload");
                continue;
            }
            let mut collection = root.enter_sequence(tag)?;
            while !collection.is_empty() {
                let index = message.elements.len();
                let mut item = collection
                    .enter_sequence(tags::ITEM)
                    .frame(|| format!("decoding root element {}", index))?;
                let id = message
                    .tree
                    .decode_element(&mut item, registry)
                    .frame(|| format!("decoding root element {}", index))?;
                message.elements.push(id);
            }
        }

        tracing::trace!(elements = message.elements.len(), "decoded message");
        Ok(message)
    }
}
