//! Element encoding and decoding
//!
//! An element is written as one record tagged with its element tag:
//!
//! ```text
//!   <tag> ─┬─ CTX(0) ── INTEGER number | RELATIVE-OID path
//!          ├─ CTX(1) ── <contents>                        (if any)
//!          ├─ CTX(2) ── APP(4) ── CTX(0) ── <child> ...    (top level only)
//!          └─ CTX(3..5) matrix groups                      (matrix only)
//! ```
//!
//! Children are written "as child": their own children are never inlined, so
//! one encode call serializes at most one level below its root. Decoding
//! applies the same rule.

use ember_codec::{Tag, TagReader, TagWriter};

use crate::contents::{ContentCodec, ContentRegistry};
use crate::element::{number_of, Element, ElementId, ElementTree};
use crate::error::{Result, ResultExt, TreeError};
use crate::tags;

impl ElementTree {
    /// Encode `id` with its direct children
    pub fn encode(&self, id: ElementId, writer: &mut TagWriter) -> Result<()> {
        self.encode_element(id, writer, false)
    }

    /// Encode `id` without its children
    pub fn encode_as_child(&self, id: ElementId, writer: &mut TagWriter) -> Result<()> {
        self.encode_element(id, writer, true)
    }

    fn encode_element(&self, id: ElementId, writer: &mut TagWriter, as_child: bool) -> Result<()> {
        let element = self.element(id)?;
        self.encode_frame(element, writer, as_child)
            .frame(|| format!("encoding {} number {}", element.tag, element.number))
    }

    fn encode_frame(&self, element: &Element, writer: &mut TagWriter, as_child: bool) -> Result<()> {
        tracing::trace!(tag = %element.tag, number = element.number, as_child, "encoding element");
        writer.start_sequence(element.tag)?;

        writer.start_sequence(tags::ADDRESS)?;
        if element.is_qualified {
            writer.write_relative_oid(&element.path)?;
        } else {
            writer.write_int(i64::from(element.number))?;
        }
        writer.end_sequence()?;

        if let Some(contents) = &element.contents {
            writer.start_sequence(tags::CONTENTS)?;
            contents.encode(writer).frame(|| "encoding contents")?;
            writer.end_sequence()?;
        }

        if !as_child && !element.children.is_empty() {
            writer.start_sequence(tags::CHILDREN)?;
            writer.start_sequence(tags::ELEMENT_COLLECTION)?;
            for child in element.children.values() {
                writer.start_sequence(tags::ITEM)?;
                self.encode_element(*child, writer, true)?;
                writer.end_sequence()?;
            }
            writer.end_sequence()?;
            writer.end_sequence()?;
        }

        if let Some(matrix) = &element.matrix {
            matrix.encode(writer)?;
        }

        writer.end_sequence()?;
        Ok(())
    }

    /// Decode the next element record into a new unparented subtree
    ///
    /// Content records are instantiated through `registry`. On error nothing
    /// of the partially decoded element is left in the arena.
    pub fn decode_element(
        &mut self,
        reader: &mut TagReader<'_>,
        registry: &ContentRegistry,
    ) -> Result<ElementId> {
        self.decode_record(reader, registry, false)
    }

    fn decode_record(
        &mut self,
        reader: &mut TagReader<'_>,
        registry: &ContentRegistry,
        as_child: bool,
    ) -> Result<ElementId> {
        let offset = reader.offset();
        let (tag, mut body) = reader
            .enter_any()
            .frame(|| format!("decoding element at offset {}", offset))?;

        let id = self.insert(Element::new(tag, 0, registry.factory(tag)));
        match self.decode_body(id, &mut body, registry, as_child) {
            Ok(()) => {
                if tags::is_matrix(tag) {
                    self.element_mut(id)?.matrix_mut();
                }
                Ok(id)
            }
            Err(err) => {
                self.remove(id)?;
                Err(err.context(format!("decoding {} at offset {}", tag, offset)))
            }
        }
    }

    fn decode_body(
        &mut self,
        id: ElementId,
        body: &mut TagReader<'_>,
        registry: &ContentRegistry,
        as_child: bool,
    ) -> Result<()> {
        while let Some(field) = body.peek_tag()? {
            let mut record = body.enter_sequence(field)?;
            match field {
                tags::ADDRESS => self.decode_address(id, &mut record)?,
                tags::CONTENTS => {
                    let tag = self.element(id)?.tag;
                    let mut contents = registry.create(tag)?;
                    contents.decode(&mut record).frame(|| "decoding contents")?;
                    self.element_mut(id)?.contents = Some(contents);
                }
                tags::CHILDREN if !as_child => {
                    self.decode_children(id, &mut record, registry)
                        .frame(|| "decoding children")?;
                }
                tags::TARGETS | tags::SOURCES | tags::CONNECTIONS => {
                    self.element_mut(id)?
                        .matrix_mut()
                        .decode_group(field, &mut record)?;
                }
                other => tracing::trace!(tag = %other, as_child, "skipping element field"),
            }
        }
        Ok(())
    }

    fn decode_address(&mut self, id: ElementId, record: &mut TagReader<'_>) -> Result<()> {
        let element = self.element_mut(id)?;
        match record.peek_tag()? {
            Some(Tag::INTEGER) => element.number = record.read_i32()?,
            Some(Tag::RELATIVE_OID) => {
                let path = record.read_relative_oid()?;
                element.number = path.last().map(number_of).transpose()?.unwrap_or_default();
                element.path = path;
                element.is_qualified = true;
            }
            _ => return Err(TreeError::UnexpectedAddress { tag: element.tag }),
        }
        Ok(())
    }

    fn decode_children(
        &mut self,
        id: ElementId,
        record: &mut TagReader<'_>,
        registry: &ContentRegistry,
    ) -> Result<()> {
        let mut collection = record.enter_sequence(tags::ELEMENT_COLLECTION)?;
        while !collection.is_empty() {
            let mut item = collection.enter_sequence(tags::ITEM)?;
            let child = self.decode_record(&mut item, registry, true)?;
            self.add_child(id, child)?;
        }
        Ok(())
    }
}
