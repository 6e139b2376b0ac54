//! Tagged-record writer
//!
//! Sequences are buffered until they are closed so that every record can be
//! written with a definite length.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::oid::RelativeOid;
use crate::tag::{push_base128, Tag};

/// An open sequence waiting for its length
struct OpenSequence {
    tag: Tag,
    body: BytesMut,
}

/// Writer for nested tagged records
pub struct TagWriter {
    out: BytesMut,
    open: Vec<OpenSequence>,
}

impl TagWriter {
    pub fn new() -> Self {
        Self {
            out: BytesMut::new(),
            open: Vec::new(),
        }
    }

    /// Number of sequences currently open
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Open a constructed record tagged `tag`
    pub fn start_sequence(&mut self, tag: Tag) -> Result<()> {
        self.open.push(OpenSequence {
            tag,
            body: BytesMut::new(),
        });
        Ok(())
    }

    /// Close the innermost open record
    pub fn end_sequence(&mut self) -> Result<()> {
        let sequence = self.open.pop().ok_or(CodecError::UnbalancedSequence)?;
        let mut header = Vec::with_capacity(8);
        sequence.tag.encode_identifier(true, &mut header);
        encode_length(sequence.body.len(), &mut header);

        let target = self.current();
        target.put_slice(&header);
        target.put_slice(&sequence.body);
        Ok(())
    }

    /// Write a universal INTEGER in minimal two's complement form
    pub fn write_int(&mut self, value: i64) -> Result<()> {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < bytes.len() - 1 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.write_primitive(Tag::INTEGER, &bytes[start..]);
        Ok(())
    }

    /// Write a universal BOOLEAN
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_primitive(Tag::BOOLEAN, &[if value { 0xff } else { 0x00 }]);
        Ok(())
    }

    /// Write a universal UTF8String
    pub fn write_utf8(&mut self, value: &str) -> Result<()> {
        self.write_primitive(Tag::UTF8_STRING, value.as_bytes());
        Ok(())
    }

    /// Write a universal RELATIVE-OID
    pub fn write_relative_oid(&mut self, oid: &RelativeOid) -> Result<()> {
        let mut content = Vec::with_capacity(oid.len() * 2);
        for number in oid.iter() {
            push_base128(number, &mut content);
        }
        self.write_primitive(Tag::RELATIVE_OID, &content);
        Ok(())
    }

    /// Return the encoded bytes, failing if any sequence is left open
    pub fn finish(self) -> Result<Bytes> {
        if !self.open.is_empty() {
            return Err(CodecError::UnclosedSequences(self.open.len()));
        }
        Ok(self.out.freeze())
    }

    fn write_primitive(&mut self, tag: Tag, content: &[u8]) {
        let mut header = Vec::with_capacity(8);
        tag.encode_identifier(false, &mut header);
        encode_length(content.len(), &mut header);

        let target = self.current();
        target.put_slice(&header);
        target.put_slice(content);
    }

    fn current(&mut self) -> &mut BytesMut {
        match self.open.last_mut() {
            Some(sequence) => &mut sequence.body,
            None => &mut self.out,
        }
    }
}

impl Default for TagWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Definite length: short form below 128, long form otherwise
fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_bytes(value: i64) -> Vec<u8> {
        let mut writer = TagWriter::new();
        writer.write_int(value).unwrap();
        writer.finish().unwrap().to_vec()
    }

    #[test]
    fn test_minimal_integers() {
        assert_eq!(int_bytes(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(int_bytes(127), vec![0x02, 0x01, 0x7f]);
        assert_eq!(int_bytes(128), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(int_bytes(-1), vec![0x02, 0x01, 0xff]);
        assert_eq!(int_bytes(-2), vec![0x02, 0x01, 0xfe]);
        assert_eq!(int_bytes(-129), vec![0x02, 0x02, 0xff, 0x7f]);
    }

    #[test]
    fn test_relative_oid() {
        let mut writer = TagWriter::new();
        writer
            .write_relative_oid(&RelativeOid::from(vec![1, 2, 300]))
            .unwrap();
        assert_eq!(
            writer.finish().unwrap().to_vec(),
            vec![0x0d, 0x04, 0x01, 0x02, 0x82, 0x2c]
        );
    }

    #[test]
    fn test_nested_sequences() {
        let mut writer = TagWriter::new();
        writer.start_sequence(Tag::application(3)).unwrap();
        writer.start_sequence(Tag::context(0)).unwrap();
        writer.write_int(5).unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();

        assert_eq!(
            writer.finish().unwrap().to_vec(),
            vec![0x63, 0x05, 0xa0, 0x03, 0x02, 0x01, 0x05]
        );
    }

    #[test]
    fn test_long_form_length() {
        let mut writer = TagWriter::new();
        writer.write_utf8(&"x".repeat(200)).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[..3], &[0x0c, 0x81, 200]);
        assert_eq!(bytes.len(), 203);
    }

    #[test]
    fn test_unbalanced_sequences() {
        let mut writer = TagWriter::new();
        assert_eq!(writer.end_sequence(), Err(CodecError::UnbalancedSequence));

        writer.start_sequence(Tag::context(1)).unwrap();
        assert_eq!(writer.depth(), 1);
        assert_eq!(
            writer.finish().unwrap_err(),
            CodecError::UnclosedSequences(1)
        );
    }
}
