//! Zero-copy tagged-record reader

use crate::error::{CodecError, Result};
use crate::oid::RelativeOid;
use crate::tag::{Tag, TagClass};

/// Decoded record header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Header {
    tag: Tag,
    constructed: bool,
    header_len: usize,
    content_len: usize,
}

/// Cursor over a run of sibling records
///
/// Sub-readers returned by [`enter_sequence`](Self::enter_sequence) cover
/// exactly the content of one record; offsets in errors are absolute.
#[derive(Clone, Debug)]
pub struct TagReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> TagReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Absolute offset of the next record
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Tag of the next record without consuming it
    pub fn peek_tag(&self) -> Result<Option<Tag>> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.header()?.tag))
    }

    /// Enter the next record, which must be tagged `expected`
    pub fn enter_sequence(&mut self, expected: Tag) -> Result<TagReader<'a>> {
        let offset = self.offset();
        let (tag, inner) = self.enter_any()?;
        if tag != expected {
            return Err(CodecError::UnexpectedTag {
                offset,
                expected,
                found: tag,
            });
        }
        Ok(inner)
    }

    /// Enter the next record whatever its tag
    pub fn enter_any(&mut self) -> Result<(Tag, TagReader<'a>)> {
        let header = self.header()?;
        let start = self.pos + header.header_len;
        let inner = TagReader {
            data: &self.data[start..start + header.content_len],
            pos: 0,
            base: self.base + start,
        };
        self.pos = start + header.content_len;
        Ok((header.tag, inner))
    }

    /// Skip the next record
    pub fn skip(&mut self) -> Result<Tag> {
        let (tag, _) = self.enter_any()?;
        Ok(tag)
    }

    /// Read a universal INTEGER
    pub fn read_int(&mut self) -> Result<i64> {
        let offset = self.offset();
        let content = self.primitive(Tag::INTEGER)?;
        if content.is_empty() || content.len() > 8 {
            return Err(CodecError::IntegerOverflow { offset });
        }
        let mut value: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
        for byte in content {
            value = (value << 8) | i64::from(*byte);
        }
        Ok(value)
    }

    /// Read a universal INTEGER that must fit in 32 bits
    pub fn read_i32(&mut self) -> Result<i32> {
        let offset = self.offset();
        let value = self.read_int()?;
        i32::try_from(value).map_err(|_| CodecError::IntegerOverflow { offset })
    }

    /// Read a universal BOOLEAN
    pub fn read_bool(&mut self) -> Result<bool> {
        let offset = self.offset();
        let content = self.primitive(Tag::BOOLEAN)?;
        match content {
            [byte] => Ok(*byte != 0),
            _ => Err(CodecError::InvalidLength { offset }),
        }
    }

    /// Read a universal UTF8String
    pub fn read_utf8(&mut self) -> Result<String> {
        let offset = self.offset();
        let content = self.primitive(Tag::UTF8_STRING)?;
        std::str::from_utf8(content)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { offset })
    }

    /// Read a universal RELATIVE-OID
    pub fn read_relative_oid(&mut self) -> Result<RelativeOid> {
        let offset = self.offset();
        let content = self.primitive(Tag::RELATIVE_OID)?;
        let mut oid = RelativeOid::new();
        let mut value: u32 = 0;
        let mut pending = false;
        for byte in content {
            value = value
                .checked_mul(128)
                .ok_or(CodecError::IntegerOverflow { offset })?
                | u32::from(byte & 0x7f);
            pending = byte & 0x80 != 0;
            if !pending {
                oid.push(value);
                value = 0;
            }
        }
        if pending {
            return Err(CodecError::Truncated {
                offset: offset + content.len(),
            });
        }
        Ok(oid)
    }

    fn primitive(&mut self, expected: Tag) -> Result<&'a [u8]> {
        let offset = self.offset();
        let header = self.header()?;
        if header.tag != expected || header.constructed {
            return Err(CodecError::UnexpectedTag {
                offset,
                expected,
                found: header.tag,
            });
        }
        let start = self.pos + header.header_len;
        self.pos = start + header.content_len;
        Ok(&self.data[start..start + header.content_len])
    }

    fn header(&self) -> Result<Header> {
        let offset = self.offset();
        let bytes = &self.data[self.pos..];
        let truncated = |at: usize| CodecError::Truncated { offset: offset + at };

        let lead = *bytes.first().ok_or_else(|| truncated(0))?;
        let class = TagClass::from_bits(lead >> 6);
        let constructed = lead & 0x20 != 0;
        let mut cursor = 1;

        let number = if lead & 0x1f != 0x1f {
            u32::from(lead & 0x1f)
        } else {
            let mut number: u32 = 0;
            loop {
                let byte = *bytes.get(cursor).ok_or_else(|| truncated(cursor))?;
                cursor += 1;
                number = number
                    .checked_mul(128)
                    .ok_or(CodecError::TagNumberOverflow { offset })?
                    | u32::from(byte & 0x7f);
                if byte & 0x80 == 0 {
                    break;
                }
            }
            number
        };

        let first = *bytes.get(cursor).ok_or_else(|| truncated(cursor))?;
        cursor += 1;
        let content_len = if first < 0x80 {
            usize::from(first)
        } else if first == 0x80 {
            return Err(CodecError::IndefiniteLength { offset });
        } else {
            let count = usize::from(first & 0x7f);
            if count > std::mem::size_of::<usize>() {
                return Err(CodecError::InvalidLength { offset });
            }
            let mut len: usize = 0;
            for _ in 0..count {
                let byte = *bytes.get(cursor).ok_or_else(|| truncated(cursor))?;
                cursor += 1;
                len = (len << 8) | usize::from(byte);
            }
            len
        };

        if content_len > bytes.len() - cursor {
            return Err(CodecError::InvalidLength { offset });
        }

        Ok(Header {
            tag: Tag::new(class, number),
            constructed,
            header_len: cursor,
            content_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::TagWriter;
    use proptest::prelude::*;

    #[test]
    fn test_read_nested() {
        let data = [0x63, 0x05, 0xa0, 0x03, 0x02, 0x01, 0x05];
        let mut reader = TagReader::new(&data);
        assert_eq!(reader.peek_tag().unwrap(), Some(Tag::application(3)));

        let mut element = reader.enter_sequence(Tag::application(3)).unwrap();
        assert!(reader.is_empty());

        let mut number = element.enter_sequence(Tag::context(0)).unwrap();
        assert_eq!(number.offset(), 4);
        assert_eq!(number.read_i32().unwrap(), 5);
        assert!(number.is_empty());
        assert_eq!(element.peek_tag().unwrap(), None);
    }

    #[test]
    fn test_unexpected_tag_reports_offset() {
        let data = [0x30, 0x03, 0x02, 0x01, 0x05];
        let mut reader = TagReader::new(&data);
        let mut seq = reader.enter_sequence(Tag::SEQUENCE).unwrap();
        let err = seq.read_utf8().unwrap_err();
        assert_eq!(
            err,
            CodecError::UnexpectedTag {
                offset: 2,
                expected: Tag::UTF8_STRING,
                found: Tag::INTEGER,
            }
        );
    }

    #[test]
    fn test_truncated_input() {
        let data = [0x63, 0x05, 0xa0];
        let mut reader = TagReader::new(&data);
        assert_eq!(
            reader.enter_any().unwrap_err(),
            CodecError::InvalidLength { offset: 0 }
        );

        let mut reader = TagReader::new(&[0x7f]);
        assert_eq!(
            reader.skip().unwrap_err(),
            CodecError::Truncated { offset: 1 }
        );
    }

    #[test]
    fn test_indefinite_length_rejected() {
        let mut reader = TagReader::new(&[0x30, 0x80, 0x00, 0x00]);
        assert_eq!(
            reader.skip().unwrap_err(),
            CodecError::IndefiniteLength { offset: 0 }
        );
    }

    #[test]
    fn test_i32_overflow() {
        let mut writer = TagWriter::new();
        writer.write_int(i64::from(i32::MAX) + 1).unwrap();
        let bytes = writer.finish().unwrap();
        let mut reader = TagReader::new(&bytes);
        assert_eq!(
            reader.read_i32().unwrap_err(),
            CodecError::IntegerOverflow { offset: 0 }
        );
    }

    #[test]
    fn test_skip_unknown_records() {
        let mut writer = TagWriter::new();
        writer.start_sequence(Tag::context(9)).unwrap();
        writer.write_utf8("ignored").unwrap();
        writer.end_sequence().unwrap();
        writer.write_bool(true).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = TagReader::new(&bytes);
        assert_eq!(reader.skip().unwrap(), Tag::context(9));
        assert!(reader.read_bool().unwrap());
        assert!(reader.is_empty());
    }

    proptest! {
        #[test]
        fn integers_survive_the_wire(value in any::<i64>()) {
            let mut writer = TagWriter::new();
            writer.write_int(value).unwrap();
            let bytes = writer.finish().unwrap();
            prop_assert_eq!(TagReader::new(&bytes).read_int().unwrap(), value);
        }

        #[test]
        fn paths_survive_the_wire(numbers in proptest::collection::vec(any::<u32>(), 0..8)) {
            let oid = RelativeOid::from(numbers);
            let mut writer = TagWriter::new();
            writer.write_relative_oid(&oid).unwrap();
            let bytes = writer.finish().unwrap();
            prop_assert_eq!(TagReader::new(&bytes).read_relative_oid().unwrap(), oid);
        }
    }
}
