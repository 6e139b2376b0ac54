//! Command elements and the field-flags selector of directory requests

use std::fmt;

use ember_codec::{TagReader, TagWriter};

use crate::contents::{ContentCodec, Contents};
use crate::element::{Element, ElementId, ElementTree};
use crate::error::Result;
use crate::tags;

/// Numeric command codes; the element number of a command element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandCode {
    Subscribe,
    Unsubscribe,
    GetDirectory,
    Invoke,
}

impl CommandCode {
    pub const SUBSCRIBE: i32 = 30;
    pub const UNSUBSCRIBE: i32 = 31;
    pub const GET_DIRECTORY: i32 = 32;
    pub const INVOKE: i32 = 33;

    pub fn number(self) -> i32 {
        match self {
            Self::Subscribe => Self::SUBSCRIBE,
            Self::Unsubscribe => Self::UNSUBSCRIBE,
            Self::GetDirectory => Self::GET_DIRECTORY,
            Self::Invoke => Self::INVOKE,
        }
    }

    pub fn from_number(number: i32) -> Option<Self> {
        match number {
            Self::SUBSCRIBE => Some(Self::Subscribe),
            Self::UNSUBSCRIBE => Some(Self::Unsubscribe),
            Self::GET_DIRECTORY => Some(Self::GetDirectory),
            Self::INVOKE => Some(Self::Invoke),
            _ => None,
        }
    }

    /// Field flags a freshly built command of this kind carries
    pub fn default_field_flags(self) -> FieldFlags {
        match self {
            Self::GetDirectory => FieldFlags::All,
            _ => FieldFlags::Default,
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Subscribe => "Subscribe",
            Self::Unsubscribe => "Unsubscribe",
            Self::GetDirectory => "GetDirectory",
            Self::Invoke => "Invoke",
        };
        f.write_str(name)
    }
}

/// Which attributes a directory response should include
///
/// Values are mutually exclusive levels, not combinable bits. Values outside
/// the known set survive decoding as [`FieldFlags::Other`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldFlags {
    Sparse,
    All,
    #[default]
    Default,
    Identifier,
    Description,
    Tree,
    Value,
    Connections,
    Other(i32),
}

impl FieldFlags {
    /// Wire value
    pub fn value(self) -> i32 {
        match self {
            Self::Sparse => -2,
            Self::All => 0,
            Self::Default => 1,
            Self::Identifier => 2,
            Self::Description => 3,
            Self::Tree => 4,
            Self::Value => 5,
            Self::Connections => 6,
            Self::Other(value) => value,
        }
    }

    pub fn from_value(value: i32) -> Self {
        match value {
            -2 => Self::Sparse,
            0 => Self::All,
            1 => Self::Default,
            2 => Self::Identifier,
            3 => Self::Description,
            4 => Self::Tree,
            5 => Self::Value,
            6 => Self::Connections,
            other => Self::Other(other),
        }
    }

    /// Parse a label as rendered by `Display` (case-insensitive)
    pub fn from_label(label: &str) -> Option<Self> {
        let flags = match label.to_ascii_lowercase().as_str() {
            "sparse" => Self::Sparse,
            "all" => Self::All,
            "default" => Self::Default,
            "identifier" => Self::Identifier,
            "description" => Self::Description,
            "tree" => Self::Tree,
            "value" => Self::Value,
            "connections" => Self::Connections,
            _ => return None,
        };
        Some(flags)
    }
}

impl From<i32> for FieldFlags {
    fn from(value: i32) -> Self {
        Self::from_value(value)
    }
}

impl From<FieldFlags> for i32 {
    fn from(flags: FieldFlags) -> Self {
        flags.value()
    }
}

impl fmt::Display for FieldFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sparse => "Sparse",
            Self::All => "All",
            Self::Default => "Default",
            Self::Identifier => "Identifier",
            Self::Description => "Description",
            Self::Tree => "Tree",
            Self::Value => "Value",
            Self::Connections => "Connections",
            Self::Other(value) => return write!(f, "{}", value),
        };
        f.write_str(label)
    }
}

/// Payload of a command element
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandContents {
    field_flags: FieldFlags,
}

impl CommandContents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_flags(&self) -> FieldFlags {
        self.field_flags
    }

    pub fn set_field_flags(&mut self, field_flags: FieldFlags) {
        self.field_flags = field_flags;
    }
}

impl ContentCodec for CommandContents {
    fn encode(&self, writer: &mut TagWriter) -> Result<()> {
        writer.write_int(i64::from(self.field_flags.value()))?;
        Ok(())
    }

    fn decode(&mut self, reader: &mut TagReader<'_>) -> Result<()> {
        self.field_flags = FieldFlags::from_value(reader.read_i32()?);
        Ok(())
    }
}

impl fmt::Display for CommandContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fieldFlags: {}", self.field_flags)
    }
}

pub(crate) fn new_command_contents() -> Contents {
    Contents::Command(CommandContents::new())
}

impl ElementTree {
    /// Create a command element numbered with `code`
    ///
    /// GetDirectory commands start with [`FieldFlags::All`], every other
    /// code with [`FieldFlags::Default`].
    pub fn new_command(&mut self, code: CommandCode) -> ElementId {
        self.new_command_with_flags(code, code.default_field_flags())
    }

    /// Create a command element with explicit field flags
    pub fn new_command_with_flags(&mut self, code: CommandCode, field_flags: FieldFlags) -> ElementId {
        let mut element = Element::new(tags::COMMAND, code.number(), Some(new_command_contents));
        if let Some(Contents::Command(command)) = element.create_content() {
            command.set_field_flags(field_flags);
        }
        self.insert(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(CommandCode::Subscribe.number(), 30);
        assert_eq!(CommandCode::Unsubscribe.number(), 31);
        assert_eq!(CommandCode::GetDirectory.number(), 32);
        assert_eq!(CommandCode::Invoke.number(), 33);
        assert_eq!(CommandCode::from_number(32), Some(CommandCode::GetDirectory));
        assert_eq!(CommandCode::from_number(34), None);
    }

    #[test]
    fn test_field_flags_wire_values() {
        let expected = [
            (FieldFlags::Sparse, -2),
            (FieldFlags::All, 0),
            (FieldFlags::Default, 1),
            (FieldFlags::Identifier, 2),
            (FieldFlags::Description, 3),
            (FieldFlags::Tree, 4),
            (FieldFlags::Value, 5),
            (FieldFlags::Connections, 6),
        ];
        for (flags, value) in expected {
            assert_eq!(flags.value(), value);
            assert_eq!(FieldFlags::from_value(value), flags);
        }
        assert_eq!(FieldFlags::from_value(-1), FieldFlags::Other(-1));
    }

    #[test]
    fn test_field_flags_labels() {
        let mut contents = CommandContents::new();
        contents.set_field_flags(FieldFlags::All);
        assert_eq!(contents.to_string(), "fieldFlags: All");

        contents.set_field_flags(FieldFlags::from_value(99));
        assert!(contents.to_string().contains("99"));

        assert_eq!(FieldFlags::from_label("connections"), Some(FieldFlags::Connections));
        assert_eq!(FieldFlags::from_label("ALL"), Some(FieldFlags::All));
        assert_eq!(FieldFlags::from_label("bogus"), None);
    }

    #[test]
    fn test_default_field_flags_per_command() {
        let mut tree = ElementTree::new();
        for code in [
            CommandCode::Subscribe,
            CommandCode::Unsubscribe,
            CommandCode::GetDirectory,
            CommandCode::Invoke,
        ] {
            let id = tree.new_command(code);
            let element = tree.element(id).unwrap();
            assert_eq!(element.tag(), tags::COMMAND);
            assert_eq!(element.number(), code.number());

            let command = element.contents().and_then(Contents::as_command).unwrap();
            assert_eq!(command.field_flags(), code.default_field_flags());
        }
        assert_eq!(CommandCode::GetDirectory.default_field_flags(), FieldFlags::All);
        assert_eq!(CommandCode::Invoke.default_field_flags(), FieldFlags::Default);
    }

    #[test]
    fn test_command_contents_wire() {
        let mut contents = CommandContents::new();
        contents.set_field_flags(FieldFlags::Sparse);

        let mut writer = TagWriter::new();
        contents.encode(&mut writer).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.to_vec(), vec![0x02, 0x01, 0xfe]);

        let mut decoded = CommandContents::new();
        decoded.decode(&mut TagReader::new(&bytes)).unwrap();
        assert_eq!(decoded.field_flags(), FieldFlags::Sparse);
    }
}
