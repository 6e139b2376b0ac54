//! Content variants attached to elements
//!
//! An element carries at most one payload. The set of payload kinds is
//! closed ([`Contents`]); which kind an element gets when it is decoded is
//! decided by the [`ContentRegistry`] entry for its tag.

use std::collections::HashMap;
use std::fmt;

use ember_codec::{Tag, TagReader, TagWriter};

use crate::command::{new_command_contents, CommandContents};
use crate::error::{Result, TreeError};
use crate::tags;

/// Encoding and decoding of one payload kind
pub trait ContentCodec {
    /// Write the payload into the currently open contents record
    fn encode(&self, writer: &mut TagWriter) -> Result<()>;

    /// Fill `self` from the contents record
    fn decode(&mut self, reader: &mut TagReader<'_>) -> Result<()>;
}

/// Constructor for the payload of a given element kind
pub type ContentFactory = fn() -> Contents;

/// Payload of an element
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Contents {
    Command(CommandContents),
    Node(NodeContents),
}

impl Contents {
    pub fn as_command(&self) -> Option<&CommandContents> {
        match self {
            Self::Command(command) => Some(command),
            _ => None,
        }
    }

    pub fn as_command_mut(&mut self) -> Option<&mut CommandContents> {
        match self {
            Self::Command(command) => Some(command),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeContents> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }
}

impl ContentCodec for Contents {
    fn encode(&self, writer: &mut TagWriter) -> Result<()> {
        match self {
            Self::Command(command) => command.encode(writer),
            Self::Node(node) => node.encode(writer),
        }
    }

    fn decode(&mut self, reader: &mut TagReader<'_>) -> Result<()> {
        match self {
            Self::Command(command) => command.decode(reader),
            Self::Node(node) => node.decode(reader),
        }
    }
}

impl fmt::Display for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(command) => fmt::Display::fmt(command, f),
            Self::Node(node) => fmt::Display::fmt(node, f),
        }
    }
}

impl From<CommandContents> for Contents {
    fn from(command: CommandContents) -> Self {
        Self::Command(command)
    }
}

impl From<NodeContents> for Contents {
    fn from(node: NodeContents) -> Self {
        Self::Node(node)
    }
}

/// Descriptive attributes of a node
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeContents {
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub is_root: Option<bool>,
    pub is_online: Option<bool>,
}

const IDENTIFIER: Tag = Tag::context(0);
const DESCRIPTION: Tag = Tag::context(1);
const IS_ROOT: Tag = Tag::context(2);
const IS_ONLINE: Tag = Tag::context(3);

impl NodeContents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Self::default()
        }
    }
}

impl ContentCodec for NodeContents {
    fn encode(&self, writer: &mut TagWriter) -> Result<()> {
        writer.start_sequence(Tag::SET)?;
        if let Some(identifier) = &self.identifier {
            writer.start_sequence(IDENTIFIER)?;
            writer.write_utf8(identifier)?;
            writer.end_sequence()?;
        }
        if let Some(description) = &self.description {
            writer.start_sequence(DESCRIPTION)?;
            writer.write_utf8(description)?;
            writer.end_sequence()?;
        }
        if let Some(is_root) = self.is_root {
            writer.start_sequence(IS_ROOT)?;
            writer.write_bool(is_root)?;
            writer.end_sequence()?;
        }
        if let Some(is_online) = self.is_online {
            writer.start_sequence(IS_ONLINE)?;
            writer.write_bool(is_online)?;
            writer.end_sequence()?;
        }
        writer.end_sequence()?;
        Ok(())
    }

    fn decode(&mut self, reader: &mut TagReader<'_>) -> Result<()> {
        let mut set = reader.enter_sequence(Tag::SET)?;
        while let Some(tag) = set.peek_tag()? {
            let mut field = set.enter_sequence(tag)?;
            match tag {
                IDENTIFIER => self.identifier = Some(field.read_utf8()?),
                DESCRIPTION => self.description = Some(field.read_utf8()?),
                IS_ROOT => self.is_root = Some(field.read_bool()?),
                IS_ONLINE => self.is_online = Some(field.read_bool()?),
                other => tracing::trace!(tag = %other, "skipping unknown node field"),
            }
        }
        Ok(())
    }
}

impl fmt::Display for NodeContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "identifier: {}, description: {}",
            self.identifier.as_deref().unwrap_or("-"),
            self.description.as_deref().unwrap_or("-")
        )?;
        if let Some(is_online) = self.is_online {
            write!(f, ", online: {}", is_online)?;
        }
        Ok(())
    }
}

fn new_node_contents() -> Contents {
    Contents::Node(NodeContents::new())
}

/// Maps element tags to the payload constructor used when decoding them
#[derive(Clone, Debug)]
pub struct ContentRegistry {
    factories: HashMap<Tag, ContentFactory>,
}

impl ContentRegistry {
    /// Registry with no factories
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register `factory` for `tag`, replacing any previous entry
    pub fn register(&mut self, tag: Tag, factory: ContentFactory) {
        self.factories.insert(tag, factory);
    }

    pub fn factory(&self, tag: Tag) -> Option<ContentFactory> {
        self.factories.get(&tag).copied()
    }

    /// Instantiate the payload for `tag`
    pub fn create(&self, tag: Tag) -> Result<Contents> {
        self.factory(tag)
            .map(|factory| factory())
            .ok_or(TreeError::NoContentFactory { tag })
    }
}

impl Default for ContentRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(tags::COMMAND, new_command_contents);
        for tag in [
            tags::NODE,
            tags::QUALIFIED_NODE,
            tags::MATRIX,
            tags::QUALIFIED_MATRIX,
        ] {
            registry.register(tag, new_node_contents);
        }
        registry
    }
}
