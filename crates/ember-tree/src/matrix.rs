//! Matrix routing state: signals and connections
//!
//! A matrix element carries its target and source signal lists and the
//! connections currently routed between them. The three groups are encoded
//! after the children record at every depth, independent of the one-level
//! children rule.

use std::fmt;

use ember_codec::{RelativeOid, Tag, TagReader, TagWriter};

use crate::error::{Result, ResultExt, TreeError};
use crate::tags;

/// A numbered endpoint on one side of a matrix
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signal {
    pub number: u32,
}

impl Signal {
    pub fn new(number: u32) -> Self {
        Self { number }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number)
    }
}

/// How a connection record is applied to the routing state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionOperation {
    /// The sources replace the target's current set
    #[default]
    Absolute,
    /// The sources are added to the target's current set
    Connect,
    /// The sources are removed from the target's current set
    Disconnect,
}

impl ConnectionOperation {
    pub fn value(self) -> i64 {
        match self {
            Self::Absolute => 0,
            Self::Connect => 1,
            Self::Disconnect => 2,
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Absolute),
            1 => Some(Self::Connect),
            2 => Some(Self::Disconnect),
            _ => None,
        }
    }
}

/// One target and the sources feeding it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Connection {
    pub target: Signal,
    pub sources: Vec<Signal>,
    pub operation: ConnectionOperation,
}

impl Connection {
    pub fn new(target: Signal, sources: Vec<Signal>) -> Self {
        Self {
            target,
            sources,
            operation: ConnectionOperation::Absolute,
        }
    }

    pub fn with_operation(mut self, operation: ConnectionOperation) -> Self {
        self.operation = operation;
        self
    }
}

const CONNECTION_TARGET: Tag = Tag::context(0);
const CONNECTION_SOURCES: Tag = Tag::context(1);
const CONNECTION_OPERATION: Tag = Tag::context(2);
const SIGNAL_NUMBER: Tag = Tag::context(0);

/// Signals and connections of a matrix element
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatrixState {
    pub targets: Vec<Signal>,
    pub sources: Vec<Signal>,
    pub connections: Vec<Connection>,
}

impl MatrixState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources currently routed to `target`
    pub fn sources_of(&self, target: Signal) -> Option<&[Signal]> {
        self.connections
            .iter()
            .find(|connection| connection.target == target)
            .map(|connection| connection.sources.as_slice())
    }

    /// Apply one connection record to the routing state
    pub fn apply_connection(&mut self, incoming: &Connection) {
        let index = match self
            .connections
            .iter()
            .position(|connection| connection.target == incoming.target)
        {
            Some(index) => index,
            None => {
                self.connections.push(Connection::new(incoming.target, Vec::new()));
                self.connections.len() - 1
            }
        };
        let sources = &mut self.connections[index].sources;

        match incoming.operation {
            ConnectionOperation::Absolute => *sources = incoming.sources.clone(),
            ConnectionOperation::Connect => {
                for source in &incoming.sources {
                    if !sources.contains(source) {
                        sources.push(*source);
                    }
                }
            }
            ConnectionOperation::Disconnect => {
                sources.retain(|source| !incoming.sources.contains(source));
            }
        }
    }

    /// Merge a decoded state into this one
    ///
    /// Non-empty signal lists replace the resident lists; connections are
    /// applied record by record.
    pub fn merge(&mut self, incoming: &MatrixState) {
        if !incoming.targets.is_empty() {
            self.targets = incoming.targets.clone();
        }
        if !incoming.sources.is_empty() {
            self.sources = incoming.sources.clone();
        }
        for connection in &incoming.connections {
            self.apply_connection(connection);
        }
    }

    /// Write the targets, sources and connections groups
    pub(crate) fn encode(&self, writer: &mut TagWriter) -> Result<()> {
        encode_signals(writer, tags::TARGETS, tags::TARGET, &self.targets)
            .frame(|| "encoding matrix targets")?;
        encode_signals(writer, tags::SOURCES, tags::SOURCE, &self.sources)
            .frame(|| "encoding matrix sources")?;
        self.encode_connections(writer)
            .frame(|| "encoding matrix connections")
    }

    fn encode_connections(&self, writer: &mut TagWriter) -> Result<()> {
        writer.start_sequence(tags::CONNECTIONS)?;
        writer.start_sequence(Tag::SEQUENCE)?;
        for connection in &self.connections {
            writer.start_sequence(tags::ITEM)?;
            writer.start_sequence(tags::CONNECTION)?;

            writer.start_sequence(CONNECTION_TARGET)?;
            writer.write_int(i64::from(connection.target.number))?;
            writer.end_sequence()?;

            let sources: RelativeOid = connection.sources.iter().map(|s| s.number).collect();
            writer.start_sequence(CONNECTION_SOURCES)?;
            writer.write_relative_oid(&sources)?;
            writer.end_sequence()?;

            writer.start_sequence(CONNECTION_OPERATION)?;
            writer.write_int(connection.operation.value())?;
            writer.end_sequence()?;

            writer.end_sequence()?;
            writer.end_sequence()?;
        }
        writer.end_sequence()?;
        writer.end_sequence()?;
        Ok(())
    }

    /// Decode one matrix group identified by `tag` into this state
    pub(crate) fn decode_group(&mut self, tag: Tag, reader: &mut TagReader<'_>) -> Result<()> {
        match tag {
            tags::TARGETS => {
                self.targets = decode_signals(reader, tags::TARGET).frame(|| "decoding matrix targets")?
            }
            tags::SOURCES => {
                self.sources = decode_signals(reader, tags::SOURCE).frame(|| "decoding matrix sources")?
            }
            tags::CONNECTIONS => {
                self.connections = decode_connections(reader).frame(|| "decoding matrix connections")?
            }
            _ => {}
        }
        Ok(())
    }
}

fn encode_signals(writer: &mut TagWriter, group: Tag, record: Tag, signals: &[Signal]) -> Result<()> {
    writer.start_sequence(group)?;
    writer.start_sequence(Tag::SEQUENCE)?;
    for signal in signals {
        writer.start_sequence(tags::ITEM)?;
        writer.start_sequence(record)?;
        writer.start_sequence(SIGNAL_NUMBER)?;
        writer.write_int(i64::from(signal.number))?;
        writer.end_sequence()?;
        writer.end_sequence()?;
        writer.end_sequence()?;
    }
    writer.end_sequence()?;
    writer.end_sequence()?;
    Ok(())
}

fn decode_signals(reader: &mut TagReader<'_>, record: Tag) -> Result<Vec<Signal>> {
    let mut list = reader.enter_sequence(Tag::SEQUENCE)?;
    let mut signals = Vec::new();
    while !list.is_empty() {
        let mut item = list.enter_sequence(tags::ITEM)?;
        let mut signal = item.enter_sequence(record)?;
        let mut number = signal.enter_sequence(SIGNAL_NUMBER)?;
        signals.push(Signal::new(read_signal_number(&mut number)?));
    }
    Ok(signals)
}

fn decode_connections(reader: &mut TagReader<'_>) -> Result<Vec<Connection>> {
    let mut list = reader.enter_sequence(Tag::SEQUENCE)?;
    let mut connections = Vec::new();
    while !list.is_empty() {
        let mut item = list.enter_sequence(tags::ITEM)?;
        let mut record = item.enter_sequence(tags::CONNECTION)?;
        let mut connection = Connection::default();

        while let Some(tag) = record.peek_tag()? {
            let mut field = record.enter_sequence(tag)?;
            match tag {
                CONNECTION_TARGET => connection.target = Signal::new(read_signal_number(&mut field)?),
                CONNECTION_SOURCES => {
                    connection.sources = field.read_relative_oid()?.iter().map(Signal::new).collect()
                }
                CONNECTION_OPERATION => {
                    let value = field.read_int()?;
                    connection.operation = ConnectionOperation::from_value(value)
                        .unwrap_or_default();
                }
                other => tracing::trace!(tag = %other, "skipping unknown connection field"),
            }
        }
        connections.push(connection);
    }
    Ok(connections)
}

fn read_signal_number(reader: &mut TagReader<'_>) -> Result<u32> {
    let value = reader.read_int()?;
    u32::try_from(value).map_err(|_| TreeError::InvalidSignal(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(numbers: &[u32]) -> Vec<Signal> {
        numbers.iter().copied().map(Signal::new).collect()
    }

    #[test]
    fn test_apply_absolute_connect_disconnect() {
        let mut state = MatrixState::new();
        state.apply_connection(&Connection::new(Signal::new(1), signals(&[4, 5])));
        assert_eq!(state.sources_of(Signal::new(1)), Some(signals(&[4, 5]).as_slice()));

        state.apply_connection(
            &Connection::new(Signal::new(1), signals(&[5, 6]))
                .with_operation(ConnectionOperation::Connect),
        );
        assert_eq!(state.sources_of(Signal::new(1)), Some(signals(&[4, 5, 6]).as_slice()));

        state.apply_connection(
            &Connection::new(Signal::new(1), signals(&[4]))
                .with_operation(ConnectionOperation::Disconnect),
        );
        assert_eq!(state.sources_of(Signal::new(1)), Some(signals(&[5, 6]).as_slice()));

        state.apply_connection(&Connection::new(Signal::new(1), signals(&[9])));
        assert_eq!(state.sources_of(Signal::new(1)), Some(signals(&[9]).as_slice()));
        assert_eq!(state.sources_of(Signal::new(2)), None);
    }

    #[test]
    fn test_merge_keeps_lists_when_incoming_empty() {
        let mut state = MatrixState {
            targets: signals(&[0, 1]),
            sources: signals(&[0, 1, 2]),
            connections: vec![Connection::new(Signal::new(0), signals(&[2]))],
        };
        let incoming = MatrixState {
            targets: Vec::new(),
            sources: Vec::new(),
            connections: vec![Connection::new(Signal::new(1), signals(&[0]))],
        };

        state.merge(&incoming);
        assert_eq!(state.targets, signals(&[0, 1]));
        assert_eq!(state.sources, signals(&[0, 1, 2]));
        assert_eq!(state.connections.len(), 2);
        assert_eq!(state.sources_of(Signal::new(0)), Some(signals(&[2]).as_slice()));
    }

    #[test]
    fn test_groups_on_the_wire() {
        let state = MatrixState {
            targets: signals(&[0, 1]),
            sources: signals(&[7]),
            connections: vec![Connection::new(Signal::new(1), signals(&[7]))
                .with_operation(ConnectionOperation::Connect)],
        };

        let mut writer = TagWriter::new();
        writer.start_sequence(tags::MATRIX).unwrap();
        state.encode(&mut writer).unwrap();
        writer.end_sequence().unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = TagReader::new(&bytes);
        let mut element = reader.enter_sequence(tags::MATRIX).unwrap();
        let mut decoded = MatrixState::new();
        let mut groups = Vec::new();
        while let Some(tag) = element.peek_tag().unwrap() {
            let mut group = element.enter_sequence(tag).unwrap();
            decoded.decode_group(tag, &mut group).unwrap();
            groups.push(tag);
        }

        assert_eq!(groups, vec![tags::TARGETS, tags::SOURCES, tags::CONNECTIONS]);
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_negative_signal_rejected() {
        let mut writer = TagWriter::new();
        writer.write_int(-3).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(
            read_signal_number(&mut TagReader::new(&bytes)),
            Err(TreeError::InvalidSignal(-3))
        );
    }
}
