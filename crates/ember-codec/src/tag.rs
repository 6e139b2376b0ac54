//! Tag identifiers: an encoding class plus a numeric subtype

use std::fmt;

/// Encoding class of a tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagClass {
    Universal,
    Application,
    Context,
    Private,
}

impl TagClass {
    /// The two class bits of the identifier octet
    pub(crate) fn bits(self) -> u8 {
        match self {
            Self::Universal => 0b00,
            Self::Application => 0b01,
            Self::Context => 0b10,
            Self::Private => 0b11,
        }
    }

    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Universal,
            0b01 => Self::Application,
            0b10 => Self::Context,
            _ => Self::Private,
        }
    }
}

/// Tag of a record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    class: TagClass,
    number: u32,
}

impl Tag {
    // Universal primitives and containers
    pub const BOOLEAN: Self = Self::universal(1);
    pub const INTEGER: Self = Self::universal(2);
    pub const UTF8_STRING: Self = Self::universal(12);
    pub const RELATIVE_OID: Self = Self::universal(13);
    pub const SEQUENCE: Self = Self::universal(16);
    pub const SET: Self = Self::universal(17);

    pub const fn new(class: TagClass, number: u32) -> Self {
        Self { class, number }
    }

    pub const fn universal(number: u32) -> Self {
        Self::new(TagClass::Universal, number)
    }

    pub const fn application(number: u32) -> Self {
        Self::new(TagClass::Application, number)
    }

    pub const fn context(number: u32) -> Self {
        Self::new(TagClass::Context, number)
    }

    pub const fn private(number: u32) -> Self {
        Self::new(TagClass::Private, number)
    }

    pub fn class(&self) -> TagClass {
        self.class
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Encode the identifier octets
    pub(crate) fn encode_identifier(&self, constructed: bool, out: &mut Vec<u8>) {
        let mut lead = self.class.bits() << 6;
        if constructed {
            lead |= 0x20;
        }

        if self.number < 31 {
            out.push(lead | self.number as u8);
            return;
        }

        out.push(lead | 0x1f);
        push_base128(self.number, out);
    }
}

/// Append `value` as base-128 digits, most significant first, with the
/// continuation bit set on every digit but the last.
pub(crate) fn push_base128(value: u32, out: &mut Vec<u8>) {
    let mut digits = [0u8; 5];
    let mut count = 0;
    let mut rest = value;
    loop {
        digits[count] = (rest & 0x7f) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(digits[i] | continuation);
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self.class {
            TagClass::Universal => "UNIV",
            TagClass::Application => "APP",
            TagClass::Context => "CTX",
            TagClass::Private => "PRIV",
        };
        write!(f, "{}({})", class, self.number)
    }
}
