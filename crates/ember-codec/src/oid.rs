//! Relative object identifiers, used as absolute element paths

use std::fmt;
use std::str::FromStr;

/// Ordered sequence of sub-identifiers, e.g. `1.2.3`
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativeOid(Vec<u32>);

impl RelativeOid {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, number: u32) {
        self.0.push(number);
    }

    /// Last sub-identifier, if any
    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Path with the last sub-identifier removed
    pub fn parent(&self) -> Option<RelativeOid> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Path with `number` appended
    pub fn child(&self, number: u32) -> RelativeOid {
        let mut path = self.clone();
        path.push(number);
        path
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<u32>> for RelativeOid {
    fn from(numbers: Vec<u32>) -> Self {
        Self(numbers)
    }
}

impl From<&[u32]> for RelativeOid {
    fn from(numbers: &[u32]) -> Self {
        Self(numbers.to_vec())
    }
}

impl FromIterator<u32> for RelativeOid {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for RelativeOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, number) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", number)?;
        }
        Ok(())
    }
}

impl FromStr for RelativeOid {
    type Err = std::num::ParseIntError;

    /// Parse a dotted path. The empty string is the empty path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::new());
        }
        s.split('.').map(str::parse::<u32>).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(RelativeOid::from(vec![1, 2, 3]).to_string(), "1.2.3");
        assert_eq!(RelativeOid::from(vec![7]).to_string(), "7");
        assert_eq!(RelativeOid::new().to_string(), "");
    }

    #[test]
    fn test_parse() {
        let path: RelativeOid = "1.20.300".parse().unwrap();
        assert_eq!(path.as_slice(), &[1, 20, 300]);
        assert!("".parse::<RelativeOid>().unwrap().is_empty());
        assert!("1..2".parse::<RelativeOid>().is_err());
        assert!("1.-2".parse::<RelativeOid>().is_err());
    }

    #[test]
    fn test_parent_and_child() {
        let path = RelativeOid::from(vec![1, 2]);
        assert_eq!(path.parent(), Some(RelativeOid::from(vec![1])));
        assert_eq!(path.child(5).as_slice(), &[1, 2, 5]);
        assert_eq!(path.last(), Some(2));
        assert_eq!(RelativeOid::new().parent(), None);
    }
}
