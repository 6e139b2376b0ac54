//! Wire tags of the Ember tree protocol

use ember_codec::Tag;

// Element kinds
pub const PARAMETER: Tag = Tag::application(1);
pub const COMMAND: Tag = Tag::application(2);
pub const NODE: Tag = Tag::application(3);
pub const QUALIFIED_PARAMETER: Tag = Tag::application(9);
pub const QUALIFIED_NODE: Tag = Tag::application(10);
pub const MATRIX: Tag = Tag::application(13);
pub const QUALIFIED_MATRIX: Tag = Tag::application(17);

// Framing
pub const ROOT: Tag = Tag::application(0);
pub const ROOT_ELEMENT_COLLECTION: Tag = Tag::application(11);
pub const ELEMENT_COLLECTION: Tag = Tag::application(4);

// Matrix records
pub const TARGET: Tag = Tag::application(14);
pub const SOURCE: Tag = Tag::application(15);
pub const CONNECTION: Tag = Tag::application(16);

// Element fields
pub const ADDRESS: Tag = Tag::context(0);
pub const CONTENTS: Tag = Tag::context(1);
pub const CHILDREN: Tag = Tag::context(2);
pub const TARGETS: Tag = Tag::context(3);
pub const SOURCES: Tag = Tag::context(4);
pub const CONNECTIONS: Tag = Tag::context(5);

/// Wrapper around each entry of a collection
pub const ITEM: Tag = Tag::context(0);

/// Whether `tag` names a matrix element
pub fn is_matrix(tag: Tag) -> bool {
    tag == MATRIX || tag == QUALIFIED_MATRIX
}

/// Qualified counterpart of an element tag, if it has one
pub fn qualified(tag: Tag) -> Option<Tag> {
    match tag {
        t if t == NODE || t == QUALIFIED_NODE => Some(QUALIFIED_NODE),
        t if t == PARAMETER || t == QUALIFIED_PARAMETER => Some(QUALIFIED_PARAMETER),
        t if t == MATRIX || t == QUALIFIED_MATRIX => Some(QUALIFIED_MATRIX),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_mapping() {
        assert_eq!(qualified(NODE), Some(QUALIFIED_NODE));
        assert_eq!(qualified(QUALIFIED_MATRIX), Some(QUALIFIED_MATRIX));
        assert_eq!(qualified(COMMAND), None);
    }

    #[test]
    fn test_matrix_tags() {
        assert!(is_matrix(MATRIX));
        assert!(is_matrix(QUALIFIED_MATRIX));
        assert!(!is_matrix(NODE));
    }
}
