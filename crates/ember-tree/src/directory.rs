//! Directory requests addressed through duplicated branches
//!
//! A request for one deep node carries only the chain of its ancestors, each
//! one a bare stand-in with the same tag and number:
//!
//! ```text
//!   resident                     message
//!   1 ─┬─ 2 ─── 5  (target)      1 ── 2 ── 5 ── Command(32)
//!      └─ 3
//! ```

use std::sync::Arc;

use crate::command::{CommandCode, FieldFlags};
use crate::element::{ElementId, ElementTree};
use crate::error::Result;
use crate::listener::Listener;
use crate::root::RootElement;
use crate::tags;

impl ElementTree {
    /// Build into `out` a stand-in chain from the top of the tree down to `id`
    ///
    /// The stand-ins carry no contents and no siblings. `command`, an element
    /// of `out`, becomes the only child of the stand-in for `id`. Returns the
    /// outermost stand-in.
    pub fn dup_branch(
        &self,
        id: ElementId,
        out: &mut ElementTree,
        command: Option<ElementId>,
    ) -> Result<ElementId> {
        let element = self.element(id)?;
        let mut branch = out.create(element.tag, element.number, None);
        if let Some(command) = command {
            out.add_child(branch, command)?;
        }

        let mut current = element.parent;
        while let Some(parent_id) = current {
            let parent = self.element(parent_id)?;
            let stand_in = out.create(parent.tag, parent.number, None);
            out.add_child(stand_in, branch)?;
            branch = stand_in;
            current = parent.parent;
        }
        Ok(branch)
    }

    /// GetDirectory request for `id`
    ///
    /// `listener`, if any, is registered on `id` itself so the merge of the
    /// response reaches it.
    pub fn get_directory_msg(
        &mut self,
        id: ElementId,
        listener: Option<&Arc<dyn Listener>>,
    ) -> Result<RootElement> {
        let code = CommandCode::GetDirectory;
        self.command_msg(id, code, code.default_field_flags(), listener)
    }

    /// Request carrying command `code` for `id` through a stand-in chain
    pub fn command_msg(
        &mut self,
        id: ElementId,
        code: CommandCode,
        field_flags: FieldFlags,
        listener: Option<&Arc<dyn Listener>>,
    ) -> Result<RootElement> {
        let mut message = RootElement::new();
        let command = message.tree_mut().new_command_with_flags(code, field_flags);
        let branch = self.dup_branch(id, message.tree_mut(), Some(command))?;

        if let Some(listener) = listener {
            self.add_listener(id, listener)?;
        }
        tracing::debug!(?id, %code, %field_flags, "built command request");

        message.add_element(branch);
        Ok(message)
    }

    /// GetDirectory request addressing `id` by its absolute path
    ///
    /// The message holds one qualified stand-in carrying the command, so the
    /// command stays within the one level an encode call writes.
    pub fn qualified_directory_msg(
        &mut self,
        id: ElementId,
        listener: Option<&Arc<dyn Listener>>,
    ) -> Result<RootElement> {
        let code = CommandCode::GetDirectory;
        self.qualified_command_msg(id, code, code.default_field_flags(), listener)
    }

    pub fn qualified_command_msg(
        &mut self,
        id: ElementId,
        code: CommandCode,
        field_flags: FieldFlags,
        listener: Option<&Arc<dyn Listener>>,
    ) -> Result<RootElement> {
        let tag = self.element(id)?.tag;
        let path = self.path(id)?;

        let mut message = RootElement::new();
        let tree = message.tree_mut();
        let stand_in = tree.create_qualified(tags::qualified(tag).unwrap_or(tag), path, None)?;
        let command = tree.new_command_with_flags(code, field_flags);
        tree.add_child(stand_in, command)?;

        if let Some(listener) = listener {
            self.add_listener(id, listener)?;
        }
        tracing::debug!(?id, %code, %field_flags, "built qualified command request");

        message.add_element(stand_in);
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contents::{ContentRegistry, Contents};
    use crate::error::TreeError;

    fn chain(tree: &mut ElementTree, numbers: &[i32]) -> Vec<ElementId> {
        let mut ids = Vec::new();
        for number in numbers {
            let id = tree.create(tags::NODE, *number, None);
            if let Some(parent) = ids.last() {
                tree.add_child(*parent, id).unwrap();
            }
            ids.push(id);
        }
        ids
    }

    struct Noop;

    impl Listener for Noop {
        fn receive(&self, _tree: &ElementTree, _element: ElementId, _error: Option<&TreeError>) {}
    }

    #[test]
    fn test_dup_branch_shape() {
        let mut tree = ElementTree::new();
        let ids = chain(&mut tree, &[1, 2, 5]);
        let sibling = tree.create(tags::NODE, 3, None);
        tree.add_child(ids[0], sibling).unwrap();

        let mut out = ElementTree::new();
        let command = out.new_command(CommandCode::GetDirectory);
        let top = tree.dup_branch(ids[2], &mut out, Some(command)).unwrap();

        assert_eq!(out.len(), 4);
        assert_eq!(out.element(top).unwrap().number(), 1);
        assert_eq!(out.element(top).unwrap().child_count(), 1);
        let middle = out.child(top, 2).unwrap().unwrap();
        let leaf = out.child(middle, 5).unwrap().unwrap();
        assert_eq!(out.element(leaf).unwrap().child(32), Some(command));
        assert!(out.element(leaf).unwrap().contents().is_none());
    }

    #[test]
    fn test_dup_branch_of_root() {
        let mut tree = ElementTree::new();
        let ids = chain(&mut tree, &[7]);
        let mut out = ElementTree::new();
        let top = tree.dup_branch(ids[0], &mut out, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.element(top).unwrap().child_count(), 0);
    }

    #[test]
    fn test_directory_msg_registers_listener_on_target() {
        let mut tree = ElementTree::new();
        let ids = chain(&mut tree, &[1, 2]);
        let listener: Arc<dyn Listener> = Arc::new(Noop);

        let message = tree.get_directory_msg(ids[1], Some(&listener)).unwrap();
        assert!(tree.element(ids[1]).unwrap().listeners().contains(&listener));
        assert!(!tree.element(ids[0]).unwrap().listeners().contains(&listener));
        assert_eq!(message.elements().len(), 1);

        // the command sits two levels below the encoded root and is not written
        let bytes = message.encode().unwrap();
        let decoded = RootElement::decode(&bytes, &ContentRegistry::default()).unwrap();
        let top = decoded.elements()[0];
        let target = decoded.tree().child(top, 2).unwrap().unwrap();
        assert_eq!(decoded.tree().element(target).unwrap().child_count(), 0);
    }

    #[test]
    fn test_command_msg_field_flags() {
        let mut tree = ElementTree::new();
        let ids = chain(&mut tree, &[1]);
        let message = tree
            .command_msg(ids[0], CommandCode::Subscribe, FieldFlags::Value, None)
            .unwrap();

        let top = message.elements()[0];
        let command = message.tree().child(top, CommandCode::SUBSCRIBE).unwrap().unwrap();
        let contents = message.tree().contents(command).unwrap().and_then(Contents::as_command);
        assert_eq!(contents.map(|c| c.field_flags()), Some(FieldFlags::Value));
    }

    #[test]
    fn test_qualified_directory_msg_survives_encoding() {
        let mut tree = ElementTree::new();
        let ids = chain(&mut tree, &[1, 2, 5, 9]);
        let message = tree.qualified_directory_msg(ids[3], None).unwrap();

        let bytes = message.encode().unwrap();
        let decoded = RootElement::decode(&bytes, &ContentRegistry::default()).unwrap();
        let top = decoded.elements()[0];
        let element = decoded.tree().element(top).unwrap();
        assert_eq!(element.tag(), tags::QUALIFIED_NODE);
        assert_eq!(decoded.tree().path(top).unwrap().to_string(), "1.2.5.9");

        let command = element.child(CommandCode::GET_DIRECTORY).unwrap();
        let contents = decoded.tree().contents(command).unwrap().and_then(Contents::as_command);
        assert_eq!(contents.map(|c| c.field_flags()), Some(FieldFlags::All));
    }
}
