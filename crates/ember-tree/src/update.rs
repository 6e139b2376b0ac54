//! Incremental merge of decoded subtrees into a resident tree

use crate::element::{ElementId, ElementTree};
use crate::error::{Result, ResultExt, TreeError};
use crate::root::RootElement;
use crate::tags;

impl ElementTree {
    /// Merge `incoming`, an element of `source`, into `resident`
    ///
    /// Incoming contents replace the resident contents; incoming children are
    /// adopted when absent and merged recursively otherwise. Resident children
    /// not mentioned by `incoming` are kept. Every merged node notifies its
    /// listeners once with the first error of its merge, except on an
    /// identity mismatch which returns before touching the node.
    ///
    /// Contents and adopted children are moved out of `source`.
    pub fn update(
        &mut self,
        resident: ElementId,
        source: &mut ElementTree,
        incoming: ElementId,
    ) -> Result<()> {
        let expected = self.element(resident)?;
        let found = source.element(incoming)?;
        if expected.number != found.number || expected.tag != found.tag {
            let err = TreeError::IdentityMismatch {
                expected_number: expected.number,
                found_number: found.number,
                expected_tag: expected.tag,
                found_tag: found.tag,
            };
            tracing::warn!(%err, "rejecting update");
            return Err(err);
        }

        let result = self.merge(resident, source, incoming);
        self.notify(resident, result.as_ref().err());
        result
    }

    fn merge(&mut self, resident: ElementId, source: &mut ElementTree, incoming: ElementId) -> Result<()> {
        let (contents, matrix, children) = {
            let element = source.element_mut(incoming)?;
            let children: Vec<(i32, ElementId)> = element.children().collect();
            (element.contents.take(), element.matrix.take(), children)
        };

        let element = self.element_mut(resident)?;
        tracing::debug!(
            tag = %element.tag,
            number = element.number,
            children = children.len(),
            "merging element"
        );
        if let Some(contents) = contents {
            element.contents = Some(contents);
        }
        if let Some(matrix) = matrix {
            match &mut element.matrix {
                Some(state) => state.merge(&matrix),
                None => element.matrix = Some(matrix),
            }
        }

        for (number, child) in children {
            match self.child(resident, number)? {
                Some(existing) => self
                    .update(existing, source, child)
                    .frame(|| format!("merging child {}", number))?,
                None => {
                    let adopted = self.adopt(source, child)?;
                    self.add_child(resident, adopted)?;
                    tracing::debug!(number, "adopted child");
                }
            }
        }
        Ok(())
    }

    /// Move the subtree rooted at `id` out of `source` into this arena
    ///
    /// Returns the handle of the moved root, unparented.
    pub fn adopt(&mut self, source: &mut ElementTree, id: ElementId) -> Result<ElementId> {
        source.detach(id)?;
        self.transplant(source, id)
    }

    fn transplant(&mut self, source: &mut ElementTree, id: ElementId) -> Result<ElementId> {
        let mut element = source.take(id)?;
        let children = std::mem::take(&mut element.children);
        element.parent = None;

        let moved = self.insert(element);
        for (number, child) in children {
            let child = self.transplant(source, child)?;
            self.element_mut(child)?.parent = Some(moved);
            self.element_mut(moved)?.children.insert(number, child);
        }
        Ok(moved)
    }

    /// Merge an inbound message into this tree
    ///
    /// Qualified top-level elements are resolved by path, unqualified ones by
    /// root number. Unresolved elements are adopted: unqualified ones as new
    /// roots, qualified ones under their parent path when it resolves. The
    /// first error aborts.
    pub fn apply(&mut self, mut message: RootElement) -> Result<()> {
        let span = self.span().clone();
        let _guard = span.enter();

        let elements = message.elements().to_vec();
        for incoming in elements {
            self.apply_element(message.tree_mut(), incoming)?;
        }
        Ok(())
    }

    fn apply_element(&mut self, source: &mut ElementTree, incoming: ElementId) -> Result<()> {
        let (path, number) = {
            let element = source.element(incoming)?;
            (element.qualified_path().cloned(), element.number)
        };

        let Some(path) = path else {
            return match self.root(number) {
                Some(resident) => self.update(resident, source, incoming),
                None => {
                    let adopted = self.adopt(source, incoming)?;
                    self.add_root(adopted)
                }
            };
        };

        if let Some(resident) = self.find(&path) {
            self.unqualify(source, incoming, resident)?;
            return self
                .update(resident, source, incoming)
                .frame(|| format!("applying {}", path));
        }

        match path.parent() {
            Some(parent_path) if parent_path.is_empty() => {
                let adopted = self.adopt(source, incoming)?;
                self.add_root(adopted)
            }
            Some(parent_path) => {
                let parent = self
                    .find(&parent_path)
                    .ok_or_else(|| TreeError::UnresolvedPath(path.to_string()))?;
                let adopted = self.adopt(source, incoming)?;
                self.add_child(parent, adopted)
            }
            None => Err(TreeError::UnresolvedPath(path.to_string())),
        }
    }

    /// Rewrite a qualified message element to the form of the resident
    /// element it addresses, so that a qualified node merges into a plain one
    fn unqualify(&self, source: &mut ElementTree, incoming: ElementId, resident: ElementId) -> Result<()> {
        let resident = self.element(resident)?;
        if resident.is_qualified {
            return Ok(());
        }
        let element = source.element_mut(incoming)?;
        if tags::qualified(resident.tag) == Some(element.tag) {
            element.tag = resident.tag;
            element.is_qualified = false;
            element.path = Default::default();
        }
        Ok(())
    }
}
