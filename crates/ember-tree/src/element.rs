//! Element arena
//!
//! Elements are stored in an [`ElementTree`] and addressed by [`ElementId`]
//! handles. A parent owns its children: freeing an element frees its whole
//! subtree. The parent link is a plain handle used for traversal only.
//!
//! ```text
//!   ElementTree
//!   ├── slots[0]  APP(3) #1   parent: -      children: {2 → slots[1]}
//!   ├── slots[1]  APP(3) #2   parent: 0      children: {5 → slots[2]}
//!   └── slots[2]  APP(13) #5  parent: 1      children: {}
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ember_codec::{RelativeOid, Tag};

use crate::contents::{ContentFactory, Contents};
use crate::error::{Result, TreeError};
use crate::listener::{Listener, ListenerSet};
use crate::matrix::MatrixState;

/// Handle to an element in an [`ElementTree`]
///
/// Carries a generation counter so that handles to freed elements are
/// detected after their slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    idx: u32,
    generation: u32,
}

impl ElementId {
    /// Raw slot index (for diagnostics only)
    pub fn index(self) -> u32 {
        self.idx
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({}@gen{})", self.idx, self.generation)
    }
}

/// Element number addressed by a path component
pub(crate) fn number_of(component: u32) -> Result<i32> {
    i32::try_from(component).map_err(|_| TreeError::NumberOutOfRange(component.into()))
}

/// Path component of an element number
pub(crate) fn component_of(number: i32) -> Result<u32> {
    u32::try_from(number).map_err(|_| TreeError::NumberOutOfRange(number.into()))
}

/// A node of the control tree
#[derive(Debug)]
pub struct Element {
    pub(crate) number: i32,
    pub(crate) tag: Tag,
    /// Authoritative only when `is_qualified`
    pub(crate) path: RelativeOid,
    pub(crate) is_qualified: bool,
    pub(crate) contents: Option<Contents>,
    pub(crate) content_factory: Option<ContentFactory>,
    pub(crate) children: BTreeMap<i32, ElementId>,
    pub(crate) parent: Option<ElementId>,
    pub(crate) listeners: ListenerSet,
    pub(crate) matrix: Option<MatrixState>,
}

impl Element {
    /// Create an unqualified element addressed by `number`
    pub fn new(tag: Tag, number: i32, content_factory: Option<ContentFactory>) -> Self {
        Self {
            number,
            tag,
            path: RelativeOid::new(),
            is_qualified: false,
            contents: None,
            content_factory,
            children: BTreeMap::new(),
            parent: None,
            listeners: ListenerSet::new(),
            matrix: None,
        }
    }

    /// Create a qualified element addressed by its absolute `path`
    ///
    /// The element number is the last component of the path.
    pub fn qualified(
        tag: Tag,
        path: RelativeOid,
        content_factory: Option<ContentFactory>,
    ) -> Result<Self> {
        let number = path.last().map(number_of).transpose()?.unwrap_or_default();
        let mut element = Self::new(tag, number, content_factory);
        element.path = path;
        element.is_qualified = true;
        Ok(element)
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn is_qualified(&self) -> bool {
        self.is_qualified
    }

    /// Absolute path of a qualified element
    pub fn qualified_path(&self) -> Option<&RelativeOid> {
        self.is_qualified.then_some(&self.path)
    }

    pub fn contents(&self) -> Option<&Contents> {
        self.contents.as_ref()
    }

    pub fn contents_mut(&mut self) -> Option<&mut Contents> {
        self.contents.as_mut()
    }

    /// Instantiate fresh contents through the element's factory
    ///
    /// Replaces any existing contents. Returns `None` when the element has
    /// no factory.
    pub fn create_content(&mut self) -> Option<&mut Contents> {
        let factory = self.content_factory?;
        self.contents = Some(factory());
        self.contents.as_mut()
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Children in ascending number order
    pub fn children(&self) -> impl Iterator<Item = (i32, ElementId)> + '_ {
        self.children.iter().map(|(number, id)| (*number, *id))
    }

    pub fn child(&self, number: i32) -> Option<ElementId> {
        self.children.get(&number).copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    pub fn is_matrix(&self) -> bool {
        self.matrix.is_some()
    }

    pub fn matrix(&self) -> Option<&MatrixState> {
        self.matrix.as_ref()
    }

    /// Matrix state, turning the element into a matrix if it was not one
    pub fn matrix_mut(&mut self) -> &mut MatrixState {
        self.matrix.get_or_insert_with(MatrixState::new)
    }

    pub fn set_matrix(&mut self, state: MatrixState) {
        self.matrix = Some(state);
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    element: Option<Element>,
}

/// Arena owning a forest of elements
#[derive(Debug)]
pub struct ElementTree {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    len: usize,
    /// Registered top-level elements, keyed by number
    roots: BTreeMap<i32, ElementId>,
    span: tracing::Span,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            roots: BTreeMap::new(),
            span: tracing::Span::none(),
        }
    }

    /// Attach a span that merges and decodes on this tree log under
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Number of live elements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // -- Allocation --

    /// Move `element` into the arena
    pub fn insert(&mut self, element: Element) -> ElementId {
        self.len += 1;
        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.element = Some(element);
            return ElementId {
                idx,
                generation: slot.generation,
            };
        }

        let idx = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            element: Some(element),
        });
        ElementId { idx, generation: 0 }
    }

    /// Create an unparented, unqualified element
    pub fn create(&mut self, tag: Tag, number: i32, factory: Option<ContentFactory>) -> ElementId {
        self.insert(Element::new(tag, number, factory))
    }

    /// Create an unparented, qualified element
    pub fn create_qualified(
        &mut self,
        tag: Tag,
        path: RelativeOid,
        factory: Option<ContentFactory>,
    ) -> Result<ElementId> {
        Ok(self.insert(Element::qualified(tag, path, factory)?))
    }

    /// Whether `id` refers to a live element
    pub fn is_alive(&self, id: ElementId) -> bool {
        self.slots
            .get(id.idx as usize)
            .map_or(false, |slot| slot.generation == id.generation && slot.element.is_some())
    }

    pub fn element(&self, id: ElementId) -> Result<&Element> {
        self.slots
            .get(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.element.as_ref())
            .ok_or(TreeError::StaleElement(id))
    }

    pub fn element_mut(&mut self, id: ElementId) -> Result<&mut Element> {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.element.as_mut())
            .ok_or(TreeError::StaleElement(id))
    }

    /// Take an element out of the arena, leaving its children in place
    pub(crate) fn take(&mut self, id: ElementId) -> Result<Element> {
        let slot = self
            .slots
            .get_mut(id.idx as usize)
            .filter(|slot| slot.generation == id.generation && slot.element.is_some())
            .ok_or(TreeError::StaleElement(id))?;
        let element = slot.element.take().ok_or(TreeError::StaleElement(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.idx);
        self.len -= 1;
        Ok(element)
    }

    /// Free `id` and every descendant
    fn free_subtree(&mut self, id: ElementId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Ok(element) = self.take(current) {
                pending.extend(element.children.into_values());
            }
        }
    }

    /// Unlink `id` from its parent and from the root registry
    pub(crate) fn detach(&mut self, id: ElementId) -> Result<()> {
        let (number, parent) = {
            let element = self.element_mut(id)?;
            (element.number, element.parent.take())
        };
        if let Some(parent) = parent {
            if let Ok(parent) = self.element_mut(parent) {
                if parent.children.get(&number) == Some(&id) {
                    parent.children.remove(&number);
                }
            }
        }
        if self.roots.get(&number) == Some(&id) {
            self.roots.remove(&number);
        }
        Ok(())
    }

    /// Detach `id` from the tree and free its subtree
    pub fn remove(&mut self, id: ElementId) -> Result<()> {
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    // -- Topology --

    /// Make `child` a child of `parent`, keyed by its number
    ///
    /// A previous child with the same number is replaced and freed. The
    /// child's path is reset unless it is qualified.
    pub fn add_child(&mut self, parent: ElementId, child: ElementId) -> Result<()> {
        self.element(parent)?;
        self.element(child)?;

        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(TreeError::CyclicChild(child));
            }
            ancestor = self.element(current)?.parent;
        }

        self.detach(child)?;
        let number = self.element(child)?.number;
        let replaced = self.element_mut(parent)?.children.insert(number, child);
        if let Some(replaced) = replaced.filter(|replaced| *replaced != child) {
            tracing::trace!(?replaced, number, "replacing child");
            self.free_subtree(replaced);
        }

        let element = self.element_mut(child)?;
        element.parent = Some(parent);
        if !element.is_qualified {
            element.path = RelativeOid::new();
        }
        Ok(())
    }

    /// Parent of `id`, or `None` at the top of the tree
    pub fn parent(&self, id: ElementId) -> Result<Option<ElementId>> {
        Ok(self.element(id)?.parent)
    }

    pub fn child(&self, parent: ElementId, number: i32) -> Result<Option<ElementId>> {
        Ok(self.element(parent)?.child(number))
    }

    /// Absolute path of `id`
    ///
    /// Qualified elements answer with their own path; otherwise the path is
    /// rebuilt from the numbers of the parent chain, stopping at the first
    /// qualified ancestor.
    pub fn path(&self, id: ElementId) -> Result<RelativeOid> {
        let mut numbers = Vec::new();
        let mut prefix = RelativeOid::new();
        let mut current = Some(id);
        while let Some(at) = current {
            let element = self.element(at)?;
            if element.is_qualified {
                prefix = element.path.clone();
                break;
            }
            numbers.push(component_of(element.number)?);
            current = element.parent;
        }

        let mut path = prefix;
        for number in numbers.into_iter().rev() {
            path.push(number);
        }
        Ok(path)
    }

    /// Number of ancestors above `id`
    pub fn depth(&self, id: ElementId) -> Result<usize> {
        let mut depth = 0;
        let mut current = self.element(id)?.parent;
        while let Some(at) = current {
            depth += 1;
            current = self.element(at)?.parent;
        }
        Ok(depth)
    }

    // -- Top-level registry --

    /// Register an unparented element as a top-level element
    ///
    /// A previous root with the same number is replaced and freed.
    pub fn add_root(&mut self, id: ElementId) -> Result<()> {
        self.detach(id)?;
        let number = self.element(id)?.number;
        if let Some(replaced) = self.roots.insert(number, id).filter(|replaced| *replaced != id) {
            self.free_subtree(replaced);
        }
        Ok(())
    }

    pub fn root(&self, number: i32) -> Option<ElementId> {
        self.roots.get(&number).copied()
    }

    /// Top-level elements in ascending number order
    pub fn roots(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.roots.values().copied()
    }

    /// Resolve an absolute path through the registered roots
    pub fn find(&self, path: &RelativeOid) -> Option<ElementId> {
        let mut numbers = path.iter();
        let mut current = self.root(number_of(numbers.next()?).ok()?)?;
        for number in numbers {
            current = self.element(current).ok()?.child(number_of(number).ok()?)?;
        }
        Some(current)
    }

    // -- Contents --

    /// Instantiate fresh contents for `id` through its factory
    pub fn create_content(&mut self, id: ElementId) -> Result<Option<&mut Contents>> {
        Ok(self.element_mut(id)?.create_content())
    }

    pub fn contents(&self, id: ElementId) -> Result<Option<&Contents>> {
        Ok(self.element(id)?.contents())
    }

    /// Replace the contents of `id` and notify its listeners
    pub fn set_contents(&mut self, id: ElementId, contents: Contents) -> Result<()> {
        self.element_mut(id)?.contents = Some(contents);
        self.notify(id, None);
        Ok(())
    }

    // -- Listeners --

    pub fn add_listener(&mut self, id: ElementId, listener: &Arc<dyn Listener>) -> Result<()> {
        self.element_mut(id)?.listeners.insert(listener);
        Ok(())
    }

    pub fn remove_listener(&mut self, id: ElementId, listener: &Arc<dyn Listener>) -> Result<()> {
        self.element_mut(id)?.listeners.remove(listener);
        Ok(())
    }

    /// Invoke every live listener of `id`
    pub(crate) fn notify(&mut self, id: ElementId, error: Option<&TreeError>) {
        let listeners = match self.element_mut(id) {
            Ok(element) => element.listeners.live(),
            Err(_) => return,
        };
        for listener in listeners {
            listener.receive(self, id, error);
        }
    }

    // -- Diagnostics --

    /// Recursive, human-readable rendering of `id` and its subtree
    pub fn display(&self, id: ElementId) -> ElementDisplay<'_> {
        ElementDisplay { tree: self, id }
    }
}

/// Debug rendering returned by [`ElementTree::display`]
pub struct ElementDisplay<'a> {
    tree: &'a ElementTree,
    id: ElementId,
}

impl ElementDisplay<'_> {
    fn write_element(&self, f: &mut fmt::Formatter<'_>, id: ElementId, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        let element = match self.tree.element(id) {
            Ok(element) => element,
            Err(_) => return writeln!(f, "{}<stale {:?}>", pad, id),
        };
        let path = self.tree.path(id).unwrap_or_default();

        writeln!(f, "{}{{", pad)?;
        writeln!(f, "{}  tag: {},", pad, element.tag)?;
        writeln!(f, "{}  number: {},", pad, element.number)?;
        writeln!(f, "{}  path: {},", pad, path)?;
        match &element.contents {
            Some(contents) => writeln!(f, "{}  content: {},", pad, contents)?,
            None => writeln!(f, "{}  content: nil,", pad)?,
        }
        if let Some(matrix) = &element.matrix {
            writeln!(
                f,
                "{}  matrix: {} targets, {} sources, {} connections,",
                pad,
                matrix.targets.len(),
                matrix.sources.len(),
                matrix.connections.len()
            )?;
        }
        writeln!(f, "{}  children: [", pad)?;
        for child in element.children.values() {
            self.write_element(f, *child, depth + 2)?;
        }
        writeln!(f, "{}  ]", pad)?;
        writeln!(f, "{}}}", pad)
    }
}

impl fmt::Display for ElementDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_element(f, self.id, 0)
    }
}
