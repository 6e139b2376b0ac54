//! Thread-safe handle to a resident tree
//!
//! Merges take the write lock; encoding and rendering take the read lock.
//! Inbound bytes are decoded into their own arena before the lock is taken.

use std::sync::Arc;

use bytes::Bytes;
use ember_codec::RelativeOid;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::contents::ContentRegistry;
use crate::element::ElementTree;
use crate::error::{Result, TreeError};
use crate::listener::Listener;
use crate::root::RootElement;

/// Cloneable handle to one resident [`ElementTree`]
#[derive(Clone, Default)]
pub struct SharedTree {
    inner: Arc<RwLock<ElementTree>>,
    registry: Arc<ContentRegistry>,
}

impl SharedTree {
    pub fn new(tree: ElementTree) -> Self {
        Self::with_registry(tree, ContentRegistry::default())
    }

    pub fn with_registry(tree: ElementTree, registry: ContentRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tree)),
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ContentRegistry {
        &self.registry
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ElementTree> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ElementTree> {
        self.inner.write()
    }

    /// Merge a decoded message
    pub fn apply(&self, message: RootElement) -> Result<()> {
        self.inner.write().apply(message)
    }

    /// Decode and merge a framed message
    pub fn apply_bytes(&self, data: &[u8]) -> Result<()> {
        let message = RootElement::decode(data, &self.registry)?;
        self.apply(message)
    }

    /// Encoded GetDirectory request for the element at `path`
    pub fn directory_request(
        &self,
        path: &RelativeOid,
        listener: Option<&Arc<dyn Listener>>,
    ) -> Result<Bytes> {
        let message = {
            let mut tree = self.inner.write();
            let id = tree
                .find(path)
                .ok_or_else(|| TreeError::UnresolvedPath(path.to_string()))?;
            tree.get_directory_msg(id, listener)?
        };
        message.encode()
    }

    /// Rendering of the element at `path` and its subtree
    pub fn render(&self, path: &RelativeOid) -> Option<String> {
        let tree = self.inner.read();
        let id = tree.find(path)?;
        Some(tree.display(id).to_string())
    }
}

impl std::fmt::Debug for SharedTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTree")
            .field("elements", &self.inner.read().len())
            .finish()
    }
}
