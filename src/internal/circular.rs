//! Circular dependency detection infrastructure.
//!
//! Each resolution carries the chain of services currently under
//! construction on its call path as a linked list of stack frames. The chain
//! lives in the `ResolverContext` handed to factories, so it follows the
//! recursion exactly and never leaks between threads or unrelated requests.

use crate::error::{DiError, DiResult};
use crate::key::Key;

/// One service under construction, linked to the service that requested it.
#[derive(Clone, Copy)]
pub(crate) struct Frame<'a> {
    key: Key,
    depth: usize,
    parent: Option<&'a Frame<'a>>,
}

impl<'a> Frame<'a> {
    /// Pushes `key` on top of `parent`, failing if `key` is already on the
    /// chain or the chain would grow past `max_depth`.
    pub(crate) fn enter(key: Key, parent: Option<&'a Frame<'a>>, max_depth: usize) -> DiResult<Self> {
        let depth = parent.map_or(0, |p| p.depth + 1);

        if parent.map_or(false, |p| p.contains(&key)) {
            let mut path = parent.map(Frame::path).unwrap_or_default();
            path.push(key.display_name());
            return Err(DiError::Circular(path));
        }
        if depth >= max_depth {
            return Err(DiError::DepthExceeded(depth));
        }

        Ok(Self { key, depth, parent })
    }

    fn contains(&self, key: &Key) -> bool {
        let mut frame = Some(self);
        while let Some(f) = frame {
            if f.key == *key {
                return true;
            }
            frame = f.parent;
        }
        false
    }

    /// Type names from the outermost request down to this frame.
    pub(crate) fn path(&self) -> Vec<&'static str> {
        let mut path = Vec::with_capacity(self.depth + 1);
        let mut frame = Some(self);
        while let Some(f) = frame {
            path.push(f.key.display_name());
            frame = f.parent;
        }
        path.reverse();
        path
    }
}
