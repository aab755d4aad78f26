use std::{alloc::Layout, fmt, ptr::NonNull};

/// Sentinel stamped into every live record.
///
/// Liveness is decided by the slot generation and the tree id carried in each
/// handle. The tag only catches a slot filled by something other than
/// `Tree::create`, so it never fails while the arena is intact.
pub(crate) const RECORD_TAG: u16 = 0xAABB;

/// Reference to one allocation in a [`Tree`](crate::Tree).
///
/// A handle is the id of the tree that made it, an arena slot index, and the
/// generation the slot had when the allocation was made. Freeing the slot
/// bumps its generation, so a handle outliving its allocation is recognised
/// instead of aliasing whatever reuses the slot. The tree id does the same for
/// handles passed to the wrong tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
  tree: u32,
  index: u32,
  generation: u32,
}

impl Handle {
  pub(crate) fn new(
    tree: u32,
    index: u32,
    generation: u32,
  ) -> Self {
    Self {
      tree,
      index,
      generation,
    }
  }

  pub fn tree(&self) -> u32 {
    self.tree
  }

  pub fn index(&self) -> u32 {
    self.index
  }

  pub fn generation(&self) -> u32 {
    self.generation
  }
}

impl fmt::Display for Handle {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "#{}v{}", self.index, self.generation)
  }
}

impl fmt::Debug for Handle {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

/// Metadata kept for every live allocation.
///
/// ```text
///   ┌──────────────────────────────┐
///   │ Record                       │        ┌──────────────────┐
///   │  tag:      0xAABB            │        │                  │
///   │  size:     N                 │        │  N zeroed bytes  │
///   │  layout:   align!(N), align  │        │                  │
///   │  parent:   Some(#p) | None   │        └──────────────────┘
///   │  children: [#a, #b, ...]     │                 ▲
///   │  payload:  ──────────────────┼─────────────────┘
///   └──────────────────────────────┘
/// ```
pub(crate) struct Record {
  pub tag: u16,
  pub size: usize,
  pub layout: Option<Layout>,
  pub parent: Option<Handle>,
  pub children: Vec<Handle>,
  pub payload: NonNull<u8>,
}

impl Record {
  pub fn new(
    size: usize,
    layout: Option<Layout>,
    parent: Option<Handle>,
    payload: NonNull<u8>,
  ) -> Self {
    Self {
      tag: RECORD_TAG,
      size,
      layout,
      parent,
      children: Vec::new(),
      payload,
    }
  }

  pub fn is_tagged(&self) -> bool {
    self.tag == RECORD_TAG
  }

  /// Removes the single entry for `child`, keeping the order of the rest.
  pub fn remove_child(
    &mut self,
    child: Handle,
  ) -> bool {
    match self.children.iter().position(|c| *c == child) {
      Some(position) => {
        self.children.remove(position);
        true
      }
      None => false,
    }
  }
}

/// One arena cell. `record` is `None` while the slot sits on the free list.
pub(crate) struct Slot {
  pub generation: u32,
  pub record: Option<Record>,
}
