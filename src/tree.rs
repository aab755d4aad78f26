use std::{
  alloc::Layout,
  fmt, mem,
  ptr::{self, NonNull},
  slice,
  sync::atomic::{AtomicU32, Ordering},
};

use log::{debug, trace, warn};

use crate::{
  align_to,
  backend::{RawAlloc, System},
  config::Config,
  error::{Error, Result, contract},
  record::{Handle, Record, Slot},
};

/// Source of [`Tree`] ids, so handles can be traced back to their tree.
static NEXT_TREE_ID: AtomicU32 = AtomicU32::new(0);

/// An arena of allocations linked into ownership trees.
///
/// Every allocation made through [`Tree::create`] may name a parent; destroying
/// a record destroys everything it owns. Payload bytes come from the backend
/// `A`, record metadata lives in the arena itself.
pub struct Tree<A: RawAlloc = System> {
  id: u32,
  slots: Vec<Slot>,
  free: Vec<u32>,
  live: usize,
  config: Config,
  backend: A,
}

/// Snapshot of a [`Tree`], see [`Tree::stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
  pub records: usize,
  pub roots: usize,
  pub payload_bytes: usize,
  pub slots: usize,
  pub free_slots: usize,
}

impl Tree<System> {
  pub fn new() -> Self {
    Self::with_config(Config::default())
  }

  pub fn with_config(config: Config) -> Self {
    Self::with_backend_config(System, config)
  }
}

impl Default for Tree<System> {
  fn default() -> Self {
    Self::new()
  }
}

impl<A: RawAlloc> Tree<A> {
  pub fn with_backend(backend: A) -> Self {
    Self::with_backend_config(backend, Config::default())
  }

  pub fn with_backend_config(
    backend: A,
    config: Config,
  ) -> Self {
    Self {
      id: NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed),
      slots: Vec::with_capacity(config.slot_capacity),
      free: Vec::new(),
      live: 0,
      config,
      backend,
    }
  }

  pub fn backend(&self) -> &A {
    &self.backend
  }

  pub fn backend_mut(&mut self) -> &mut A {
    &mut self.backend
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Allocates `size` zeroed bytes owned by `parent`, or a new root when
  /// `parent` is `None`.
  ///
  /// ```rust
  /// use treealloc::Tree;
  ///
  /// let mut tree = Tree::new();
  /// let root = tree.create(None, 16).unwrap();
  /// let child = tree.create(root, 4).unwrap();
  ///
  /// assert_eq!(tree.children(root), &[child]);
  /// assert_eq!(tree.payload(child), &[0, 0, 0, 0]);
  ///
  /// tree.destroy(root);
  /// assert!(!tree.is_live(child));
  /// ```
  ///
  /// # Panics
  ///
  /// If `parent` is not a live handle of this tree.
  #[track_caller]
  pub fn create(
    &mut self,
    parent: impl Into<Option<Handle>>,
    size: usize,
  ) -> Result<Handle> {
    let align = self.config.payload_align;
    self.create_aligned(parent, size, align)
  }

  /// Allocates room for one `T` owned by `parent`.
  #[track_caller]
  pub fn create_for<T>(
    &mut self,
    parent: impl Into<Option<Handle>>,
  ) -> Result<Handle> {
    self.create_aligned(parent, mem::size_of::<T>(), mem::align_of::<T>())
  }

  /// Like [`Tree::create`], with the payload aligned to `align`.
  ///
  /// Nothing is modified when this returns an error: the parent's children,
  /// the arena and the backend are left as they were.
  ///
  /// # Panics
  ///
  /// If `parent` is not a live handle of this tree, or `align` is not a power
  /// of two.
  #[track_caller]
  pub fn create_aligned(
    &mut self,
    parent: impl Into<Option<Handle>>,
    size: usize,
    align: usize,
  ) -> Result<Handle> {
    assert!(align.is_power_of_two(), "payload alignment {} is not a power of two", align);

    let parent = parent.into();

    if let Some(parent) = parent {
      let record = contract(self.parent_record_mut(parent));
      if record.children.try_reserve(1).is_err() {
        return Err(out_of_memory(Some(parent), size, "child list"));
      }
    }

    if self.free.is_empty()
      && (self.slots.len() >= u32::MAX as usize || self.slots.try_reserve(1).is_err())
    {
      return Err(out_of_memory(parent, size, "arena"));
    }

    let layout = match size {
      0 => None,
      _ if size > (isize::MAX as usize).saturating_sub(align) => {
        return Err(out_of_memory(parent, size, "layout"));
      }
      _ => match Layout::from_size_align(align_to!(size, align), align) {
        Ok(layout) => Some(layout),
        Err(_) => return Err(out_of_memory(parent, size, "layout")),
      },
    };

    let payload = match layout {
      None => dangling(align),
      Some(layout) => match NonNull::new(unsafe { self.backend.allocate(layout) }) {
        Some(payload) => payload,
        None => return Err(out_of_memory(parent, size, "backend")),
      },
    };

    let index = match self.free.pop() {
      Some(index) => index,
      None => {
        self.slots.push(Slot {
          generation: 0,
          record: None,
        });
        (self.slots.len() - 1) as u32
      }
    };

    let slot = &mut self.slots[index as usize];
    slot.record = Some(Record::new(size, layout, parent, payload));
    let handle = Handle::new(self.id, index, slot.generation);

    if let Some(parent) = parent {
      contract(self.parent_record_mut(parent)).children.push(handle);
    }

    self.live += 1;

    trace!("[tree] create({:?}, {}) -> {} at {:p}", parent, size, handle, payload);

    Ok(handle)
  }

  /// Frees `handle` and everything it owns.
  ///
  /// The record is first unlinked from its parent, so destroying a child
  /// leaves the parent intact. Descendants are released depth first, each one
  /// before the record that owns it. `None` is ignored.
  ///
  /// # Panics
  ///
  /// If `handle` is not a live handle of this tree.
  #[track_caller]
  pub fn destroy(
    &mut self,
    handle: impl Into<Option<Handle>>,
  ) {
    let Some(handle) = handle.into() else {
      return;
    };

    if let Some(parent) = contract(self.record(handle)).parent {
      let record = contract(self.parent_record_mut(parent));
      if !record.remove_child(handle) {
        contract::<()>(Err(Error::NotAChild {
          parent,
          child: handle,
        }));
      }
    }

    let mut released = 0usize;
    let mut stack = vec![handle];

    while let Some(&top) = stack.last() {
      let next = contract(self.record_mut(top)).children.pop();

      match next {
        Some(child) => stack.push(child),
        None => {
          stack.pop();
          self.release(top);
          released += 1;
        }
      }
    }

    debug!("[tree] destroy({}) released {} records", handle, released);
  }

  /// Moves `handle`, with its whole subtree, under `new_parent`.
  ///
  /// Returns the same handle. Moving a record under its current parent does
  /// nothing; `None` is passed through.
  ///
  /// ```rust
  /// use treealloc::Tree;
  ///
  /// let mut tree = Tree::new();
  /// let scratch = tree.create(None, 0).unwrap();
  /// let keep = tree.create(None, 0).unwrap();
  /// let result = tree.create(scratch, 32).unwrap();
  ///
  /// tree.reparent(keep, result);
  /// tree.destroy(scratch);
  ///
  /// assert!(tree.is_live(result));
  /// assert_eq!(tree.parent(result), Some(keep));
  /// ```
  ///
  /// # Panics
  ///
  /// If either handle is not live, if the record's parent does not list it as
  /// a child, or if `new_parent` is `handle` itself or one of its descendants.
  #[track_caller]
  pub fn reparent(
    &mut self,
    new_parent: Handle,
    handle: impl Into<Option<Handle>>,
  ) -> Option<Handle> {
    let handle = handle.into()?;

    let old_parent = contract(self.record(handle)).parent;
    contract(self.parent_record_mut(new_parent));

    if old_parent == Some(new_parent) {
      return Some(handle);
    }

    let mut ancestor = Some(new_parent);
    while let Some(current) = ancestor {
      if current == handle {
        contract::<()>(Err(Error::WouldCycle { new_parent, handle }));
      }
      ancestor = contract(self.record(current)).parent;
    }

    if let Some(old_parent) = old_parent {
      let record = contract(self.parent_record_mut(old_parent));
      if !record.remove_child(handle) {
        contract::<()>(Err(Error::NotAChild {
          parent: old_parent,
          child: handle,
        }));
      }
    }

    contract(self.record_mut(new_parent)).children.push(handle);
    contract(self.record_mut(handle)).parent = Some(new_parent);

    trace!("[tree] reparent({}, {}) from {:?}", new_parent, handle, old_parent);

    Some(handle)
  }

  pub fn is_live(
    &self,
    handle: Handle,
  ) -> bool {
    self.lookup(handle).is_some()
  }

  #[track_caller]
  pub fn size(
    &self,
    handle: Handle,
  ) -> usize {
    contract(self.record(handle)).size
  }

  #[track_caller]
  pub fn parent(
    &self,
    handle: Handle,
  ) -> Option<Handle> {
    contract(self.record(handle)).parent
  }

  /// Children of `handle` in the order they were attached.
  #[track_caller]
  pub fn children(
    &self,
    handle: Handle,
  ) -> &[Handle] {
    &contract(self.record(handle)).children
  }

  #[track_caller]
  pub fn payload(
    &self,
    handle: Handle,
  ) -> &[u8] {
    let record = contract(self.record(handle));
    unsafe { slice::from_raw_parts(record.payload.as_ptr(), record.size) }
  }

  #[track_caller]
  pub fn payload_mut(
    &mut self,
    handle: Handle,
  ) -> &mut [u8] {
    let record = contract(self.record(handle));
    unsafe { slice::from_raw_parts_mut(record.payload.as_ptr(), record.size) }
  }

  /// Raw address of the payload, valid until `handle` is destroyed.
  #[track_caller]
  pub fn as_ptr(
    &self,
    handle: Handle,
  ) -> *mut u8 {
    contract(self.record(handle)).payload.as_ptr()
  }

  #[track_caller]
  pub fn root_of(
    &self,
    handle: Handle,
  ) -> Handle {
    let mut current = handle;
    while let Some(parent) = contract(self.record(current)).parent {
      current = parent;
    }
    current
  }

  /// Number of records `handle` transitively owns, not counting itself.
  #[track_caller]
  pub fn descendants(
    &self,
    handle: Handle,
  ) -> usize {
    let mut count = 0;
    let mut pending = contract(self.record(handle)).children.clone();

    while let Some(next) = pending.pop() {
      count += 1;
      pending.extend_from_slice(&contract(self.record(next)).children);
    }

    count
  }

  pub fn roots(&self) -> impl Iterator<Item = Handle> + '_ {
    self.slots.iter().enumerate().filter_map(|(index, slot)| match &slot.record {
      Some(record) if record.parent.is_none() => Some(Handle::new(self.id, index as u32, slot.generation)),
      _ => None,
    })
  }

  pub fn len(&self) -> usize {
    self.live
  }

  pub fn is_empty(&self) -> bool {
    self.live == 0
  }

  pub fn stats(&self) -> TreeStats {
    let mut stats = TreeStats {
      slots: self.slots.len(),
      free_slots: self.free.len(),
      ..TreeStats::default()
    };

    for record in self.slots.iter().filter_map(|slot| slot.record.as_ref()) {
      stats.records += 1;
      stats.payload_bytes += record.size;
      if record.parent.is_none() {
        stats.roots += 1;
      }
    }

    stats
  }

  fn lookup(
    &self,
    handle: Handle,
  ) -> Option<&Record> {
    if handle.tree() != self.id {
      return None;
    }

    let slot = self.slots.get(handle.index() as usize)?;

    if slot.generation != handle.generation() {
      return None;
    }

    slot.record.as_ref().filter(|record| record.is_tagged())
  }

  fn lookup_mut(
    &mut self,
    handle: Handle,
  ) -> Option<&mut Record> {
    if handle.tree() != self.id {
      return None;
    }

    let slot = self.slots.get_mut(handle.index() as usize)?;

    if slot.generation != handle.generation() {
      return None;
    }

    slot.record.as_mut().filter(|record| record.is_tagged())
  }

  fn record(
    &self,
    handle: Handle,
  ) -> Result<&Record> {
    self.lookup(handle).ok_or(Error::InvalidHandle(handle))
  }

  fn record_mut(
    &mut self,
    handle: Handle,
  ) -> Result<&mut Record> {
    self.lookup_mut(handle).ok_or(Error::InvalidHandle(handle))
  }

  fn parent_record_mut(
    &mut self,
    parent: Handle,
  ) -> Result<&mut Record> {
    self.lookup_mut(parent).ok_or(Error::InvalidParent(parent))
  }

  /// Returns the payload to the backend and retires the slot's generation.
  fn release(
    &mut self,
    handle: Handle,
  ) {
    contract(self.record(handle));

    let slot = &mut self.slots[handle.index() as usize];
    let record = slot.record.take();
    slot.generation = slot.generation.wrapping_add(1);

    // A slot whose generation wrapped could hand out a handle equal to one
    // already released, so it is never reused.
    if slot.generation != 0 {
      self.free.push(handle.index());
    }

    self.live -= 1;

    if let Some(Record {
      layout: Some(layout),
      payload,
      ..
    }) = record
    {
      unsafe { self.backend.deallocate(payload.as_ptr(), layout) };
    }

    trace!("[tree] release({})", handle);
  }
}

fn out_of_memory(
  parent: Option<Handle>,
  size: usize,
  exhausted: &str,
) -> Error {
  warn!("[tree] create({:?}, {}) -> out of memory ({})", parent, size, exhausted);
  Error::OutOfMemory { size }
}

/// Non-null address for a zero-sized payload, aligned to `align`.
fn dangling(align: usize) -> NonNull<u8> {
  NonNull::new(ptr::without_provenance_mut(align)).unwrap_or(NonNull::dangling())
}

impl<A: RawAlloc> Drop for Tree<A> {
  fn drop(&mut self) {
    if self.live > 0 {
      debug!("[tree] dropping tree with {} live records", self.live);
    }

    for slot in self.slots.iter_mut() {
      if let Some(Record {
        layout: Some(layout),
        payload,
        ..
      }) = slot.record.take()
      {
        unsafe { self.backend.deallocate(payload.as_ptr(), layout) };
      }
    }
  }
}

impl<A: RawAlloc> fmt::Debug for Tree<A> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Tree")
      .field("id", &self.id)
      .field("live", &self.live)
      .field("slots", &self.slots.len())
      .field("free", &self.free.len())
      .field("config", &self.config)
      .finish()
  }
}
