//! NUL-terminated strings allocated inside a [`Tree`].

use std::{
  ffi::CStr,
  fmt::{self, Write},
};

use log::warn;

use crate::{
  backend::RawAlloc,
  error::{Error, Result},
  record::Handle,
  tree::Tree,
};

/// Copies `bytes` into a new allocation under `parent`, followed by a NUL.
///
/// ```rust
/// use treealloc::{Tree, strndup};
///
/// let mut tree = Tree::new();
/// let root = tree.create(None, 0).unwrap();
/// let copy = strndup(&mut tree, root, b"abc").unwrap();
///
/// assert_eq!(tree.payload(copy), b"abc\0");
/// ```
#[track_caller]
pub fn strndup<A: RawAlloc>(
  tree: &mut Tree<A>,
  parent: impl Into<Option<Handle>>,
  bytes: &[u8],
) -> Result<Handle> {
  let handle = tree.create(parent, bytes.len() + 1)?;
  tree.payload_mut(handle)[..bytes.len()].copy_from_slice(bytes);

  Ok(handle)
}

#[track_caller]
pub fn strdup<A: RawAlloc>(
  tree: &mut Tree<A>,
  parent: impl Into<Option<Handle>>,
  text: &str,
) -> Result<Handle> {
  strndup(tree, parent, text.as_bytes())
}

/// Formats `args` into an allocation sized exactly for the text and its NUL.
///
/// Runs the formatter twice: once to measure, once to write. A formatting
/// trait implementation that reports an error in either pass yields
/// [`Error::Format`] and leaves nothing allocated. Most callers want the
/// [`tree_format!`](crate::tree_format) macro instead.
#[track_caller]
pub fn format<A: RawAlloc>(
  tree: &mut Tree<A>,
  parent: impl Into<Option<Handle>>,
  args: fmt::Arguments<'_>,
) -> Result<Handle> {
  let parent = parent.into();
  let mut measure = Measure(0);

  if measure.write_fmt(args).is_err() {
    warn!("[tree] format({:?}) -> formatter failed while measuring", parent);
    return Err(Error::Format);
  }

  let handle = tree.create(parent, measure.0 + 1)?;

  let mut cursor = Cursor {
    buffer: tree.payload_mut(handle),
    written: 0,
  };

  if cursor.write_fmt(args).is_err() {
    warn!("[tree] format({}) -> formatter failed while writing", handle);
    tree.destroy(handle);
    return Err(Error::Format);
  }

  Ok(handle)
}

/// Allocates a formatted, NUL-terminated string in a tree.
///
/// ```rust
/// use treealloc::{Tree, tree_format};
///
/// let mut tree = Tree::new();
/// let root = tree.create(None, 0).unwrap();
/// let text = tree_format!(tree, root, "{}{}{}", 3, 2, 1).unwrap();
///
/// assert_eq!(tree.as_str(text), Some("321"));
/// assert_eq!(tree.size(text), 4);
/// ```
#[macro_export]
macro_rules! tree_format {
  ($tree:expr, $parent:expr, $($arg:tt)*) => {
    $crate::format(&mut $tree, $parent, ::core::format_args!($($arg)*))
  };
}

struct Measure(usize);

impl Write for Measure {
  fn write_str(
    &mut self,
    s: &str,
  ) -> fmt::Result {
    self.0 += s.len();
    Ok(())
  }
}

/// Writes into a payload, always leaving the final byte for the terminator.
struct Cursor<'a> {
  buffer: &'a mut [u8],
  written: usize,
}

impl Write for Cursor<'_> {
  fn write_str(
    &mut self,
    s: &str,
  ) -> fmt::Result {
    let end = self.written + s.len();

    if end >= self.buffer.len() {
      return Err(fmt::Error);
    }

    self.buffer[self.written..end].copy_from_slice(s.as_bytes());
    self.written = end;

    Ok(())
  }
}

impl<A: RawAlloc> Tree<A> {
  /// Reads a payload up to its first NUL.
  ///
  /// # Panics
  ///
  /// If `handle` is stale or the payload contains no NUL.
  #[track_caller]
  pub fn c_str(
    &self,
    handle: Handle,
  ) -> &CStr {
    match CStr::from_bytes_until_nul(self.payload(handle)) {
      Ok(text) => text,
      Err(_) => panic!("payload of {} is not NUL-terminated", handle),
    }
  }

  /// The payload as UTF-8 text up to its first NUL, if it is both.
  #[track_caller]
  pub fn as_str(
    &self,
    handle: Handle,
  ) -> Option<&str> {
    let payload = self.payload(handle);
    let nul = payload.iter().position(|b| *b == 0)?;

    std::str::from_utf8(&payload[..nul]).ok()
  }
}
