//! # treealloc - A Hierarchical Memory Allocator
//!
//! This crate provides a **hierarchical** (ownership tree) allocator: every
//! allocation may name a parent allocation, and freeing a node frees its whole
//! subtree with it.
//!
//! ## Overview
//!
//! ```text
//!   Ownership Forest:
//!
//!        ┌──────────┐                 ┌──────────┐
//!        │  root A  │                 │  root B  │
//!        └────┬─────┘                 └────┬─────┘
//!        ┌────┴─────┐                      │
//!        ▼          ▼                      ▼
//!   ┌─────────┐ ┌─────────┐           ┌─────────┐
//!   │ child 1 │ │ child 2 │           │ child 3 │
//!   └────┬────┘ └─────────┘           └─────────┘
//!        ▼
//!   ┌─────────┐
//!   │ string  │   destroy(root A) releases root A,
//!   └─────────┘   child 1, child 2 and string.
//! ```
//!
//! An allocation can also be **stolen**: moved, with everything it owns, under
//! another parent. A result computed under a short-lived scratch allocation can
//! be kept that way without copying it.
//!
//! ## Crate Structure
//!
//! ```text
//!   treealloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── backend    - RawAlloc trait, libc System heap, Counting wrapper
//!   ├── config     - Tree configuration
//!   ├── error      - Error type
//!   ├── record     - Handle and per-allocation record (internal)
//!   ├── strings    - strdup / strndup / format helpers
//!   └── tree       - Tree: create, destroy, reparent
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use treealloc::{Tree, strdup};
//!
//! let mut tree = Tree::new();
//!
//! let scratch = tree.create(None, 64).unwrap();
//! let keep = tree.create(None, 0).unwrap();
//!
//! let name = strdup(&mut tree, scratch, "result").unwrap();
//! tree.reparent(keep, name);
//!
//! // Frees the 64 byte scratch buffer, but not the stolen string.
//! tree.destroy(scratch);
//! assert_eq!(tree.as_str(name), Some("result"));
//!
//! tree.destroy(keep);
//! assert!(tree.is_empty());
//! ```
//!
//! ## How It Works
//!
//! Records live in an arena owned by the [`Tree`]. A [`Handle`] is the tree's
//! id, a slot index and the slot's generation, so a handle that outlived its
//! allocation, or belongs to another tree, is detected instead of silently
//! aliasing a record it does not name:
//!
//! ```text
//!   Arena:
//!
//!   slot     0          1          2          3
//!        ┌────────┬──────────┬──────────┬──────────┐
//!   gen  │   0    │    2     │    0     │    1     │
//!        ├────────┼──────────┼──────────┼──────────┤
//!        │ Record │  (free)  │ Record   │ Record   │
//!        └───┬────┴──────────┴───┬──────┴──────────┘
//!            │                   │
//!            │  children: [#2v0] │  parent: Some(#0v0)
//!            └───────────────────┘
//!
//!   #1v1 was destroyed: slot 1 is now at generation 2, so any copy of the
//!   old handle is rejected.
//! ```
//!
//! Payload bytes come from a [`RawAlloc`] backend, by default the C heap via
//! `libc`. Each payload is zero filled and rounded up with [`align_to!`].
//!
//! ## Errors
//!
//! Running out of memory is handed back to the caller as
//! [`Error::OutOfMemory`] and leaves the tree exactly as it was; a failing
//! `Display` impl inside [`format()`] is reported as [`Error::Format`]. Passing a
//! destroyed handle, or one made by another `Tree`, is a bug in the caller:
//! the tree logs it and panics with the matching [`Error`] message.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: a `Tree` is neither `Send` nor `Sync`
//! - **No reference counting**: every record has exactly one owner
//! - **Unix-only**: the default backend requires `libc`

pub mod align;
mod backend;
mod config;
mod error;
mod record;
mod strings;
mod tree;

pub use backend::{AllocStats, Counting, RawAlloc, System};
pub use config::Config;
pub use error::{Error, Result};
pub use record::Handle;
pub use strings::{format, strdup, strndup};
pub use tree::{Tree, TreeStats};
