use thiserror::Error;

use crate::record::Handle;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the ownership tree.
///
/// Only [`Error::OutOfMemory`] and [`Error::Format`] are ever returned to a
/// caller. The remaining variants describe broken caller contracts; the tree
/// panics with their message as soon as it detects one, because carrying on
/// with a damaged forest ends in a double free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
  #[error("out of memory allocating {size} payload bytes")]
  OutOfMemory { size: usize },

  #[error("a formatting trait implementation returned an error")]
  Format,

  #[error("invalid handle {0}: freed, stale or foreign")]
  InvalidHandle(Handle),

  #[error("invalid parent {0}: freed, stale or foreign")]
  InvalidParent(Handle),

  #[error("record {child} claims parent {parent}, which does not list it as a child")]
  NotAChild { parent: Handle, child: Handle },

  #[error("cannot move {handle} under {new_parent}: it is {handle} or one of its descendants")]
  WouldCycle { new_parent: Handle, handle: Handle },
}

impl Error {
  pub fn is_contract_violation(&self) -> bool {
    !matches!(self, Error::OutOfMemory { .. } | Error::Format)
  }
}

/// Unwraps a contract check, aborting the current operation loudly on failure.
#[track_caller]
pub(crate) fn contract<T>(result: Result<T>) -> T {
  match result {
    Ok(value) => value,
    Err(err) => {
      log::error!("[tree] contract violation: {}", err);
      panic!("{}", err);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_oom_is_recoverable() {
    let handle = Handle::new(0, 3, 1);

    assert!(!Error::OutOfMemory { size: 8 }.is_contract_violation());
    assert!(!Error::Format.is_contract_violation());
    assert!(Error::InvalidHandle(handle).is_contract_violation());
    assert!(Error::InvalidParent(handle).is_contract_violation());
  }

  #[test]
  fn test_messages_name_the_handles() {
    let err = Error::NotAChild {
      parent: Handle::new(0, 1, 0),
      child: Handle::new(0, 2, 4),
    };

    assert_eq!(
      err.to_string(),
      "record #2v4 claims parent #1v0, which does not list it as a child"
    );
  }

  #[test]
  #[should_panic(expected = "invalid handle #7v2")]
  fn test_contract_panics_with_message() {
    contract::<()>(Err(Error::InvalidHandle(Handle::new(0, 7, 2))));
  }
}
