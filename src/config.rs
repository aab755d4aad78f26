use std::mem;

/// Tuning knobs for a [`Tree`](crate::Tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Arena slots reserved up front.
  pub slot_capacity: usize,
  /// Alignment of payloads created without an explicit one. Power of two.
  pub payload_align: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      slot_capacity: 0,
      payload_align: mem::size_of::<usize>(),
    }
  }
}

impl Config {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn slot_capacity(
    mut self,
    slots: usize,
  ) -> Self {
    self.slot_capacity = slots;
    self
  }

  /// # Panics
  ///
  /// If `align` is not a power of two.
  pub fn payload_align(
    mut self,
    align: usize,
  ) -> Self {
    assert!(align.is_power_of_two(), "payload alignment {} is not a power of two", align);
    self.payload_align = align;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_aligns_to_words() {
    let config = Config::default();

    assert_eq!(config.payload_align, mem::size_of::<usize>());
    assert_eq!(config.slot_capacity, 0);
  }

  #[test]
  fn test_builder_setters() {
    let config = Config::new().slot_capacity(64).payload_align(32);

    assert_eq!(config.slot_capacity, 64);
    assert_eq!(config.payload_align, 32);
  }

  #[test]
  #[should_panic(expected = "not a power of two")]
  fn test_rejects_odd_alignment() {
    Config::new().payload_align(12);
  }
}
