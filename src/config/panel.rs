use crate::{MAX_FINGERS, MAX_KEYS};

/// Panel geometry and contact capability of the attached controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Panel {
  /// Exclusive upper bound for reported X coordinates.
  pub max_x: u16,
  /// Exclusive upper bound for reported Y coordinates.
  pub max_y: u16,
  pub max_fingers: u8,
  pub max_keys: u8,
}

impl Panel {
  pub const fn new(max_x: u16, max_y: u16) -> Self {
    Self { max_x, max_y, max_fingers: MAX_FINGERS as u8, max_keys: 0 }
  }

  pub const fn with_fingers(mut self, max_fingers: u8) -> Self {
    self.max_fingers = max_fingers;
    self
  }

  pub const fn with_keys(mut self, max_keys: u8) -> Self {
    self.max_keys = max_keys;
    self
  }

  pub(crate) const fn is_valid(&self) -> bool {
    self.max_x > 0
      && self.max_y > 0
      && self.max_fingers > 0
      && self.max_fingers as usize <= MAX_FINGERS
      && self.max_keys as usize <= MAX_KEYS
  }
}

impl Default for Panel {
  fn default() -> Self {
    Self::new(720, 1280)
  }
}
