/// Bus parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transfer {
  /// 7-bit I²C address of the controller.
  pub i2c_addr: u8,
  /// Largest number of words moved in one bus transaction.
  pub max_transfer_words: usize,
  /// Read coordinate words in one burst. When off they are fetched one at a time.
  pub burst: bool,
}

impl Transfer {
  pub const fn new() -> Self {
    Self { i2c_addr: 0x50, max_transfer_words: 64, burst: true }
  }

  pub const fn with_address(mut self, i2c_addr: u8) -> Self {
    self.i2c_addr = i2c_addr;
    self
  }

  pub const fn with_max_transfer_words(mut self, words: usize) -> Self {
    self.max_transfer_words = words;
    self
  }

  pub const fn without_burst(mut self) -> Self {
    self.burst = false;
    self
  }
}

impl Default for Transfer {
  fn default() -> Self {
    Self::new()
  }
}
