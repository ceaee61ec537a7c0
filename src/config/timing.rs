/// Hardware-mandated waits, in milliseconds.
///
/// These are deliberate blocking waits. Shortening them makes the controller
/// miss commands or come out of power-up half initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
  /// Settle time after a single register write before it takes effect.
  pub write_settle_ms: u32,
  /// Wait after cutting power.
  pub power_off_ms: u32,
  /// Wait after applying power before the first transaction.
  pub power_on_ms: u32,
  /// Wait after re-arming the interrupt line.
  pub irq_enable_ms: u32,
  /// Quiet period after the last interrupt before the watchdog polls the IC.
  pub watchdog_quiet_ms: u32,
  /// Calibration supervised by the watchdog is abandoned after this long.
  pub calib_timeout_ms: u32,
  /// Poll step of the blocking calibration wait.
  pub calib_poll_ms: u32,
}

impl Timing {
  pub const fn new() -> Self {
    Self {
      write_settle_ms: 40,
      power_off_ms: 50,
      power_on_ms: 100,
      irq_enable_ms: 10,
      watchdog_quiet_ms: 100,
      calib_timeout_ms: 3000,
      calib_poll_ms: 100,
    }
  }

  pub const fn with_write_settle(mut self, ms: u32) -> Self {
    self.write_settle_ms = ms;
    self
  }

  pub const fn with_power_cycle(mut self, off_ms: u32, on_ms: u32) -> Self {
    self.power_off_ms = off_ms;
    self.power_on_ms = on_ms;
    self
  }

  pub const fn with_calibration(mut self, timeout_ms: u32, poll_ms: u32) -> Self {
    self.calib_timeout_ms = timeout_ms;
    self.calib_poll_ms = poll_ms;
    self
  }
}

impl Default for Timing {
  fn default() -> Self {
    Self::new()
  }
}
