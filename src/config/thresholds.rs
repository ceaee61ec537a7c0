/// Retry and escalation limits of the recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Thresholds {
  /// Consecutive bad interrupts tolerated before the device is reset.
  pub max_irq_errors: u16,
  /// Consecutive stalled watchdog checks tolerated before the device is reset.
  pub max_scan_retry: u16,
  /// Largest calibration gap still accepted as converged.
  pub calib_gap_limit: u16,
  /// Calibration attempts before giving up.
  pub calib_retries: u8,
  /// Polls of the calibration result per attempt.
  pub calib_wait_steps: u16,
  /// Bus failures tolerated while issuing the calibration command.
  pub calib_bus_retries: u8,
}

impl Thresholds {
  pub const fn new() -> Self {
    Self {
      max_irq_errors: 100,
      max_scan_retry: 2,
      calib_gap_limit: 0x3FF,
      calib_retries: 2,
      calib_wait_steps: 50,
      calib_bus_retries: 10,
    }
  }

  pub const fn with_irq_errors(mut self, max: u16) -> Self {
    self.max_irq_errors = max;
    self
  }

  pub const fn with_scan_retry(mut self, max: u16) -> Self {
    self.max_scan_retry = max;
    self
  }

  pub const fn with_calibration(mut self, gap_limit: u16, retries: u8, wait_steps: u16) -> Self {
    self.calib_gap_limit = gap_limit;
    self.calib_retries = retries;
    self.calib_wait_steps = wait_steps;
    self
  }

  pub(crate) const fn is_valid(&self) -> bool {
    self.max_irq_errors > 0
      && self.max_scan_retry > 0
      && self.calib_retries > 0
      && self.calib_wait_steps > 0
      && self.calib_bus_retries > 0
  }
}

impl Default for Thresholds {
  fn default() -> Self {
    Self::new()
  }
}
