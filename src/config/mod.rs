mod layout;
mod panel;
mod thresholds;
mod timing;
mod transfer;

pub use layout::*;
pub use panel::*;
pub use thresholds::*;
pub use timing::*;
pub use transfer::*;

use crate::NoiseMode;

/// Complete driver configuration.
///
/// Chip differences live here instead of in the control flow: pick the
/// [`Layout`] of the attached generation, describe the panel and adjust the
/// recovery limits if the defaults do not suit the product.
///
/// # Example
/// ```no_run
/// use ist30xx::{Config, Layout, Panel, Thresholds};
///
/// let config = Config::default()
///   .with_layout(Layout::IST30XXC)
///   .with_panel(Panel::new(1080, 2400).with_fingers(10).with_keys(2))
///   .with_thresholds(Thresholds::new().with_scan_retry(3))
///   .with_report_rate(Some(8000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
  pub layout: Layout,
  pub panel: Panel,
  pub thresholds: Thresholds,
  pub timing: Timing,
  pub transfer: Transfer,
  /// Noise mode pushed to the IC on every (re)start.
  pub noise_mode: NoiseMode,
  /// Active scan period in microseconds. `None` keeps the firmware default.
  pub report_rate: Option<u16>,
  /// Idle scan period in microseconds. `None` keeps the firmware default.
  pub idle_rate: Option<u16>,
  /// Chip id expected at bring-up. `None` accepts any.
  pub chip_id: Option<u32>,
}

impl Config {
  pub const fn new(layout: Layout, panel: Panel) -> Self {
    Self {
      layout,
      panel,
      thresholds: Thresholds::new(),
      timing: Timing::new(),
      transfer: Transfer::new(),
      noise_mode: NoiseMode::new(),
      report_rate: None,
      idle_rate: None,
      chip_id: None,
    }
  }

  pub const fn with_layout(mut self, layout: Layout) -> Self {
    self.layout = layout;
    self
  }

  pub const fn with_panel(mut self, panel: Panel) -> Self {
    self.panel = panel;
    self
  }

  pub const fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
    self.thresholds = thresholds;
    self
  }

  pub const fn with_timing(mut self, timing: Timing) -> Self {
    self.timing = timing;
    self
  }

  pub const fn with_transfer(mut self, transfer: Transfer) -> Self {
    self.transfer = transfer;
    self
  }

  pub const fn with_noise_mode(mut self, noise_mode: NoiseMode) -> Self {
    self.noise_mode = noise_mode;
    self
  }

  pub const fn with_report_rate(mut self, rate: Option<u16>) -> Self {
    self.report_rate = rate;
    self
  }

  pub const fn with_idle_rate(mut self, rate: Option<u16>) -> Self {
    self.idle_rate = rate;
    self
  }

  pub const fn with_chip_id(mut self, chip_id: u32) -> Self {
    self.chip_id = Some(chip_id);
    self
  }

  /// Returns `true` when every limit is usable by the driver.
  pub const fn validate(&self) -> bool {
    self.panel.is_valid() && self.thresholds.is_valid() && self.transfer.max_transfer_words > 0
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new(Layout::IST30XXC, Panel::default())
  }
}
