//! Detecting a desynchronized controller and bringing it back.
//!
//! Interrupts alone cannot reveal a controller that silently stopped
//! scanning, so a periodic [`Ist30xx::watchdog`] polls the heartbeat word and
//! supervises calibration. Both paths, and the interrupt path, feed bounded
//! counters; reaching a limit runs the reset sequence:
//!
//! 1. interrupts off
//! 2. every pressed contact released
//! 3. power off, then on, with the configured settle delays
//! 4. noise mode, scan rates and start scan
//! 5. interrupts back on
//!
//! A reset never fails outward. Errors along the way are logged and the next
//! watchdog tick retries.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::irq::IrqState;
use crate::reg::HIB_TOUCH_STATUS;
use crate::{CalibrationStatus, ChipInfo, Config, Device, Error, EventSink, Ist30xx, NoiseMode, TouchStatus};

/// Consecutive-failure counter with a firing threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct ErrorCounter {
  count: u16,
  limit: u16,
}

impl ErrorCounter {
  pub(crate) const fn new(limit: u16) -> Self {
    Self { count: 0, limit }
  }

  /// Count one failure. Returns `true` when the limit is reached, which also
  /// starts the count over.
  pub(crate) fn bump(&mut self) -> bool {
    self.count = self.count.saturating_add(1);
    if self.count >= self.limit {
      self.count = 0;
      return true;
    }
    false
  }

  pub(crate) fn clear(&mut self) {
    self.count = 0;
  }

  pub(crate) const fn count(&self) -> u16 {
    self.count
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
  Off,
  On,
}

/// Session bookkeeping guarded by the device lock.
#[derive(Debug, Clone)]
pub(crate) struct Session {
  pub(crate) power: PowerState,
  pub(crate) initialized: bool,
  pub(crate) noise_mode: NoiseMode,
  /// Start time of a watchdog-supervised calibration.
  pub(crate) calibrating: Option<u32>,
  pub(crate) calib_msg: Option<u32>,
  pub(crate) miscalib_msg: Option<u32>,
  pub(crate) self_test_msg: Option<u32>,
  pub(crate) reset_pending: bool,
  /// Heartbeat scan counter seen on the last watchdog tick.
  pub(crate) scan_count: Option<u16>,
  pub(crate) irq_errors: ErrorCounter,
  pub(crate) scan_retry: ErrorCounter,
  pub(crate) resets: u32,
}

impl Session {
  pub(crate) const fn new(config: &Config) -> Self {
    Self {
      power: PowerState::Off,
      initialized: false,
      noise_mode: config.noise_mode,
      calibrating: None,
      calib_msg: None,
      miscalib_msg: None,
      self_test_msg: None,
      reset_pending: false,
      scan_count: None,
      irq_errors: ErrorCounter::new(config.thresholds.max_irq_errors),
      scan_retry: ErrorCounter::new(config.thresholds.max_scan_retry),
      resets: 0,
    }
  }
}

/// Snapshot of the session, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
  pub power: PowerState,
  pub initialized: bool,
  pub irq_enabled: bool,
  pub calibrating: bool,
  pub calib_msg: Option<u32>,
  /// Last miscalibration check message.
  pub miscalib_msg: Option<u32>,
  /// Last self-test notification.
  pub self_test_msg: Option<u32>,
  pub noise_mode: NoiseMode,
  pub irq_errors: u16,
  pub scan_retry: u16,
  pub reset_pending: bool,
  /// Resets performed since the session was created.
  pub resets: u32,
  /// Fingers currently reported as down.
  pub pressed: usize,
}

/// What a watchdog tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WatchdogOutcome {
  /// Interrupt in flight, device down or interrupts disabled.
  Skipped,
  /// An interrupt arrived recently enough.
  Quiet,
  /// Calibration still running.
  Calibrating,
  /// Heartbeat advanced.
  Alive,
  /// Heartbeat stuck or unreadable, below the retry limit.
  Stalled,
  /// The controller reports no finger while contacts were still pressed.
  Released(usize),
  /// A reset was performed.
  Reset,
}

impl<I, E, P, D> Device<I, P, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  pub(crate) fn ensure_ready(&self) -> Result<(), Error<E>> {
    if !self.session.initialized {
      return Err(Error::NotInitialized);
    }
    if self.session.power == PowerState::Off {
      return Err(Error::PoweredOff);
    }
    Ok(())
  }

  /// Request a reset. Ignored until the device has been brought up.
  pub(crate) fn schedule_reset(&mut self) {
    if self.session.initialized && self.session.power == PowerState::On {
      self.session.reset_pending = true;
    }
  }

  pub(crate) async fn power_on(&mut self) -> Result<(), Error<E>> {
    self.power.set_high().map_err(|_| Error::Power)?;
    self.session.power = PowerState::On;
    self.delay.delay_ms(self.config.timing.power_on_ms).await;
    Ok(())
  }

  pub(crate) async fn power_off(&mut self) -> Result<(), Error<E>> {
    self.power.set_low().map_err(|_| Error::Power)?;
    self.session.power = PowerState::Off;
    self.delay.delay_ms(self.config.timing.power_off_ms).await;
    Ok(())
  }

  /// Push the runtime configuration and arm scanning.
  pub(crate) async fn start(&mut self) -> Result<(), Error<E>> {
    self.ignore_delay = true;
    let result = self.start_sequence().await;
    self.ignore_delay = false;
    self.session.irq_errors.clear();
    self.session.scan_retry.clear();
    self.session.scan_count = None;
    result
  }

  async fn start_sequence(&mut self) -> Result<(), Error<E>> {
    self.configure_noise_mode(self.session.noise_mode).await?;
    self.set_report_rate(self.config.report_rate).await?;
    self.set_idle_rate(self.config.idle_rate).await?;
    self.start_scan().await
  }

  /// The full reset sequence. Runs to the end whatever fails on the way.
  pub(crate) async fn reset<S: EventSink>(&mut self, irq: &IrqState, sink: &mut S) {
    info!("resetting controller");
    self.session.reset_pending = false;
    self.session.calibrating = None;
    irq.disable();
    self.tracker.clear_all(sink);

    if self.power_off().await.is_err() {
      error!("power off failed");
    }
    if self.power_on().await.is_err() {
      error!("power on failed");
    }
    if self.start().await.is_err() {
      error!("restart after reset failed");
    }

    irq.enable();
    self.delay.delay_ms(self.config.timing.irq_enable_ms).await;
    self.session.resets = self.session.resets.wrapping_add(1);
  }

  async fn service<S: EventSink>(&mut self, irq: &IrqState, sink: &mut S) -> bool {
    if !self.session.reset_pending {
      return false;
    }
    self.reset(irq, sink).await;
    true
  }

  async fn heartbeat<S: EventSink>(&mut self, sink: &mut S) -> WatchdogOutcome {
    let status = match self.read(HIB_TOUCH_STATUS).await {
      Ok(raw) => TouchStatus::from_bits(raw),
      Err(_) => TouchStatus::new(),
    };

    // stale contacts go even while the scan counter is stuck
    let mut released = 0;
    if status.is_valid() && !status.finger_enable() && self.tracker.any_pressed() {
      released = self.tracker.clear_all(sink);
    }

    if !status.is_valid() || self.session.scan_count == Some(status.scan_count()) {
      warn!("heartbeat stalled ({:#x})", status.into_bits());
      if self.session.scan_retry.bump() {
        error!("scan counter stuck, resetting");
        self.schedule_reset();
        return WatchdogOutcome::Reset;
      }
      if released > 0 {
        return WatchdogOutcome::Released(released);
      }
      return WatchdogOutcome::Stalled;
    }

    self.session.scan_count = Some(status.scan_count());
    self.session.scan_retry.clear();

    if released > 0 {
      return WatchdogOutcome::Released(released);
    }
    WatchdogOutcome::Alive
  }

  fn status(&self, irq: &IrqState) -> Status {
    Status {
      power: self.session.power,
      initialized: self.session.initialized,
      irq_enabled: irq.is_enabled(),
      calibrating: self.session.calibrating.is_some(),
      calib_msg: self.session.calib_msg,
      miscalib_msg: self.session.miscalib_msg,
      self_test_msg: self.session.self_test_msg,
      noise_mode: self.session.noise_mode,
      irq_errors: self.session.irq_errors.count(),
      scan_retry: self.session.scan_retry.count(),
      reset_pending: self.session.reset_pending,
      resets: self.session.resets,
      pressed: self.tracker.pressed_count(),
    }
  }
}

impl<M, I, E, P, D> Ist30xx<M, I, P, D>
where
  M: RawMutex,
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  /// Power the controller up, check its identity and start scanning.
  pub async fn initialize(&self) -> Result<ChipInfo, Error<E>> {
    let mut dev = self.device.lock().await;
    if !dev.config.validate() {
      return Err(Error::InvalidConfig);
    }
    self.irq.disable();
    dev.power_on().await?;

    let info = dev.chip_info().await?;
    if let Some(expected) = dev.config.chip_id {
      if info.chip_id != expected {
        error!("unexpected chip id {:#x}", info.chip_id);
        dev.power_off().await?;
        return Err(Error::InvalidChipId(info.chip_id));
      }
    }
    info!("chip {:#x} fw {:#x}", info.chip_id, info.fw_version);

    dev.session.noise_mode.set_power(true);
    dev.start().await?;
    dev.session.initialized = true;
    self.irq.enable();
    let settle = dev.config.timing.irq_enable_ms;
    dev.delay.delay_ms(settle).await;
    Ok(info)
  }

  /// Run the reset sequence now. The controller must have been brought up
  /// with [`Ist30xx::initialize`] first.
  pub async fn reset<S: EventSink>(&self, sink: &mut S) -> Result<(), Error<E>> {
    let mut dev = self.device.lock().await;
    if !dev.session.initialized {
      return Err(Error::NotInitialized);
    }
    dev.reset(&self.irq, sink).await;
    Ok(())
  }

  /// Run a reset scheduled earlier. Returns `true` if one ran.
  pub async fn service<S: EventSink>(&self, sink: &mut S) -> bool {
    let mut dev = self.device.lock().await;
    dev.service(&self.irq, sink).await
  }

  /// Periodic liveness check. Call every few hundred milliseconds.
  pub async fn watchdog<S: EventSink>(&self, now_ms: u32, sink: &mut S) -> WatchdogOutcome {
    if self.irq.is_working() {
      return WatchdogOutcome::Skipped;
    }
    let mut dev = self.device.lock().await;
    if dev.service(&self.irq, sink).await {
      return WatchdogOutcome::Reset;
    }
    if !dev.session.initialized || dev.session.power == PowerState::Off {
      return WatchdogOutcome::Skipped;
    }

    if let Some(started) = dev.session.calibrating {
      let timed_out = now_ms.wrapping_sub(started) >= dev.config.timing.calib_timeout_ms;
      if dev.session.calib_msg.is_none() && !timed_out {
        return WatchdogOutcome::Calibrating;
      }
      if timed_out {
        warn!("calibration timed out");
      }
      dev.session.calibrating = None;
      dev.schedule_reset();
      dev.service(&self.irq, sink).await;
      return WatchdogOutcome::Reset;
    }

    if !self.irq.is_enabled() {
      return WatchdogOutcome::Skipped;
    }
    if now_ms.wrapping_sub(self.irq.event_ms()) <= dev.config.timing.watchdog_quiet_ms {
      return WatchdogOutcome::Quiet;
    }

    let outcome = dev.heartbeat(sink).await;
    dev.service(&self.irq, sink).await;
    outcome
  }

  /// Charger connected or removed.
  pub async fn set_charger_mode<S: EventSink>(&self, on: bool, sink: &mut S) {
    self.update_noise_mode(|m| m.with_charger(on), sink).await
  }

  /// Voice call started or ended.
  pub async fn set_call_mode<S: EventSink>(&self, on: bool, sink: &mut S) {
    self.update_noise_mode(|m| m.with_call(on), sink).await
  }

  /// Flip cover closed or opened.
  pub async fn set_cover_mode<S: EventSink>(&self, on: bool, sink: &mut S) {
    self.update_noise_mode(|m| m.with_cover(on), sink).await
  }

  async fn update_noise_mode<F, S>(&self, f: F, sink: &mut S)
  where
    F: FnOnce(NoiseMode) -> NoiseMode,
    S: EventSink,
  {
    let mut dev = self.device.lock().await;
    let mode = f(dev.session.noise_mode);
    if mode == dev.session.noise_mode {
      return;
    }
    debug!("noise mode {:#x} -> {:#x}", dev.session.noise_mode.into_bits(), mode.into_bits());
    dev.session.noise_mode = mode;
    dev.schedule_reset();
    dev.service(&self.irq, sink).await;
  }

  /// Start calibration and return. The watchdog restarts the controller once
  /// the result message arrives or `calib_timeout_ms` passes.
  pub async fn request_calibration(&self, now_ms: u32) -> Result<(), Error<E>> {
    let mut dev = self.device.lock().await;
    dev.ensure_ready()?;
    dev.session.calib_msg = None;
    dev.issue_calibration().await?;
    dev.session.calibrating = Some(now_ms);
    Ok(())
  }

  /// Calibrate and wait for the outcome, making up to `calib_retries` attempts.
  ///
  /// Interrupts stay off while waiting. Each attempt starts from a cleared
  /// result register, failed attempts are followed by a reset, and the
  /// controller is reset once more at the end whatever the result.
  pub async fn calibrate<S: EventSink>(&self, sink: &mut S) -> Result<CalibrationStatus, Error<E>> {
    let mut dev = self.device.lock().await;
    dev.ensure_ready()?;
    let attempts = dev.config.thresholds.calib_retries.max(1);
    let mut attempt = 1;
    let result = loop {
      self.irq.disable();
      match dev.calibration_attempt().await {
        Ok(status) => break Ok(status),
        Err(e) if attempt >= attempts => break Err(e),
        Err(_) => {
          warn!("calibration attempt {} failed", attempt);
          dev.reset(&self.irq, sink).await;
          attempt += 1;
        }
      }
    };
    dev.reset(&self.irq, sink).await;
    result
  }

  /// Release every contact, stop interrupts and cut power.
  pub async fn suspend<S: EventSink>(&self, sink: &mut S) -> Result<(), Error<E>> {
    let mut dev = self.device.lock().await;
    self.irq.disable();
    dev.tracker.clear_all(sink);
    dev.session.reset_pending = false;
    dev.session.noise_mode.set_power(false);
    dev.power_off().await
  }

  /// Power back up through the reset sequence.
  pub async fn resume<S: EventSink>(&self, sink: &mut S) -> Result<(), Error<E>> {
    let mut dev = self.device.lock().await;
    if !dev.session.initialized {
      return Err(Error::NotInitialized);
    }
    dev.session.noise_mode.set_power(true);
    dev.reset(&self.irq, sink).await;
    match dev.session.power {
      PowerState::On => Ok(()),
      PowerState::Off => Err(Error::Power),
    }
  }

  /// Stop interrupts and cut power for good. [`Ist30xx::initialize`] starts over.
  pub async fn shutdown(&self) -> Result<(), Error<E>> {
    let mut dev = self.device.lock().await;
    self.irq.disable();
    dev.session.initialized = false;
    dev.session.reset_pending = false;
    dev.session.calibrating = None;
    dev.power_off().await
  }

  pub async fn status(&self) -> Status {
    self.device.lock().await.status(&self.irq)
  }

  /// Lifetime touch counters.
  pub async fn touch_stats(&self) -> crate::TouchStats {
    self.device.lock().await.tracker.stats()
  }
}
