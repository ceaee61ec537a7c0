#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Async, `no_std` driver core for the Imagis IST30xx family of capacitive
//! touchscreen controllers (IST30xx, IST3026C, IST3038 and relatives).
//!
//! The crate covers the part of a touch driver that is about the controller
//! rather than the operating system:
//!
//! - The register protocol: 32-bit addresses carrying direct, burst or
//!   hibernate-window access bits, big-endian words, chunked bursts
//! - The command vocabulary: start scan, hold, register access, noise mode,
//!   scan rates and calibration
//! - Turning interrupt packets into press, move and release events with
//!   checksum and sanity checks that drop a bad packet as a whole
//! - Recovery: bounded error and heartbeat counters escalating into a
//!   power-cycle reset, calibration supervision and stale contact release
//!
//! Chip generations differ only in word layout and limits, which live in a
//! [`Config`].
//!
//! ```no_run
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use embedded_hal::digital::OutputPin;
//! use embedded_hal_async::{delay::DelayNs, i2c::{I2c, SevenBitAddress}};
//! use ist30xx::{Config, Event, EventSink, Ist30xx, Layout, Panel};
//!
//! struct Input;
//! impl EventSink for Input {
//!   fn report(&mut self, event: Event) {
//!     let _ = event;
//!   }
//! }
//!
//! async fn example<I2C, PWR, DLY, E>(i2c: I2C, power: PWR, delay: DLY) -> Result<(), ist30xx::Error<E>>
//! where
//!   I2C: I2c<SevenBitAddress, Error = E>,
//!   PWR: OutputPin,
//!   DLY: DelayNs,
//! {
//!   let config = Config::new(Layout::IST30XXC, Panel::new(720, 1280).with_keys(2));
//!   let touch: Ist30xx<NoopRawMutex, _, _, _> = Ist30xx::new(i2c, power, delay, config);
//!   touch.initialize().await?;
//!
//!   // From the interrupt task:
//!   touch.handle_interrupt(0, &mut Input).await;
//!   // From a periodic timer:
//!   touch.watchdog(500, &mut Input).await;
//!   Ok(())
//! }
//! ```

#[macro_use]
mod fmt;

mod config;
mod control;
mod event;
mod irq;
#[cfg(test)]
mod mock;
mod recovery;
mod reg;
mod rw;
mod touchpad;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

pub use config::*;
pub use control::{CalibrationStatus, ChipInfo, NoiseMode};
pub use event::*;
pub use irq::{IrqOutcome, SelfTest};
pub use recovery::{PowerState, Status, WatchdogOutcome};
pub use reg::{Access, Addr};
pub use touchpad::{ContactTracker, TouchStats};

use irq::IrqState;
use recovery::Session;

/// Finger slots the driver can track.
pub const MAX_FINGERS: usize = 10;
/// Touch key slots the driver can track.
pub const MAX_KEYS: usize = 5;

/// Errors that can occur while interacting with the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
  /// I²C bus transaction failed with the underlying driver error.
  I2c(E),
  /// The power enable line could not be driven.
  Power,
  /// An interrupt packet failed validation.
  Decode(DecodeError),
  /// The IC reported an exception code.
  DeviceException(u8),
  /// Calibration finished without converging.
  Calibration(CalibrationStatus),
  /// No calibration result arrived in time.
  CalibrationTimeout,
  /// The device reported an unexpected chip identifier during bring-up.
  InvalidChipId(u32),
  /// The operation needs a device brought up with [`Ist30xx::initialize`].
  NotInitialized,
  /// The controller is suspended or shut down.
  PoweredOff,
  /// [`Config::validate`] rejected the configuration.
  InvalidConfig,
}

impl<E> From<DecodeError> for Error<E> {
  fn from(e: DecodeError) -> Self {
    Error::Decode(e)
  }
}

/// Everything that must only be touched under the session lock.
pub(crate) struct Device<I, P, D> {
  pub(crate) i2c: I,
  pub(crate) power: P,
  pub(crate) delay: D,
  pub(crate) config: Config,
  pub(crate) tracker: ContactTracker,
  pub(crate) session: Session,
  /// Skip the per-write settle delay, used for back-to-back start commands.
  pub(crate) ignore_delay: bool,
}

impl<I, P, D> Device<I, P, D> {
  pub(crate) fn new(i2c: I, power: P, delay: D, config: Config) -> Self {
    Self { i2c, power, delay, session: Session::new(&config), tracker: ContactTracker::new(), config, ignore_delay: false }
  }
}

/// One attached IST30xx controller.
///
/// All methods take `&self` so the session can be shared between the
/// interrupt task, a periodic watchdog task and whoever changes modes or runs
/// diagnostics. Register sequences are serialized by an async mutex; the
/// interrupt-enable flag is kept outside of it so a racing interrupt can bail
/// out without waiting for a reset to finish.
///
/// Timestamps are caller-provided milliseconds from any monotonic clock and
/// may wrap.
pub struct Ist30xx<M: RawMutex, I, P, D> {
  device: Mutex<M, Device<I, P, D>>,
  irq: IrqState,
}

impl<M: RawMutex, I, P, D> Ist30xx<M, I, P, D> {
  /// Create a session. Nothing is sent to the device until [`Ist30xx::initialize`].
  pub fn new(i2c: I, power: P, delay: D, config: Config) -> Self {
    Self { device: Mutex::new(Device::new(i2c, power, delay, config)), irq: IrqState::new() }
  }

  /// Consume the session and hand back the peripherals.
  pub fn release(self) -> (I, P, D) {
    let device = self.device.into_inner();
    (device.i2c, device.power, device.delay)
  }

  /// Whether interrupts are currently processed.
  pub fn irq_enabled(&self) -> bool {
    self.irq.is_enabled()
  }

  /// Timestamp of the last completed interrupt.
  pub fn last_event_ms(&self) -> u32 {
    self.irq.event_ms()
  }
}

impl<M, I, E, P, D> Ist30xx<M, I, P, D>
where
  M: RawMutex,
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  /// Read a word in direct register access mode.
  ///
  /// Scanning is held and interrupts are off for the duration. If the device
  /// cannot be taken out of register access again a reset is scheduled; it
  /// runs on the next interrupt, watchdog tick or [`Ist30xx::service`] call.
  pub async fn peek(&self, addr: Addr) -> Result<u32, Error<E>> {
    let mut word = [0u32; 1];
    self.peek_block(addr, &mut word).await?;
    Ok(word[0])
  }

  /// Write a word in direct register access mode. See [`Ist30xx::peek`].
  pub async fn poke(&self, addr: Addr, value: u32) -> Result<(), Error<E>> {
    self.poke_block(addr, &[value]).await
  }

  /// Burst read of consecutive words in direct register access mode.
  pub async fn peek_block(&self, addr: Addr, out: &mut [u32]) -> Result<(), Error<E>> {
    let mut dev = self.device.lock().await;
    dev.ensure_ready()?;
    self.irq.disable();
    let result = match dev.open_direct_access().await {
      Ok(()) => dev.burst_read(addr, out).await,
      Err(e) => Err(e),
    };
    self.leave_direct_access(&mut dev).await;
    result
  }

  /// Burst write of consecutive words in direct register access mode.
  pub async fn poke_block(&self, addr: Addr, values: &[u32]) -> Result<(), Error<E>> {
    let mut dev = self.device.lock().await;
    dev.ensure_ready()?;
    self.irq.disable();
    let result = match dev.open_direct_access().await {
      Ok(()) => dev.burst_write(addr, values).await,
      Err(e) => Err(e),
    };
    self.leave_direct_access(&mut dev).await;
    result
  }

  async fn leave_direct_access(&self, dev: &mut Device<I, P, D>) {
    if dev.close_direct_access().await.is_err() {
      error!("register access exit failed");
      dev.schedule_reset();
    }
    self.irq.enable();
  }
}
