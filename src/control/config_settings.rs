use bitfield_struct::bitfield;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::Command;
use crate::{Device, Error};

/// Runtime noise-handling flags pushed with `SetModeSpecial`.
///
/// The firmware only picks these up on (re)start, so changing one on a
/// running device goes through a reset.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoiseMode {
  /// Charger connected.
  pub charger: bool,
  /// Voice call in progress.
  pub call: bool,
  /// Flip cover closed.
  pub cover: bool,
  #[bits(5)]
  __: u8,
  /// Set while the host is awake.
  pub power: bool,
  #[bits(7)]
  ___: u8,
}

impl<I, E, P, D> Device<I, P, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  pub(crate) async fn configure_noise_mode(&mut self, mode: NoiseMode) -> Result<(), Error<E>> {
    debug!("noise mode {:#x}", mode.into_bits());
    self.write_cmd(Command::SetModeSpecial, mode.into_bits()).await
  }

  /// `None` leaves the firmware default in place.
  pub(crate) async fn set_report_rate(&mut self, rate: Option<u16>) -> Result<(), Error<E>> {
    match rate {
      Some(rate) => self.write_cmd(Command::SetTimeActive, rate).await,
      None => Ok(()),
    }
  }

  pub(crate) async fn set_idle_rate(&mut self, rate: Option<u16>) -> Result<(), Error<E>> {
    match rate {
      Some(rate) => self.write_cmd(Command::SetTimeIdle, rate).await,
      None => Ok(()),
    }
  }
}
