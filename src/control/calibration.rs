use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::Command;
use crate::reg::{CALIB_MSG_MASK, CALIB_MSG_VALID, HIB_CALIB_RESULT};
use crate::{Device, Error};

/// Decoded calibration result message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationStatus {
  /// Spread between the recalibrated baselines.
  pub gap: u16,
  /// Firmware status code, zero on success.
  pub status: u8,
}

impl CalibrationStatus {
  /// Whether `raw` carries the calibration message marker.
  pub const fn is_message(raw: u32) -> bool {
    raw & CALIB_MSG_MASK == CALIB_MSG_VALID
  }

  pub const fn decode(raw: u32) -> Option<Self> {
    if !Self::is_message(raw) {
      return None;
    }
    Some(Self { gap: Self::gap_of(raw), status: ((raw >> 12) & 0xF) as u8 })
  }

  /// Gap field shared by calibration and miscalibration messages.
  pub const fn gap_of(raw: u32) -> u16 {
    ((raw >> 16) & 0xFFF) as u16
  }

  pub const fn is_converged(&self, gap_limit: u16) -> bool {
    self.status == 0 && self.gap <= gap_limit
  }
}

impl<I, E, P, D> Device<I, P, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  /// Kick off the firmware's automatic calibration.
  pub(crate) async fn run_calibration(&mut self) -> Result<(), Error<E>> {
    self.write_cmd(Command::RunCalAuto, 0).await
  }

  /// `None` while no result message is present.
  pub(crate) async fn check_calibration(&mut self) -> Result<Option<CalibrationStatus>, Error<E>> {
    Ok(CalibrationStatus::decode(self.read(HIB_CALIB_RESULT).await?))
  }

  /// Issue the calibration command, retrying bus failures.
  pub(crate) async fn issue_calibration(&mut self) -> Result<(), Error<E>> {
    let tries = self.config.thresholds.calib_bus_retries.max(1);
    let mut attempt = 1;
    loop {
      match self.run_calibration().await {
        Ok(()) => return Ok(()),
        Err(e) if attempt >= tries => return Err(e),
        Err(_) => {
          debug!("calibration command failed, attempt {}", attempt);
          attempt += 1;
        }
      }
    }
  }

  /// Poll for a result message in `calib_poll_ms` steps.
  pub(crate) async fn wait_calibration(&mut self) -> Result<CalibrationStatus, Error<E>> {
    let poll = self.config.timing.calib_poll_ms;
    for _ in 0..self.config.thresholds.calib_wait_steps {
      self.delay.delay_ms(poll).await;
      match self.check_calibration().await {
        Ok(Some(status)) => return Ok(status),
        Ok(None) => {}
        Err(_) => warn!("calibration poll failed"),
      }
    }
    Err(Error::CalibrationTimeout)
  }

  /// Forget any result left by an earlier calibration.
  pub(crate) async fn clear_calibration(&mut self) -> Result<(), Error<E>> {
    self.write(HIB_CALIB_RESULT, 0).await
  }

  /// One calibration attempt: clear the old result, issue the command and
  /// wait for a fresh one.
  pub(crate) async fn calibration_attempt(&mut self) -> Result<CalibrationStatus, Error<E>> {
    self.clear_calibration().await?;
    self.issue_calibration().await?;
    let status = self.wait_calibration().await?;
    if !status.is_converged(self.config.thresholds.calib_gap_limit) {
      return Err(Error::Calibration(status));
    }
    info!("calibration done, gap {}", status.gap);
    Ok(status)
  }
}
