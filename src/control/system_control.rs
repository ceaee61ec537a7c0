use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::Command;
use crate::{Device, Error};

impl<I, E, P, D> Device<I, P, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  /// Arm continuous scanning. Needed after every power-up before contacts are reported.
  pub(crate) async fn start_scan(&mut self) -> Result<(), Error<E>> {
    self.write_cmd(Command::FwStart, 1).await
  }

  /// Suspend or resume scanning so registers can be read directly.
  pub(crate) async fn hold(&mut self, enable: bool) -> Result<(), Error<E>> {
    self.write_cmd(Command::FwHold, enable as u16).await
  }

  pub(crate) async fn enter_register_access(&mut self) -> Result<(), Error<E>> {
    self.write_cmd(Command::RegAccess, 1).await
  }

  /// A failure here leaves the IC out of sync. Callers must reset it.
  pub(crate) async fn exit_register_access(&mut self) -> Result<(), Error<E>> {
    self.write_cmd(Command::RegAccess, 0).await
  }

  /// Hold scanning and open direct register access.
  pub(crate) async fn open_direct_access(&mut self) -> Result<(), Error<E>> {
    self.hold(true).await?;
    self.enter_register_access().await
  }

  /// Undo [`Device::open_direct_access`]. Both steps are attempted.
  pub(crate) async fn close_direct_access(&mut self) -> Result<(), Error<E>> {
    let exit = self.exit_register_access().await;
    let release = self.hold(false).await;
    exit.and(release)
  }
}
