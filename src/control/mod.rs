use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::reg::HIB_CMD;
use crate::{Addr, Device, Error};

mod calibration;
mod config_settings;
mod system_control;

pub use calibration::*;
pub use config_settings::*;

/// Commands accepted through the HIB command register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub(crate) enum Command {
  FwStart = 0x01,
  FwHold = 0x02,
  RegAccess = 0x03,
  SetTimeActive = 0x20,
  SetTimeIdle = 0x21,
  SetModeSpecial = 0x22,
  RunCalAuto = 0x31,
}

impl Command {
  /// `(command << 16) | value`
  pub(crate) const fn word(self, value: u16) -> u32 {
    ((self as u32) << 16) | value as u32
  }
}

/// Values the firmware exposes through direct reads of a command number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub(crate) enum Query {
  ChipId = 0x01,
  VerMain = 0x02,
  VerFw = 0x03,
}

/// Identity read at bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipInfo {
  pub chip_id: u32,
  pub main_version: u32,
  pub fw_version: u32,
}

impl<I, E, P, D> Device<I, P, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  pub(crate) async fn write_cmd(&mut self, cmd: Command, value: u16) -> Result<(), Error<E>> {
    trace!("cmd {:#x} value {:#x}", cmd as u16, value);
    self.write(HIB_CMD, cmd.word(value)).await
  }

  pub(crate) async fn read_cmd(&mut self, query: Query) -> Result<u32, Error<E>> {
    self.read(Addr::direct(query as u32)).await
  }

  pub(crate) async fn chip_info(&mut self) -> Result<ChipInfo, Error<E>> {
    Ok(ChipInfo {
      chip_id: self.read_cmd(Query::ChipId).await?,
      main_version: self.read_cmd(Query::VerMain).await?,
      fw_version: self.read_cmd(Query::VerFw).await?,
    })
  }
}
