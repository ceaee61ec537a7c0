/******************************************************************************
 * Imagis IST30xx family - register addressing & HIB memory map               *
 * ========================================================================== *
 * Every transaction carries a 32-bit big-endian address. The access mode is  *
 * selected by bits ORed into that address: direct access, burst access or    *
 * the hibernate (HIB) register window.                                       *
*******************************************************************************/

pub(crate) const DIRECT_ACCESS: u32 = 1 << 31;
pub(crate) const BURST_ACCESS: u32 = 1 << 27;
pub(crate) const HIB_ACCESS: u32 = 0x800B << 16;
pub(crate) const HIB_BASE: u32 = 0x0100;

/// Access mode encoded into a register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
  /// Single word, direct memory access.
  Direct,
  /// Contiguous run of words in one transaction.
  Burst,
  /// Hibernate register window (status, messages, commands).
  Hib,
}

/// A device register address together with its access mode.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Addr {
  access: Access,
  offset: u32,
}

impl Addr {
  pub const fn direct(offset: u32) -> Self {
    Self { access: Access::Direct, offset }
  }

  pub const fn burst(offset: u32) -> Self {
    Self { access: Access::Burst, offset }
  }

  pub const fn hib(offset: u32) -> Self {
    Self { access: Access::Hib, offset }
  }

  pub const fn access(&self) -> Access {
    self.access
  }

  pub const fn offset(&self) -> u32 {
    self.offset
  }

  /// Address of the word `words` positions further along.
  pub(crate) const fn advance(self, words: usize) -> Self {
    Self { access: self.access, offset: self.offset.wrapping_add((words as u32) * 4) }
  }

  /// The on-wire 32-bit address.
  pub const fn encode(&self) -> u32 {
    match self.access {
      Access::Direct => self.offset | DIRECT_ACCESS,
      Access::Burst => self.offset | BURST_ACCESS,
      Access::Hib => HIB_ACCESS | (HIB_BASE + self.offset),
    }
  }

  /// The on-wire address of a multi-word transfer. Direct and HIB addresses
  /// keep their own access bits and carry the burst bit on top.
  pub(crate) const fn encode_burst(&self) -> u32 {
    self.encode() | BURST_ACCESS
  }
}

impl core::fmt::Debug for Addr {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{:?}({:#010x})", self.access, self.encode())
  }
}

impl From<Addr> for u32 {
  #[inline]
  fn from(a: Addr) -> Self {
    a.encode()
  }
}

// HIB window
pub(crate) const HIB_TOUCH_STATUS: Addr = Addr::hib(0x00);
pub(crate) const HIB_INTR_MSG: Addr = Addr::hib(0x04);
pub(crate) const HIB_COORD: Addr = Addr::hib(0x08);
pub(crate) const HIB_CALIB_RESULT: Addr = Addr::hib(0x30);
pub(crate) const HIB_CMD: Addr = Addr::hib(0x3C);

// Interrupt message magics
pub(crate) const EXCEPT_MASK: u32 = 0xFFFF_FF00;
pub(crate) const EXCEPT_VALUE: u32 = 0xE11C_E900;
pub(crate) const MAX_EXCEPT_SIZE: usize = 2;
pub(crate) const INITIAL_VALUE: u32 = 0x8CB4_A7D6;

pub(crate) const REC_VALUE: u32 = 0x3A6D_1D9C;

pub(crate) const CALIB_MSG_MASK: u32 = 0xF000_0FFF;
pub(crate) const CALIB_MSG_VALID: u32 = 0x8000_0CAB;
pub(crate) const MISCALIB_MSG_VALID: u32 = 0x8000_0CAF;

// Self-test notifications: bits [31:12] name the test, [11:0] carry the result
pub(crate) const SELF_TEST_SHIFT: u32 = 12;
pub(crate) const SELF_TEST_RESULT_MASK: u32 = 0xFFF;
pub(crate) const CM_MSG_VALID: u32 = 0x0E7DC;
pub(crate) const CS_MSG_VALID: u32 = 0x0E7DD;
pub(crate) const CMJIT_MSG_VALID: u32 = 0x0E7DE;
pub(crate) const CRJIT_MSG_VALID: u32 = 0x0E7DF;
pub(crate) const CRJIT2_MSG_VALID: u32 = 0x0E7E0;

/// Largest number of coordinate words a single interrupt can carry.
pub(crate) const MAX_COORD_WORDS: usize = crate::MAX_FINGERS;
