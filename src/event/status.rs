use bitfield_struct::bitfield;

use crate::{Layout, Panel, StatusTag};

/// Why an interrupt payload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
  /// Read back as all zeros or all ones.
  Glitch(u32),
  /// Neither a known message nor a status word carrying the touch signature.
  Signature(u32),
  /// Status word did not carry the expected marker byte.
  Magic { expected: u8, actual: u8 },
  Checksum { expected: u8, actual: u8 },
  TooManyFingers(u8),
  TooManyKeys(u8),
  /// Coordinate word out of range or with an invalid slot id.
  Contact(u32),
  /// Finger bit set without a matching coordinate word.
  MissingContact(u8),
}

/// Decoded interrupt status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusWord {
  pub tag: u8,
  pub key_count: u8,
  pub key_status: u8,
  pub finger_count: u8,
  pub finger_status: u16,
}

impl StatusWord {
  pub const fn decode(raw: u32, layout: &Layout) -> Self {
    Self {
      tag: layout.tag_field.get(raw) as u8,
      key_count: layout.key_count.get(raw) as u8,
      key_status: layout.key_status.get(raw) as u8,
      finger_count: layout.finger_count.get(raw) as u8,
      finger_status: layout.finger_status.get(raw) as u16,
    }
  }

  pub const fn encode(&self, layout: &Layout) -> u32 {
    let w = layout.signature.put(0, u32::MAX);
    let w = layout.tag_field.put(w, self.tag as u32);
    let w = layout.key_count.put(w, self.key_count as u32);
    let w = layout.key_status.put(w, self.key_status as u32);
    let w = layout.finger_count.put(w, self.finger_count as u32);
    layout.finger_status.put(w, self.finger_status as u32)
  }

  pub const fn finger_pressed(&self, slot: usize) -> bool {
    self.finger_status & (1 << slot) != 0
  }

  pub const fn key_pressed(&self, slot: usize) -> bool {
    self.key_status & (1 << slot) != 0
  }

  /// Touch status words always carry the layout's signature bits.
  pub(crate) const fn check_signature(raw: u32, layout: &Layout) -> Result<(), DecodeError> {
    if layout.signature.get(raw) != layout.signature.mask() {
      return Err(DecodeError::Signature(raw));
    }
    Ok(())
  }

  /// Counts must fit the panel.
  pub(crate) const fn check_counts(&self, panel: &Panel) -> Result<(), DecodeError> {
    if self.finger_count > panel.max_fingers {
      return Err(DecodeError::TooManyFingers(self.finger_count));
    }
    if self.key_count > panel.max_keys {
      return Err(DecodeError::TooManyKeys(self.key_count));
    }
    Ok(())
  }

  /// Marker check that can run before the coordinate words are fetched.
  pub(crate) const fn check_magic(&self, layout: &Layout) -> Result<(), DecodeError> {
    match layout.tag {
      StatusTag::Magic(expected) if expected != self.tag => Err(DecodeError::Magic { expected, actual: self.tag }),
      _ => Ok(()),
    }
  }
}

/// Byte sum over the status payload (tag byte excluded) and every coordinate word.
pub fn checksum(raw_status: u32, coords: &[u32], layout: &Layout) -> u8 {
  let sum = |acc: u8, w: u32| w.to_be_bytes().iter().fold(acc, |a, b| a.wrapping_add(*b));
  coords.iter().fold(sum(0, raw_status & layout.payload_mask()), |acc, w| sum(acc, *w))
}

/// Verify the packet tag once the coordinate words are known.
pub(crate) fn verify(raw_status: u32, coords: &[u32], layout: &Layout) -> Result<(), DecodeError> {
  let status = StatusWord::decode(raw_status, layout);
  match layout.tag {
    StatusTag::Checksum => {
      let expected = checksum(raw_status, coords, layout);
      if expected != status.tag {
        return Err(DecodeError::Checksum { expected, actual: status.tag });
      }
      Ok(())
    }
    StatusTag::Magic(_) => status.check_magic(layout),
  }
}

/// Seal a status payload with the tag `layout` expects.
pub fn seal(status: StatusWord, coords: &[u32], layout: &Layout) -> u32 {
  let raw = status.encode(layout) & layout.payload_mask();
  let tag = match layout.tag {
    StatusTag::Checksum => checksum(raw, coords, layout),
    StatusTag::Magic(m) => m,
  };
  layout.tag_field.put(raw, tag as u32)
}

/// HIB touch status word, the liveness heartbeat polled by the watchdog.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchStatus {
  pub magic: u8,
  __: u8,
  pub noise: bool,
  pub wet: bool,
  #[bits(2)]
  ___: u8,
  pub finger_enable: bool,
  #[bits(11)]
  pub scan_count: u16,
}

impl TouchStatus {
  pub(crate) const MAGIC: u8 = 0x75;

  pub const fn is_valid(&self) -> bool {
    self.magic() == Self::MAGIC
  }
}
