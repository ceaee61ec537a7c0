/// A contiguous bit range inside a 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
  pub shift: u8,
  pub width: u8,
}

impl Field {
  pub const fn new(shift: u8, width: u8) -> Self {
    Self { shift, width }
  }

  pub const fn mask(&self) -> u32 {
    if self.width >= 32 {
      u32::MAX
    } else {
      (1u32 << self.width) - 1
    }
  }

  pub const fn get(&self, word: u32) -> u32 {
    (word >> self.shift) & self.mask()
  }

  /// Store `value` into the field, truncating it to the field width.
  pub const fn put(&self, word: u32, value: u32) -> u32 {
    let mask = self.mask() << self.shift;
    (word & !mask) | ((value << self.shift) & mask)
  }
}

/// How the top byte of a touch status word authenticates the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusTag {
  /// Byte sum of the status payload and every coordinate word.
  Checksum,
  /// A fixed marker value.
  Magic(u8),
}

/// Bit positions of a coordinate word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoordLayout {
  pub id: Field,
  pub area: Field,
  pub x: Field,
  pub y: Field,
}

/// Per-chip bit layout of the interrupt status word and the coordinate words.
///
/// The IST30xx generations share one acquisition protocol but pack their
/// words differently, so every decoder in the crate is driven by this table
/// rather than by chip-specific code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
  pub tag: StatusTag,
  pub tag_field: Field,
  /// Always-set bits of a touch status word, so that no valid packet reads
  /// back as zero. Empty (`width == 0`) disables the check.
  pub signature: Field,
  pub key_count: Field,
  pub key_status: Field,
  pub finger_count: Field,
  pub finger_status: Field,
  pub coord: CoordLayout,
}

impl Layout {
  /// First generation IST30xx: 6-bit id, 10-bit axes, 6-bit width.
  ///
  /// ```text
  /// status  [31:24] checksum [23:21] key cnt [20:16] key status [15:12] finger cnt [10] signature [9:0] finger status
  /// coord   [31:26] id       [25:16] x       [15:10] width      [9:0]   y
  /// ```
  pub const IST30XX: Self = Self {
    tag: StatusTag::Checksum,
    tag_field: Field::new(24, 8),
    signature: Field::new(10, 1),
    key_count: Field::new(21, 3),
    key_status: Field::new(16, 5),
    finger_count: Field::new(12, 4),
    finger_status: Field::new(0, 10),
    coord: CoordLayout { id: Field::new(26, 6), x: Field::new(16, 10), area: Field::new(10, 6), y: Field::new(0, 10) },
  };

  /// IST30xxC / IST3038 generation: 4-bit id, 12-bit axes, 4-bit area.
  ///
  /// ```text
  /// status  [31:24] checksum [23:21] key cnt [20:16] key status [15:12] finger cnt [10] signature [9:0] finger status
  /// coord   [31:28] id       [27:24] area    [23:12] x          [11:0]  y
  /// ```
  pub const IST30XXC: Self = Self {
    tag: StatusTag::Checksum,
    tag_field: Field::new(24, 8),
    signature: Field::new(10, 1),
    key_count: Field::new(21, 3),
    key_status: Field::new(16, 5),
    finger_count: Field::new(12, 4),
    finger_status: Field::new(0, 10),
    coord: CoordLayout { id: Field::new(28, 4), area: Field::new(24, 4), x: Field::new(12, 12), y: Field::new(0, 12) },
  };

  pub const fn with_tag(mut self, tag: StatusTag) -> Self {
    self.tag = tag;
    self
  }

  pub const fn with_signature(mut self, signature: Field) -> Self {
    self.signature = signature;
    self
  }

  /// Mask covering everything below the tag byte.
  pub(crate) const fn payload_mask(&self) -> u32 {
    !(self.tag_field.mask() << self.tag_field.shift)
  }
}

impl Default for Layout {
  fn default() -> Self {
    Self::IST30XXC
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn field_get_put() {
    let f = Field::new(12, 4);
    let w = f.put(0xFFFF_FFFF, 0x3);
    assert_eq!(w, 0xFFFF_3FFF);
    assert_eq!(f.get(w), 0x3);
    assert_eq!(f.put(0, 0x1F), 0xF000, "value truncated to field width");
  }

  #[test]
  fn full_width_field() {
    let f = Field::new(0, 32);
    assert_eq!(f.mask(), u32::MAX);
    assert_eq!(f.get(0xDEAD_BEEF), 0xDEAD_BEEF);
  }

  #[test]
  fn payload_mask_excludes_tag() {
    assert_eq!(Layout::IST30XXC.payload_mask(), 0x00FF_FFFF);
  }
}
