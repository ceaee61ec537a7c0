use crate::{CoordLayout, Panel};

/// One finger contact decoded from a coordinate word.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Contact {
  /// 1-based slot id assigned by the controller.
  pub id: u8,
  pub x: u16,
  pub y: u16,
  /// Contact width/area in controller units.
  pub area: u8,
}

impl Contact {
  pub const fn new(id: u8, x: u16, y: u16, area: u8) -> Self {
    Self { id, x, y, area }
  }

  /// Decode a raw coordinate word.
  pub const fn parse(raw: u32, layout: &CoordLayout) -> Self {
    Self {
      id: layout.id.get(raw) as u8,
      x: layout.x.get(raw) as u16,
      y: layout.y.get(raw) as u16,
      area: layout.area.get(raw) as u8,
    }
  }

  /// Pack into a raw coordinate word.
  pub const fn encode(&self, layout: &CoordLayout) -> u32 {
    let w = layout.id.put(0, self.id as u32);
    let w = layout.area.put(w, self.area as u32);
    let w = layout.x.put(w, self.x as u32);
    layout.y.put(w, self.y as u32)
  }

  /// Zero-based slot index. Only meaningful once [`Contact::is_valid`] holds.
  pub(crate) const fn slot(&self) -> usize {
    (self.id as usize).saturating_sub(1)
  }

  /// Id within the panel's finger capacity and position inside the panel.
  /// Coordinates equal to `max_x`/`max_y` are out of range.
  pub const fn is_valid(&self, panel: &Panel) -> bool {
    self.id != 0 && self.id <= panel.max_fingers && self.x < panel.max_x && self.y < panel.max_y
  }
}

impl core::fmt::Debug for Contact {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "#{} ({}, {}) a{}", self.id, self.x, self.y, self.area)
  }
}
