//! Finger and key lifecycle tracking.
//!
//! Every interrupt delivers a complete snapshot: a press bitmask for the
//! fingers, one for the keys, and a coordinate word per reported finger. The
//! [`ContactTracker`] compares that snapshot with what it reported last time
//! and turns the difference into [`Event`]s:
//!
//! | before  | now     | event                     |
//! |---------|---------|---------------------------|
//! | idle    | pressed | [`TouchPhase::Start`]     |
//! | pressed | pressed | [`TouchPhase::Move`]      |
//! | pressed | idle    | [`TouchPhase::End`]       |
//! | idle    | idle    | nothing                   |
//!
//! A snapshot is checked in full before any slot changes. A single bad
//! coordinate word rejects the whole interrupt.
//!
//! ```
//! use ist30xx::{Contact, ContactTracker, Event, EventSink, Layout, Panel, StatusWord};
//!
//! struct Print;
//! impl EventSink for Print {
//!   fn report(&mut self, event: Event) {
//!     let _ = event;
//!   }
//! }
//!
//! let layout = Layout::IST30XXC;
//! let panel = Panel::new(720, 1280);
//! let mut tracker = ContactTracker::new();
//! let coord = Contact::new(1, 100, 200, 3).encode(&layout.coord);
//! let status = StatusWord { finger_count: 1, finger_status: 1, ..Default::default() };
//! tracker.update(&status, &[coord], &layout, &panel, &mut Print).unwrap();
//! assert!(tracker.is_pressed(1));
//! ```

use crate::{Contact, Diagnostic, DecodeError, Event, EventSink, Key, Layout, Panel, StatusWord, Touch, TouchPhase};
use crate::{MAX_FINGERS, MAX_KEYS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Slot {
  Idle,
  Pressed(Contact),
}

impl Slot {
  const fn is_pressed(&self) -> bool {
    matches!(self, Slot::Pressed(_))
  }
}

/// Running totals kept across the tracker's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchStats {
  /// Number of finger presses reported.
  pub presses: u32,
  /// Number of times two or more fingers went down together.
  pub multi_touch: u32,
}

/// Per-slot memory of what was last reported upward.
#[derive(Debug, Clone)]
pub struct ContactTracker {
  fingers: [Slot; MAX_FINGERS],
  keys: [bool; MAX_KEYS],
  stats: TouchStats,
}

impl ContactTracker {
  pub const fn new() -> Self {
    Self { fingers: [Slot::Idle; MAX_FINGERS], keys: [false; MAX_KEYS], stats: TouchStats { presses: 0, multi_touch: 0 } }
  }

  /// Apply one interrupt's snapshot.
  ///
  /// `coords` holds the `finger_count` coordinate words read after the status
  /// word. On error nothing is emitted and no slot changes. Returns the number
  /// of events emitted.
  pub fn update<S: EventSink>(
    &mut self,
    status: &StatusWord,
    coords: &[u32],
    layout: &Layout,
    panel: &Panel,
    sink: &mut S,
  ) -> Result<usize, DecodeError> {
    status.check_counts(panel)?;

    let mut next: [Option<Contact>; MAX_FINGERS] = [None; MAX_FINGERS];
    for &raw in coords {
      let contact = Contact::parse(raw, &layout.coord);
      match next.get_mut(contact.slot()) {
        Some(entry) if contact.is_valid(panel) => *entry = Some(contact),
        _ => {
          warn!("corrupt contact word {:#x}", raw);
          sink.diagnostic(Diagnostic::CorruptContact { raw });
          return Err(DecodeError::Contact(raw));
        }
      }
    }

    let fingers = (panel.max_fingers as usize).min(MAX_FINGERS);
    for slot in 0..fingers {
      if status.finger_pressed(slot) && next[slot].is_none() {
        return Err(DecodeError::MissingContact(slot as u8 + 1));
      }
      if !status.finger_pressed(slot) {
        next[slot] = None;
      }
    }

    let was_multi = self.pressed_count() >= 2;
    let mut emitted = 0;
    for slot in 0..fingers {
      if let Some(touch) = classify_transition(self.fingers[slot], next[slot]) {
        if touch.phase.is_start() {
          self.stats.presses = self.stats.presses.wrapping_add(1);
        }
        trace!("slot {} {}", touch.slot(), touch.phase.as_str());
        sink.report(Event::Touch(touch));
        emitted += 1;
      }
      self.fingers[slot] = match next[slot] {
        Some(contact) => Slot::Pressed(contact),
        None => Slot::Idle,
      };
    }
    if !was_multi && self.pressed_count() >= 2 {
      self.stats.multi_touch = self.stats.multi_touch.wrapping_add(1);
    }

    let keys = (panel.max_keys as usize).min(MAX_KEYS);
    for slot in 0..keys {
      let pressed = status.key_pressed(slot);
      if pressed != self.keys[slot] {
        self.keys[slot] = pressed;
        sink.report(Event::Key(Key { id: slot as u8 + 1, pressed }));
        emitted += 1;
      }
    }

    if emitted > 0 {
      sink.sync();
    }
    Ok(emitted)
  }

  /// Release every pressed finger and key without asking the hardware.
  pub fn clear_all<S: EventSink>(&mut self, sink: &mut S) -> usize {
    let mut released = 0;
    for slot in self.fingers.iter_mut() {
      if let Slot::Pressed(contact) = *slot {
        sink.report(Event::Touch(Touch::new(TouchPhase::End, contact)));
        *slot = Slot::Idle;
        released += 1;
      }
    }
    for (i, key) in self.keys.iter_mut().enumerate() {
      if *key {
        sink.report(Event::Key(Key { id: i as u8 + 1, pressed: false }));
        *key = false;
        released += 1;
      }
    }
    if released > 0 {
      debug!("released {} stale contacts", released);
      sink.sync();
    }
    released
  }

  /// Whether the 1-based finger slot is down.
  pub fn is_pressed(&self, id: u8) -> bool {
    self.contact(id).is_some()
  }

  /// Last reported contact of a 1-based finger slot.
  pub fn contact(&self, id: u8) -> Option<Contact> {
    match self.fingers.get((id as usize).checked_sub(1)?) {
      Some(Slot::Pressed(c)) => Some(*c),
      _ => None,
    }
  }

  pub fn key_pressed(&self, id: u8) -> bool {
    (id as usize).checked_sub(1).and_then(|i| self.keys.get(i)).copied().unwrap_or(false)
  }

  pub fn pressed_count(&self) -> usize {
    self.fingers.iter().filter(|s| s.is_pressed()).count()
  }

  /// Any finger or key down.
  pub fn any_pressed(&self) -> bool {
    self.pressed_count() > 0 || self.keys.iter().any(|k| *k)
  }

  pub fn stats(&self) -> TouchStats {
    self.stats
  }
}

impl Default for ContactTracker {
  fn default() -> Self {
    Self::new()
  }
}

fn classify_transition(previous: Slot, current: Option<Contact>) -> Option<Touch> {
  match (previous, current) {
    (Slot::Idle, None) => None,
    (Slot::Idle, Some(c)) => Some(Touch::new(TouchPhase::Start, c)),
    (Slot::Pressed(_), Some(c)) => Some(Touch::new(TouchPhase::Move, c)),
    (Slot::Pressed(c), None) => Some(Touch::new(TouchPhase::End, c)),
  }
}
