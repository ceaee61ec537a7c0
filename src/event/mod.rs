mod contact;
mod status;

pub use contact::*;
pub use status::*;

/// Indicates how a finger changed compared to the previous interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchPhase {
  /// A new finger contact appeared on the surface.
  Start,
  /// An existing finger is still down. Emitted on every interrupt, moved or not.
  Move,
  /// A finger was lifted, or released on the driver's behalf.
  End,
}

impl TouchPhase {
  pub const fn is_start(self) -> bool {
    matches!(self, TouchPhase::Start)
  }

  pub const fn is_move(self) -> bool {
    matches!(self, TouchPhase::Move)
  }

  pub const fn is_end(self) -> bool {
    matches!(self, TouchPhase::End)
  }

  pub const fn as_str(self) -> &'static str {
    match self {
      TouchPhase::Start => "start",
      TouchPhase::Move => "move",
      TouchPhase::End => "end",
    }
  }
}

/// A finger transition.
///
/// `contact` carries the latest coordinates. For [`TouchPhase::End`] that is
/// the last position reported before the finger went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Touch {
  pub phase: TouchPhase,
  pub contact: Contact,
}

impl Touch {
  pub const fn new(phase: TouchPhase, contact: Contact) -> Self {
    Self { phase, contact }
  }

  /// 1-based slot id, stable for the lifetime of the physical contact.
  pub const fn slot(&self) -> u8 {
    self.contact.id
  }
}

/// A touch key press or release. Keys carry no position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Key {
  /// 1-based key id.
  pub id: u8,
  pub pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
  Touch(Touch),
  Key(Key),
}

/// Out-of-band records that are not input events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostic {
  /// A coordinate word failed the sanity check. The whole interrupt was dropped.
  CorruptContact { raw: u32 },
  /// The IC raised an exception. `info` holds the diagnostic words read after it.
  Exception { code: u8, info: [u32; 2] },
  /// A calibration result message arrived.
  CalibrationResult(u32),
  /// A miscalibration check result arrived.
  Miscalibration(u32),
  /// A CM/CS self-test notification arrived.
  SelfTest(u32),
}

/// Receiver for everything the driver reports upward.
///
/// One [`EventSink::report`] call is made per event and [`EventSink::sync`]
/// closes each batch, mirroring how an input subsystem frames multitouch
/// reports.
pub trait EventSink {
  fn report(&mut self, event: Event);

  /// End of one batch of events.
  fn sync(&mut self) {}

  fn diagnostic(&mut self, _diagnostic: Diagnostic) {}
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
  fn report(&mut self, event: Event) {
    (**self).report(event)
  }

  fn sync(&mut self) {
    (**self).sync()
  }

  fn diagnostic(&mut self, diagnostic: Diagnostic) {
    (**self).diagnostic(diagnostic)
  }
}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSink;

impl EventSink for NoSink {
  fn report(&mut self, _event: Event) {}
}
