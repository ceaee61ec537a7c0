//! Interrupt-level orchestration: one call per falling edge of the
//! controller's interrupt line.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::event::verify;
use crate::reg::*;
use crate::{CalibrationStatus, DecodeError, Device, Diagnostic, Error, EventSink, Ist30xx, StatusWord};

/// Lock-free interrupt bookkeeping shared by every task.
///
/// `working` and `event_ms` are only written by the interrupt path.
pub(crate) struct IrqState {
  enabled: AtomicBool,
  working: AtomicBool,
  event_ms: AtomicU32,
}

impl IrqState {
  pub(crate) const fn new() -> Self {
    Self { enabled: AtomicBool::new(false), working: AtomicBool::new(false), event_ms: AtomicU32::new(0) }
  }

  pub(crate) fn enable(&self) {
    self.enabled.store(true, Ordering::Release);
  }

  pub(crate) fn disable(&self) {
    self.enabled.store(false, Ordering::Release);
  }

  pub(crate) fn is_enabled(&self) -> bool {
    self.enabled.load(Ordering::Acquire)
  }

  pub(crate) fn is_working(&self) -> bool {
    self.working.load(Ordering::Acquire)
  }

  pub(crate) fn event_ms(&self) -> u32 {
    self.event_ms.load(Ordering::Acquire)
  }

  fn begin(&self, now_ms: u32) -> InFlight<'_> {
    self.working.store(true, Ordering::Release);
    InFlight { state: self, now_ms, serviced: false }
  }
}

/// Marks an interrupt as in flight until dropped. Only a serviced interrupt
/// moves the last-event timestamp.
struct InFlight<'a> {
  state: &'a IrqState,
  now_ms: u32,
  serviced: bool,
}

impl InFlight<'_> {
  fn complete(mut self) {
    self.serviced = true;
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    if self.serviced {
      self.state.event_ms.store(self.now_ms, Ordering::Release);
    }
    self.state.working.store(false, Ordering::Release);
  }
}

/// Which self-test reported through the interrupt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelfTest {
  Cm,
  Cs,
  CmJitter,
  CrJitter,
  CrJitter2,
}

impl SelfTest {
  const fn from_msg(msg: u32) -> Option<Self> {
    match msg >> SELF_TEST_SHIFT {
      CM_MSG_VALID => Some(Self::Cm),
      CS_MSG_VALID => Some(Self::Cs),
      CMJIT_MSG_VALID => Some(Self::CmJitter),
      CRJIT_MSG_VALID => Some(Self::CrJitter),
      CRJIT2_MSG_VALID => Some(Self::CrJitter2),
      _ => None,
    }
  }
}

/// What a single interrupt turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqOutcome {
  /// Interrupts are administratively disabled.
  Ignored,
  /// A touch packet was applied; carries the number of events emitted.
  Touch(usize),
  /// A calibration result message was stored.
  Calibration(CalibrationStatus),
  /// The IC signalled it finished booting.
  Ready,
  /// The IC is recording raw frames and has nothing to report.
  Recording,
  /// A miscalibration check finished; carries the reported gap.
  Miscalibration(u16),
  /// A self-test finished with the given result code.
  SelfTest { test: SelfTest, result: u16 },
  /// The IC raised an exception. A reset was scheduled.
  Exception(u8),
  /// The packet was rejected and counted against the error threshold.
  Rejected(DecodeError),
  /// The bus failed mid-interrupt; counted like a rejected packet.
  Bus,
}

impl<M, I, E, P, D> Ist30xx<M, I, P, D>
where
  M: RawMutex,
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  /// Service one hardware interrupt.
  ///
  /// Never fails: bad packets are counted and, once the error threshold is
  /// reached, turned into a reset. A reset scheduled here runs before this
  /// call returns, after the interrupt itself is marked complete.
  pub async fn handle_interrupt<S: EventSink>(&self, now_ms: u32, sink: &mut S) -> IrqOutcome {
    let in_flight = self.irq.begin(now_ms);
    if !self.irq.is_enabled() {
      return IrqOutcome::Ignored;
    }

    let mut dev = self.device.lock().await;
    // a reset may have started while we waited for the lock
    if !self.irq.is_enabled() {
      return IrqOutcome::Ignored;
    }
    let outcome = dev.pump(sink).await;
    in_flight.complete();

    if dev.session.reset_pending {
      dev.reset(&self.irq, sink).await;
    }
    outcome
  }
}

impl<I, E, P, D> Device<I, P, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  async fn pump<S: EventSink>(&mut self, sink: &mut S) -> IrqOutcome {
    let outcome = match self.read_packet(sink).await {
      Ok(outcome) => outcome,
      Err(Error::Decode(e)) => {
        warn!("interrupt rejected: {:?}", e);
        IrqOutcome::Rejected(e)
      }
      Err(_) => {
        warn!("interrupt bus error");
        IrqOutcome::Bus
      }
    };

    match outcome {
      IrqOutcome::Rejected(_) | IrqOutcome::Bus => {
        if self.session.irq_errors.bump() {
          error!("too many interrupt errors, resetting");
          self.schedule_reset();
        }
      }
      IrqOutcome::Touch(_) => {
        self.session.irq_errors.clear();
        self.session.scan_retry.clear();
      }
      _ => {}
    }
    outcome
  }

  async fn read_packet<S: EventSink>(&mut self, sink: &mut S) -> Result<IrqOutcome, Error<E>> {
    let msg = self.read(HIB_INTR_MSG).await?;

    if msg == INITIAL_VALUE {
      debug!("ic ready");
      return Ok(IrqOutcome::Ready);
    }

    if msg == REC_VALUE {
      return Ok(IrqOutcome::Recording);
    }

    if msg & EXCEPT_MASK == EXCEPT_VALUE {
      let code = (msg & !EXCEPT_MASK) as u8;
      let mut info = [0u32; MAX_EXCEPT_SIZE];
      if self.burst_read(HIB_COORD, &mut info).await.is_err() {
        warn!("exception info unreadable");
      }
      error!("ic exception {:#x} info {:#x} {:#x}", code, info[0], info[1]);
      sink.diagnostic(Diagnostic::Exception { code, info });
      self.schedule_reset();
      return Ok(IrqOutcome::Exception(code));
    }

    if msg == 0 || msg == u32::MAX {
      return Err(DecodeError::Glitch(msg).into());
    }

    if msg & CALIB_MSG_MASK == MISCALIB_MSG_VALID {
      let gap = CalibrationStatus::gap_of(msg);
      info!("miscalibration check done, gap {}", gap);
      sink.diagnostic(Diagnostic::Miscalibration(msg));
      self.session.miscalib_msg = Some(msg);
      return Ok(IrqOutcome::Miscalibration(gap));
    }

    if let Some(status) = CalibrationStatus::decode(msg) {
      info!("calibration message {:#x}", msg);
      sink.diagnostic(Diagnostic::CalibrationResult(msg));
      self.session.calib_msg = Some(msg);
      if self.session.calibrating.take().is_some() {
        self.schedule_reset();
      }
      return Ok(IrqOutcome::Calibration(status));
    }

    if let Some(test) = SelfTest::from_msg(msg) {
      let result = (msg & SELF_TEST_RESULT_MASK) as u16;
      info!("self-test notify {:#x}", msg);
      sink.diagnostic(Diagnostic::SelfTest(msg));
      self.session.self_test_msg = Some(msg);
      return Ok(IrqOutcome::SelfTest { test, result });
    }

    let layout = self.config.layout;
    let panel = self.config.panel;
    StatusWord::check_signature(msg, &layout)?;
    let status = StatusWord::decode(msg, &layout);
    status.check_magic(&layout)?;
    status.check_counts(&panel)?;

    let mut coords = [0u32; MAX_COORD_WORDS];
    let coords = coords.get_mut(..status.finger_count as usize).ok_or(DecodeError::TooManyFingers(status.finger_count))?;
    if !coords.is_empty() {
      self.read_words(HIB_COORD, coords).await?;
    }
    verify(msg, coords, &layout)?;

    let emitted = self.tracker.update(&status, coords, &layout, &panel, sink)?;
    Ok(IrqOutcome::Touch(emitted))
  }
}

#[cfg(test)]
mod tests {
  use embassy_futures::block_on;
  use embassy_futures::join::join;

  use super::*;
  use crate::event::seal;
  use crate::mock::{self, Op, Recorder};
  use crate::{Config, Contact, Layout, Thresholds, TouchPhase};

  const LAYOUT: Layout = Layout::IST30XXC;

  fn packet(chip: &mock::Chip, contacts: &[Contact]) {
    let coords: Vec<u32> = contacts.iter().map(|c| c.encode(&LAYOUT.coord)).collect();
    let mask = contacts.iter().fold(0u16, |m, c| m | 1 << (c.id - 1));
    let status = StatusWord { finger_count: contacts.len() as u8, finger_status: mask, ..Default::default() };
    for (i, w) in coords.iter().enumerate() {
      chip.set(HIB_COORD.advance(i), *w);
    }
    chip.push_intr(seal(status, &coords, &LAYOUT));
  }

  #[test]
  fn touch_lifecycle_through_interrupts() {
    let (touch, chip) = mock::session(Config::default());
    block_on(touch.initialize()).unwrap();
    let mut rec = Recorder::default();

    packet(&chip, &[Contact::new(1, 100, 200, 2)]);
    assert_eq!(block_on(touch.handle_interrupt(10, &mut rec)), IrqOutcome::Touch(1));
    packet(&chip, &[Contact::new(1, 105, 200, 2)]);
    assert_eq!(block_on(touch.handle_interrupt(20, &mut rec)), IrqOutcome::Touch(1));
    packet(&chip, &[]);
    assert_eq!(block_on(touch.handle_interrupt(30, &mut rec)), IrqOutcome::Touch(1));

    assert_eq!(
      rec.touches(),
      [(1, TouchPhase::Start, 100, 200), (1, TouchPhase::Move, 105, 200), (1, TouchPhase::End, 105, 200)]
    );
    assert_eq!(rec.syncs, 3);
    assert_eq!(touch.last_event_ms(), 30);
  }

  #[test]
  fn checksum_mismatch_counts_error_without_events() {
    let (touch, chip) = mock::session(Config::default());
    block_on(touch.initialize()).unwrap();
    let mut rec = Recorder::default();

    let coord = Contact::new(1, 100, 200, 2).encode(&LAYOUT.coord);
    let status = StatusWord { finger_count: 1, finger_status: 1, ..Default::default() };
    chip.set(HIB_COORD, coord);
    chip.push_intr(seal(status, &[coord], &LAYOUT) ^ 0x0100_0000);

    let outcome = block_on(touch.handle_interrupt(10, &mut rec));
    assert!(matches!(outcome, IrqOutcome::Rejected(DecodeError::Checksum { .. })));
    assert!(rec.events.is_empty());
    let status = block_on(touch.status());
    assert_eq!(status.irq_errors, 1);
    assert_eq!(status.pressed, 0);
  }

  #[test]
  fn success_clears_error_history() {
    let (touch, chip) = mock::session(Config::default());
    block_on(touch.initialize()).unwrap();
    let mut rec = Recorder::default();

    chip.push_intr(0);
    chip.push_intr(u32::MAX);
    block_on(touch.handle_interrupt(1, &mut rec));
    block_on(touch.handle_interrupt(2, &mut rec));
    assert_eq!(block_on(touch.status()).irq_errors, 2);

    packet(&chip, &[Contact::new(2, 5, 5, 1)]);
    block_on(touch.handle_interrupt(3, &mut rec));
    assert_eq!(block_on(touch.status()).irq_errors, 0);
  }

  #[test]
  fn error_threshold_resets_once() {
    let config = Config::default().with_thresholds(Thresholds::new().with_irq_errors(3));
    let (touch, chip) = mock::session(config);
    block_on(touch.initialize()).unwrap();
    let mut rec = Recorder::default();
    packet(&chip, &[Contact::new(1, 10, 10, 1)]);
    block_on(touch.handle_interrupt(1, &mut rec));
    chip.clear_journal();

    for t in 0..2 {
      chip.push_intr(0);
      assert_eq!(block_on(touch.handle_interrupt(t, &mut rec)), IrqOutcome::Rejected(DecodeError::Glitch(0)));
    }
    assert_eq!(block_on(touch.status()).resets, 0);

    chip.push_intr(0);
    block_on(touch.handle_interrupt(5, &mut rec));
    let status = block_on(touch.status());
    assert_eq!(status.resets, 1);
    assert_eq!(status.irq_errors, 0);
    assert_eq!(status.pressed, 0);
    assert_eq!(chip.journal().iter().filter(|op| **op == Op::Power(false)).count(), 1);
    assert_eq!(rec.touches().last(), Some(&(1, TouchPhase::End, 10, 10)));
    assert!(touch.irq_enabled());
  }

  #[test]
  fn exception_schedules_reset_immediately() {
    let (touch, chip) = mock::session(Config::default());
    block_on(touch.initialize()).unwrap();
    let mut rec = Recorder::default();
    chip.set(HIB_COORD, 0xDEAD);
    chip.set(HIB_COORD.advance(1), 0xBEEF);
    chip.push_intr(0xE11C_E905);

    assert_eq!(block_on(touch.handle_interrupt(1, &mut rec)), IrqOutcome::Exception(5));
    assert_eq!(rec.diagnostics, [Diagnostic::Exception { code: 5, info: [0xDEAD, 0xBEEF] }]);
    assert_eq!(block_on(touch.status()).resets, 1);
  }

  #[test]
  fn calibration_message_is_stored() {
    let (touch, chip) = mock::session(Config::default());
    block_on(touch.initialize()).unwrap();
    let mut rec = Recorder::default();
    chip.push_intr(0x8005_0CAB);
    let outcome = block_on(touch.handle_interrupt(1, &mut rec));
    assert_eq!(outcome, IrqOutcome::Calibration(CalibrationStatus { gap: 5, status: 0 }));
    assert_eq!(block_on(touch.status()).calib_msg, Some(0x8005_0CAB));
    assert!(rec.events.is_empty());
  }

  #[test]
  fn ready_message_is_not_a_touch() {
    let (touch, chip) = mock::session(Config::default());
    block_on(touch.initialize()).unwrap();
    chip.push_intr(INITIAL_VALUE);
    assert_eq!(block_on(touch.handle_interrupt(1, &mut Recorder::default())), IrqOutcome::Ready);
  }

  #[test]
  fn disabled_irq_is_a_noop() {
    let (touch, chip) = mock::session(Config::default());
    packet(&chip, &[Contact::new(1, 1, 1, 1)]);
    let mut rec = Recorder::default();
    assert_eq!(block_on(touch.handle_interrupt(1, &mut rec)), IrqOutcome::Ignored);
    assert!(chip.frames().is_empty());
    assert!(rec.events.is_empty());
    assert_eq!(touch.last_event_ms(), 0, "ignored interrupts do not count as activity");
    assert!(!touch.irq.is_working());
  }

  #[test]
  fn interrupt_disabled_while_waiting_for_lock_is_ignored() {
    let (touch, chip) = mock::session(Config::default());
    block_on(touch.initialize()).unwrap();
    packet(&chip, &[Contact::new(1, 1, 1, 1)]);
    chip.clear_journal();
    let mut rec = Recorder::default();

    // another task holds the session and turns interrupts off before releasing it
    let guard = block_on(touch.device.lock());
    let holder = async {
      touch.irq.disable();
      drop(guard);
    };
    let (outcome, ()) = block_on(join(touch.handle_interrupt(50, &mut rec), holder));

    assert_eq!(outcome, IrqOutcome::Ignored);
    assert!(chip.frames().is_empty());
    assert!(rec.events.is_empty());
    assert_eq!(block_on(touch.status()).pressed, 0);
    assert_eq!(touch.last_event_ms(), 0);
  }

  #[test]
  fn unsigned_status_word_is_rejected() {
    let (touch, chip) = mock::session(Config::default());
    block_on(touch.initialize()).unwrap();
    chip.push_intr(0x0100_1001);
    let outcome = block_on(touch.handle_interrupt(1, &mut Recorder::default()));
    assert_eq!(outcome, IrqOutcome::Rejected(DecodeError::Signature(0x0100_1001)));
    assert_eq!(block_on(touch.status()).irq_errors, 1);
  }

  #[test]
  fn non_touch_messages_are_not_errors() {
    let (touch, chip) = mock::session(Config::default());
    block_on(touch.initialize()).unwrap();
    let mut rec = Recorder::default();

    chip.push_intr(REC_VALUE);
    assert_eq!(block_on(touch.handle_interrupt(1, &mut rec)), IrqOutcome::Recording);

    chip.push_intr(0x8021_0CAF);
    assert_eq!(block_on(touch.handle_interrupt(2, &mut rec)), IrqOutcome::Miscalibration(0x21));

    chip.push_intr(0x0E7D_D123);
    let outcome = block_on(touch.handle_interrupt(3, &mut rec));
    assert_eq!(outcome, IrqOutcome::SelfTest { test: SelfTest::Cs, result: 0x123 });

    let status = block_on(touch.status());
    assert_eq!(status.irq_errors, 0);
    assert_eq!(status.resets, 0);
    assert_eq!(status.miscalib_msg, Some(0x8021_0CAF));
    assert_eq!(status.self_test_msg, Some(0x0E7D_D123));
    assert_eq!(rec.diagnostics, [Diagnostic::Miscalibration(0x8021_0CAF), Diagnostic::SelfTest(0x0E7D_D123)]);
    assert!(rec.events.is_empty());
  }

  #[test]
  fn finger_count_beyond_slot_storage_is_rejected() {
    let config = Config::default().with_panel(crate::Panel::new(720, 1280).with_fingers(15));
    let (mut dev, chip) = mock::device(config);
    let status = StatusWord { finger_count: 15, finger_status: 0x3FF, ..Default::default() };
    chip.push_intr(seal(status, &[], &LAYOUT));
    let outcome = block_on(dev.pump(&mut Recorder::default()));
    assert_eq!(outcome, IrqOutcome::Rejected(DecodeError::TooManyFingers(15)));
    assert_eq!(chip.frames().len(), 1);
  }

  #[test]
  fn too_many_fingers_is_rejected_before_coordinates_are_read() {
    let config = Config::default().with_panel(crate::Panel::new(720, 1280).with_fingers(2));
    let (touch, chip) = mock::session(config);
    block_on(touch.initialize()).unwrap();
    let status = StatusWord { finger_count: 3, finger_status: 0b111, ..Default::default() };
    chip.push_intr(seal(status, &[], &LAYOUT));
    chip.clear_journal();
    let outcome = block_on(touch.handle_interrupt(1, &mut Recorder::default()));
    assert_eq!(outcome, IrqOutcome::Rejected(DecodeError::TooManyFingers(3)));
    assert_eq!(chip.frames().len(), 1);
  }
}
