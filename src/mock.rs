//! In-memory IST30xx stand-in for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::i2c::{ErrorKind, ErrorType, Operation, SevenBitAddress};

use crate::reg::{BURST_ACCESS, DIRECT_ACCESS, HIB_CMD, HIB_INTR_MSG};
use crate::{Addr, Config, Device, Diagnostic, Event, EventSink, Ist30xx, TouchPhase};

pub(crate) const CHIP_ID: u32 = 0x3026_C000;

/// Side effects in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
  Power(bool),
  Delay(u32),
  /// Word written to the HIB command register.
  Cmd(u32),
  Write(u32, u32),
}

/// A read transaction: encoded address and number of bytes read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
  pub(crate) addr: u32,
  pub(crate) len: usize,
}

#[derive(Default)]
struct ChipState {
  regs: HashMap<u32, u32>,
  intr: VecDeque<u32>,
  journal: Vec<Op>,
  frames: Vec<Frame>,
  /// Register writes the chip performs in answer to a command word.
  responses: VecDeque<(u32, u32, u32)>,
  /// Transactions left before the bus starts failing.
  healthy: Option<usize>,
}

impl ChipState {
  fn fails(&mut self) -> bool {
    match self.healthy.as_mut() {
      Some(0) => true,
      Some(n) => {
        *n -= 1;
        false
      }
      None => false,
    }
  }
}

/// Storage key: the address with its direct and burst bits removed.
fn key(encoded: u32) -> u32 {
  encoded & !(DIRECT_ACCESS | BURST_ACCESS)
}

#[derive(Clone)]
pub(crate) struct Chip(Rc<RefCell<ChipState>>);

impl Chip {
  pub(crate) fn set(&self, addr: Addr, value: u32) {
    self.0.borrow_mut().regs.insert(key(addr.encode()), value);
  }

  pub(crate) fn get(&self, addr: Addr) -> u32 {
    self.0.borrow().regs.get(&key(addr.encode())).copied().unwrap_or(0)
  }

  /// Queue a value for the next interrupt message read.
  pub(crate) fn push_intr(&self, value: u32) {
    self.0.borrow_mut().intr.push_back(value);
  }

  /// Once the command word `cmd` arrives, store `value` at `addr`. Each
  /// queued answer is used once.
  pub(crate) fn answer(&self, cmd: u32, addr: Addr, value: u32) {
    self.0.borrow_mut().responses.push_back((cmd, key(addr.encode()), value));
  }

  /// Let `n` more transactions through, then fail every one after.
  pub(crate) fn fail_after(&self, n: usize) {
    self.0.borrow_mut().healthy = Some(n);
  }

  pub(crate) fn heal(&self) {
    self.0.borrow_mut().healthy = None;
  }

  pub(crate) fn journal(&self) -> Vec<Op> {
    self.0.borrow().journal.clone()
  }

  pub(crate) fn frames(&self) -> Vec<Frame> {
    self.0.borrow().frames.clone()
  }

  pub(crate) fn commands(&self) -> Vec<u32> {
    self.journal().into_iter().filter_map(|op| if let Op::Cmd(c) = op { Some(c) } else { None }).collect()
  }

  pub(crate) fn clear_journal(&self) {
    let mut chip = self.0.borrow_mut();
    chip.journal.clear();
    chip.frames.clear();
  }
}

pub(crate) struct Bus(Rc<RefCell<ChipState>>);

impl ErrorType for Bus {
  type Error = ErrorKind;
}

impl embedded_hal_async::i2c::I2c<SevenBitAddress> for Bus {
  async fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
    let mut chip = self.0.borrow_mut();
    if chip.fails() {
      return Err(ErrorKind::Other);
    }

    let mut addr = None;
    for op in operations.iter_mut() {
      match op {
        Operation::Write(bytes) => {
          let (head, data) = bytes.split_at(4);
          let encoded = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
          addr = Some(encoded);
          for (i, w) in data.chunks_exact(4).enumerate() {
            let value = u32::from_be_bytes([w[0], w[1], w[2], w[3]]);
            let at = key(encoded) + 4 * i as u32;
            chip.regs.insert(at, value);
            if at != key(HIB_CMD.encode()) {
              chip.journal.push(Op::Write(at, value));
              continue;
            }
            chip.journal.push(Op::Cmd(value));
            if let Some(pos) = chip.responses.iter().position(|r| r.0 == value) {
              if let Some((_, reg, answer)) = chip.responses.remove(pos) {
                chip.regs.insert(reg, answer);
              }
            }
          }
        }
        Operation::Read(buf) => {
          let encoded = addr.ok_or(ErrorKind::Other)?;
          chip.frames.push(Frame { addr: encoded, len: buf.len() });
          for (i, out) in buf.chunks_exact_mut(4).enumerate() {
            let at = key(encoded) + 4 * i as u32;
            let value = match at == key(HIB_INTR_MSG.encode()) {
              true => chip.intr.pop_front().unwrap_or(0),
              false => chip.regs.get(&at).copied().unwrap_or(0),
            };
            out.copy_from_slice(&value.to_be_bytes());
          }
        }
      }
    }
    Ok(())
  }
}

pub(crate) struct Pin(Rc<RefCell<ChipState>>);

impl embedded_hal::digital::ErrorType for Pin {
  type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for Pin {
  fn set_low(&mut self) -> Result<(), Self::Error> {
    self.0.borrow_mut().journal.push(Op::Power(false));
    Ok(())
  }

  fn set_high(&mut self) -> Result<(), Self::Error> {
    self.0.borrow_mut().journal.push(Op::Power(true));
    Ok(())
  }
}

pub(crate) struct Delay(Rc<RefCell<ChipState>>);

impl embedded_hal_async::delay::DelayNs for Delay {
  async fn delay_ns(&mut self, _ns: u32) {}

  async fn delay_ms(&mut self, ms: u32) {
    self.0.borrow_mut().journal.push(Op::Delay(ms));
  }
}

fn parts() -> (Bus, Pin, Delay, Chip) {
  let chip = Rc::new(RefCell::new(ChipState::default()));
  chip.borrow_mut().regs.insert(key(Addr::direct(0x01).encode()), CHIP_ID);
  (Bus(chip.clone()), Pin(chip.clone()), Delay(chip.clone()), Chip(chip))
}

pub(crate) fn device(config: Config) -> (Device<Bus, Pin, Delay>, Chip) {
  let (bus, pin, delay, chip) = parts();
  (Device::new(bus, pin, delay, config), chip)
}

pub(crate) fn session(config: Config) -> (Ist30xx<NoopRawMutex, Bus, Pin, Delay>, Chip) {
  let (bus, pin, delay, chip) = parts();
  (Ist30xx::new(bus, pin, delay, config), chip)
}

/// Collects everything reported to it.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
  pub(crate) events: Vec<Event>,
  pub(crate) diagnostics: Vec<Diagnostic>,
  pub(crate) syncs: usize,
}

impl Recorder {
  /// Finger events as `(slot, phase, x, y)`.
  pub(crate) fn touches(&self) -> Vec<(u8, TouchPhase, u16, u16)> {
    self
      .events
      .iter()
      .filter_map(|e| match e {
        Event::Touch(t) => Some((t.slot(), t.phase, t.contact.x, t.contact.y)),
        _ => None,
      })
      .collect()
  }

  /// Key events as `(id, pressed)`.
  pub(crate) fn keys(&self) -> Vec<(u8, bool)> {
    self
      .events
      .iter()
      .filter_map(|e| match e {
        Event::Key(k) => Some((k.id, k.pressed)),
        _ => None,
      })
      .collect()
  }

  pub(crate) fn clear(&mut self) {
    self.events.clear();
    self.diagnostics.clear();
    self.syncs = 0;
  }
}

impl EventSink for Recorder {
  fn report(&mut self, event: Event) {
    self.events.push(event);
  }

  fn sync(&mut self) {
    self.syncs += 1;
  }

  fn diagnostic(&mut self, diagnostic: Diagnostic) {
    self.diagnostics.push(diagnostic);
  }
}
