//! Event loop example: interrupts, watchdog ticks and a charger mode change.
#![allow(unused)]
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::{
  delay::DelayNs,
  digital::Wait,
  i2c::{I2c, SevenBitAddress},
};
use ist30xx::{Config, Event, EventSink, Ist30xx, Layout, Panel, TouchPhase};

struct Input;

impl EventSink for Input {
  fn report(&mut self, event: Event) {
    match event {
      Event::Touch(touch) => match touch.phase {
        TouchPhase::Start => { /* finger down at touch.contact.x, touch.contact.y */ }
        TouchPhase::Move => { /* finger moved */ }
        TouchPhase::End => { /* finger up */ }
      },
      Event::Key(key) => {
        let _ = (key.id, key.pressed);
      }
    }
  }

  fn sync(&mut self) {
    // flush the frame to the input stack
  }
}

#[allow(dead_code)]
async fn main_async<I2C, PWR, DLY, INT, TICK, E>(
  i2c: I2C,
  power: PWR,
  delay: DLY,
  mut int: INT,
  mut tick: TICK,
  now_ms: impl Fn() -> u32,
) -> Result<(), ist30xx::Error<E>>
where
  I2C: I2c<SevenBitAddress, Error = E>,
  PWR: OutputPin,
  DLY: DelayNs,
  INT: Wait,
  TICK: DelayNs,
{
  let config = Config::new(Layout::IST30XXC, Panel::new(1080, 2400).with_keys(2)).with_report_rate(Some(8000));
  let touch: Ist30xx<NoopRawMutex, _, _, _> = Ist30xx::new(i2c, power, delay, config);
  let info = touch.initialize().await?;
  let _ = info.fw_version;

  touch.set_charger_mode(true, &mut Input).await;

  loop {
    match select(int.wait_for_falling_edge(), tick.delay_ms(500)).await {
      Either::First(_) => {
        touch.handle_interrupt(now_ms(), &mut Input).await;
      }
      Either::Second(()) => {
        touch.watchdog(now_ms(), &mut Input).await;
      }
    }
  }
}

fn main() {}
