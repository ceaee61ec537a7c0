use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::{Addr, Device, Error};

/// Upper bound on words moved in a single bus transaction.
pub(crate) const MAX_CHUNK_WORDS: usize = 64;

impl<I, E, P, D> Device<I, P, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  P: OutputPin,
  D: DelayNs,
{
  fn chunk_words(&self) -> usize {
    self.config.transfer.max_transfer_words.clamp(1, MAX_CHUNK_WORDS)
  }

  /// Single word read: 4-byte address out, 4-byte word back, both big-endian.
  pub(crate) async fn read(&mut self, addr: Addr) -> Result<u32, Error<E>> {
    let mut buf = [0u8; 4];
    let reg = addr.encode().to_be_bytes();
    self.i2c.write_read(self.config.transfer.i2c_addr, &reg, &mut buf).await.map_err(Error::I2c)?;
    Ok(u32::from_be_bytes(buf))
  }

  /// Single word write followed by the register settle delay.
  pub(crate) async fn write(&mut self, addr: Addr, value: u32) -> Result<(), Error<E>> {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&addr.encode().to_be_bytes());
    buf[4..].copy_from_slice(&value.to_be_bytes());
    self.i2c.write(self.config.transfer.i2c_addr, &buf).await.map_err(Error::I2c)?;
    if !self.ignore_delay {
      self.delay.delay_ms(self.config.timing.write_settle_ms).await;
    }
    Ok(())
  }

  /// Read `out.len()` consecutive words. On failure `out` is zeroed.
  pub(crate) async fn burst_read(&mut self, addr: Addr, out: &mut [u32]) -> Result<(), Error<E>> {
    let result = self.burst_read_chunks(addr, out).await;
    if result.is_err() {
      out.fill(0);
    }
    result
  }

  async fn burst_read_chunks(&mut self, addr: Addr, out: &mut [u32]) -> Result<(), Error<E>> {
    let chunk = self.chunk_words();
    let mut raw = [0u8; MAX_CHUNK_WORDS * 4];
    for (i, words) in out.chunks_mut(chunk).enumerate() {
      let reg = addr.advance(i * chunk).encode_burst().to_be_bytes();
      let bytes = &mut raw[..words.len() * 4];
      self.i2c.write_read(self.config.transfer.i2c_addr, &reg, bytes).await.map_err(Error::I2c)?;
      for (word, b) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
      }
    }
    Ok(())
  }

  /// Write consecutive words, chunked like [`Device::burst_read`].
  pub(crate) async fn burst_write(&mut self, addr: Addr, values: &[u32]) -> Result<(), Error<E>> {
    let chunk = self.chunk_words();
    let mut buf = [0u8; 4 + MAX_CHUNK_WORDS * 4];
    for (i, words) in values.chunks(chunk).enumerate() {
      buf[..4].copy_from_slice(&addr.advance(i * chunk).encode_burst().to_be_bytes());
      for (slot, word) in buf[4..].chunks_exact_mut(4).zip(words) {
        slot.copy_from_slice(&word.to_be_bytes());
      }
      let len = 4 + words.len() * 4;
      self.i2c.write(self.config.transfer.i2c_addr, &buf[..len]).await.map_err(Error::I2c)?;
    }
    Ok(())
  }

  /// Read a run of words, in bursts when the bus allows it and one by one otherwise.
  pub(crate) async fn read_words(&mut self, addr: Addr, out: &mut [u32]) -> Result<(), Error<E>> {
    if self.config.transfer.burst {
      return self.burst_read(addr, out).await;
    }
    for i in 0..out.len() {
      match self.read(addr.advance(i)).await {
        Ok(word) => out[i] = word,
        Err(e) => {
          out.fill(0);
          return Err(e);
        }
      }
    }
    Ok(())
  }
}
