//! Register transport over the I²C control bus.
//!
//! Every register access is its own transaction: writes are `[offset, value]`,
//! reads are `write_read([offset], [value])`. Page switching is transparent:
//! the transport remembers the active page and writes PAGE_CFG only when the
//! next register lives elsewhere.
//!
//! Each try is bounded by [`DriverConfig::transaction_timeout`]. Failed tries
//! are retried per [`RetryPolicy`](crate::RetryPolicy) with exponential
//! backoff; a [`TransportError`] is returned only once every try failed.
//!
//! The transport keeps a shadow of the last value written to or read from
//! every register. A failed write drops the register's shadow entry, since
//! the part may or may not have latched it.

use embassy_time::{with_timeout, Timer};
use embedded_hal::i2c::Error as _;
use embedded_hal_async::i2c::I2c;
use heapless::index_map::FnvIndexMap;
use platform::I2cAddr;

use crate::config::DriverConfig;
use crate::error::{BusFault, TransportError};
use crate::registers::{Register, PAGE_CFG};

/// Registers the shadow can hold: page 0, both biquad pages and the IIR block.
pub const SHADOW_CAPACITY: usize = 512;

/// Transaction counters, saturating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportStats {
    /// Tries issued on the bus, including retries and page switches.
    pub transactions: u32,
    /// Tries that were retried after a failure.
    pub retries: u32,
    /// Accesses that failed after every retry.
    pub failures: u32,
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Write(u8),
    Read,
}

/// Paged, retrying register access to one device.
pub struct RegisterTransport<I> {
    i2c: I,
    address: I2cAddr,
    config: DriverConfig,
    /// Active page, `None` until the first access or after a failed switch.
    page: Option<u8>,
    shadow: FnvIndexMap<u16, u8, SHADOW_CAPACITY>,
    stats: TransportStats,
}

impl<I: I2c> RegisterTransport<I> {
    /// Wrap `i2c` for the device at `address`.
    pub fn new(i2c: I, address: I2cAddr, config: DriverConfig) -> Self {
        Self {
            i2c,
            address,
            config,
            page: None,
            shadow: FnvIndexMap::new(),
            stats: TransportStats::default(),
        }
    }

    /// Read one register.
    pub async fn read(&mut self, register: Register) -> Result<u8, TransportError> {
        self.select_page(register.page).await?;
        let value = self.with_retry(register, Access::Read).await?;
        trace!("read {} = {}", register, value);
        let _ = self.shadow.insert(register.key(), value);
        Ok(value)
    }

    /// Write one register.
    pub async fn write(&mut self, register: Register, value: u8) -> Result<(), TransportError> {
        self.select_page(register.page).await?;
        match self.with_retry(register, Access::Write(value)).await {
            Ok(_) => {
                trace!("write {} = {}", register, value);
                let _ = self.shadow.insert(register.key(), value);
                Ok(())
            }
            Err(err) => {
                self.shadow.remove(&register.key());
                Err(err)
            }
        }
    }

    /// Last value written to or read from `register`, if known.
    pub fn shadow(&self, register: Register) -> Option<u8> {
        self.shadow.get(&register.key()).copied()
    }

    /// Forget all cached state after a device reset.
    ///
    /// SW_RESET returns the part to page 0 and restores register defaults.
    pub fn invalidate(&mut self) {
        self.page = Some(0);
        self.shadow.clear();
    }

    /// Forget the active page so the next access rewrites PAGE_CFG.
    pub fn forget_page(&mut self) {
        self.page = None;
    }

    /// Active page as last written, if known.
    pub fn page(&self) -> Option<u8> {
        self.page
    }

    /// Transaction counters.
    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Driver tuning in effect.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Device address.
    pub fn address(&self) -> I2cAddr {
        self.address
    }

    /// Borrow the underlying bus.
    pub fn bus(&self) -> &I {
        &self.i2c
    }

    /// Mutably borrow the underlying bus.
    pub fn bus_mut(&mut self) -> &mut I {
        &mut self.i2c
    }

    /// Give the bus back.
    pub fn release(self) -> I {
        self.i2c
    }

    /// Make `page` the active page, writing PAGE_CFG only if it is not.
    pub async fn select_page(&mut self, page: u8) -> Result<(), TransportError> {
        if self.page == Some(page) {
            return Ok(());
        }
        let target = Register {
            page,
            offset: PAGE_CFG,
        };
        match self.with_retry(target, Access::Write(page)).await {
            Ok(_) => {
                trace!("page {}", page);
                self.page = Some(page);
                Ok(())
            }
            Err(err) => {
                self.page = None;
                Err(err)
            }
        }
    }

    async fn with_retry(&mut self, register: Register, access: Access) -> Result<u8, TransportError> {
        let attempts = self.config.retry.attempts();
        let mut attempt: u8 = 1;
        loop {
            self.stats.transactions = self.stats.transactions.saturating_add(1);
            let kind = match self.attempt(register.offset, access).await {
                Ok(value) => return Ok(value),
                Err(kind) => kind,
            };
            if attempt >= attempts {
                self.stats.failures = self.stats.failures.saturating_add(1);
                error!("{}: {} after {} attempt(s)", register, kind, attempt);
                return Err(TransportError {
                    register,
                    kind,
                    attempts: attempt,
                });
            }
            warn!("{}: {}, retry {}/{}", register, kind, attempt, attempts);
            self.stats.retries = self.stats.retries.saturating_add(1);
            Timer::after(self.config.retry.backoff(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    }

    /// One bus transaction, bounded by the transaction timeout.
    async fn attempt(&mut self, offset: u8, access: Access) -> Result<u8, BusFault> {
        let address = self.address.get();
        let timeout = self.config.transaction_timeout();
        match access {
            Access::Write(value) => {
                match with_timeout(timeout, self.i2c.write(address, &[offset, value])).await {
                    Ok(Ok(())) => Ok(value),
                    Ok(Err(err)) => Err(BusFault::from_kind(err.kind())),
                    Err(_) => Err(BusFault::Timeout),
                }
            }
            Access::Read => {
                let mut buf = [0u8; 1];
                let result =
                    with_timeout(timeout, self.i2c.write_read(address, &[offset], &mut buf)).await;
                let [value] = buf;
                match result {
                    Ok(Ok(())) => Ok(value),
                    Ok(Err(err)) => Err(BusFault::from_kind(err.kind())),
                    Err(_) => Err(BusFault::Timeout),
                }
            }
        }
    }
}
