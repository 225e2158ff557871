//! Register-backed mock I²C bus.
//!
//! Each simulated device is a set of 128-byte register pages with the
//! TAA3040 power-on defaults. The simulation covers the behaviour the driver
//! relies on:
//!
//! - PAGE_CFG (offset 0x00 on every page) switches the active page
//! - SW_RESET (page 0, 0x01) bit 0 restores defaults and is self-clearing
//! - DEV_STS0 / DEV_STS1 (0x76 / 0x77) are read-only and derived from
//!   SLEEP_CFG, IN_CH_EN, ASI_OUT_CH_EN and PWR_CFG
//! - multi-byte writes and reads auto-increment the register pointer
//!
//! Faults are checked before a transaction takes effect, so a failed
//! transaction never changes register contents.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

const PAGE_SIZE: usize = 128;
const PAGE_COUNT: usize = 5;

const PAGE_CFG: u8 = 0x00;
const SW_RESET: u8 = 0x01;
const SLEEP_CFG: u8 = 0x02;
const ASI_STS: u8 = 0x15;
const IN_CH_EN: u8 = 0x73;
const ASI_OUT_CH_EN: u8 = 0x74;
const PWR_CFG: u8 = 0x75;
const DEV_STS0: u8 = 0x76;
const DEV_STS1: u8 = 0x77;

const SLEEP_ENZ: u8 = 1 << 0;
const ADC_PDZ: u8 = 1 << 6;

/// Page 0 power-on defaults that differ from zero.
const PAGE0_DEFAULTS: [(u8, u8); 12] = [
    (0x07, 0x30), // ASI_CFG0: TDM, 32-bit
    (0x13, 0x02), // MST_CFG0
    (0x14, 0x48), // MST_CFG1
    (0x3E, 0xC9), // CH1_CFG2: 0 dB
    (0x43, 0xC9), // CH2_CFG2
    (0x48, 0xC9), // CH3_CFG2
    (0x4D, 0xC9), // CH4_CFG2
    (0x3F, 0x80), // CH1_CFG3
    (0x44, 0x80), // CH2_CFG3
    (0x49, 0x80), // CH3_CFG3
    (0x4E, 0x80), // CH4_CFG3
    (IN_CH_EN, 0xF0),
];

/// One completed register access, as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// A register was written.
    Write {
        /// 7-bit device address.
        address: u8,
        /// Active page at the time of the write.
        page: u8,
        /// Register offset.
        register: u8,
        /// Written value.
        value: u8,
    },
    /// A register was read.
    Read {
        /// 7-bit device address.
        address: u8,
        /// Active page at the time of the read.
        page: u8,
        /// Register offset.
        register: u8,
        /// Returned value.
        value: u8,
    },
}

/// Which transactions a [`Fault`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTarget {
    /// Every transaction.
    Any,
    /// Every write-only transaction.
    AnyWrite,
    /// Every transaction containing a read.
    AnyRead,
    /// Writes addressing `register` while `page` is active.
    Write {
        /// Page the register lives on.
        page: u8,
        /// Register offset.
        register: u8,
    },
    /// Reads addressing `register` while `page` is active.
    Read {
        /// Page the register lives on.
        page: u8,
        /// Register offset.
        register: u8,
    },
}

/// How a faulted transaction fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The device does not acknowledge its data byte.
    Nack,
    /// Another controller won arbitration.
    ArbitrationLoss,
    /// Bus error (misplaced START/STOP).
    Bus,
    /// The transaction never completes (SCL held low).
    Stall,
}

/// Fault injection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Transactions the rule applies to.
    pub target: FaultTarget,
    /// Failure mode.
    pub kind: FaultKind,
    /// Matching transactions to let through before failing.
    pub skip: u32,
    /// Matching transactions to fail; `u32::MAX` fails forever.
    pub count: u32,
}

impl Fault {
    /// Fail every matching transaction.
    pub fn always(target: FaultTarget, kind: FaultKind) -> Self {
        Self {
            target,
            kind,
            skip: 0,
            count: u32::MAX,
        }
    }

    /// Fail the next `count` matching transactions.
    pub fn times(target: FaultTarget, kind: FaultKind, count: u32) -> Self {
        Self {
            target,
            kind,
            skip: 0,
            count,
        }
    }

    /// Let `skip` matching transactions through first.
    #[must_use]
    pub fn after(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    fn matches(&self, page: u8, register: u8, is_read: bool) -> bool {
        match self.target {
            FaultTarget::Any => true,
            FaultTarget::AnyWrite => !is_read,
            FaultTarget::AnyRead => is_read,
            FaultTarget::Write { page: p, register: r } => !is_read && p == page && r == register,
            FaultTarget::Read { page: p, register: r } => is_read && p == page && r == register,
        }
    }
}

/// Error returned by [`MockBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockBusError(pub ErrorKind);

impl embedded_hal::i2c::Error for MockBusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug)]
struct RegisterFile {
    address: u8,
    pages: [[u8; PAGE_SIZE]; PAGE_COUNT],
    page: u8,
    pointer: u8,
}

impl RegisterFile {
    fn new(address: u8) -> Self {
        let mut file = Self {
            address,
            pages: [[0; PAGE_SIZE]; PAGE_COUNT],
            page: 0,
            pointer: 0,
        };
        file.power_on_reset();
        file
    }

    fn power_on_reset(&mut self) {
        self.pages = [[0; PAGE_SIZE]; PAGE_COUNT];
        for (register, value) in PAGE0_DEFAULTS {
            self.poke(0, register, value);
        }
        self.page = 0;
    }

    fn peek(&self, page: u8, register: u8) -> u8 {
        self.pages
            .get(usize::from(page))
            .and_then(|p| p.get(usize::from(register)))
            .copied()
            .unwrap_or(0)
    }

    fn poke(&mut self, page: u8, register: u8, value: u8) {
        if let Some(slot) = self
            .pages
            .get_mut(usize::from(page))
            .and_then(|p| p.get_mut(usize::from(register)))
        {
            *slot = value;
        }
    }

    fn mode_bits(&self) -> u8 {
        let sleep_cfg = self.peek(0, SLEEP_CFG);
        let pwr_cfg = self.peek(0, PWR_CFG);
        let active = self.peek(0, IN_CH_EN) & self.peek(0, ASI_OUT_CH_EN);
        if sleep_cfg & SLEEP_ENZ == 0 {
            0b100 << 5
        } else if pwr_cfg & ADC_PDZ != 0 && active != 0 {
            0b111 << 5
        } else {
            0b110 << 5
        }
    }

    fn read(&self, register: u8) -> u8 {
        if register == PAGE_CFG {
            return self.page;
        }
        if self.page != 0 {
            return self.peek(self.page, register);
        }
        match register {
            SW_RESET => 0,
            DEV_STS1 => self.mode_bits(),
            DEV_STS0 if self.mode_bits() == 0b111 << 5 => {
                self.peek(0, IN_CH_EN) & self.peek(0, ASI_OUT_CH_EN) & 0xF0
            }
            DEV_STS0 | ASI_STS => 0,
            _ => self.peek(0, register),
        }
    }

    fn write(&mut self, register: u8, value: u8) {
        if register == PAGE_CFG {
            if usize::from(value) < PAGE_COUNT {
                self.page = value;
            }
            return;
        }
        if self.page == 0 {
            match register {
                SW_RESET => {
                    if value & 0x01 != 0 {
                        self.power_on_reset();
                    }
                    return;
                }
                DEV_STS0 | DEV_STS1 | ASI_STS => return,
                _ => {}
            }
        }
        self.poke(self.page, register, value);
    }
}

/// Mock I²C bus with one or more simulated TAA3040 devices.
#[derive(Debug)]
pub struct MockBus {
    devices: heapless::Vec<RegisterFile, 4>,
    faults: heapless::Vec<Fault, 8>,
    log: heapless::Vec<BusEvent, 1024>,
    transactions: u32,
}

impl MockBus {
    /// Create a bus with a single device at `address`.
    pub fn new(address: u8) -> Self {
        Self::with_devices(&[address])
    }

    /// Create a bus with one device per address (at most four).
    pub fn with_devices(addresses: &[u8]) -> Self {
        let mut devices = heapless::Vec::new();
        for &address in addresses {
            let _ = devices.push(RegisterFile::new(address));
        }
        Self {
            devices,
            faults: heapless::Vec::new(),
            log: heapless::Vec::new(),
            transactions: 0,
        }
    }

    /// Add a fault injection rule (at most eight are kept).
    pub fn inject(&mut self, fault: Fault) {
        let _ = self.faults.push(fault);
    }

    /// Remove every fault injection rule.
    pub fn heal(&mut self) {
        self.faults.clear();
    }

    /// Register contents without generating bus traffic.
    pub fn register(&self, address: u8, page: u8, register: u8) -> Option<u8> {
        self.device(address).map(|d| d.peek(page, register))
    }

    /// Overwrite a register without generating bus traffic.
    pub fn set_register(&mut self, address: u8, page: u8, register: u8, value: u8) {
        if let Some(device) = self.device_mut(address) {
            device.poke(page, register, value);
        }
    }

    /// Completed register accesses, oldest first (first 1024 only).
    pub fn events(&self) -> &[BusEvent] {
        &self.log
    }

    /// Values written to `register` on `page`, oldest first.
    pub fn writes_to(&self, page: u8, register: u8) -> impl Iterator<Item = u8> + '_ {
        self.log.iter().filter_map(move |event| match *event {
            BusEvent::Write {
                page: p,
                register: r,
                value,
                ..
            } if p == page && r == register => Some(value),
            _ => None,
        })
    }

    /// Number of completed register writes.
    pub fn write_count(&self) -> usize {
        self.log
            .iter()
            .filter(|e| matches!(e, BusEvent::Write { .. }))
            .count()
    }

    /// Number of transactions attempted, including faulted ones.
    pub fn transactions(&self) -> u32 {
        self.transactions
    }

    /// Forget the transaction log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn device(&self, address: u8) -> Option<&RegisterFile> {
        self.devices.iter().find(|d| d.address == address)
    }

    fn device_mut(&mut self, address: u8) -> Option<&mut RegisterFile> {
        self.devices.iter_mut().find(|d| d.address == address)
    }

    /// Consume the first matching fault rule, returning its failure mode.
    fn take_fault(&mut self, page: u8, register: u8, is_read: bool) -> Option<FaultKind> {
        for fault in self.faults.iter_mut() {
            if fault.count == 0 || !fault.matches(page, register, is_read) {
                continue;
            }
            if fault.skip > 0 {
                fault.skip = fault.skip.saturating_sub(1);
                continue;
            }
            if fault.count != u32::MAX {
                fault.count = fault.count.saturating_sub(1);
            }
            return Some(fault.kind);
        }
        None
    }

    fn record(&mut self, event: BusEvent) {
        let _ = self.log.push(event);
    }
}

impl ErrorType for MockBus {
    type Error = MockBusError;
}

impl I2c for MockBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.transactions = self.transactions.saturating_add(1);

        let Some(device) = self.device(address) else {
            return Err(MockBusError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        };

        let is_read = operations.iter().any(|op| matches!(op, Operation::Read(_)));
        let target = operations
            .iter()
            .find_map(|op| match op {
                Operation::Write(data) => data.first().copied(),
                Operation::Read(_) => None,
            })
            .unwrap_or(device.pointer);
        let page = device.page;

        if let Some(kind) = self.take_fault(page, target, is_read) {
            let error = match kind {
                FaultKind::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
                FaultKind::ArbitrationLoss => ErrorKind::ArbitrationLoss,
                FaultKind::Bus => ErrorKind::Bus,
                FaultKind::Stall => {
                    core::future::pending::<()>().await;
                    ErrorKind::Other
                }
            };
            return Err(MockBusError(error));
        }

        let mut events: heapless::Vec<BusEvent, 32> = heapless::Vec::new();
        let Some(device) = self.device_mut(address) else {
            return Err(MockBusError(ErrorKind::Other));
        };
        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => {
                    let mut bytes = data.iter().copied();
                    if let Some(pointer) = bytes.next() {
                        device.pointer = pointer;
                    }
                    for value in bytes {
                        let register = device.pointer;
                        let page = device.page;
                        device.write(register, value);
                        let _ = events.push(BusEvent::Write {
                            address,
                            page,
                            register,
                            value,
                        });
                        device.pointer = register.wrapping_add(1) & 0x7F;
                    }
                }
                Operation::Read(buffer) => {
                    for slot in buffer.iter_mut() {
                        let register = device.pointer;
                        let value = device.read(register);
                        *slot = value;
                        let _ = events.push(BusEvent::Read {
                            address,
                            page: device.page,
                            register,
                            value,
                        });
                        device.pointer = register.wrapping_add(1) & 0x7F;
                    }
                }
            }
        }
        for event in events {
            self.record(event);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const ADDR: u8 = 0x4C;

    #[tokio::test]
    async fn power_on_defaults_match_datasheet() {
        let mut bus = MockBus::new(ADDR);
        let mut value = [0u8];
        bus.write_read(ADDR, &[0x07], &mut value).await.unwrap();
        assert_eq!(value[0], 0x30, "ASI_CFG0 defaults to TDM / 32-bit");
        bus.write_read(ADDR, &[0x3E], &mut value).await.unwrap();
        assert_eq!(value[0], 0xC9, "CH1_CFG2 defaults to 0 dB");
        bus.write_read(ADDR, &[DEV_STS1], &mut value).await.unwrap();
        assert_eq!(value[0] >> 5, 0b100, "device starts asleep");
    }

    #[tokio::test]
    async fn unknown_address_is_nacked() {
        let mut bus = MockBus::new(ADDR);
        let err = bus.write(0x4D, &[0x02, 0x81]).await.unwrap_err();
        assert_eq!(
            err.0,
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
    }

    #[tokio::test]
    async fn software_reset_restores_defaults() {
        let mut bus = MockBus::new(ADDR);
        bus.write(ADDR, &[0x3D, 0x30]).await.unwrap();
        bus.write(ADDR, &[SW_RESET, 0x01]).await.unwrap();
        assert_eq!(bus.register(ADDR, 0, 0x3D), Some(0));
        assert_eq!(bus.register(ADDR, 0, IN_CH_EN), Some(0xF0));
    }

    #[tokio::test]
    async fn pages_are_independent() {
        let mut bus = MockBus::new(ADDR);
        bus.write(ADDR, &[PAGE_CFG, 2]).await.unwrap();
        bus.write(ADDR, &[0x08, 0xAB, 0xCD]).await.unwrap();
        bus.write(ADDR, &[PAGE_CFG, 0]).await.unwrap();
        assert_eq!(bus.register(ADDR, 2, 0x08), Some(0xAB));
        assert_eq!(bus.register(ADDR, 2, 0x09), Some(0xCD));
        assert_eq!(bus.register(ADDR, 0, 0x08), Some(0));
    }

    #[tokio::test]
    async fn status_reflects_power_configuration() {
        let mut bus = MockBus::new(ADDR);
        bus.write(ADDR, &[SLEEP_CFG, 0x81]).await.unwrap();
        bus.write(ADDR, &[ASI_OUT_CH_EN, 0x80]).await.unwrap();
        bus.write(ADDR, &[PWR_CFG, 0x60]).await.unwrap();
        let mut status = [0u8; 2];
        bus.write_read(ADDR, &[DEV_STS0], &mut status).await.unwrap();
        assert_eq!(status[0], 0x80, "only channel 1 is both enabled and routed");
        assert_eq!(status[1] >> 5, 0b111);
    }

    #[tokio::test]
    async fn faults_skip_then_fail_then_expire() {
        let mut bus = MockBus::new(ADDR);
        bus.inject(Fault::times(FaultTarget::AnyWrite, FaultKind::Nack, 1).after(1));

        assert!(bus.write(ADDR, &[0x3D, 0x04]).await.is_ok());
        assert!(bus.write(ADDR, &[0x3D, 0x08]).await.is_err());
        assert!(bus.write(ADDR, &[0x3D, 0x0C]).await.is_ok());

        assert_eq!(bus.writes_to(0, 0x3D).collect::<std::vec::Vec<_>>(), [0x04, 0x0C]);
        assert_eq!(bus.transactions(), 3);
    }

    #[tokio::test]
    async fn register_fault_leaves_register_untouched() {
        let mut bus = MockBus::new(ADDR);
        bus.inject(Fault::always(
            FaultTarget::Write { page: 0, register: 0x42 },
            FaultKind::Bus,
        ));
        assert!(bus.write(ADDR, &[0x42, 0x10]).await.is_err());
        assert!(bus.write(ADDR, &[0x3D, 0x10]).await.is_ok());
        assert_eq!(bus.register(ADDR, 0, 0x42), Some(0));
        assert_eq!(bus.write_count(), 1);
    }
}
