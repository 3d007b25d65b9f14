// meter.rs

use crate::*;

/// One consistent set of readings from the power meter.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Snapshot {
    /// Volts.
    pub voltage: f32,
    /// Amps.
    pub current: f32,
    /// Active power, watts.
    pub power: f32,
    /// Power factor, 0..1.
    pub power_factor: f32,
    /// Cumulative active energy, watt-hours.
    pub energy: u32,
}

/// A power meter peripheral that refreshes its readings on demand.
///
/// `trigger_read()` performs one bus transaction. The getters only return what
/// the last successful transaction stored and never touch the bus, so a caller
/// can trigger once and then read every field from the same measurement.
pub trait MeterSource {
    /// Refresh the readings from the device.
    ///
    /// Returns `false` if no fresh values were obtained; the previous readings
    /// are kept as they were.
    fn trigger_read(&mut self) -> bool;

    fn voltage(&self) -> f32;
    fn current(&self) -> f32;
    fn active_power(&self) -> f32;
    fn power_factor(&self) -> f32;
    fn active_energy(&self) -> u32;

    /// Change the bus address stored on the device.
    fn set_address(&mut self, addr: u8) -> bool;

    /// The bus address the device is currently talked to at.
    fn address(&self) -> u8;

    /// Ask the device which address it has stored, and talk to it there from
    /// now on. `None` if the device could not be asked.
    fn stored_address(&mut self) -> Option<u8> {
        Some(self.address())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            voltage: self.voltage(),
            current: self.current(),
            power: self.active_power(),
            power_factor: self.power_factor(),
            energy: self.active_energy(),
        }
    }
}

impl<M: MeterSource + ?Sized> MeterSource for Box<M> {
    fn trigger_read(&mut self) -> bool {
        (**self).trigger_read()
    }
    fn voltage(&self) -> f32 {
        (**self).voltage()
    }
    fn current(&self) -> f32 {
        (**self).current()
    }
    fn active_power(&self) -> f32 {
        (**self).active_power()
    }
    fn power_factor(&self) -> f32 {
        (**self).power_factor()
    }
    fn active_energy(&self) -> u32 {
        (**self).active_energy()
    }
    fn set_address(&mut self, addr: u8) -> bool {
        (**self).set_address(addr)
    }
    fn address(&self) -> u8 {
        (**self).address()
    }
    fn stored_address(&mut self) -> Option<u8> {
        (**self).stored_address()
    }
}

/// Make sure the device answers at `desired`, writing the address at most once.
pub fn configure_address<M: MeterSource + ?Sized>(meter: &mut M, desired: u8) -> bool {
    if meter.stored_address() == Some(desired) {
        info!("Meter address is already {desired:#04x}");
        return true;
    }

    let current = meter.address();

    info!("Setting meter address {current:#04x} -> {desired:#04x}");
    if meter.set_address(desired) {
        info!("New meter address is {:#04x}", meter.address());
        true
    } else {
        warn!("Could not set meter address, staying at {current:#04x}");
        false
    }
}

/// In-memory meter with scripted outcomes, for tests and bench runs.
#[derive(Debug, Default)]
pub struct FakeMeter {
    snapshot: Snapshot,
    /// Readings that successive triggers produce; `None` is a failed transaction.
    pub script: std::collections::VecDeque<Option<Snapshot>>,
    pub addr: u8,
    pub triggers: u32,
    pub address_writes: u32,
}

impl FakeMeter {
    pub fn new(addr: u8) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }

    pub fn then(mut self, outcome: Option<Snapshot>) -> Self {
        self.script.push_back(outcome);
        self
    }
}

impl MeterSource for FakeMeter {
    fn trigger_read(&mut self) -> bool {
        self.triggers += 1;
        match self.script.pop_front().flatten() {
            Some(snapshot) => {
                self.snapshot = snapshot;
                true
            }
            None => false,
        }
    }

    fn voltage(&self) -> f32 {
        self.snapshot.voltage
    }
    fn current(&self) -> f32 {
        self.snapshot.current
    }
    fn active_power(&self) -> f32 {
        self.snapshot.power
    }
    fn power_factor(&self) -> f32 {
        self.snapshot.power_factor
    }
    fn active_energy(&self) -> u32 {
        self.snapshot.energy
    }

    fn set_address(&mut self, addr: u8) -> bool {
        self.address_writes += 1;
        self.addr = addr;
        true
    }

    fn address(&self) -> u8 {
        self.addr
    }
}


// EOF
