// pzem.rs
//
// PZEM-004T v3 energy meter, Modbus-RTU over a serial line.

use crc::{Crc, CRC_16_MODBUS};

use crate::*;

/// Address every PZEM answers to, whatever its configured address is.
pub const GENERAL_ADDRESS: u8 = 0xf8;

const FN_READ_HOLDING: u8 = 0x03;
const FN_READ_INPUT: u8 = 0x04;
const FN_WRITE_SINGLE: u8 = 0x06;
const EXCEPTION_FLAG: u8 = 0x80;

const REG_MEASUREMENTS: u16 = 0x0000;
const MEASUREMENT_REGS: u16 = 10;
const REG_ADDRESS: u16 = 0x0002;

const MAX_FRAME: usize = 32;
// addr + fn + byte count + 20 data bytes + crc
const MEASUREMENT_REPLY_LEN: usize = 3 + 2 * MEASUREMENT_REGS as usize + 2;
const WRITE_REPLY_LEN: usize = 8;
const EXCEPTION_REPLY_LEN: usize = 5;

const MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

pub type Frame = heapless::Vec<u8, MAX_FRAME>;

/// Byte transport to the meter.
pub trait SerialBus {
    fn write_all(&mut self, data: &[u8]) -> anyhow::Result<()>;

    /// Read until `buf` is full or `timeout` passes, returning the byte count.
    fn read_frame(&mut self, buf: &mut [u8], timeout: Duration) -> anyhow::Result<usize>;

    /// Drop any stale input before a new request.
    fn discard_input(&mut self) {}
}

fn frame(bytes: &[u8]) -> anyhow::Result<Frame> {
    let mut f = Frame::new();
    f.extend_from_slice(bytes)
        .map_err(|_| anyhow!("frame too long: {} bytes", bytes.len()))?;
    let crc = MODBUS.checksum(bytes);
    f.extend_from_slice(&crc.to_le_bytes())
        .map_err(|_| anyhow!("frame too long: {} bytes", bytes.len() + 2))?;
    Ok(f)
}

fn request(addr: u8, function: u8, reg: u16, value: u16) -> anyhow::Result<Frame> {
    let [reg_hi, reg_lo] = reg.to_be_bytes();
    let [val_hi, val_lo] = value.to_be_bytes();
    frame(&[addr, function, reg_hi, reg_lo, val_hi, val_lo])
}

pub fn read_input_request(addr: u8, start: u16, count: u16) -> anyhow::Result<Frame> {
    request(addr, FN_READ_INPUT, start, count)
}

pub fn read_holding_request(addr: u8, start: u16, count: u16) -> anyhow::Result<Frame> {
    request(addr, FN_READ_HOLDING, start, count)
}

pub fn write_single_request(addr: u8, reg: u16, value: u16) -> anyhow::Result<Frame> {
    request(addr, FN_WRITE_SINGLE, reg, value)
}

fn crc_ok(frame: &[u8]) -> bool {
    match frame.len() {
        0..=2 => false,
        n => {
            let (body, tail) = frame.split_at(n - 2);
            MODBUS.checksum(body).to_le_bytes() == tail
        }
    }
}

/// Decode the ten measurement registers (20 bytes, big-endian words).
pub fn decode_measurements(data: &[u8]) -> anyhow::Result<Snapshot> {
    if data.len() != 2 * MEASUREMENT_REGS as usize {
        bail!("expected {} data bytes, got {}", 2 * MEASUREMENT_REGS, data.len());
    }
    let reg = |i: usize| u16::from_be_bytes([data[2 * i], data[2 * i + 1]]) as u32;
    // 32-bit values come low word first
    let reg32 = |i: usize| reg(i) | (reg(i + 1) << 16);

    Ok(Snapshot {
        voltage: reg(0) as f32 / 10.0,
        current: reg32(1) as f32 / 1000.0,
        power: reg32(3) as f32 / 10.0,
        energy: reg32(5),
        power_factor: reg(8) as f32 / 100.0,
    })
}

pub struct Pzem004t<B> {
    bus: B,
    addr: u8,
    timeout: Duration,
    snapshot: Snapshot,
}

impl<B: SerialBus> Pzem004t<B> {
    pub fn new(bus: B, timeout: Duration) -> Self {
        Self {
            bus,
            addr: GENERAL_ADDRESS,
            timeout,
            snapshot: Snapshot::default(),
        }
    }

    #[cfg(test)]
    pub fn with_address(mut self, addr: u8) -> Self {
        self.addr = addr;
        self
    }

    fn transact(&mut self, req: &[u8], reply_len: usize) -> anyhow::Result<Frame> {
        self.bus.discard_input();
        self.bus.write_all(req)?;

        let mut buf = [0u8; MAX_FRAME];
        let n = self.bus.read_frame(&mut buf[..reply_len], self.timeout)?;
        let reply = &buf[..n];

        if n >= EXCEPTION_REPLY_LEN && reply[1] == req[1] | EXCEPTION_FLAG {
            let exc = &reply[..EXCEPTION_REPLY_LEN];
            if crc_ok(exc) {
                bail!("modbus exception {:#04x}", exc[2]);
            }
        }
        if n < reply_len {
            bail!("short reply: {n}/{reply_len} bytes");
        }
        if !crc_ok(reply) {
            bail!("crc mismatch");
        }
        // under the general address the reply may carry the real one
        if req[0] != GENERAL_ADDRESS && reply[0] != req[0] {
            bail!("reply from address {:#04x}, expected {:#04x}", reply[0], req[0]);
        }
        if reply[1] != req[1] {
            bail!("reply function {:#04x}, expected {:#04x}", reply[1], req[1]);
        }
        Frame::from_slice(reply).map_err(|_| anyhow!("reply too long"))
    }

    pub fn read_measurements(&mut self) -> anyhow::Result<Snapshot> {
        let req = read_input_request(self.addr, REG_MEASUREMENTS, MEASUREMENT_REGS)?;
        let reply = self.transact(&req, MEASUREMENT_REPLY_LEN)?;
        let count = reply[2] as usize;
        if count != 2 * MEASUREMENT_REGS as usize {
            bail!("byte count {count} in reply");
        }
        decode_measurements(&reply[3..3 + count])
    }

    /// Ask the device which address it has stored.
    pub fn read_address(&mut self) -> anyhow::Result<u8> {
        let req = read_holding_request(self.addr, REG_ADDRESS, 1)?;
        // addr + fn + count + one register + crc
        let reply = self.transact(&req, 7)?;
        Ok(reply[4])
    }

    pub fn write_address(&mut self, addr: u8) -> anyhow::Result<()> {
        if !(0x01..GENERAL_ADDRESS).contains(&addr) {
            bail!("invalid meter address {addr:#04x}");
        }
        let req = write_single_request(self.addr, REG_ADDRESS, addr as u16)?;
        let reply = self.transact(&req, WRITE_REPLY_LEN)?;
        if reply[2..6] != req[2..6] {
            bail!("address write not echoed");
        }
        self.addr = addr;
        Ok(())
    }
}

impl<B: SerialBus> MeterSource for Pzem004t<B> {
    fn trigger_read(&mut self) -> bool {
        match self.read_measurements() {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                true
            }
            Err(e) => {
                warn!("Meter read failed: {e:#}");
                false
            }
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
        match self.write_address(addr) {
            Ok(()) => true,
            Err(e) => {
                warn!("Meter address write failed: {e:#}");
                false
            }
        }
    }

    fn address(&self) -> u8 {
        self.addr
    }

    fn stored_address(&mut self) -> Option<u8> {
        match self.read_address() {
            Ok(addr) if (0x01..GENERAL_ADDRESS).contains(&addr) => {
                self.addr = addr;
                Some(addr)
            }
            Ok(addr) => {
                warn!("Meter reports invalid address {addr:#04x}");
                None
            }
            Err(e) => {
                warn!("Meter address read failed: {e:#}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Default)]
    struct ScriptedBus {
        written: Vec<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
    }

    impl SerialBus for ScriptedBus {
        fn write_all(&mut self, data: &[u8]) -> anyhow::Result<()> {
            self.written.push(data.to_vec());
            Ok(())
        }

        fn read_frame(&mut self, buf: &mut [u8], _timeout: Duration) -> anyhow::Result<usize> {
            let reply = self.replies.pop_front().unwrap_or_default();
            let n = reply.len().min(buf.len());
            buf[..n].copy_from_slice(&reply[..n]);
            Ok(n)
        }
    }

    fn with_crc(body: &[u8]) -> Vec<u8> {
        frame(body).unwrap().to_vec()
    }

    fn measurement_reply(addr: u8) -> Vec<u8> {
        let regs: [u16; 10] = [2301, 430, 0, 985, 0, 1534, 0, 500, 97, 0];
        let mut body = vec![addr, FN_READ_INPUT, 20];
        for r in regs {
            body.extend_from_slice(&r.to_be_bytes());
        }
        with_crc(&body)
    }

    fn meter(replies: Vec<Vec<u8>>) -> Pzem004t<ScriptedBus> {
        let bus = ScriptedBus {
            replies: replies.into(),
            ..Default::default()
        };
        Pzem004t::new(bus, Duration::from_millis(100)).with_address(0x01)
    }

    #[test]
    fn request_frames() {
        assert_eq!(
            read_input_request(0x01, 0, 10).unwrap().as_slice(),
            &[0x01, 0x04, 0x00, 0x00, 0x00, 0x0a, 0x70, 0x0d]
        );
        assert_eq!(
            write_single_request(0xf8, 2, 5).unwrap().as_slice(),
            &[0xf8, 0x06, 0x00, 0x02, 0x00, 0x05, 0xfc, 0x60]
        );
    }

    #[test]
    fn reads_measurements() {
        let mut m = meter(vec![measurement_reply(0x01)]);
        assert!(m.trigger_read());
        let s = m.snapshot();
        assert_eq!(s.voltage, 230.1);
        assert_eq!(s.current, 0.43);
        assert_eq!(s.power, 98.5);
        assert_eq!(s.power_factor, 0.97);
        assert_eq!(s.energy, 1534);
        assert_eq!(m.bus.written[0], vec![0x01, 0x04, 0x00, 0x00, 0x00, 0x0a, 0x70, 0x0d]);
    }

    #[test]
    fn large_current_uses_high_word() {
        let mut data = [0u8; 20];
        // 70000 mA = 0x0001_1170, low word first
        data[2..4].copy_from_slice(&0x1170u16.to_be_bytes());
        data[4..6].copy_from_slice(&0x0001u16.to_be_bytes());
        let s = decode_measurements(&data).unwrap();
        assert_eq!(s.current, 70.0);
        assert!(decode_measurements(&data[..18]).is_err());
    }

    #[test]
    fn bad_crc_keeps_snapshot() {
        let mut corrupt = measurement_reply(0x01);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xff;

        let mut m = meter(vec![measurement_reply(0x01), corrupt]);
        assert!(m.trigger_read());
        let before = m.snapshot();
        assert!(!m.trigger_read());
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn timeout_and_exception_fail() {
        let exception = with_crc(&[0x01, FN_READ_INPUT | EXCEPTION_FLAG, 0x02]);
        let mut m = meter(vec![vec![], exception, measurement_reply(0x02)]);
        assert!(!m.trigger_read());
        assert!(!m.trigger_read());
        // reply from some other device
        assert!(!m.trigger_read());
        assert_eq!(m.snapshot(), Snapshot::default());
    }

    #[test]
    fn set_address_follows_device() {
        let req = write_single_request(0x01, REG_ADDRESS, 0x05).unwrap().to_vec();
        let mut m = meter(vec![req.clone(), measurement_reply(0x05)]);
        assert!(m.set_address(0x05));
        assert_eq!(m.address(), 0x05);
        assert_eq!(m.bus.written[0], req);
        assert!(m.trigger_read());
        assert_eq!(m.bus.written[1][0], 0x05);
    }

    #[test]
    fn set_address_rejects_reserved() {
        let mut m = meter(vec![]);
        assert!(!m.set_address(0x00));
        assert!(!m.set_address(GENERAL_ADDRESS));
        assert_eq!(m.address(), 0x01);
        assert!(m.bus.written.is_empty());
    }

    #[test]
    fn set_address_without_echo_fails() {
        let mut m = meter(vec![vec![]]);
        assert!(!m.set_address(0x05));
        assert_eq!(m.address(), 0x01);
    }

    fn address_reply(stored: u8) -> Vec<u8> {
        with_crc(&[GENERAL_ADDRESS, FN_READ_HOLDING, 2, 0x00, stored])
    }

    fn general_meter(replies: Vec<Vec<u8>>) -> Pzem004t<ScriptedBus> {
        let bus = ScriptedBus {
            replies: replies.into(),
            ..Default::default()
        };
        Pzem004t::new(bus, Duration::from_millis(100))
    }

    #[test]
    fn startup_skips_write_when_address_stored() {
        let mut m = general_meter(vec![address_reply(0x05)]);
        assert!(configure_address(&mut m, 0x05));
        assert_eq!(m.address(), 0x05);
        assert_eq!(m.bus.written.len(), 1);
        assert!(m.bus.written.iter().all(|f| f[1] != FN_WRITE_SINGLE));
    }

    #[test]
    fn startup_writes_differing_address_once() {
        let write = write_single_request(0x01, REG_ADDRESS, 0x05).unwrap().to_vec();
        let mut m = general_meter(vec![address_reply(0x01), write.clone()]);
        assert!(configure_address(&mut m, 0x05));
        assert_eq!(m.address(), 0x05);
        let writes: Vec<_> = m.bus.written.iter().filter(|f| f[1] == FN_WRITE_SINGLE).collect();
        assert_eq!(writes, [&write]);
    }

    #[test]
    fn startup_writes_when_address_unreadable() {
        let write = write_single_request(GENERAL_ADDRESS, REG_ADDRESS, 0x05)
            .unwrap()
            .to_vec();
        let mut m = general_meter(vec![vec![], write]);
        assert!(configure_address(&mut m, 0x05));
        assert_eq!(m.address(), 0x05);
        assert_eq!(m.bus.written.len(), 2);
    }

    #[test]
    fn reads_stored_address() {
        let reply = with_crc(&[GENERAL_ADDRESS, FN_READ_HOLDING, 2, 0x00, 0x05]);
        let bus = ScriptedBus {
            replies: vec![reply].into(),
            ..Default::default()
        };
        let mut m = Pzem004t::new(bus, Duration::from_millis(100));
        assert_eq!(m.read_address().unwrap(), 0x05);
    }
}

// EOF
