//! Scripted stand-in for the host interface, test builds only

extern crate std;

use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;

use crate::{
    interface::Interface,
    nfc_a::Iso14443aInitiator,
    registers::{Register, RxStatus},
    Pn5180,
};

/// Error injected by [`MockTransceiver::fail_on_send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct ScriptedFault;

/// One frame the driver pushed out, bit count included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub bytes: Vec<u8>,
    pub tx_last_bits: u8,
}

/// Every interface call in order, for sequencing assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    LoadRfConfig(u8, u8),
    RfOn,
    RfOff,
    WriteReg(u8, u32),
    ReadReg(u8),
    OrMask(u8, u32),
    AndMask(u8, u32),
    Send(Vec<u8>, u8),
    Read(usize),
}

/// Plays back queued card responses against the driver
///
/// Reads with nothing queued come back zero filled, like an empty field.
/// The reception register reports the length of the next queued response.
pub struct MockTransceiver {
    pub responses: VecDeque<Vec<u8>>,
    pub frames: Vec<SentFrame>,
    pub regs: BTreeMap<u8, u32>,
    pub ops: Vec<Op>,
    /// Zero-based index of the send that fails with [`ScriptedFault`]
    pub fail_on_send: Option<usize>,
    sends_seen: usize,
}

impl MockTransceiver {
    pub fn new() -> Self {
        MockTransceiver {
            responses: VecDeque::new(),
            frames: Vec::new(),
            regs: BTreeMap::new(),
            ops: Vec::new(),
            fail_on_send: None,
            sends_seen: 0,
        }
    }

    pub fn queue_response(&mut self, bytes: &[u8]) {
        self.responses.push_back(bytes.to_vec());
    }
}

impl Interface for MockTransceiver {
    type Error = ScriptedFault;

    fn send_data(&mut self, buf: &[u8], tx_last_bits: u8) -> Result<(), Self::Error> {
        let n = self.sends_seen;
        self.sends_seen += 1;
        if self.fail_on_send == Some(n) {
            return Err(ScriptedFault);
        }
        self.ops.push(Op::Send(buf.to_vec(), tx_last_bits));
        self.frames.push(SentFrame {
            bytes: buf.to_vec(),
            tx_last_bits,
        });
        Ok(())
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.ops.push(Op::Read(buf.len()));
        match self.responses.pop_front() {
            Some(rsp) => {
                let n = rsp.len().min(buf.len());
                buf[..n].copy_from_slice(&rsp[..n]);
                buf[n..].fill(0);
            }
            None => buf.fill(0),
        }
        Ok(())
    }

    fn register_read(&mut self, addr: u8) -> Result<u32, Self::Error> {
        self.ops.push(Op::ReadReg(addr));
        if addr == RxStatus::ADDRESS {
            let len = self.responses.front().map(Vec::len).unwrap_or(0);
            return Ok(len as u32);
        }
        Ok(*self.regs.get(&addr).unwrap_or(&0))
    }

    fn register_write(&mut self, addr: u8, value: u32) -> Result<(), Self::Error> {
        self.ops.push(Op::WriteReg(addr, value));
        self.regs.insert(addr, value);
        Ok(())
    }

    fn register_or_mask(&mut self, addr: u8, mask: u32) -> Result<(), Self::Error> {
        self.ops.push(Op::OrMask(addr, mask));
        *self.regs.entry(addr).or_insert(0) |= mask;
        Ok(())
    }

    fn register_and_mask(&mut self, addr: u8, mask: u32) -> Result<(), Self::Error> {
        self.ops.push(Op::AndMask(addr, mask));
        *self.regs.entry(addr).or_insert(0) &= mask;
        Ok(())
    }

    fn load_rf_config(&mut self, tx: u8, rx: u8) -> Result<(), Self::Error> {
        self.ops.push(Op::LoadRfConfig(tx, rx));
        Ok(())
    }

    fn rf_on(&mut self) -> Result<(), Self::Error> {
        self.ops.push(Op::RfOn);
        Ok(())
    }

    fn rf_off(&mut self) -> Result<(), Self::Error> {
        self.ops.push(Op::RfOff);
        Ok(())
    }
}

pub struct NoopDelay;

impl embedded_hal::delay::DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Driver over a scripted transceiver with the field already up
pub fn initiator(mock: MockTransceiver) -> Iso14443aInitiator<MockTransceiver, NoopDelay> {
    Pn5180::new(mock, NoopDelay)
        .into_iso14443a_initiator()
        .unwrap()
}

fn bcc(bytes: [u8; 4]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Queues ATQA, one anticollision round and the final SAK
pub fn queue_single_activation(
    mock: &mut MockTransceiver,
    atqa: [u8; 2],
    uid: [u8; 4],
    sak: u8,
) {
    mock.queue_response(&atqa);
    mock.queue_response(&[uid[0], uid[1], uid[2], uid[3], bcc(uid)]);
    mock.queue_response(&[sak]);
}

/// Queues ATQA and both cascade rounds of a seven byte UID
pub fn queue_double_activation(
    mock: &mut MockTransceiver,
    atqa: [u8; 2],
    uid: [u8; 7],
    sak: u8,
) {
    use crate::nfc_a::{CASCADE_TAG, SAK_UID_INCOMPLETE};

    mock.queue_response(&atqa);
    let head = [CASCADE_TAG, uid[0], uid[1], uid[2]];
    mock.queue_response(&[head[0], head[1], head[2], head[3], bcc(head)]);
    mock.queue_response(&[SAK_UID_INCOMPLETE]);
    let tail = [uid[3], uid[4], uid[5], uid[6]];
    mock.queue_response(&[tail[0], tail[1], tail[2], tail[3], bcc(tail)]);
    mock.queue_response(&[sak]);
}
