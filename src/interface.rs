use embedded_hal::{
    digital::InputPin,
    spi::{Operation, SpiDevice},
};

use crate::{
    commands::HostCommand,
    registers::{rf_status::TransceiveState, Register, RfStatus, SystemConfig},
};

pub trait Interface: Sized {
    type Error;
    /// Transmit a frame over the RF link
    ///
    /// `tx_last_bits` is the number of valid bits in the last byte, 0 meaning all 8
    fn send_data(&mut self, buf: &[u8], tx_last_bits: u8) -> Result<(), Self::Error>;
    /// Fetch `buf.len()` bytes out of the reception buffer
    fn read_data(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
    /// Read a 32-bit logical register
    fn register_read(&mut self, addr: u8) -> Result<u32, Self::Error>;
    /// Write a 32-bit logical register
    fn register_write(&mut self, addr: u8, value: u32) -> Result<(), Self::Error>;
    /// OR a register with the mask, atomically on the chip
    fn register_or_mask(&mut self, addr: u8, mask: u32) -> Result<(), Self::Error>;
    /// AND a register with the mask, atomically on the chip
    fn register_and_mask(&mut self, addr: u8, mask: u32) -> Result<(), Self::Error>;
    /// Load a (transmitter, receiver) RF configuration pair
    fn load_rf_config(&mut self, tx: u8, rx: u8) -> Result<(), Self::Error>;
    /// Field on, with automatic collision avoidance
    fn rf_on(&mut self) -> Result<(), Self::Error>;
    /// Field off
    fn rf_off(&mut self) -> Result<(), Self::Error>;
}

/// Faults on the host link
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum TransportError<S, B> {
    /// SPI bus fault
    Spi(S),
    /// BUSY line fault
    Busy(B),
    /// The state machine did not accept the transceive command
    Transceive(TransceiveState),
}

pub struct SpiInterface<S: SpiDevice, B: InputPin> {
    dev: S,
    busy: B,
}

impl<S: SpiDevice, B: InputPin> SpiInterface<S, B> {
    pub fn new(dev: S, busy: B) -> Self {
        Self { dev, busy }
    }

    /// BUSY is high while the chip works on a host frame
    fn wait_ready(&mut self) -> Result<(), TransportError<S::Error, B::Error>> {
        while self.busy.is_high().map_err(TransportError::Busy)? {
            core::hint::spin_loop()
        }
        Ok(())
    }

    /// One host frame: header plus payload out, optional response back in
    fn command(
        &mut self,
        header: &[u8],
        payload: &[u8],
        response: &mut [u8],
    ) -> Result<(), TransportError<S::Error, B::Error>> {
        self.wait_ready()?;
        self.dev
            .transaction(&mut [Operation::Write(header), Operation::Write(payload)])
            .map_err(TransportError::Spi)?;
        // executed once BUSY deasserts
        self.wait_ready()?;
        if !response.is_empty() {
            self.dev.read(response).map_err(TransportError::Spi)?;
            self.wait_ready()?;
        }
        Ok(())
    }
}

impl<S: SpiDevice, B: InputPin> Interface for SpiInterface<S, B> {
    type Error = TransportError<S::Error, B::Error>;

    fn send_data(&mut self, buf: &[u8], tx_last_bits: u8) -> Result<(), Self::Error> {
        defmt::trace!("SEND_DATA {=[u8]:02X}, {=u8} bits in last byte", buf, tx_last_bits);
        // idle the state machine, then arm a fresh transceive cycle
        SystemConfig::clear_bits(self, SystemConfig::COMMAND)?;
        SystemConfig::set_bits(self, SystemConfig::TRANSCEIVE)?;
        let state = RfStatus::read(self)?.transceive_state();
        if state != TransceiveState::WaitTransmit {
            return Err(TransportError::Transceive(state));
        }
        self.command(&[HostCommand::SendData as u8, tx_last_bits], buf, &mut [])
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.command(&[HostCommand::ReadData as u8, 0x00], &[], buf)?;
        defmt::trace!("READ_DATA {=[u8]:02X}", buf);
        Ok(())
    }

    fn register_read(&mut self, addr: u8) -> Result<u32, Self::Error> {
        let mut out = [0u8; 4];
        self.command(&[HostCommand::ReadRegister as u8, addr], &[], &mut out)?;
        let value = u32::from_le_bytes(out);
        defmt::trace!("Register {=u8:X}, read {=u32:X}", addr, value);
        Ok(value)
    }

    fn register_write(&mut self, addr: u8, value: u32) -> Result<(), Self::Error> {
        defmt::trace!("Register {=u8:X}, write {=u32:X}", addr, value);
        self.command(
            &[HostCommand::WriteRegister as u8, addr],
            &value.to_le_bytes(),
            &mut [],
        )
    }

    fn register_or_mask(&mut self, addr: u8, mask: u32) -> Result<(), Self::Error> {
        defmt::trace!("Register {=u8:X}, or {=u32:X}", addr, mask);
        self.command(
            &[HostCommand::WriteRegisterOrMask as u8, addr],
            &mask.to_le_bytes(),
            &mut [],
        )
    }

    fn register_and_mask(&mut self, addr: u8, mask: u32) -> Result<(), Self::Error> {
        defmt::trace!("Register {=u8:X}, and {=u32:X}", addr, mask);
        self.command(
            &[HostCommand::WriteRegisterAndMask as u8, addr],
            &mask.to_le_bytes(),
            &mut [],
        )
    }

    fn load_rf_config(&mut self, tx: u8, rx: u8) -> Result<(), Self::Error> {
        defmt::trace!("LOAD_RF_CONFIG tx {=u8:#X}, rx {=u8:#X}", tx, rx);
        self.command(&[HostCommand::LoadRfConfig as u8, tx, rx], &[], &mut [])
    }

    fn rf_on(&mut self) -> Result<(), Self::Error> {
        self.command(&[HostCommand::RfOn as u8, 0x00], &[], &mut [])
    }

    fn rf_off(&mut self) -> Result<(), Self::Error> {
        self.command(&[HostCommand::RfOff as u8, 0x00], &[], &mut [])
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::convert::Infallible;
    use std::collections::VecDeque;
    use std::vec::Vec;

    use super::*;

    /// Records each SPI transaction's written bytes, serves queued reads
    struct ScriptedBus {
        transactions: Vec<Vec<u8>>,
        responses: VecDeque<Vec<u8>>,
    }

    impl ScriptedBus {
        fn new() -> Self {
            ScriptedBus {
                transactions: Vec::new(),
                responses: VecDeque::new(),
            }
        }

        fn queue_response(&mut self, bytes: &[u8]) {
            self.responses.push_back(bytes.to_vec());
        }
    }

    impl embedded_hal::spi::ErrorType for ScriptedBus {
        type Error = Infallible;
    }

    impl SpiDevice for ScriptedBus {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
            let mut written = Vec::new();
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => written.extend_from_slice(bytes),
                    Operation::Read(buf) => match self.responses.pop_front() {
                        Some(rsp) => {
                            let n = rsp.len().min(buf.len());
                            buf[..n].copy_from_slice(&rsp[..n]);
                            buf[n..].fill(0);
                        }
                        None => buf.fill(0),
                    },
                    _ => {}
                }
            }
            if !written.is_empty() {
                self.transactions.push(written);
            }
            Ok(())
        }
    }

    /// BUSY permanently low, the chip is always ready
    struct ReadyPin;

    impl embedded_hal::digital::ErrorType for ReadyPin {
        type Error = Infallible;
    }

    impl InputPin for ReadyPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(false)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(true)
        }
    }

    fn interface() -> SpiInterface<ScriptedBus, ReadyPin> {
        SpiInterface::new(ScriptedBus::new(), ReadyPin)
    }

    #[test]
    fn send_data_arms_transceive_then_pushes_the_frame() {
        let mut iface = interface();
        // RF_STATUS with WaitTransmit in bits [26:24]
        iface.dev.queue_response(&[0x00, 0x00, 0x00, 0x01]);

        iface.send_data(&[0x26], 7).unwrap();

        let frames = &iface.dev.transactions;
        // AND-mask clearing the command field, little-endian
        assert_eq!(frames[0], [0x02, 0x00, 0xF8, 0xFF, 0xFF, 0xFF]);
        // OR-mask arming Transceive
        assert_eq!(frames[1], [0x01, 0x00, 0x03, 0x00, 0x00, 0x00]);
        // RF_STATUS readback
        assert_eq!(frames[2], [0x04, 0x1D]);
        // SEND_DATA, valid bits first
        assert_eq!(frames[3], [0x09, 0x07, 0x26]);
    }

    #[test]
    fn send_data_rejects_a_wrong_transceive_state() {
        let mut iface = interface();
        // nothing queued: RF_STATUS reads zero, state machine still Idle

        let err = iface.send_data(&[0x26], 7).unwrap_err();
        assert_eq!(err, TransportError::Transceive(TransceiveState::Idle));
        // the frame never went out
        assert!(!iface
            .dev
            .transactions
            .iter()
            .any(|f| f.first() == Some(&(HostCommand::SendData as u8))));
    }

    #[test]
    fn register_frames_are_little_endian() {
        let mut iface = interface();
        iface.dev.queue_response(&[0x78, 0x56, 0x34, 0x12]);

        iface.register_write(0x19, 0xA1B2_C3D4).unwrap();
        let value = iface.register_read(0x13).unwrap();
        assert_eq!(value, 0x1234_5678);

        let frames = &iface.dev.transactions;
        assert_eq!(frames[0], [0x00, 0x19, 0xD4, 0xC3, 0xB2, 0xA1]);
        assert_eq!(frames[1], [0x04, 0x13]);
    }

    #[test]
    fn read_data_is_a_two_phase_fetch() {
        let mut iface = interface();
        iface.dev.queue_response(&[0x44, 0x00]);

        let mut buf = [0u8; 2];
        iface.read_data(&mut buf).unwrap();
        assert_eq!(buf, [0x44, 0x00]);
        assert_eq!(iface.dev.transactions[0], [0x0A, 0x00]);
    }
}
