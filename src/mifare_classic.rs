use defmt::Format;
use embedded_hal::delay::DelayNs;

use crate::{
    interface::Interface,
    nfc_a::Iso14443aInitiator,
    registers::{CrcRxConfig, Register},
    transport, Error, FwtDuration, Result, Stage,
};

/// Wait after a read command before the block is ready
const MF_READ_FWT: FwtDuration = FwtDuration::millis(5);
/// Wait after the data half of a write, covers EEPROM programming
const MF_WRITE_FWT: FwtDuration = FwtDuration::millis(10);

#[derive(Debug, Clone, Copy, Format)]
pub enum Command {
    AuthKeyA = 0x60,
    AuthKeyB = 0x61,
    ReadBlock = 0x30,
    WriteBlock = 0xA0,
    ValueDec = 0xC0,
    ValueInc = 0xC1,
    ValueRestore = 0xC2,
    ValueTransfer = 0xB0,
    Halt = 0x50,
    Ack = 0x0A,
    Nack = 0x00,
    NackTransferInvalid = 0x04,
    NackTransferCrcError = 0x01,
}

/// True for the 4-bit acknowledge code, anything else is a NAK
pub fn is_ack(code: u8) -> bool {
    code & 0x0F == Command::Ack as u8
}

/// Plain (non-encrypted) block access on an activated card
pub struct MfClassicIo<'a, I, D> {
    pub drv: &'a mut Iso14443aInitiator<I, D>,
}

impl<'a, I: Interface, D: DelayNs> MfClassicIo<'a, I, D> {
    pub fn new(drv: &'a mut Iso14443aInitiator<I, D>) -> Self {
        Self { drv }
    }

    /// Reads one 16 byte block
    ///
    /// The card answers a read with exactly 16 bytes or not at all, any
    /// other length reads as a protocol failure.
    pub fn block_read(&mut self, block: u8) -> Result<[u8; 16], I::Error> {
        self.drv
            .0
            .dev
            .send_data(&[Command::ReadBlock as u8, block], 0)
            .map_err(transport(Stage::MifareBlockIo))?;
        self.drv.0.delay.delay_us(MF_READ_FWT.to_micros());

        let len = self
            .drv
            .0
            .rx_bytes_received()
            .map_err(transport(Stage::MifareBlockIo))?;
        if len != 16 {
            return Err(Error::UnexpectedLength(len));
        }
        let mut buf = [0u8; 16];
        self.drv
            .0
            .dev
            .read_data(&mut buf)
            .map_err(transport(Stage::MifareBlockIo))?;
        defmt::debug!("Block {=u8}: {=[u8]:02X}", block, buf);
        Ok(buf)
    }

    /// Writes one 16 byte block, returning the card's final code
    ///
    /// Two frames on the wire, the write command and the data, each
    /// acknowledged with a bare 4-bit code. Callers check the code with
    /// [`is_ack`].
    pub fn block_write(&mut self, block: u8, data: &[u8; 16]) -> Result<u8, I::Error> {
        // the 4-bit codes carry no CRC, checking stays off until both landed
        CrcRxConfig::clear_bits(&mut self.drv.0.dev, CrcRxConfig::ENABLE)
            .map_err(transport(Stage::MifareBlockIo))?;
        let res = self.block_write_frames(block, data);
        let restore = CrcRxConfig::set_bits(&mut self.drv.0.dev, CrcRxConfig::ENABLE)
            .map_err(transport(Stage::MifareBlockIo));
        let code = res?;
        restore?;
        Ok(code)
    }

    fn block_write_frames(&mut self, block: u8, data: &[u8; 16]) -> Result<u8, I::Error> {
        self.drv
            .0
            .dev
            .send_data(&[Command::WriteBlock as u8, block], 0)
            .map_err(transport(Stage::MifareBlockIo))?;
        let mut ack = [0u8; 1];
        self.drv
            .0
            .dev
            .read_data(&mut ack)
            .map_err(transport(Stage::MifareBlockIo))?;
        defmt::trace!("Write command code {=u8:#04X}", ack[0]);

        self.drv
            .0
            .dev
            .send_data(data, 0)
            .map_err(transport(Stage::MifareBlockIo))?;
        self.drv.0.delay.delay_us(MF_WRITE_FWT.to_micros());
        self.drv
            .0
            .dev
            .read_data(&mut ack)
            .map_err(transport(Stage::MifareBlockIo))?;
        Ok(ack[0])
    }
}
