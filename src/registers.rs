use bilge::prelude::*;
use defmt::Format;

use crate::interface::Interface;

/// 32-bit logical register
///
/// Masked updates go through the chip's atomic OR/AND write commands instead
/// of a read-modify-write over the host link
pub trait Register: Copy + Sized + From<u32> + Into<u32> {
    const ADDRESS: u8;
    fn read<I: Interface>(iface: &mut I) -> Result<Self, I::Error> {
        iface.register_read(Self::ADDRESS).map(Self::from)
    }
    fn write<I: Interface>(self, iface: &mut I) -> Result<(), I::Error> {
        iface.register_write(Self::ADDRESS, self.into())
    }
    /// Sets the masked bits, WRITE_REGISTER_OR_MASK
    fn set_bits<I: Interface>(iface: &mut I, mask: u32) -> Result<(), I::Error> {
        iface.register_or_mask(Self::ADDRESS, mask)
    }
    /// Clears the masked bits, WRITE_REGISTER_AND_MASK
    fn clear_bits<I: Interface>(iface: &mut I, mask: u32) -> Result<(), I::Error> {
        iface.register_and_mask(Self::ADDRESS, !mask)
    }
}

macro_rules! register_impl {
    ($type:ty, $addr:literal) => {
        impl Register for $type {
            const ADDRESS: u8 = $addr;
        }
    };
}

pub mod system_config {
    use bilge::prelude::*;
    use defmt::Format;

    /// Transceive state machine commands
    #[bitsize(3)]
    #[derive(FromBits, Debug, Format, Clone, Copy, Default, PartialEq, Eq)]
    pub enum Command {
        /// Stops all communication, idles the state machine
        #[default]
        Idle = 0b000,
        /// Arms a transmission followed by reception
        Transceive = 0b011,
        #[fallback]
        Reserved,
    }
}

register_impl!(SystemConfig, 0x00);
/// Transceiver control
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemConfig {
    pub command: system_config::Command,
    /// Starts transmission of the TX buffer contents
    pub start_send: bool,
    reserved: u2,
    /// Mifare Crypto1 cipher unit
    ///
    /// Left on after an authentication it garbles plain ISO14443 framing,
    /// so activation always switches it off
    pub mfc_crypto_on: bool,
    reserved: u25,
}

impl SystemConfig {
    /// COMMAND field mask
    pub const COMMAND: u32 = 0b111;
    /// COMMAND value arming a transceive cycle, OR over a zeroed field
    pub const TRANSCEIVE: u32 = 0b011;
    /// START_SEND mask
    pub const START_SEND: u32 = 1 << 3;
    /// MFC_CRYPTO_ON mask
    pub const MFC_CRYPTO_ON: u32 = 1 << 6;
}

pub mod crc_config {
    use bilge::prelude::*;
    use defmt::Format;

    #[bitsize(1)]
    #[derive(FromBits, Debug, Format, Clone, Copy, Default, PartialEq, Eq)]
    pub enum CrcType {
        #[default]
        Crc16 = 0,
        Crc5 = 1,
    }
}

register_impl!(CrcRxConfig, 0x12);
/// Receiver CRC handling
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrcRxConfig {
    /// Check and strip the frame CRC on reception
    pub rx_crc_enable: bool,
    /// Expect the CRC inverted
    pub rx_crc_inv: bool,
    pub rx_crc_type: crc_config::CrcType,
    /// Preset value selection, 0x6363 for ISO14443A
    pub rx_crc_preset_sel: u3,
    /// Parity bit checking and removal
    pub rx_parity_enable: bool,
    reserved: u25,
}

impl CrcRxConfig {
    /// RX_CRC_ENABLE mask
    pub const ENABLE: u32 = 1;
}

register_impl!(CrcTxConfig, 0x19);
/// Transmitter CRC handling
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrcTxConfig {
    /// Append a CRC to every transmitted frame
    pub tx_crc_enable: bool,
    /// Transmit the CRC inverted
    pub tx_crc_inv: bool,
    pub tx_crc_type: crc_config::CrcType,
    /// Preset value selection, 0x6363 for ISO14443A
    pub tx_crc_preset_sel: u3,
    reserved: u26,
}

impl CrcTxConfig {
    /// TX_CRC_ENABLE mask
    pub const ENABLE: u32 = 1;
}

register_impl!(RxStatus, 0x13);
/// Reception status
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxStatus {
    /// Bytes pending in the reception buffer
    pub rx_num_bytes_received: u9,
    /// Frames received while multiple reception is enabled
    pub rx_num_frames_received: u4,
    /// Valid bits in the last byte of an incomplete-byte frame
    pub rx_num_last_bits: u3,
    /// CRC or parity failure on the last reception
    pub rx_data_integrity_error: bool,
    /// Framing failure on the last reception
    pub rx_protocol_error: bool,
    /// Collision observed during reception
    pub rx_collision_detected: bool,
    /// Bit position of the first detected collision
    pub rx_coll_pos: u6,
    reserved: u7,
}

pub mod rf_status {
    use bilge::prelude::*;
    use defmt::Format;

    /// Transceive state machine states
    #[bitsize(3)]
    #[derive(FromBits, Debug, Format, Clone, Copy, Default, PartialEq, Eq)]
    pub enum TransceiveState {
        #[default]
        Idle = 0,
        WaitTransmit = 1,
        Transmitting = 2,
        WaitReceive = 3,
        WaitForData = 4,
        Receiving = 5,
        LoopBack = 6,
        Reserved = 7,
    }
}

register_impl!(RfStatus, 0x1D);
/// RF driver and transceive state machine status
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct RfStatus {
    reserved: u24,
    pub transceive_state: rf_status::TransceiveState,
    reserved: u5,
}
