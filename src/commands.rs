/// Host interface commands
///
/// Copied and pasted from the
/// [datasheet](https://www.nxp.com/docs/en/data-sheet/PN5180A0XX-C1-C2.pdf), section 11.4
#[derive(Debug, Clone, Copy, defmt::Format)]
#[repr(u8)]
pub enum HostCommand {
    /// Writes a 32-bit value to a logical register
    WriteRegister = 0x00,
    /// ORs the register content with the provided 32-bit mask
    WriteRegisterOrMask = 0x01,
    /// ANDs the register content with the provided 32-bit mask
    WriteRegisterAndMask = 0x02,
    /// Processes an (address, operation, value) batch of register writes
    WriteRegisterMultiple = 0x03,
    /// Reads the 32-bit content of a logical register
    ReadRegister = 0x04,
    /// Reads a batch of logical registers
    ReadRegisterMultiple = 0x05,
    /// Writes up to 255 bytes of EEPROM
    WriteEeprom = 0x06,
    /// Reads up to 255 bytes of EEPROM
    ReadEeprom = 0x07,
    /// Fills the transmission buffer without starting a transmission
    WriteTxData = 0x08,
    /// Fills the transmission buffer and starts a transmission
    ///
    /// The parameter byte holds the number of valid bits in the last byte,
    /// 0 meaning all 8
    SendData = 0x09,
    /// Reads bytes out of the reception buffer
    ReadData = 0x0A,
    /// Switches to standby, LPCD or autocoll operation
    SwitchMode = 0x0B,
    /// Runs a Mifare Classic authentication on an activated card
    MifareAuthenticate = 0x0C,
    /// Starts an EPC GEN2 inventory round
    EpcInventory = 0x0D,
    /// Resumes a paused EPC GEN2 inventory round
    EpcResumeInventory = 0x0E,
    EpcRetrieveInventoryResultSize = 0x0F,
    EpcRetrieveInventoryResult = 0x10,
    /// Loads a (transmitter, receiver) RF configuration pair
    LoadRfConfig = 0x11,
    /// Patches individual registers of a stored RF configuration
    UpdateRfConfig = 0x12,
    RetrieveRfConfigSize = 0x13,
    RetrieveRfConfig = 0x14,
    /// Switches the RF field on, honoring external field detection
    RfOn = 0x16,
    /// Switches the RF field off
    RfOff = 0x17,
}

/// Identifier pairs for [`HostCommand::LoadRfConfig`]
pub mod rf_config {
    /// ISO14443A / Mifare, 106 kbit/s
    pub const ISO14443A_106_TX: u8 = 0x00;
    pub const ISO14443A_212_TX: u8 = 0x01;
    pub const ISO14443A_424_TX: u8 = 0x02;
    pub const ISO14443A_848_TX: u8 = 0x03;
    /// ISO14443A / Mifare, 106 kbit/s
    pub const ISO14443A_106_RX: u8 = 0x80;
    pub const ISO14443A_212_RX: u8 = 0x81;
    pub const ISO14443A_424_RX: u8 = 0x82;
    pub const ISO14443A_848_RX: u8 = 0x83;
}
