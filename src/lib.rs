#![no_std]

use defmt::Format;
use embedded_hal::delay::DelayNs;

use crate::{
    commands::rf_config,
    interface::Interface,
    nfc_a::{CascadeLevel, Iso14443aInitiator},
    registers::{Register, RxStatus},
};

pub mod commands;
pub mod interface;
pub mod iso_dep;
pub mod mifare_classic;
pub mod nfc_a;
pub mod registers;

#[cfg(test)]
mod testing;

/// Fixed waits approximating the frame waiting time
pub type FwtDuration = fugit::Duration<u32, 1, 1_000_000>;

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Protocol step a host interface fault occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum Stage {
    /// RF configuration load or field control
    RfConfig,
    /// System and CRC register setup
    RegConfig,
    /// REQA/WUPA and the ATQA reply
    Request,
    /// Anticollision frame at the given cascade level
    Anticollision(CascadeLevel),
    /// Select frame at the given cascade level
    Select(CascadeLevel),
    /// RATS and the ATS reply
    Rats,
    /// I-block exchange
    Apdu,
    /// Mifare Classic block transfer
    MifareBlockIo,
    /// HLTA transmission
    Halt,
}

#[derive(Debug, Clone, PartialEq, Eq, Format)]
pub enum Error<E> {
    /// Host interface fault, tagged with the step it interrupted
    Transport(Stage, E),
    /// The SAK promised another cascade level but the anticollision
    /// response does not open with the cascade tag
    UnexpectedCascadeTag(u8),
    /// Empty reception where a response is mandatory
    NoResponse,
    /// ATS length byte outside 2..=20
    InvalidTl(u8),
    /// Reception does not fit the caller's buffer, length in bytes
    ResponseTooLarge(u16),
    /// Command APDU too long for a single frame
    ApduTooLong(usize),
    /// Mifare block read of a size other than 16
    UnexpectedLength(u16),
}

/// map_err adapter tagging interface faults with their protocol step
pub(crate) fn transport<E>(stage: Stage) -> impl FnOnce(E) -> Error<E> {
    move |e| Error::Transport(stage, e)
}

/// PN5180 driver over its host interface and a delay provider
#[derive(Debug)]
pub struct Pn5180<I, D> {
    pub(crate) dev: I,
    pub(crate) delay: D,
}

impl<I: Interface, D: DelayNs> Pn5180<I, D> {
    /// Takes ownership of the interface, assuming the chip is out of reset
    pub fn new(dev: I, delay: D) -> Self {
        Self { dev, delay }
    }

    /// Run a function with access to the interface
    ///
    /// Can be used to reclock after initialization
    pub fn with_interface(&mut self, f: impl FnOnce(&mut I)) {
        f(&mut self.dev);
    }

    /// Loads the ISO14443A 106 kbit/s configuration pair and raises the field
    pub fn setup_rf(&mut self) -> Result<(), I::Error> {
        defmt::debug!("Loading ISO14443A RF configuration");
        self.dev
            .load_rf_config(rf_config::ISO14443A_106_TX, rf_config::ISO14443A_106_RX)
            .map_err(transport(Stage::RfConfig))?;
        self.dev.rf_on().map_err(transport(Stage::RfConfig))
    }

    /// Field off
    pub fn rf_off(&mut self) -> Result<(), I::Error> {
        self.dev.rf_off().map_err(transport(Stage::RfConfig))
    }

    /// Bytes pending in the reception buffer
    pub(crate) fn rx_bytes_received(&mut self) -> core::result::Result<u16, I::Error> {
        RxStatus::read(&mut self.dev).map(|r| r.rx_num_bytes_received().value())
    }

    /// Raises the field and hands out the ISO14443A poller surface
    pub fn into_iso14443a_initiator(mut self) -> Result<Iso14443aInitiator<I, D>, I::Error> {
        self.setup_rf()?;
        Ok(Iso14443aInitiator(self))
    }
}
