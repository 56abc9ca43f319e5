use core::cmp::min;

use defmt::Format;
use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::{
    interface::Interface, nfc_a::Iso14443aInitiator, transport, Error, FwtDuration, Result, Stage,
};

/// Longest ATS a card can legally send, TL included
pub const MAX_ATS_LEN: usize = 20;
/// Request for answer to select
pub const RATS: u8 = 0xE0;
/// RATS parameter byte, FSDI 8 in the high nibble and CID 0 in the low
pub const RATS_PARAM: u8 = 0x80;
/// I-block PCB base, bit 1 fixed to one, block number in bit 0
pub const PCB_I_BLOCK: u8 = 0x02;
/// Largest frame exchanged over the link, PCB included
pub const MAX_FRAME_LEN: usize = 260;
/// Fixed wait before polling for an ISO-DEP response
const ISO_DEP_FWT: FwtDuration = FwtDuration::millis(5);

/// Answer to select as the card sent it
///
/// TL counts itself, so `as_bytes().len()` matches `tl()` unless the card
/// stopped short, which [`AtsInfo::is_truncated`] reports.
#[derive(Debug, Clone, Copy)]
pub struct AtsInfo {
    len: u8,
    buf: [u8; MAX_ATS_LEN],
    truncated: bool,
}

impl AtsInfo {
    pub(crate) fn new(bytes: &[u8], tl: u8) -> Self {
        let mut buf = [0u8; MAX_ATS_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        AtsInfo {
            len: bytes.len() as u8,
            buf,
            truncated: bytes.len() < tl as usize,
        }
    }

    /// Length byte from the card, first byte of the ATS
    pub fn tl(&self) -> u8 {
        self.buf[0]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    /// True when the card announced more bytes than it delivered
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Format for AtsInfo {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ATS {=[u8]:02X}", self.as_bytes())
    }
}

/// Half-duplex block protocol state for one activated card
///
/// Created by activation, which starts the block number at 0. Dropping the
/// session and activating again is the only way to reset it.
#[derive(Debug, Format)]
pub struct ProtocolSession {
    last_sak: u8,
    last_ats: Option<AtsInfo>,
    pcb_toggle: bool,
}

impl ProtocolSession {
    pub(crate) fn new(sak: u8) -> Self {
        ProtocolSession {
            last_sak: sak,
            last_ats: None,
            pcb_toggle: false,
        }
    }

    pub(crate) fn set_ats(&mut self, ats: AtsInfo) {
        self.last_ats = Some(ats);
    }

    pub fn sak(&self) -> u8 {
        self.last_sak
    }

    pub fn ats(&self) -> Option<&AtsInfo> {
        self.last_ats.as_ref()
    }

    /// Block number the next I-block will carry
    pub fn pcb_toggle(&self) -> bool {
        self.pcb_toggle
    }
}

impl<I: Interface, D: DelayNs> Iso14443aInitiator<I, D> {
    /// RATS, keeping up to `max_ats_len` bytes of the answer
    ///
    /// Assumes CRC is on, which the select preceding this leaves in place.
    /// A short answer is kept and flagged, only a missing or malformed TL
    /// fails the exchange.
    pub fn transceive_rats(&mut self, max_ats_len: u8) -> Result<AtsInfo, I::Error> {
        self.0
            .dev
            .send_data(&[RATS, RATS_PARAM], 0)
            .map_err(transport(Stage::Rats))?;
        self.0.delay.delay_us(ISO_DEP_FWT.to_micros());

        let received = self
            .0
            .rx_bytes_received()
            .map_err(transport(Stage::Rats))? as usize;
        if received == 0 {
            return Err(Error::NoResponse);
        }
        let take = min(received, min(max_ats_len as usize, MAX_ATS_LEN));
        let mut buf = [0u8; MAX_ATS_LEN];
        self.0
            .dev
            .read_data(&mut buf[..take])
            .map_err(transport(Stage::Rats))?;

        let tl = buf[0];
        if !(2..=MAX_ATS_LEN as u8).contains(&tl) {
            return Err(Error::InvalidTl(tl));
        }
        let len = min(take, tl as usize);
        if len < tl as usize {
            defmt::warn!(
                "ATS cut short, TL {=u8} but only {=usize} bytes arrived",
                tl,
                len
            );
        }
        let ats = AtsInfo::new(&buf[..len], tl);
        defmt::debug!("{}", ats);
        Ok(ats)
    }

    /// One I-block APDU exchange
    ///
    /// Prefixes the request with the session's PCB, waits a fixed frame
    /// waiting time and strips the PCB off the response. The block number
    /// advances only after the response landed in `rsp`, so a failed
    /// exchange can be retried with the same number.
    pub fn transceive_apdu(
        &mut self,
        session: &mut ProtocolSession,
        apdu: &[u8],
        rsp: &mut [u8],
    ) -> Result<usize, I::Error> {
        if apdu.len() >= MAX_FRAME_LEN {
            return Err(Error::ApduTooLong(apdu.len()));
        }
        let mut frame: Vec<u8, MAX_FRAME_LEN> = Vec::new();
        // capacity checked above, PCB included
        frame.push(PCB_I_BLOCK | session.pcb_toggle as u8).ok();
        frame.extend_from_slice(apdu).ok();
        self.0
            .dev
            .send_data(&frame, 0)
            .map_err(transport(Stage::Apdu))?;
        self.0.delay.delay_us(ISO_DEP_FWT.to_micros());

        let received = self
            .0
            .rx_bytes_received()
            .map_err(transport(Stage::Apdu))? as usize;
        if received == 0 {
            return Err(Error::NoResponse);
        }
        if received > rsp.len() {
            // drain what fits so the next exchange starts clean
            self.0
                .dev
                .read_data(rsp)
                .map_err(transport(Stage::Apdu))?;
            return Err(Error::ResponseTooLarge(received as u16));
        }
        self.0
            .dev
            .read_data(&mut rsp[..received])
            .map_err(transport(Stage::Apdu))?;
        // the response leads with its own PCB
        rsp.copy_within(1..received, 0);
        session.pcb_toggle = !session.pcb_toggle;
        Ok(received - 1)
    }
}
