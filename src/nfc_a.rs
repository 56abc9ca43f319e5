use defmt::Format;
use embedded_hal::delay::DelayNs;

use crate::{
    commands::rf_config,
    interface::Interface,
    iso_dep::{ProtocolSession, MAX_ATS_LEN},
    registers::{CrcRxConfig, CrcTxConfig, Register, SystemConfig},
    transport, Error, Result, Stage,
};

/// First anticollision byte when the UID continues at the next level
pub const CASCADE_TAG: u8 = 0x88;
/// SAK bit set while the UID is still incomplete
pub const SAK_UID_INCOMPLETE: u8 = 0x04;
/// SAK bit advertising ISO14443-4 support
pub const SAK_ISO_DEP: u8 = 0x20;
/// NVB for a full anticollision frame
pub const NVB_ANTICOLLISION: u8 = 0x20;
/// NVB for a select frame carrying all five UID bytes
pub const NVB_SELECT: u8 = 0x70;
/// REQA and WUPA go out as seven-bit short frames
pub const SHORT_FRAME_BITS: u8 = 7;
/// HLTA frame, the card acknowledges by staying mute
pub const HLTA: [u8; 2] = [0x50, 0x00];

/// Wakeup and request short frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
#[repr(u8)]
pub enum ShortFrame {
    /// Request Type A, addresses idle cards only
    ReqA = 0x26,
    /// Wake-up Type A, also addresses halted cards
    WupA = 0x52,
}

/// Anticollision and select command bytes per cascade level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
#[repr(u8)]
pub enum CascadeLevel {
    One = 0x93,
    Two = 0x95,
}

/// Resolved UID, cascade tags stripped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum Uid {
    Single([u8; 4]),
    Double([u8; 7]),
}

impl Uid {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Uid::Single(b) => b,
            Uid::Double(b) => b,
        }
    }
}

/// Identity a card reports during activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub struct CardIdentity {
    pub atqa: [u8; 2],
    pub sak: u8,
    pub uid: Uid,
}

#[derive(Debug)]
pub struct Iso14443aInitiator<I, D>(pub(crate) crate::Pn5180<I, D>);

impl<I: Interface, D: DelayNs> Iso14443aInitiator<I, D> {
    /// Full Type A activation
    ///
    /// Wakes a card, resolves its UID through the anticollision cascade and,
    /// when requested and advertised by the SAK, upgrades the link with RATS.
    /// A single failed step aborts the whole sequence. The returned session
    /// starts with block number 0.
    pub fn activate(
        &mut self,
        kind: ShortFrame,
        with_iso_dep: bool,
    ) -> Result<(CardIdentity, ProtocolSession), I::Error> {
        self.0
            .dev
            .load_rf_config(rf_config::ISO14443A_106_TX, rf_config::ISO14443A_106_RX)
            .map_err(transport(Stage::RfConfig))?;
        // a failed authentication attempt can leave the Crypto1 unit on
        SystemConfig::clear_bits(&mut self.0.dev, SystemConfig::MFC_CRYPTO_ON)
            .map_err(transport(Stage::RegConfig))?;
        // short frames and anticollision run without CRC
        self.set_crc(false, Stage::RegConfig)?;

        let atqa = self.transceive_short_frame(kind)?;
        defmt::debug!("ATQA {=[u8]:02X}", atqa);

        let (scratch, sak1) = self.perform_anticollision(CascadeLevel::One)?;
        let (uid, sak) = if sak1 & SAK_UID_INCOMPLETE == 0 {
            (Uid::Single([scratch[0], scratch[1], scratch[2], scratch[3]]), sak1)
        } else {
            if scratch[0] != CASCADE_TAG {
                return Err(Error::UnexpectedCascadeTag(scratch[0]));
            }
            self.set_crc(false, Stage::Anticollision(CascadeLevel::Two))?;
            let (scratch2, sak2) = self.perform_anticollision(CascadeLevel::Two)?;
            if sak2 & SAK_UID_INCOMPLETE != 0 {
                defmt::warn!("Triple size UID not supported, keeping the first seven bytes");
            }
            let mut uid = [0u8; 7];
            uid[..3].copy_from_slice(&scratch[1..4]);
            uid[3..].copy_from_slice(&scratch2[..4]);
            (Uid::Double(uid), sak2)
        };
        defmt::info!(
            "Activated card, UID {=[u8]:02X}, SAK {=u8:#04X}",
            uid.as_bytes(),
            sak
        );

        let identity = CardIdentity { atqa, sak, uid };
        let mut session = ProtocolSession::new(sak);
        if with_iso_dep && sak & SAK_ISO_DEP != 0 {
            let ats = self.transceive_rats(MAX_ATS_LEN as u8)?;
            session.set_ats(ats);
        }
        Ok((identity, session))
    }

    /// One-shot serial read for presence polling
    ///
    /// Wakes the card with WUPA, filters sentinel identities and halts the
    /// card so it stops answering the next poll. Protocol failures mean no
    /// card; only host interface faults surface as errors.
    pub fn read_card_serial(&mut self) -> Result<Option<Uid>, I::Error> {
        let identity = match self.activate(ShortFrame::WupA, false) {
            Ok((identity, _)) => identity,
            Err(Error::Transport(stage, e)) => return Err(Error::Transport(stage, e)),
            Err(_) => return Ok(None),
        };
        if identity.atqa == [0xFF, 0xFF] {
            return Ok(None);
        }
        // an empty field reads back as an all-zero or all-ones serial
        let head = &identity.uid.as_bytes()[..4];
        let all = |v: u8| head.iter().all(|&b| b == v);
        if all(0x00) || all(0xFF) {
            defmt::debug!("Sentinel serial {=[u8]:02X}, rejecting", identity.uid.as_bytes());
            return Ok(None);
        }
        self.transmit_halt()?;
        Ok(Some(identity.uid))
    }

    /// True when a card with a plausible serial answers a wakeup
    pub fn is_card_present(&mut self) -> Result<bool, I::Error> {
        Ok(self.read_card_serial()?.is_some())
    }

    /// HLTA, no reply expected
    pub fn transmit_halt(&mut self) -> Result<(), I::Error> {
        self.0
            .dev
            .send_data(&HLTA, 0)
            .map_err(transport(Stage::Halt))
    }

    /// Field off, handing the base driver back
    pub fn rf_off(mut self) -> Result<crate::Pn5180<I, D>, I::Error> {
        self.0.rf_off()?;
        Ok(self.0)
    }

    /// REQA/WUPA, expecting the two ATQA bytes back
    fn transceive_short_frame(&mut self, kind: ShortFrame) -> Result<[u8; 2], I::Error> {
        self.0
            .dev
            .send_data(&[kind as u8], SHORT_FRAME_BITS)
            .map_err(transport(Stage::Request))?;
        let mut atqa = [0u8; 2];
        self.0
            .dev
            .read_data(&mut atqa)
            .map_err(transport(Stage::Request))?;
        Ok(atqa)
    }

    /// Anticollision plus select for one cascade level
    ///
    /// Assumes CRC is already off on entry. Leaves it on for the select pair,
    /// which is also what RATS and the I-block traffic after it need.
    fn perform_anticollision(&mut self, level: CascadeLevel) -> Result<([u8; 5], u8), I::Error> {
        self.0
            .dev
            .send_data(&[level as u8, NVB_ANTICOLLISION], 0)
            .map_err(transport(Stage::Anticollision(level)))?;
        let mut scratch = [0u8; 5];
        self.0
            .dev
            .read_data(&mut scratch)
            .map_err(transport(Stage::Anticollision(level)))?;
        self.set_crc(true, Stage::Select(level))?;

        let mut select = [0u8; 7];
        select[0] = level as u8;
        select[1] = NVB_SELECT;
        select[2..].copy_from_slice(&scratch);
        self.0
            .dev
            .send_data(&select, 0)
            .map_err(transport(Stage::Select(level)))?;
        let mut sak = [0u8; 1];
        self.0
            .dev
            .read_data(&mut sak)
            .map_err(transport(Stage::Select(level)))?;
        defmt::debug!(
            "Cascade {}: {=[u8]:02X}, SAK {=u8:#04X}",
            level,
            scratch,
            sak[0]
        );
        Ok((scratch, sak[0]))
    }

    /// Frame CRC handling for both directions, RX register first
    fn set_crc(&mut self, enable: bool, stage: Stage) -> Result<(), I::Error> {
        if enable {
            CrcRxConfig::set_bits(&mut self.0.dev, CrcRxConfig::ENABLE)
                .map_err(transport(stage))?;
            CrcTxConfig::set_bits(&mut self.0.dev, CrcTxConfig::ENABLE)
                .map_err(transport(stage))
        } else {
            CrcRxConfig::clear_bits(&mut self.0.dev, CrcRxConfig::ENABLE)
                .map_err(transport(stage))?;
            CrcTxConfig::clear_bits(&mut self.0.dev, CrcTxConfig::ENABLE)
                .map_err(transport(stage))
        }
    }
}
