//! The typed command surface: door, output, input, area, and system
//! operations layered on top of [`Session::call`].
//!
//! `get_status` methods have a three-way outcome instead of the usual
//! `Result<T>`: a NACK carrying [`error_code::INDEX_NOT_VALID`] means "no
//! such entity" and maps to `Ok(None)`; a successful reply maps to
//! `Ok(Some(entity))`; anything else (timeout, connection loss, any other
//! NACK) is a genuine `Err` and must not be swallowed into `None`.

use crate::constants::{cmd_group, error_code, subcmd, tlv_type};
use crate::entities::{Area, Door, Input, Output, PanelDescriptor};
use crate::error::{Error, Result};
use crate::multiplexer::CommandResponse;
use crate::session::Session;
use crate::tlv;

/// How [`Session::arm_area`] should arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmMode {
    Normal,
    Force,
    Stay,
    Instant,
}

impl ArmMode {
    fn subcmd(self) -> u8 {
        match self {
            ArmMode::Normal => subcmd::ARM_NORMAL,
            ArmMode::Force => subcmd::ARM_FORCE,
            ArmMode::Stay => subcmd::ARM_STAY,
            ArmMode::Instant => subcmd::ARM_INSTANT,
        }
    }
}

/// Finds the first TLV record of `wanted` type in `payload` and runs `build`
/// over its value. No matching record is treated the same as the original
/// implementation treats it: not found, not an error.
fn find_status<T>(payload: &[u8], wanted: u16, build: impl FnOnce(&[u8]) -> Option<T>) -> Result<Option<T>> {
    let records = tlv::decode(payload)?;
    Ok(records
        .iter()
        .find(|r| r.record_type == wanted)
        .and_then(|r| build(&r.value)))
}

fn index_params(index: u32) -> [u8; 4] {
    index.to_le_bytes()
}

impl Session {
    /// Momentarily unlock, then relock, the named door.
    pub async fn unlock_door(&self, index: u32) -> Result<()> {
        self.expect_ack(cmd_group::DOOR, subcmd::UNLOCK_DOOR, &index_params(index)).await
    }

    /// Unlock and latch the named door open until explicitly locked again.
    pub async fn unlock_door_latched(&self, index: u32) -> Result<()> {
        self.expect_ack(cmd_group::DOOR, subcmd::UNLOCK_DOOR_LATCHED, &index_params(index))
            .await
    }

    pub async fn lock_door(&self, index: u32) -> Result<()> {
        self.expect_ack(cmd_group::DOOR, subcmd::LOCK_DOOR, &index_params(index)).await
    }

    pub async fn get_door_status(&self, index: u32) -> Result<Option<Door>> {
        match self
            .call(cmd_group::DOOR, subcmd::REQUEST_DOOR_STATUS, &index_params(index))
            .await
        {
            Ok(CommandResponse::Data(payload)) => find_status(&payload, tlv_type::DOOR_STATUS, |value| {
                (value.len() >= 6).then(|| Door::from_status_bytes(index, value[4], value[5]))
            }),
            other => Self::status_outcome(other),
        }
    }

    pub async fn output_on(&self, index: u32) -> Result<()> {
        self.expect_ack(cmd_group::OUTPUT, subcmd::OUTPUT_ON, &index_params(index)).await
    }

    pub async fn output_off(&self, index: u32) -> Result<()> {
        self.expect_ack(cmd_group::OUTPUT, subcmd::OUTPUT_OFF, &index_params(index)).await
    }

    /// Turn the output on for `seconds`, then automatically off.
    pub async fn output_on_timed(&self, index: u32, seconds: u16) -> Result<()> {
        let mut params = index_params(index).to_vec();
        params.extend_from_slice(&seconds.to_le_bytes());
        self.expect_ack(cmd_group::OUTPUT, subcmd::OUTPUT_ON_TIMED, &params).await
    }

    pub async fn get_output_status(&self, index: u32) -> Result<Option<Output>> {
        match self
            .call(cmd_group::OUTPUT, subcmd::REQUEST_OUTPUT_STATUS, &index_params(index))
            .await
        {
            Ok(CommandResponse::Data(payload)) => find_status(&payload, tlv_type::OUTPUT_STATUS, |value| {
                if value.len() < 13 {
                    return None;
                }
                let mut reference = [0u8; 8];
                reference.copy_from_slice(&value[4..12]);
                Some(Output::from_status_bytes(index, reference, value[12]))
            }),
            other => Self::status_outcome(other),
        }
    }

    pub async fn get_input_status(&self, index: u32) -> Result<Option<Input>> {
        match self
            .call(cmd_group::INPUT, subcmd::REQUEST_INPUT_STATUS, &index_params(index))
            .await
        {
            Ok(CommandResponse::Data(payload)) => find_status(&payload, tlv_type::INPUT_STATUS, |value| {
                if value.len() < 14 {
                    return None;
                }
                let mut reference = [0u8; 8];
                reference.copy_from_slice(&value[4..12]);
                Some(Input::from_status_bytes(index, reference, value[12], value[13]))
            }),
            other => Self::status_outcome(other),
        }
    }

    /// Bypass an input. `permanent` selects a bypass that survives a
    /// disarm/arm cycle rather than clearing automatically.
    pub async fn bypass_input(&self, index: u32, permanent: bool) -> Result<()> {
        let subcmd = if permanent { subcmd::BYPASS_INPUT_PERM } else { subcmd::BYPASS_INPUT_TEMP };
        self.expect_ack(cmd_group::INPUT, subcmd, &index_params(index)).await
    }

    pub async fn remove_input_bypass(&self, index: u32) -> Result<()> {
        self.expect_ack(cmd_group::INPUT, subcmd::REMOVE_INPUT_BYPASS, &index_params(index))
            .await
    }

    pub async fn arm_area(&self, index: u32, mode: ArmMode) -> Result<()> {
        self.expect_ack(cmd_group::AREA, mode.subcmd(), &index_params(index)).await
    }

    /// Disarm an area. `disarm_24hr` also clears any 24-hour zones, which a
    /// plain disarm leaves armed.
    pub async fn disarm_area(&self, index: u32, disarm_24hr: bool) -> Result<()> {
        let subcmd = if disarm_24hr { subcmd::DISARM_ALL } else { subcmd::DISARM_AREA };
        self.expect_ack(cmd_group::AREA, subcmd, &index_params(index)).await
    }

    pub async fn get_area_status(&self, index: u32) -> Result<Option<Area>> {
        match self
            .call(cmd_group::AREA, subcmd::REQUEST_AREA_STATUS, &index_params(index))
            .await
        {
            Ok(CommandResponse::Data(payload)) => find_status(&payload, tlv_type::AREA_STATUS, |value| {
                (value.len() >= 7).then(|| Area::from_status_bytes(index, value[4], value[5], value[6]))
            }),
            other => Self::status_outcome(other),
        }
    }

    /// Request the panel's serial, firmware type, version, and build.
    pub async fn get_panel_description(&self) -> Result<PanelDescriptor> {
        match self.call(cmd_group::SYSTEM, subcmd::PANEL_DESCRIPTION, &[]).await? {
            CommandResponse::Data(payload) => {
                let records = tlv::decode(&payload)?;
                Ok(PanelDescriptor::from_records(&records))
            }
            CommandResponse::Ack => Ok(PanelDescriptor::default()),
            CommandResponse::Nack(code) => Err(Error::PanelError { code }),
        }
    }

    async fn expect_ack(&self, cmd_group: u8, subcmd: u8, params: &[u8]) -> Result<()> {
        match self.call(cmd_group, subcmd, params).await? {
            CommandResponse::Ack => Ok(()),
            CommandResponse::Nack(code) => Err(Error::PanelError { code }),
            CommandResponse::Data(_) => Err(Error::FramingError("unexpected data reply to command".into())),
        }
    }

    /// Handles every non-`Data` outcome of a status query: `Ok(None)` only
    /// for the "no such entity" NACK, `Err` for everything else.
    fn status_outcome<T>(response: Result<CommandResponse>) -> Result<Option<T>> {
        match response {
            Ok(CommandResponse::Nack(code)) if code == error_code::INDEX_NOT_VALID => Ok(None),
            Ok(CommandResponse::Nack(code)) => Err(Error::PanelError { code }),
            Ok(CommandResponse::Ack) => {
                Err(Error::FramingError("unexpected ack reply to status query".into()))
            }
            Ok(CommandResponse::Data(_)) => unreachable!("Data is matched before status_outcome is called"),
            Err(e) => Err(e),
        }
    }
}
