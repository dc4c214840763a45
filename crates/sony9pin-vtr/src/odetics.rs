//! Odetics extensions.
//!
//! Odetics is a superset of the 9-pin command set used by video servers
//! (clip lists, IDs, machine routing). Commands use classes `0xA_` and
//! `0xB_`; as with every 9-pin packet the low nibble of `cmd1` is the data
//! length, so the `AX`/`BX` forms in device documentation are simply the
//! same command with a different payload size.
//!
//! Payloads are device specific and passed through unchanged. Replies come
//! back as [`VtrEvent::Raw`](sony9pin_core::VtrEvent::Raw) events, e.g.
//! `80 14` (no clip) or `88 14 <id>` for [`Odetics::list_first_id`].

use std::time::Duration;

use sony9pin_core::error::Result;

use crate::commands::time_sense;
use crate::vtr::Vtr;

/// Odetics opcodes as `(cmd1, cmd2)`.
pub mod op {
    pub const PREVIEW_IN_RESET: (u8, u8) = (0xA0, 0x06);
    pub const PREVIEW_OUT_RESET: (u8, u8) = (0xA0, 0x07);
    pub const LIST_FIRST_ID: (u8, u8) = (0xA0, 0x14);
    pub const LIST_NEXT_ID: (u8, u8) = (0xA0, 0x15);
    pub const LONGEST_CONTIGUOUS_AVAILABLE_STORAGE: (u8, u8) = (0xA0, 0x1C);
    pub const DEVICE_ID_REQUEST: (u8, u8) = (0xA0, 0x21);
    pub const RECORD_CUE_UP_WITH_DATA: (u8, u8) = (0xA0, 0x02);
    pub const PREVIEW_IN_PRESET: (u8, u8) = (0xA0, 0x04);
    pub const PREVIEW_OUT_PRESET: (u8, u8) = (0xA0, 0x05);
    pub const ERASE_ID: (u8, u8) = (0xA0, 0x10);
    pub const ERASE_SEGMENT: (u8, u8) = (0xA8, 0x11);
    pub const LIST_CLIP_TC: (u8, u8) = (0xA8, 0x16);
    pub const LIST_CLIP_TC_EVS: (u8, u8) = (0xA8, 0x17);
    pub const ID_STATUS_REQUEST: (u8, u8) = (0xA8, 0x18);
    pub const SET_DEVICE_ID: (u8, u8) = (0xA8, 0x20);

    pub const GET_EVENT: (u8, u8) = (0xB0, 0x00);
    pub const SET_TARGET_MACHINE: (u8, u8) = (0xB1, 0x01);
    pub const SET_ID_FOR_DATA: (u8, u8) = (0xB8, 0x02);
    pub const SET_DATA: (u8, u8) = (0xBC, 0x02);
    pub const GET_DATA: (u8, u8) = (0xB8, 0x03);
    pub const MAKE_CLIP: (u8, u8) = (0xB0, 0x04);
    pub const SET_ID_EVS_STATUS: (u8, u8) = (0xBA, 0x05);
    pub const LIST_CLIP_PROTECT_TC: (u8, u8) = (0xB8, 0x06);
    pub const GET_KEYWORD: (u8, u8) = (0xB9, 0x07);
    pub const SET_KEYWORD_1: (u8, u8) = (0xB8, 0x08);
    pub const SET_KEYWORD_2: (u8, u8) = (0xBD, 0x08);
    /// First data byte selects the direction: `0x04` LSM to Louth, `0x05`
    /// Louth to LSM.
    pub const ID_CONVERT: (u8, u8) = (0xB9, 0x09);
    pub const NET_MOVE_CLIP_ID_VDCP: (u8, u8) = (0xB9, 0x0A);
    /// First data byte: `0x53` source, `0x54` target.
    pub const NET_MOVE_CLIP_ID_LSM: (u8, u8) = (0xB9, 0x0B);
    pub const NET_COPY_CLIP_ID_VDCP_1: (u8, u8) = (0xB8, 0x0C);
    pub const NET_COPY_CLIP_ID_VDCP_2: (u8, u8) = (0xB9, 0x0C);
    /// First data byte: `0x53` source, `0x54` target.
    pub const NET_COPY_CLIP_ID_LSM: (u8, u8) = (0xB9, 0x0D);
    pub const GET_FIRST_MACHINE: (u8, u8) = (0xB0, 0x0E);
    pub const GET_NEXT_MACHINE: (u8, u8) = (0xB0, 0x0F);
    pub const SET_OPTIONS: (u8, u8) = (0xB4, 0x10);
    pub const GET_OPTIONS: (u8, u8) = (0xB0, 0x11);
    pub const SET_IN_OUT: (u8, u8) = (0xB0, 0x12);
    pub const LIVE: (u8, u8) = (0xB8, 0x13);
}

const LSM_TO_LOUTH: u8 = 0x04;
const LOUTH_TO_LSM: u8 = 0x05;
const LSM_SOURCE: u8 = 0x53;
const LSM_TARGET: u8 = 0x54;

/// Odetics command set on top of a [`Vtr`] session.
///
/// Every helper is a thin wrapper over [`Vtr::send_command`]; payloads
/// longer than 15 bytes are rejected with
/// [`Error::InvalidParameter`](sony9pin_core::Error::InvalidParameter).
pub struct Odetics<'a> {
    vtr: &'a Vtr,
}

impl<'a> Odetics<'a> {
    pub fn new(vtr: &'a Vtr) -> Self {
        Odetics { vtr }
    }

    /// Send any command as-is.
    pub async fn send(&self, cmd1: u8, cmd2: u8, data: &[u8]) -> Result<()> {
        self.vtr.send_command(cmd1, cmd2, data).await
    }

    /// Alias for [`send`](Self::send).
    pub async fn raw(&self, cmd1: u8, cmd2: u8, data: &[u8]) -> Result<()> {
        self.send(cmd1, cmd2, data).await
    }

    async fn send_op(&self, op: (u8, u8), data: &[u8]) -> Result<()> {
        self.send(op.0, op.1, data).await
    }

    async fn send_prefixed(&self, op: (u8, u8), prefix: u8, data: &[u8]) -> Result<()> {
        let mut payload = Vec::with_capacity(1 + data.len());
        payload.push(prefix);
        payload.extend_from_slice(data);
        self.send_op(op, &payload).await
    }

    /// Current time sense with automatic LTC/VITC selection.
    pub async fn timecode_auto(&self) -> Result<()> {
        self.vtr.current_time_sense(time_sense::AUTO).await
    }

    /// Poll [`timecode_auto`](Self::timecode_auto) every `interval` for
    /// `duration`.
    pub async fn poll_timecode(&self, interval: Duration, duration: Duration) -> Result<()> {
        self.vtr
            .poll_timecode(time_sense::AUTO, interval, duration)
            .await
    }

    // ---------------------------------------------------------------
    // Class A: preview, clip list, storage
    // ---------------------------------------------------------------

    pub async fn preview_in_reset(&self) -> Result<()> {
        self.send_op(op::PREVIEW_IN_RESET, &[]).await
    }

    pub async fn preview_out_reset(&self) -> Result<()> {
        self.send_op(op::PREVIEW_OUT_RESET, &[]).await
    }

    pub async fn list_first_id(&self) -> Result<()> {
        self.send_op(op::LIST_FIRST_ID, &[]).await
    }

    pub async fn list_next_id(&self) -> Result<()> {
        self.send_op(op::LIST_NEXT_ID, &[]).await
    }

    pub async fn longest_contiguous_available_storage(&self) -> Result<()> {
        self.send_op(op::LONGEST_CONTIGUOUS_AVAILABLE_STORAGE, &[])
            .await
    }

    pub async fn device_id_request(&self) -> Result<()> {
        self.send_op(op::DEVICE_ID_REQUEST, &[]).await
    }

    pub async fn record_cue_up_with_data(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::RECORD_CUE_UP_WITH_DATA, data).await
    }

    pub async fn preview_in_preset(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::PREVIEW_IN_PRESET, data).await
    }

    pub async fn preview_out_preset(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::PREVIEW_OUT_PRESET, data).await
    }

    pub async fn erase_id(&self, id: &[u8]) -> Result<()> {
        self.send_op(op::ERASE_ID, id).await
    }

    /// Often NAKed by devices that do not implement segments.
    pub async fn erase_segment(&self) -> Result<()> {
        self.send_op(op::ERASE_SEGMENT, &[]).await
    }

    /// Request the first-frame timecode and duration of a clip.
    pub async fn list_clip_tc(&self) -> Result<()> {
        self.send_op(op::LIST_CLIP_TC, &[]).await
    }

    /// EVS flavor of [`list_clip_tc`](Self::list_clip_tc); the reply also
    /// carries the machine number.
    pub async fn list_clip_tc_evs(&self) -> Result<()> {
        self.send_op(op::LIST_CLIP_TC_EVS, &[]).await
    }

    pub async fn id_status_request(&self) -> Result<()> {
        self.send_op(op::ID_STATUS_REQUEST, &[]).await
    }

    pub async fn set_device_id(&self, id: &[u8]) -> Result<()> {
        self.send_op(op::SET_DEVICE_ID, id).await
    }

    // ---------------------------------------------------------------
    // Class B: events, data, keywords, network
    // ---------------------------------------------------------------

    /// Poll for a pending event (`90 00` means none).
    pub async fn get_event(&self) -> Result<()> {
        self.send_op(op::GET_EVENT, &[]).await
    }

    pub async fn set_target_machine(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::SET_TARGET_MACHINE, data).await
    }

    /// Store the clip ID that a following [`set_data`](Self::set_data)
    /// applies to.
    pub async fn set_id_for_data(&self, id: &[u8]) -> Result<()> {
        self.send_op(op::SET_ID_FOR_DATA, id).await
    }

    pub async fn set_data(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::SET_DATA, data).await
    }

    pub async fn get_data(&self, id: &[u8]) -> Result<()> {
        self.send_op(op::GET_DATA, id).await
    }

    pub async fn make_clip(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::MAKE_CLIP, data).await
    }

    pub async fn set_id_evs_status(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::SET_ID_EVS_STATUS, data).await
    }

    pub async fn list_clip_protect_tc(&self, id: &[u8]) -> Result<()> {
        self.send_op(op::LIST_CLIP_PROTECT_TC, id).await
    }

    pub async fn get_keyword(&self, id: &[u8]) -> Result<()> {
        self.send_op(op::GET_KEYWORD, id).await
    }

    /// Select the clip ID for [`set_keyword2`](Self::set_keyword2).
    pub async fn set_keyword1(&self, id: &[u8]) -> Result<()> {
        self.send_op(op::SET_KEYWORD_1, id).await
    }

    pub async fn set_keyword2(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::SET_KEYWORD_2, data).await
    }

    pub async fn id_lsm_to_louth(&self, data: &[u8]) -> Result<()> {
        self.send_prefixed(op::ID_CONVERT, LSM_TO_LOUTH, data).await
    }

    pub async fn id_louth_to_lsm(&self, data: &[u8]) -> Result<()> {
        self.send_prefixed(op::ID_CONVERT, LOUTH_TO_LSM, data).await
    }

    pub async fn net_move_clip_id_vdcp(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::NET_MOVE_CLIP_ID_VDCP, data).await
    }

    pub async fn net_move_clip_id_lsm1(&self, data: &[u8]) -> Result<()> {
        self.send_prefixed(op::NET_MOVE_CLIP_ID_LSM, LSM_SOURCE, data)
            .await
    }

    pub async fn net_move_clip_id_lsm2(&self, data: &[u8]) -> Result<()> {
        self.send_prefixed(op::NET_MOVE_CLIP_ID_LSM, LSM_TARGET, data)
            .await
    }

    pub async fn net_copy_clip_id_vdcp1(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::NET_COPY_CLIP_ID_VDCP_1, data).await
    }

    pub async fn net_copy_clip_id_vdcp2(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::NET_COPY_CLIP_ID_VDCP_2, data).await
    }

    pub async fn net_copy_clip_id_lsm1(&self, data: &[u8]) -> Result<()> {
        self.send_prefixed(op::NET_COPY_CLIP_ID_LSM, LSM_SOURCE, data)
            .await
    }

    pub async fn net_copy_clip_id_lsm2(&self, data: &[u8]) -> Result<()> {
        self.send_prefixed(op::NET_COPY_CLIP_ID_LSM, LSM_TARGET, data)
            .await
    }

    pub async fn get_first_machine(&self) -> Result<()> {
        self.send_op(op::GET_FIRST_MACHINE, &[]).await
    }

    pub async fn get_next_machine(&self) -> Result<()> {
        self.send_op(op::GET_NEXT_MACHINE, &[]).await
    }

    pub async fn set_options(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::SET_OPTIONS, data).await
    }

    pub async fn get_options(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::GET_OPTIONS, data).await
    }

    /// Update the short in/out points of a clip.
    pub async fn set_in_out(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::SET_IN_OUT, data).await
    }

    /// Go live on the given camera.
    pub async fn live(&self, data: &[u8]) -> Result<()> {
        self.send_op(op::LIVE, data).await
    }
}
