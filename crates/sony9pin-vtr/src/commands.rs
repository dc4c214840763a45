//! 9-pin command builders.
//!
//! This module provides the opcode tables for the four host-to-device
//! command classes and functions that build complete, checksummed packets
//! for the common deck operations (transport, jog/var/shuttle, sense,
//! preset).
//!
//! All functions are pure: they produce byte vectors without performing any
//! I/O. None of them can exceed the 15-byte data limit, so they return
//! `Vec<u8>` directly rather than a `Result`.

use sony9pin_core::Timecode;

use crate::packet::{build_packet, encode_timecode, CommandClass};

// ---------------------------------------------------------------
// Opcode tables
// ---------------------------------------------------------------

/// System control opcodes (class `0x0_`).
pub mod system {
    pub const LOCAL_DISABLE: u8 = 0x0C;
    pub const DEVICE_TYPE: u8 = 0x11;
    pub const LOCAL_ENABLE: u8 = 0x1D;
}

/// Transport control opcodes (class `0x2_`).
pub mod transport {
    pub const STOP: u8 = 0x00;
    pub const PLAY: u8 = 0x01;
    pub const RECORD: u8 = 0x02;
    pub const STANDBY_OFF: u8 = 0x04;
    pub const STANDBY_ON: u8 = 0x05;
    pub const EJECT: u8 = 0x0F;
    pub const FAST_FWD: u8 = 0x10;
    pub const JOG_FWD: u8 = 0x11;
    pub const VAR_FWD: u8 = 0x12;
    pub const SHUTTLE_FWD: u8 = 0x13;
    pub const FRAME_STEP_FWD: u8 = 0x14;
    pub const REWIND: u8 = 0x20;
    /// Same opcode as [`REWIND`].
    pub const FAST_REVERSE: u8 = 0x20;
    pub const JOG_REV: u8 = 0x21;
    pub const VAR_REV: u8 = 0x22;
    pub const SHUTTLE_REV: u8 = 0x23;
    pub const FRAME_STEP_REV: u8 = 0x24;
    pub const PREROLL: u8 = 0x30;
    /// Data: 4-byte BCD timecode `[ff, ss, mm, hh]`.
    pub const CUE_UP_WITH_DATA: u8 = 0x31;
    pub const SYNC_PLAY: u8 = 0x34;
    pub const PROG_SPEED_PLAY_PLUS: u8 = 0x38;
    pub const PROG_SPEED_PLAY_MINUS: u8 = 0x39;
    pub const PREVIEW: u8 = 0x40;
    pub const REVIEW: u8 = 0x41;
}

/// Preset/select control opcodes (class `0x4_`).
pub mod preset {
    pub const IN_ENTRY: u8 = 0x10;
    pub const OUT_ENTRY: u8 = 0x11;
    pub const IN_DATA_PRESET: u8 = 0x14;
    pub const OUT_DATA_PRESET: u8 = 0x15;
    pub const PREROLL_PRESET: u8 = 0x31;
    pub const INPUT_CHECK: u8 = 0x37;
    pub const AUTO_MODE_OFF: u8 = 0x40;
    pub const AUTO_MODE_ON: u8 = 0x41;
}

/// Sense request opcodes (class `0x6_`).
pub mod sense {
    pub const TC_GEN_SENSE: u8 = 0x0A;
    pub const CURRENT_TIME_SENSE: u8 = 0x0C;
    pub const IN_DATA_SENSE: u8 = 0x10;
    pub const OUT_DATA_SENSE: u8 = 0x11;
    pub const STATUS_SENSE: u8 = 0x20;
}

/// Data byte of a current time sense, selecting the time source.
pub mod time_sense {
    pub const LTC_TC: u8 = 0x01;
    pub const VITC_TC: u8 = 0x02;
    /// LTC or VITC, whichever the deck considers best.
    pub const AUTO: u8 = 0x03;
    pub const TIMER_1: u8 = 0x04;
    pub const TIMER_2: u8 = 0x08;
    pub const LTC_UB: u8 = 0x10;
    pub const VITC_UB: u8 = 0x20;
}

/// Largest speed magnitude for jog, var and shuttle.
pub const MAX_SPEED: i16 = 0x7F;

fn system(cmd2: u8) -> Vec<u8> {
    build_packet(CommandClass::SystemControl.cmd1(), cmd2, &[])
}

fn transport(cmd2: u8) -> Vec<u8> {
    build_packet(CommandClass::TransportControl.cmd1(), cmd2, &[])
}

fn preset(cmd2: u8, data: &[u8]) -> Vec<u8> {
    build_packet(CommandClass::PresetSelectControl.cmd1(), cmd2, data)
}

fn sense(cmd2: u8, data: &[u8]) -> Vec<u8> {
    build_packet(CommandClass::SenseRequest.cmd1(), cmd2, data)
}

/// Build a signed-speed transport command: forward opcode for `speed >= 0`,
/// reverse otherwise, one data byte holding the clamped magnitude.
fn speed_command(fwd: u8, rev: u8, speed: i16) -> Vec<u8> {
    let v = speed.clamp(-MAX_SPEED, MAX_SPEED);
    let cmd2 = if v >= 0 { fwd } else { rev };
    let magnitude = (v.unsigned_abs() as u8) & 0x7F;
    build_packet(CommandClass::TransportControl.cmd1(), cmd2, &[magnitude])
}

// ---------------------------------------------------------------
// System control
// ---------------------------------------------------------------

pub fn cmd_local_disable() -> Vec<u8> {
    system(system::LOCAL_DISABLE)
}

pub fn cmd_local_enable() -> Vec<u8> {
    system(system::LOCAL_ENABLE)
}

/// Request the device type. The deck answers with `12 11 <hi> <lo>`.
pub fn cmd_device_type() -> Vec<u8> {
    system(system::DEVICE_TYPE)
}

// ---------------------------------------------------------------
// Transport control
// ---------------------------------------------------------------

pub fn cmd_stop() -> Vec<u8> {
    transport(transport::STOP)
}

pub fn cmd_play() -> Vec<u8> {
    transport(transport::PLAY)
}

pub fn cmd_record() -> Vec<u8> {
    transport(transport::RECORD)
}

pub fn cmd_standby_off() -> Vec<u8> {
    transport(transport::STANDBY_OFF)
}

pub fn cmd_standby_on() -> Vec<u8> {
    transport(transport::STANDBY_ON)
}

pub fn cmd_eject() -> Vec<u8> {
    transport(transport::EJECT)
}

pub fn cmd_fast_forward() -> Vec<u8> {
    transport(transport::FAST_FWD)
}

pub fn cmd_rewind() -> Vec<u8> {
    transport(transport::REWIND)
}

pub fn cmd_preroll() -> Vec<u8> {
    transport(transport::PREROLL)
}

pub fn cmd_sync_play() -> Vec<u8> {
    transport(transport::SYNC_PLAY)
}

pub fn cmd_preview() -> Vec<u8> {
    transport(transport::PREVIEW)
}

pub fn cmd_review() -> Vec<u8> {
    transport(transport::REVIEW)
}

pub fn cmd_frame_step_forward() -> Vec<u8> {
    transport(transport::FRAME_STEP_FWD)
}

pub fn cmd_frame_step_reverse() -> Vec<u8> {
    transport(transport::FRAME_STEP_REV)
}

/// Cue up to a timecode. Data: BCD `[ff, ss, mm, hh]`.
pub fn cmd_cue_up_with_data(tc: &Timecode) -> Vec<u8> {
    build_packet(
        CommandClass::TransportControl.cmd1(),
        transport::CUE_UP_WITH_DATA,
        &encode_timecode(tc),
    )
}

/// Jog at a signed speed, clamped to -127..=127.
pub fn cmd_jog(speed: i16) -> Vec<u8> {
    speed_command(transport::JOG_FWD, transport::JOG_REV, speed)
}

/// Variable-speed play at a signed speed, clamped to -127..=127.
pub fn cmd_var_speed(speed: i16) -> Vec<u8> {
    speed_command(transport::VAR_FWD, transport::VAR_REV, speed)
}

/// Shuttle at a signed speed, clamped to -127..=127.
pub fn cmd_shuttle(speed: i16) -> Vec<u8> {
    speed_command(transport::SHUTTLE_FWD, transport::SHUTTLE_REV, speed)
}

// ---------------------------------------------------------------
// Sense requests
// ---------------------------------------------------------------

/// Request `size` status bytes starting at byte `start`. Both values are
/// 4-bit fields packed into one data byte.
pub fn cmd_status_sense(start: u8, size: u8) -> Vec<u8> {
    let v = ((start & 0x0F) << 4) | (size & 0x0F);
    sense(sense::STATUS_SENSE, &[v])
}

/// Request the current time from the source selected by `flag`
/// (see [`time_sense`]).
pub fn cmd_current_time_sense(flag: u8) -> Vec<u8> {
    sense(sense::CURRENT_TIME_SENSE, &[flag])
}

pub fn cmd_tc_gen_sense() -> Vec<u8> {
    sense(sense::TC_GEN_SENSE, &[])
}

pub fn cmd_in_data_sense() -> Vec<u8> {
    sense(sense::IN_DATA_SENSE, &[])
}

pub fn cmd_out_data_sense() -> Vec<u8> {
    sense(sense::OUT_DATA_SENSE, &[])
}

// ---------------------------------------------------------------
// Preset / select
// ---------------------------------------------------------------

pub fn cmd_in_entry() -> Vec<u8> {
    preset(preset::IN_ENTRY, &[])
}

pub fn cmd_out_entry() -> Vec<u8> {
    preset(preset::OUT_ENTRY, &[])
}

/// Preset the IN point. Data: BCD `[ff, ss, mm, hh]`.
pub fn cmd_in_data_preset(tc: &Timecode) -> Vec<u8> {
    preset(preset::IN_DATA_PRESET, &encode_timecode(tc))
}

/// Preset the OUT point. Data: BCD `[ff, ss, mm, hh]`.
pub fn cmd_out_data_preset(tc: &Timecode) -> Vec<u8> {
    preset(preset::OUT_DATA_PRESET, &encode_timecode(tc))
}

/// Preset the preroll duration. Data: BCD `[ff, ss, mm, hh]`.
pub fn cmd_preroll_preset(tc: &Timecode) -> Vec<u8> {
    preset(preset::PREROLL_PRESET, &encode_timecode(tc))
}

pub fn cmd_auto_mode_on() -> Vec<u8> {
    preset(preset::AUTO_MODE_ON, &[])
}

pub fn cmd_auto_mode_off() -> Vec<u8> {
    preset(preset::AUTO_MODE_OFF, &[])
}

pub fn cmd_input_check() -> Vec<u8> {
    preset(preset::INPUT_CHECK, &[])
}
