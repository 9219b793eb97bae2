/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
use crate::error::SdpError;
use crate::sdp::status::{ResponseValue, StatusCode};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    // Commands understood by the i.MX Serial Download Protocol ROM
    ReadRegister = 0x0101,
    WriteRegister = 0x0202,
    WriteFile = 0x0404,
    ErrorStatus = 0x0505,
    WriteCsf = 0x0606,
    WriteDcd = 0x0A0A,
    JumpAddress = 0x0B0B,
    SkipDcdHeader = 0x0C0C,
}

impl CommandTag {
    pub const ALL: [CommandTag; 8] = [
        CommandTag::ReadRegister,
        CommandTag::WriteRegister,
        CommandTag::WriteFile,
        CommandTag::ErrorStatus,
        CommandTag::WriteCsf,
        CommandTag::WriteDcd,
        CommandTag::JumpAddress,
        CommandTag::SkipDcdHeader,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CommandTag::ReadRegister => "READ_REGISTER",
            CommandTag::WriteRegister => "WRITE_REGISTER",
            CommandTag::WriteFile => "WRITE_FILE",
            CommandTag::ErrorStatus => "ERROR_STATUS",
            CommandTag::WriteCsf => "WRITE_CSF",
            CommandTag::WriteDcd => "WRITE_DCD",
            CommandTag::JumpAddress => "JUMP_ADDRESS",
            CommandTag::SkipDcdHeader => "SKIP_DCD_HEADER",
        }
    }

    /// Status reported when a command with this tag is rejected by the device.
    ///
    /// The response words carry no hint about what failed, so the failure is
    /// always attributed from the tag of the packet that was sent.
    pub fn failure_status(&self) -> StatusCode {
        match self {
            CommandTag::WriteDcd => StatusCode::WriteDcdFailure,
            CommandTag::WriteCsf => StatusCode::WriteCsfFailure,
            CommandTag::WriteFile => StatusCode::WriteImageFailure,
            CommandTag::WriteRegister => StatusCode::WriteRegisterFailure,
            CommandTag::SkipDcdHeader => StatusCode::SkipDcdHeaderFailure,
            CommandTag::ReadRegister => StatusCode::ReadDataFailure,
            CommandTag::ErrorStatus | CommandTag::JumpAddress => StatusCode::CmdFailure,
        }
    }

    /// Word the ROM sends once the command has completed.
    pub fn completion_value(&self) -> ResponseValue {
        match self {
            CommandTag::WriteFile | CommandTag::WriteCsf => ResponseValue::WriteFileOk,
            CommandTag::WriteDcd | CommandTag::WriteRegister => ResponseValue::WriteDataOk,
            CommandTag::SkipDcdHeader => ResponseValue::SkipDcdHeaderOk,
            _ => ResponseValue::HabSuccess,
        }
    }
}

impl From<CommandTag> for u32 {
    fn from(tag: CommandTag) -> u32 {
        tag as u32
    }
}

impl TryFrom<u32> for CommandTag {
    type Error = SdpError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        CommandTag::ALL
            .into_iter()
            .find(|tag| *tag as u32 == value)
            .ok_or(SdpError::UnknownCommandTag(value))
    }
}

impl std::fmt::Display for CommandTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), *self as u32)
    }
}
