/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/

/// Outcome of the last operation, as classified by the host.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success = 0,
    CmdFailure = 1,
    HabIsLocked = 10,
    ReadDataFailure = 11,
    WriteRegisterFailure = 12,
    WriteImageFailure = 13,
    WriteDcdFailure = 14,
    WriteCsfFailure = 15,
    SkipDcdHeaderFailure = 16,
}

impl StatusCode {
    pub const ALL: [StatusCode; 9] = [
        StatusCode::Success,
        StatusCode::CmdFailure,
        StatusCode::HabIsLocked,
        StatusCode::ReadDataFailure,
        StatusCode::WriteRegisterFailure,
        StatusCode::WriteImageFailure,
        StatusCode::WriteDcdFailure,
        StatusCode::WriteCsfFailure,
        StatusCode::SkipDcdHeaderFailure,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as u32 == code)
    }

    pub fn description(&self) -> &'static str {
        match self {
            StatusCode::Success => "Success",
            StatusCode::CmdFailure => "Command Failure",
            StatusCode::HabIsLocked => "HAB Is Locked",
            StatusCode::ReadDataFailure => "Read Register/Data Failure",
            StatusCode::WriteRegisterFailure => "Write Register Failure",
            StatusCode::WriteImageFailure => "Write Image Failure",
            StatusCode::WriteDcdFailure => "Write DCD Failure",
            StatusCode::WriteCsfFailure => "Write CSF Failure",
            StatusCode::SkipDcdHeaderFailure => "Skip DCD Header Failure",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == StatusCode::Success
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), *self as u32)
    }
}

/// Raw words echoed by the boot ROM.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseValue {
    WriteDataOk = 0x128A_8A12,
    WriteFileOk = 0x8888_8888,
    SkipDcdHeaderOk = 0x900D_D009,
    HabSuccess = 0xF0F0_F0F0,
    Locked = 0x1234_3412,
    Unlocked = 0x5678_7856,
}

impl ResponseValue {
    pub const ALL: [ResponseValue; 6] = [
        ResponseValue::WriteDataOk,
        ResponseValue::WriteFileOk,
        ResponseValue::SkipDcdHeaderOk,
        ResponseValue::HabSuccess,
        ResponseValue::Locked,
        ResponseValue::Unlocked,
    ];

    pub fn from_word(word: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|v| *v as u32 == word)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ResponseValue::WriteDataOk => "Write Data Success",
            ResponseValue::WriteFileOk => "Write File Success",
            ResponseValue::SkipDcdHeaderOk => "Skip DCD Header Success",
            ResponseValue::HabSuccess => "HAB Success",
            ResponseValue::Locked => "Locked",
            ResponseValue::Unlocked => "Unlocked",
        }
    }

    pub fn to_be_bytes(self) -> [u8; 4] {
        (self as u32).to_be_bytes()
    }
}

impl std::fmt::Display for ResponseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:08X})", self.description(), *self as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_have_stable_numbers() {
        assert_eq!(StatusCode::Success as u32, 0);
        assert_eq!(StatusCode::HabIsLocked as u32, 10);
        assert_eq!(StatusCode::from_code(14), Some(StatusCode::WriteDcdFailure));
        assert_eq!(StatusCode::from_code(2), None);
    }

    #[test]
    fn response_words_map_into_the_closed_set() {
        assert_eq!(
            ResponseValue::from_word(0x1234_3412),
            Some(ResponseValue::Locked)
        );
        assert_eq!(
            ResponseValue::from_word(0x5678_7856),
            Some(ResponseValue::Unlocked)
        );
        assert_eq!(ResponseValue::from_word(0x1234_5678), None);
    }

    #[test]
    fn display_includes_wire_value() {
        assert_eq!(
            ResponseValue::Locked.to_string(),
            "Locked (0x12343412)"
        );
        assert_eq!(StatusCode::HabIsLocked.to_string(), "HAB Is Locked (10)");
    }
}
