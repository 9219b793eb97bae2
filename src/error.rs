/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdpError {
    #[error("Port is not open")]
    PortClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out waiting for the device")]
    Timeout,

    /// Fewer bytes arrived than the frame needs.
    #[error("Malformed frame: expected {expected} bytes, got {got}")]
    MalformedFrame { expected: usize, got: usize },

    #[error("Unknown command tag: 0x{0:04X}")]
    UnknownCommandTag(u32),

    #[error("No device found matching '{0}'")]
    NoDeviceFound(String),

    #[error("More than one device matches '{0}'")]
    AmbiguousDevice(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[cfg(feature = "libusb")]
    #[error("USB error: {0}")]
    Usb(String),
}

#[cfg(feature = "libusb")]
impl From<rusb::Error> for SdpError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::Timeout => SdpError::Timeout,
            rusb::Error::NoDevice => SdpError::PortClosed,
            other => SdpError::Usb(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SdpError>;
