/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
use crate::connection::port::{DEFAULT_BAUDRATE, KNOWN_DEVICES};
use crate::error::{Result, SdpError};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdpConfig {
    /// How long each response read may wait for the device.
    pub timeout: Duration,
}

impl SdpConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SdpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelector {
    Uart { name: String, baudrate: u32 },
    Usb { vid: u16, pid: u16 },
}

impl PortSelector {
    /// Builds a selector from the user's `port` and `usb` options.
    ///
    /// Exactly one of them must be set. `port` is `name[,baudrate]`; `usb` is
    /// `VID:PID`, `VID,PID` or a known device name such as `MX6ULL`.
    pub fn from_options(port: Option<&str>, usb: Option<&str>) -> Result<Self> {
        match (port, usb) {
            (None, None) => Err(SdpError::InvalidConfig(
                "one of 'port' or 'usb' must be specified".into(),
            )),
            (Some(_), Some(_)) => Err(SdpError::InvalidConfig(
                "only one of 'port' or 'usb' may be specified".into(),
            )),
            (Some(port), None) => Self::parse_port(port),
            (None, Some(usb)) => Self::parse_usb(usb),
        }
    }

    pub fn parse_port(port: &str) -> Result<Self> {
        let mut parts = port.splitn(2, ',');
        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(SdpError::InvalidConfig("empty serial port name".into()));
        }

        let baudrate = match parts.next().map(str::trim) {
            Some(speed) => parse_int(speed)
                .ok_or_else(|| SdpError::InvalidConfig(format!("invalid baudrate '{}'", speed)))?,
            None => DEFAULT_BAUDRATE,
        };

        Ok(PortSelector::Uart {
            name: name.to_string(),
            baudrate,
        })
    }

    pub fn parse_usb(usb: &str) -> Result<Self> {
        let usb = usb.trim();
        if let Some((_, vid, pid)) = KNOWN_DEVICES
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(usb))
        {
            return Ok(PortSelector::Usb {
                vid: *vid,
                pid: *pid,
            });
        }

        let (vid, pid) = usb
            .split_once([':', ','])
            .ok_or_else(|| SdpError::InvalidConfig(format!("unknown USB device '{}'", usb)))?;

        let parse_id = |s: &str| {
            parse_int(s.trim())
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(|| SdpError::InvalidConfig(format!("invalid USB id '{}'", s)))
        };

        Ok(PortSelector::Usb {
            vid: parse_id(vid)?,
            pid: parse_id(pid)?,
        })
    }
}

impl std::fmt::Display for PortSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortSelector::Uart { name, baudrate } => write!(f, "{},{}", name, baudrate),
            PortSelector::Usb { vid, pid } => write!(f, "0x{:04X}:0x{:04X}", vid, pid),
        }
    }
}

// Accepts decimal, 0x hex, 0o octal and 0b binary, with '_' separators.
fn parse_int(s: &str) -> Option<u32> {
    let s = s.replace('_', "");
    let lower = s.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        u32::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u32::from_str_radix(bin, 2).ok()
    } else {
        lower.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_requires_exactly_one_option() {
        assert!(matches!(
            PortSelector::from_options(None, None),
            Err(SdpError::InvalidConfig(_))
        ));
        assert!(matches!(
            PortSelector::from_options(Some("/dev/ttyUSB0"), Some("0x15A2:0x0080")),
            Err(SdpError::InvalidConfig(_))
        ));
    }

    #[test]
    fn uart_selector_parsing() {
        assert_eq!(
            PortSelector::from_options(Some("/dev/ttyUSB0"), None).unwrap(),
            PortSelector::Uart {
                name: "/dev/ttyUSB0".into(),
                baudrate: 115_200
            }
        );
        assert_eq!(
            PortSelector::parse_port("COM3, 57600").unwrap(),
            PortSelector::Uart {
                name: "COM3".into(),
                baudrate: 57_600
            }
        );
        assert!(PortSelector::parse_port(",9600").is_err());
        assert!(PortSelector::parse_port("COM3,fast").is_err());
    }

    #[test]
    fn usb_selector_parsing() {
        let expected = PortSelector::Usb {
            vid: 0x15A2,
            pid: 0x0080,
        };
        assert_eq!(PortSelector::parse_usb("0x15A2:0x0080").unwrap(), expected);
        assert_eq!(PortSelector::parse_usb("0x15a2,0x80").unwrap(), expected);
        assert_eq!(PortSelector::parse_usb("5538:128").unwrap(), expected);
        assert_eq!(PortSelector::parse_usb("mx6ull").unwrap(), expected);

        assert!(PortSelector::parse_usb("MX99").is_err());
        assert!(PortSelector::parse_usb("0x1FFFF:0x1").is_err());
    }

    #[test]
    fn default_timeout() {
        assert_eq!(SdpConfig::default().timeout, Duration::from_millis(5000));
    }
}
