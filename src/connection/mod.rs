/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
pub mod backend;
pub mod port;
use crate::config::PortSelector;
use crate::connection::backend::{SerialSdpPort, find_serial_ports};
use crate::connection::port::SdpPort;
use crate::error::{Result, SdpError};
use log::info;

/// Resolves `selector` to exactly one port. The port is returned closed.
pub fn find_sdp_port(selector: &PortSelector) -> Result<Box<dyn SdpPort>> {
    match selector {
        PortSelector::Uart { name, baudrate } => {
            let found = exactly_one(selector, find_serial_ports(name))?;
            info!("Found SDP serial port: {}", found.port_name);
            Ok(Box::new(SerialSdpPort::new(&found.port_name, *baudrate)))
        }
        #[cfg(feature = "libusb")]
        PortSelector::Usb { vid, pid } => {
            let device = exactly_one(selector, backend::find_usb_devices(*vid, *pid)?)?;
            info!("Found SDP USB device: {}", device.describe());
            Ok(Box::new(device))
        }
        #[cfg(not(feature = "libusb"))]
        PortSelector::Usb { .. } => Err(SdpError::InvalidConfig(format!(
            "cannot open USB device {}: built without the 'libusb' feature",
            selector
        ))),
    }
}

/// Finds and opens the port described by the user's `port`/`usb` options.
pub async fn open_sdp_port(port: Option<&str>, usb: Option<&str>) -> Result<Box<dyn SdpPort>> {
    let selector = PortSelector::from_options(port, usb)?;
    let mut sdp_port = find_sdp_port(&selector)?;
    sdp_port.open().await?;
    Ok(sdp_port)
}

// The engine needs one device: none or several is a selection error.
fn exactly_one<T>(selector: &PortSelector, mut candidates: Vec<T>) -> Result<T> {
    match candidates.len() {
        0 => Err(SdpError::NoDeviceFound(selector.to_string())),
        1 => Ok(candidates.remove(0)),
        _ => Err(SdpError::AmbiguousDevice(selector.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uart(name: &str) -> PortSelector {
        PortSelector::Uart {
            name: name.into(),
            baudrate: 115_200,
        }
    }

    #[test]
    fn exactly_one_candidate_is_selected() {
        let selector = uart("/dev/ttyUSB0");
        assert_eq!(exactly_one(&selector, vec![7u8]).unwrap(), 7);
    }

    #[test]
    fn no_candidate_is_no_device_found() {
        let selector = uart("/dev/ttyUSB0");
        let err = exactly_one::<u8>(&selector, vec![]).unwrap_err();
        assert!(matches!(err, SdpError::NoDeviceFound(s) if s == "/dev/ttyUSB0,115200"));
    }

    #[test]
    fn several_candidates_are_ambiguous() {
        let selector = PortSelector::Usb {
            vid: 0x15A2,
            pid: 0x0080,
        };
        let err = exactly_one(&selector, vec![1u8, 2u8]).unwrap_err();
        assert!(matches!(err, SdpError::AmbiguousDevice(s) if s == "0x15A2:0x0080"));
    }

    #[test]
    fn unknown_serial_port_is_not_found() {
        let selector = uart("/dev/sdpboot-no-such-port");
        assert!(matches!(
            find_sdp_port(&selector),
            Err(SdpError::NoDeviceFound(_))
        ));
    }

    #[tokio::test]
    async fn open_rejects_invalid_options_before_io() {
        assert!(matches!(
            open_sdp_port(None, None).await,
            Err(SdpError::InvalidConfig(_))
        ));
        assert!(matches!(
            open_sdp_port(Some("/dev/ttyUSB0"), Some("MX6ULL")).await,
            Err(SdpError::InvalidConfig(_))
        ));
    }
}
