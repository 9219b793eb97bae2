/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
pub mod serial_backend;
pub use serial_backend::{SerialSdpPort, find_serial_ports};
#[cfg(feature = "libusb")]
pub mod libusb_backend;
#[cfg(feature = "libusb")]
pub use libusb_backend::{UsbSdpPort, find_usb_devices};
