/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
use crate::connection::port::{CloseHandle, SdpPort, known_device_name};
use crate::error::{Result, SdpError};
use log::{debug, error, info};
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const SDP_INTERFACE: u8 = 0;
// Largest single bulk IN transfer; longer reads come back short.
const MAX_TRANSFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct UsbSdpPort {
    handle: Arc<Mutex<DeviceHandle<Context>>>,
    is_open: bool,
    port_name: String,
    product_name: String,
    in_endpoint: u8,
    out_endpoint: u8,
    in_max_packet_size: usize,
    vid: u16,
    pid: u16,
    closer: CloseHandle,
}

impl UsbSdpPort {
    // Looks up the first bulk IN and OUT endpoints and the IN max packet size.
    fn find_bulk_endpoints(device: &Device<Context>) -> Option<(u8, usize, u8)> {
        let config = device.active_config_descriptor().ok()?;
        let mut in_ep = None;
        let mut in_sz = None;
        let mut out_ep = None;

        for interface in config.interfaces() {
            for interface_desc in interface.descriptors() {
                for endpoint in interface_desc.endpoint_descriptors() {
                    if endpoint.transfer_type() != rusb::TransferType::Bulk {
                        continue;
                    }
                    match endpoint.direction() {
                        rusb::Direction::In if in_ep.is_none() => {
                            in_ep = Some(endpoint.address());
                            in_sz = Some(endpoint.max_packet_size() as usize);
                        }
                        rusb::Direction::Out if out_ep.is_none() => {
                            out_ep = Some(endpoint.address());
                        }
                        _ => {}
                    }
                }
            }
        }

        Some((in_ep?, in_sz?, out_ep?))
    }

    pub fn from_device(device: Device<Context>) -> Option<Self> {
        let descriptor = device.device_descriptor().ok()?;
        let (vid, pid) = (descriptor.vendor_id(), descriptor.product_id());

        let (in_endpoint, in_max_packet_size, out_endpoint) = Self::find_bulk_endpoints(&device)?;

        let handle = device
            .open()
            .map_err(|e| error!("Failed to open USB device {:04x}:{:04x}: {}", vid, pid, e))
            .ok()?;

        let product_name = handle
            .read_product_string_ascii(&descriptor)
            .unwrap_or_else(|_| known_device_name(vid, pid).unwrap_or("Unknown").to_string());

        Some(Self {
            handle: Arc::new(Mutex::new(handle)),
            is_open: false,
            port_name: format!("USB:{:04x}:{:04x}", vid, pid),
            product_name,
            in_endpoint,
            out_endpoint,
            in_max_packet_size,
            vid,
            pid,
            closer: CloseHandle::new(),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.is_open {
            return Err(SdpError::PortClosed);
        }
        self.closer.ensure_open()
    }
}

#[async_trait::async_trait]
impl SdpPort for UsbSdpPort {
    async fn open(&mut self) -> Result<()> {
        if self.is_open && !self.closer.is_closed() {
            return Ok(());
        }

        let handle = self.handle.clone();
        // Closed out of band: the interface is still claimed by us.
        let reclaim = self.is_open;
        self.is_open = false;

        // RUSB is sync, so we need to spawn blocking here
        tokio::task::spawn_blocking(move || -> Result<()> {
            let handle = handle.blocking_lock();

            if reclaim {
                if let Err(e) = handle.release_interface(SDP_INTERFACE) {
                    debug!("Failed to release interface {}: {:?}", SDP_INTERFACE, e);
                }
            }

            #[cfg(not(target_os = "windows"))]
            {
                if handle.kernel_driver_active(SDP_INTERFACE)? {
                    handle.detach_kernel_driver(SDP_INTERFACE).map_err(|e| {
                        error!(
                            "Failed to detach kernel driver on interface {}: {:?}",
                            SDP_INTERFACE, e
                        );
                        SdpError::from(e)
                    })?;
                }
            }

            handle.claim_interface(SDP_INTERFACE).map_err(|e| {
                error!("Failed to claim interface {}: {:?}", SDP_INTERFACE, e);
                SdpError::from(e)
            })?;

            Ok(())
        })
        .await
        .map_err(|e| SdpError::Io(e.into()))??;

        self.is_open = true;
        self.closer.reset();
        info!("Opened SDP USB port: {}", self.describe());

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closer.close();
        if !self.is_open {
            return Ok(());
        }

        let handle = self.handle.clone();
        tokio::task::spawn_blocking(move || {
            let handle = handle.blocking_lock();
            if let Err(e) = handle.release_interface(SDP_INTERFACE) {
                error!("Failed to release interface {}: {:?}", SDP_INTERFACE, e);
            }
            #[cfg(not(target_os = "windows"))]
            if let Err(e) = handle.attach_kernel_driver(SDP_INTERFACE) {
                debug!(
                    "Failed to reattach kernel driver on interface {}: {:?}",
                    SDP_INTERFACE, e
                );
            }
        })
        .await
        .map_err(|e| SdpError::Io(e.into()))?;

        self.is_open = false;
        info!("Closed SDP USB port: {}", self.port_name);

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open && !self.closer.is_closed()
    }

    async fn read(&mut self, size: usize, timeout: Duration) -> Result<Vec<u8>> {
        self.ensure_open()?;

        let handle = self.handle.clone();
        let endpoint = self.in_endpoint;
        // Bulk IN transfers must be a multiple of the packet size or libusb
        // reports an overflow.
        let packet = self.in_max_packet_size.max(1);
        let size = size.min(MAX_TRANSFER_SIZE);
        let request = size.div_ceil(packet) * packet;

        let transfer = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut buf = vec![0u8; request];
            let locked = handle.blocking_lock();
            match locked.read_bulk(endpoint, &mut buf, timeout) {
                Ok(n) => {
                    buf.truncate(n.min(size));
                    Ok(buf)
                }
                Err(rusb::Error::Timeout) => Ok(Vec::new()),
                Err(e) => Err(e.into()),
            }
        });

        let data = self
            .closer
            .guard(async { transfer.await.map_err(|e| SdpError::Io(e.into()))? })
            .await?;

        debug!("[RX] {} bytes: {}", data.len(), hex::encode(&data));
        Ok(data)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        debug!("[TX] {} bytes: {}", data.len(), hex::encode(data));

        let handle = self.handle.clone();
        let endpoint = self.out_endpoint;
        let timeout = Duration::from_millis(5000);
        let data = data.to_vec();

        let transfer = tokio::task::spawn_blocking(move || -> Result<()> {
            let locked = handle.blocking_lock();
            let mut written = 0;
            while written < data.len() {
                written += locked.write_bulk(endpoint, &data[written..], timeout)?;
            }
            Ok(())
        });

        self.closer
            .guard(async { transfer.await.map_err(|e| SdpError::Io(e.into()))? })
            .await
    }

    fn describe(&self) -> String {
        format!(
            "{} (0x{:04X}, 0x{:04X})",
            self.product_name, self.vid, self.pid
        )
    }

    fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }
}

/// Enumerates SDP devices on the bus matching `vid`/`pid`.
pub fn find_usb_devices(vid: u16, pid: u16) -> Result<Vec<UsbSdpPort>> {
    let context = Context::new()?;
    let devices = context.devices()?;

    Ok(devices
        .iter()
        .filter(|device| {
            device
                .device_descriptor()
                .map(|d| d.vendor_id() == vid && d.product_id() == pid)
                .unwrap_or(false)
        })
        .filter_map(UsbSdpPort::from_device)
        .collect())
}
