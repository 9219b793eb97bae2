/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
use crate::connection::port::{CloseHandle, SdpPort, known_device_name};
use crate::error::{Result, SdpError};
use log::{debug, error, info};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialPortInfo, SerialPortType, SerialStream};

const SCRATCH_SIZE: usize = 1024;

#[derive(Debug)]
pub struct SerialSdpPort {
    port: Option<SerialStream>,
    port_name: String,
    baudrate: u32,
    closer: CloseHandle,
}

impl SerialSdpPort {
    pub fn new(port_name: &str, baudrate: u32) -> Self {
        Self {
            port: None,
            port_name: port_name.to_string(),
            baudrate,
            closer: CloseHandle::new(),
        }
    }

    fn stream(&mut self) -> Result<&mut SerialStream> {
        self.closer.ensure_open()?;
        self.port.as_mut().ok_or(SdpError::PortClosed)
    }
}

#[async_trait::async_trait]
impl SdpPort for SerialSdpPort {
    async fn open(&mut self) -> Result<()> {
        // A stream left behind by an out-of-band close is stale.
        if self.closer.is_closed() && self.port.take().is_some() {
            debug!("Dropping stale stream for {}", self.port_name);
        }

        if self.port.is_none() {
            let stream = tokio_serial::new(&self.port_name, self.baudrate)
                .timeout(Duration::from_millis(1000))
                .open_native_async()
                .map_err(|e| {
                    error!("Failed to open serial port {}: {}", self.port_name, e);
                    SdpError::Io(e.into())
                })?;
            self.port = Some(stream);
            self.closer.reset();
            info!(
                "Opened SDP serial port: {} with baudrate {}",
                self.port_name, self.baudrate
            );
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closer.close();
        if self.port.take().is_some() {
            info!("Closed SDP serial port: {}", self.port_name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some() && !self.closer.is_closed()
    }

    async fn read(&mut self, size: usize, timeout: Duration) -> Result<Vec<u8>> {
        let closer = self.closer.clone();
        let port = self.stream()?;

        let mut buf = Vec::new();
        let mut scratch = [0u8; SCRATCH_SIZE];
        let res = closer
            .guard(async {
                let deadline = tokio::time::Instant::now() + timeout;
                while buf.len() < size {
                    let want = (size - buf.len()).min(SCRATCH_SIZE);
                    match tokio::time::timeout_at(deadline, port.read(&mut scratch[..want])).await {
                        Ok(Ok(0)) => return Err(SdpError::PortClosed),
                        Ok(Ok(n)) => buf.extend_from_slice(&scratch[..n]),
                        Ok(Err(e)) => return Err(SdpError::Io(e)),
                        Err(_) => break,
                    }
                }
                Ok(())
            })
            .await;

        if let Err(e) = res {
            // The serial driver's own timeout surfaces as an I/O error.
            match e {
                SdpError::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {}
                other => return Err(other),
            }
        }

        debug!("[RX] {} bytes: {}", buf.len(), hex::encode(&buf));
        Ok(buf)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        debug!("[TX] {} bytes: {}", data.len(), hex::encode(data));
        let port = self.stream()?;
        port.write_all(data).await?;
        port.flush().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("UART {} @ {} baud", self.port_name, self.baudrate)
    }

    fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }
}

/// Lists serial ports whose name matches `name`.
pub fn find_serial_ports(name: &str) -> Vec<SerialPortInfo> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            error!("Error listing serial ports: {}", e);
            return vec![];
        }
    };

    ports
        .into_iter()
        .filter(|p| p.port_name == name)
        .inspect(|p| {
            if let SerialPortType::UsbPort(usb_info) = &p.port_type {
                debug!(
                    "Serial port {} is USB {:04x}:{:04x} ({})",
                    p.port_name,
                    usb_info.vid,
                    usb_info.pid,
                    known_device_name(usb_info.vid, usb_info.pid).unwrap_or("Unknown")
                );
            }
        })
        .collect()
}
