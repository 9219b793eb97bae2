/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
pub mod command;
pub mod packet;
pub mod status;
use crate::config::SdpConfig;
use crate::connection::port::SdpPort;
use crate::error::{Result, SdpError};
use crate::sdp::command::CommandTag;
use crate::sdp::packet::{CmdPacket, CmdResponse, RESPONSE_WORD_SIZE};
use crate::sdp::status::{ResponseValue, StatusCode};
use log::{debug, error, info, warn};

/// Access width, in bits, sent with register reads and writes.
pub const DATA_FORMAT_32: u32 = 32;

const PAYLOAD_CHUNK_SIZE: usize = 1024;
// Upper bound on a single transport read while collecting memory contents.
const READ_CHUNK_SIZE: usize = 1024;

// First word the ROM sends back for a command.
enum Ack {
    Locked,
    Accepted,
    Missing,
}

/// Serial Download Protocol session on top of one already opened port.
///
/// The session borrows the port and never closes it on its own. Every
/// operation overwrites [`Sdp::status_code`] and [`Sdp::response_value`]
/// before returning, so they describe the most recent call only. The
/// protocol is strictly half-duplex: one session per port, one call at a
/// time.
#[derive(Debug)]
pub struct Sdp<'a> {
    port: &'a mut dyn SdpPort,
    config: SdpConfig,
    status_code: StatusCode,
    response_value: Option<u32>,
}

impl<'a> Sdp<'a> {
    pub fn new(port: &'a mut dyn SdpPort) -> Self {
        Self::with_config(port, SdpConfig::default())
    }

    pub fn with_config(port: &'a mut dyn SdpPort, config: SdpConfig) -> Self {
        Sdp {
            port,
            config,
            status_code: StatusCode::Success,
            response_value: None,
        }
    }

    pub fn is_opened(&self) -> bool {
        self.port.is_open()
    }

    pub async fn open(&mut self) -> Result<()> {
        self.port.open().await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.port.close().await
    }

    pub fn describe(&self) -> String {
        self.port.describe()
    }

    pub fn config(&self) -> &SdpConfig {
        &self.config
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// HAB state word echoed during the last call, if one arrived and it is
    /// a known value.
    pub fn response_value(&self) -> Option<ResponseValue> {
        self.response_value.and_then(ResponseValue::from_word)
    }

    pub fn response_word(&self) -> Option<u32> {
        self.response_value
    }

    /// Sends `packet` followed by `payload` and waits for the outcome.
    ///
    /// Returns `Ok(true)` when the device completed the command or when it is
    /// HAB locked. A locked device acknowledges commands without executing
    /// them, so callers must check [`Sdp::status_code`] for
    /// [`StatusCode::HabIsLocked`]. A rejected or timed out command returns
    /// `Ok(false)` with a failure status chosen from the packet's tag.
    pub async fn send_command(&mut self, packet: &CmdPacket, payload: &[u8]) -> Result<bool> {
        self.begin(packet)?;

        if !self.transmit(packet, payload).await? {
            return Ok(self.fail(packet.tag));
        }

        match self.await_ack(packet).await? {
            Ack::Locked => return Ok(true),
            Ack::Missing => return Ok(self.fail(packet.tag)),
            Ack::Accepted => {}
        }

        let completion = self.read_response(packet.tag).await?;
        let expected = packet.tag.completion_value();
        if completion.is(expected) {
            debug!("{} completed", packet.tag);
            self.status_code = StatusCode::Success;
            Ok(true)
        } else {
            match completion.value() {
                Some(word) => error!(
                    "{} failed: expected 0x{:08X}, device sent 0x{:08X}",
                    packet.tag, expected as u32, word
                ),
                None => error!("{} failed: no completion status received", packet.tag),
            }
            Ok(self.fail(packet.tag))
        }
    }

    /// Reads `length` bytes starting at `address`.
    ///
    /// Returns `Ok(None)` when the device is locked (nothing can be read back
    /// from a locked part) or when the data does not arrive in time.
    pub async fn read(&mut self, address: u32, length: u32) -> Result<Option<Vec<u8>>> {
        info!("Read {} bytes from 0x{:08X}", length, address);
        let packet = CmdPacket::new(CommandTag::ReadRegister, address, length, DATA_FORMAT_32);
        self.begin(&packet)?;

        if !self.transmit(&packet, &[]).await? {
            self.fail(packet.tag);
            return Ok(None);
        }

        match self.await_ack(&packet).await? {
            Ack::Locked => return Ok(None),
            Ack::Missing => {
                self.fail(packet.tag);
                return Ok(None);
            }
            Ack::Accepted => {}
        }

        let length = length as usize;
        let mut data = Vec::new();
        while data.len() < length {
            let want = std::cmp::min(length - data.len(), READ_CHUNK_SIZE);
            let chunk = match self.port.read(want, self.config.timeout).await {
                Ok(chunk) => chunk,
                Err(e) => return self.transport_error(packet.tag, e).map(|_| None),
            };
            if chunk.is_empty() {
                error!(
                    "Read from 0x{:08X} stalled after {} of {} bytes",
                    address,
                    data.len(),
                    length
                );
                self.fail(packet.tag);
                return Ok(None);
            }
            data.extend_from_slice(&chunk);
        }
        data.truncate(length);

        self.status_code = StatusCode::Success;
        Ok(Some(data))
    }

    /// Reads a single 32-bit register.
    pub async fn read_u32(&mut self, address: u32) -> Result<Option<u32>> {
        let data = self.read(address, RESPONSE_WORD_SIZE as u32).await?;
        Ok(data.map(|d| u32::from_le_bytes([d[0], d[1], d[2], d[3]])))
    }

    pub async fn write_register(&mut self, address: u32, value: u32) -> Result<bool> {
        info!("Write 0x{:08X} to register 0x{:08X}", value, address);
        // The value rides in the packet itself, no payload follows.
        let packet = CmdPacket::new(
            CommandTag::WriteRegister,
            address,
            RESPONSE_WORD_SIZE as u32,
            value,
        );
        self.send_command(&packet, &[]).await
    }

    pub async fn write_dcd(&mut self, address: u32, data: &[u8]) -> Result<bool> {
        self.write_blob(CommandTag::WriteDcd, address, data).await
    }

    pub async fn write_csf(&mut self, address: u32, data: &[u8]) -> Result<bool> {
        self.write_blob(CommandTag::WriteCsf, address, data).await
    }

    pub async fn write_file(&mut self, address: u32, data: &[u8]) -> Result<bool> {
        self.write_blob(CommandTag::WriteFile, address, data).await
    }

    pub async fn skip_dcd_header(&mut self) -> Result<bool> {
        info!("Skip DCD header");
        let packet = CmdPacket::new(CommandTag::SkipDcdHeader, 0, 0, 0);
        self.send_command(&packet, &[]).await
    }

    /// Jumps to the image at `address`.
    ///
    /// A locked device still answers `true` with
    /// [`StatusCode::HabIsLocked`] even though nothing was started. On an
    /// unlocked device silence after the acknowledgement means the jump
    /// happened; any further word is the ROM reporting a HAB error.
    pub async fn jump_and_run(&mut self, address: u32) -> Result<bool> {
        info!("Jump to 0x{:08X}", address);
        let packet = CmdPacket::new(CommandTag::JumpAddress, address, 0, 0);
        self.begin(&packet)?;

        if !self.transmit(&packet, &[]).await? {
            return Ok(self.fail(packet.tag));
        }

        match self.await_ack(&packet).await? {
            Ack::Locked => return Ok(true),
            Ack::Missing => return Ok(self.fail(packet.tag)),
            Ack::Accepted => {}
        }

        let response = self.read_response(packet.tag).await?;
        match response.value() {
            None => {
                self.status_code = StatusCode::Success;
                Ok(true)
            }
            Some(word) => {
                error!("Jump to 0x{:08X} refused, HAB status 0x{:08X}", address, word);
                Ok(self.fail(packet.tag))
            }
        }
    }

    /// Queries the HAB error status word.
    pub async fn read_status(&mut self) -> Result<Option<u32>> {
        let packet = CmdPacket::new(CommandTag::ErrorStatus, 0, 0, 0);
        self.begin(&packet)?;

        if !self.transmit(&packet, &[]).await? {
            self.fail(packet.tag);
            return Ok(None);
        }

        // A locked device still reports its status after the HAB word.
        if let Ack::Missing = self.await_ack(&packet).await? {
            self.fail(packet.tag);
            return Ok(None);
        }

        let response = self.read_response(packet.tag).await?;
        match response.value() {
            Some(word) => {
                debug!("HAB status: 0x{:08X}", word);
                Ok(Some(word))
            }
            None => {
                self.fail(packet.tag);
                Ok(None)
            }
        }
    }

    async fn write_blob(&mut self, tag: CommandTag, address: u32, data: &[u8]) -> Result<bool> {
        info!(
            "{} to 0x{:08X} ({} bytes)",
            tag.name(),
            address,
            data.len()
        );
        let count = u32::try_from(data.len()).map_err(|_| {
            self.status_code = tag.failure_status();
            SdpError::InvalidConfig(format!("{} payload too large: {} bytes", tag, data.len()))
        })?;
        let packet = CmdPacket::new(tag, address, count, 0);
        self.send_command(&packet, data).await
    }

    // Every call starts from a clean slate and refuses to touch a closed port.
    fn begin(&mut self, packet: &CmdPacket) -> Result<()> {
        self.status_code = StatusCode::Success;
        self.response_value = None;

        if !self.port.is_open() {
            error!("Cannot send {}: port is not open", packet.tag);
            self.status_code = packet.tag.failure_status();
            return Err(SdpError::PortClosed);
        }

        debug!("[SDP] {}", packet);
        Ok(())
    }

    // Ok(false) when the transport dropped the bytes; the caller reports it.
    async fn transmit(&mut self, packet: &CmdPacket, payload: &[u8]) -> Result<bool> {
        if let Err(e) = self.port.write(&packet.to_bytes()).await {
            return self.transport_error(packet.tag, e).map(|_| false);
        }

        let mut pos = 0;
        while pos < payload.len() {
            let end = std::cmp::min(pos + PAYLOAD_CHUNK_SIZE, payload.len());
            if let Err(e) = self.port.write(&payload[pos..end]).await {
                return self.transport_error(packet.tag, e).map(|_| false);
            }
            pos = end;

            if pos % (PAYLOAD_CHUNK_SIZE * 64) == 0 {
                debug!("[TX] Progress: {}/{} bytes sent", pos, payload.len());
            }
        }

        Ok(true)
    }

    async fn await_ack(&mut self, packet: &CmdPacket) -> Result<Ack> {
        let response = self.read_response(packet.tag).await?;
        let Some(word) = response.value() else {
            error!("{}: no acknowledgement from device", packet.tag);
            return Ok(Ack::Missing);
        };

        self.response_value = Some(word);
        if word == ResponseValue::Locked as u32 {
            warn!("{}: HAB is locked, command accepted but not executed", packet.tag);
            self.status_code = StatusCode::HabIsLocked;
            return Ok(Ack::Locked);
        }

        debug!("{}: acknowledged with 0x{:08X}", packet.tag, word);
        Ok(Ack::Accepted)
    }

    // A missing word comes back as a response with `ok == false`.
    async fn read_response(&mut self, tag: CommandTag) -> Result<CmdResponse> {
        let frame = match self.port.read(RESPONSE_WORD_SIZE, self.config.timeout).await {
            Ok(frame) => frame,
            Err(e) => {
                return self
                    .transport_error(tag, e)
                    .map(|_| CmdResponse::missing());
            }
        };

        CmdResponse::decode(&frame).inspect_err(|e| {
            error!("{}: {}", tag, e);
            self.status_code = tag.failure_status();
        })
    }

    fn fail(&mut self, tag: CommandTag) -> bool {
        self.status_code = tag.failure_status();
        false
    }

    // Plain I/O failures and timeouts end the call quietly with a failure
    // status; a closed port is misuse and is passed on.
    fn transport_error(&mut self, tag: CommandTag, e: SdpError) -> Result<()> {
        self.status_code = tag.failure_status();
        match e {
            SdpError::Io(_) | SdpError::Timeout => {
                error!("{}: transport error: {}", tag, e);
                Ok(())
            }
            #[cfg(feature = "libusb")]
            SdpError::Usb(_) => {
                error!("{}: transport error: {}", tag, e);
                Ok(())
            }
            other => Err(other),
        }
    }
}
