/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
#![allow(dead_code)]
use sdpboot::{CloseHandle, ResponseValue, Result, SdpError, SdpPort};
use std::collections::VecDeque;
use std::time::Duration;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn word(value: u32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn resp(value: ResponseValue) -> Vec<u8> {
    word(value as u32)
}

/// In-memory port that replays scripted frames. An empty frame, or running
/// out of frames, looks like a read timeout.
#[derive(Debug)]
pub struct VirtualPort {
    pub responses: VecDeque<Vec<u8>>,
    pub written: Vec<Vec<u8>>,
    pub reads: usize,
    /// `size` argument of every read, in order.
    pub read_sizes: Vec<usize>,
    pub fail_writes: bool,
    /// Block reads until the port is closed instead of timing out.
    pub hang_on_read: bool,
    open: bool,
    closer: CloseHandle,
}

impl VirtualPort {
    pub fn new(responses: Vec<Vec<u8>>) -> Self {
        Self {
            responses: responses.into(),
            written: Vec::new(),
            reads: 0,
            read_sizes: Vec::new(),
            fail_writes: false,
            hang_on_read: false,
            open: true,
            closer: CloseHandle::new(),
        }
    }

    pub fn respond_with(&mut self, responses: Vec<Vec<u8>>) {
        self.responses = responses.into();
        self.reads = 0;
        self.read_sizes.clear();
        self.written.clear();
    }
}

#[async_trait::async_trait]
impl SdpPort for VirtualPort {
    async fn open(&mut self) -> Result<()> {
        self.open = true;
        self.closer.reset();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        self.closer.close();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open && !self.closer.is_closed()
    }

    async fn read(&mut self, size: usize, _timeout: Duration) -> Result<Vec<u8>> {
        if !self.open {
            return Err(SdpError::PortClosed);
        }
        self.reads += 1;
        self.read_sizes.push(size);

        if self.hang_on_read {
            return self
                .closer
                .guard(std::future::pending::<Result<Vec<u8>>>())
                .await;
        }

        let mut frame = self.responses.pop_front().unwrap_or_default();
        if frame.len() > size {
            let rest = frame.split_off(size);
            self.responses.push_front(rest);
        }
        Ok(frame)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.closer.ensure_open()?;
        if !self.open {
            return Err(SdpError::PortClosed);
        }
        if self.fail_writes {
            return Err(SdpError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "cable unplugged",
            )));
        }
        self.written.push(data.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "VirtualPort".to_string()
    }

    fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }
}
