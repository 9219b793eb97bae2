/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
use crate::error::{Result, SdpError};
use std::time::Duration;
use tokio::sync::watch;

pub const DEFAULT_BAUDRATE: u32 = 115_200;

pub const KNOWN_DEVICES: &[(&str, u16, u16)] = &[
    ("MX6DQP", 0x15A2, 0x0054),
    ("MX6SDL", 0x15A2, 0x0061),
    ("MX6SL", 0x15A2, 0x0063),
    ("MX6SX", 0x15A2, 0x0071),
    ("MX6UL", 0x15A2, 0x007D),
    ("MX6ULL", 0x15A2, 0x0080),
    ("MX6SLL", 0x15A2, 0x0128),
    ("MX7SD", 0x15A2, 0x0076),
    ("MX7ULP", 0x1FC9, 0x0126),
    ("VYBRID", 0x15A2, 0x006A),
    ("MXRT20", 0x1FC9, 0x0130),
    ("MXRT50", 0x1FC9, 0x0130),
    ("MXRT60", 0x1FC9, 0x0135),
    ("MX8MQ", 0x1FC9, 0x012B),
    ("MX8QXP-A0", 0x1FC9, 0x007D),
    ("MX8QM-A0", 0x1FC9, 0x0129),
    ("MX8QXP", 0x1FC9, 0x012F),
    ("MX8QM", 0x1FC9, 0x0129),
    ("MX815", 0x1FC9, 0x013E),
    ("MX865", 0x1FC9, 0x0146),
];

pub fn known_device_name(vid: u16, pid: u16) -> Option<&'static str> {
    KNOWN_DEVICES
        .iter()
        .find(|(_, v, p)| *v == vid && *p == pid)
        .map(|(name, _, _)| *name)
}

/// Physical link to the boot ROM.
///
/// `read` must give up after `timeout` and hand back an empty buffer instead
/// of an error, so callers can tell "nothing arrived" from "garbage arrived".
/// Once closed, every read and write fails with [`SdpError::PortClosed`].
#[async_trait::async_trait]
pub trait SdpPort: Send + std::fmt::Debug {
    async fn open(&mut self) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
    fn is_open(&self) -> bool;

    /// Reads at most `size` bytes.
    async fn read(&mut self, size: usize, timeout: Duration) -> Result<Vec<u8>>;
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    fn describe(&self) -> String;

    /// Handle that closes this port from another task.
    fn close_handle(&self) -> CloseHandle;
}

/// Out-of-band close signal shared between a port and whoever may need to
/// abort it. Triggering it wakes any read currently waiting on the device.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: watch::Sender<bool>,
}

impl CloseHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    /// Re-arms the signal when the port is opened again.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(SdpError::PortClosed)
        } else {
            Ok(())
        }
    }

    /// Resolves once the port has been closed.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        // Sender lives in self, so wait_for can only fail if we are dropped.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Runs `fut`, failing with [`SdpError::PortClosed`] if the port gets
    /// closed before it finishes.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        self.ensure_open()?;
        tokio::select! {
            res = fut => res,
            _ = self.closed() => Err(SdpError::PortClosed),
        }
    }
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_devices_lookup() {
        assert_eq!(known_device_name(0x15A2, 0x0080), Some("MX6ULL"));
        assert_eq!(known_device_name(0x1FC9, 0x0135), Some("MXRT60"));
        assert_eq!(known_device_name(0xDEAD, 0xBEEF), None);
    }

    #[tokio::test]
    async fn close_handle_unblocks_pending_future() {
        let handle = CloseHandle::new();
        let closer = handle.clone();

        let pending = tokio::spawn(async move {
            handle
                .guard(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        closer.close();

        let res = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("guarded future did not unblock")
            .unwrap();
        assert!(matches!(res, Err(SdpError::PortClosed)));
    }

    #[tokio::test]
    async fn guard_fails_fast_when_already_closed() {
        let handle = CloseHandle::new();
        handle.close();
        let res = handle.guard(async { Ok(1u8) }).await;
        assert!(matches!(res, Err(SdpError::PortClosed)));

        handle.reset();
        assert_eq!(handle.guard(async { Ok(1u8) }).await.unwrap(), 1);
    }
}
