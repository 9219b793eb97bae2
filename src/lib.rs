/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
pub mod config;
pub mod connection;
pub mod error;
pub mod sdp;

pub use config::{PortSelector, SdpConfig};
pub use connection::port::{CloseHandle, SdpPort};
pub use connection::{find_sdp_port, open_sdp_port};
pub use error::{Result, SdpError};
pub use sdp::Sdp;
pub use sdp::command::CommandTag;
pub use sdp::packet::{CmdPacket, CmdResponse};
pub use sdp::status::{ResponseValue, StatusCode};
