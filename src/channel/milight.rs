// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MiLight v6 bridge protocol over UDP.
//!
//! Each command opens a short session with the bridge:
//!
//! 1. Send the session start frame; the answer carries two session bytes.
//! 2. Send the 22-byte command frame containing those bytes, a rolling
//!    sequence number, the 9-byte command, the zone and a checksum.
//! 3. Wait for the acknowledgement (`0x88 ...`).
//!
//! The bridge is write-only: it never reports state or effects.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;

use super::DeviceChannel;
use crate::error::ChannelError;
use crate::types::{DeviceAddress, PowerState};

const START_SESSION: [u8; 27] = [
    0x20, 0x00, 0x00, 0x00, 0x16, 0x02, 0x62, 0x3A, 0xD5, 0xED, 0xA3, 0x01, 0xAE, 0x08, 0x2D, 0x46,
    0x61, 0x41, 0xA7, 0xF6, 0xDC, 0xAF, 0xD3, 0xE6, 0x00, 0x00, 0x1E,
];

const SESSION_REPLY_MIN: usize = 21;
const ACK_MIN: usize = 8;
const ACK_HEADER: u8 = 0x88;

/// Zone byte addressing the lamp built into the bridge.
const BRIDGE_LAMP_ZONE: u8 = 0x01;

/// What a channel addresses behind a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiLightTarget {
    /// The lamp built into the bridge itself.
    BridgeLamp,
    /// A remote zone (1-4, 0 for all zones).
    Zone(u8),
}

impl MiLightTarget {
    const fn zone_byte(self) -> u8 {
        match self {
            Self::BridgeLamp => BRIDGE_LAMP_ZONE,
            Self::Zone(zone) => zone,
        }
    }

    /// Returns the 9-byte command for `op`, or `None` if the target has no
    /// such operation.
    fn command(self, op: Op) -> Option<[u8; 9]> {
        let command = match self {
            Self::BridgeLamp => match op {
                Op::On => lamp(0x03, 0x03),
                Op::Off => lamp(0x03, 0x04),
                Op::White => lamp(0x03, 0x05),
                Op::Color(c) => [0x31, 0x00, 0x00, 0x00, 0x01, c, c, c, c],
                Op::Brightness(b) => lamp(0x02, b),
                Op::Disco(m) => lamp(0x04, m),
                Op::Night | Op::Saturation(_) | Op::Temperature(_) => return None,
            },
            Self::Zone(_) => match op {
                Op::On => zone(0x04, 0x01),
                Op::Off => zone(0x04, 0x02),
                Op::Night => zone(0x04, 0x05),
                Op::White => zone(0x05, 0x64),
                Op::Color(c) => [0x31, 0x00, 0x00, 0x08, 0x01, c, c, c, c],
                Op::Saturation(s) => zone(0x02, s),
                Op::Brightness(b) => zone(0x03, b),
                Op::Temperature(t) => zone(0x05, t),
                Op::Disco(m) => zone(0x06, m),
            },
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    On,
    Off,
    Night,
    White,
    Color(u8),
    Saturation(u8),
    Brightness(u8),
    Temperature(u8),
    Disco(u8),
}

impl Op {
    const fn name(self) -> &'static str {
        match self {
            Self::On | Self::Off => "power",
            Self::Night => "night mode",
            Self::White => "white mode",
            Self::Color(_) => "color",
            Self::Saturation(_) => "saturation",
            Self::Brightness(_) => "brightness",
            Self::Temperature(_) => "color temperature",
            Self::Disco(_) => "disco mode",
        }
    }
}

const fn lamp(kind: u8, value: u8) -> [u8; 9] {
    [0x31, 0x00, 0x00, 0x00, kind, value, 0x00, 0x00, 0x00]
}

const fn zone(kind: u8, value: u8) -> [u8; 9] {
    [0x31, 0x00, 0x00, 0x08, kind, value, 0x00, 0x00, 0x00]
}

fn byte(operation: &'static str, value: i32) -> Result<u8, ChannelError> {
    u8::try_from(value).map_err(|_| ChannelError::ValueOutOfRange { operation, value })
}

/// Builds a command frame.
fn encode_frame(session: (u8, u8), sequence: u8, command: &[u8; 9], zone: u8) -> [u8; 22] {
    let checksum = command
        .iter()
        .fold(zone, |acc, b| acc.wrapping_add(*b));

    let mut frame = [0u8; 22];
    frame[..10].copy_from_slice(&[
        0x80, 0x00, 0x00, 0x00, 0x11, session.0, session.1, 0x00, sequence, 0x00,
    ]);
    frame[10..19].copy_from_slice(command);
    frame[19] = zone;
    frame[20] = 0x00;
    frame[21] = checksum;
    frame
}

/// Connection parameters of one v6 bridge, shared by its lamp and zones.
#[derive(Debug)]
pub struct MiLightBridge {
    address: DeviceAddress,
    timeout: Duration,
    sequence: AtomicU8,
}

impl MiLightBridge {
    /// Default bridge UDP port.
    pub const DEFAULT_PORT: u16 = 5987;
    /// Default time to wait for each bridge answer.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a bridge handle. No packet is sent until the first command.
    #[must_use]
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            timeout: Self::DEFAULT_TIMEOUT,
            sequence: AtomicU8::new(0),
        }
    }

    /// Sets how long to wait for each answer.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the bridge address.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    async fn recv(&self, socket: &UdpSocket, buf: &mut [u8]) -> Result<usize, ChannelError> {
        let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        tokio::time::timeout(self.timeout, socket.recv(buf))
            .await
            .map_err(|_| ChannelError::Timeout(millis))?
            .map_err(ChannelError::from)
    }

    async fn send(&self, command: [u8; 9], zone: u8) -> Result<(), ChannelError> {
        let target = (
            self.address.host(),
            self.address.port_or(Self::DEFAULT_PORT),
        );
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.connect(target).await?;

        socket.send(&START_SESSION).await?;
        let mut buf = [0u8; 64];
        let n = self.recv(&socket, &mut buf).await?;
        if n < SESSION_REPLY_MIN {
            return Err(ChannelError::UnexpectedResponse(format!(
                "session reply of {n} bytes"
            )));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let frame = encode_frame((buf[19], buf[20]), sequence, &command, zone);
        tracing::debug!(bridge = %self.address, zone, frame = ?frame, "Sending MiLight command");
        socket.send(&frame).await?;

        let n = self.recv(&socket, &mut buf).await?;
        if n < ACK_MIN || buf[0] != ACK_HEADER {
            return Err(ChannelError::UnexpectedResponse(format!(
                "bad acknowledgement {:02X?}",
                &buf[..n]
            )));
        }
        Ok(())
    }
}

/// Channel to one lamp or zone behind a [`MiLightBridge`].
#[derive(Debug, Clone)]
pub struct MiLightChannel {
    bridge: Arc<MiLightBridge>,
    target: MiLightTarget,
}

impl MiLightChannel {
    /// Creates a channel for `target` on `bridge`.
    #[must_use]
    pub fn new(bridge: Arc<MiLightBridge>, target: MiLightTarget) -> Self {
        Self { bridge, target }
    }

    /// Returns what this channel addresses.
    #[must_use]
    pub fn target(&self) -> MiLightTarget {
        self.target
    }

    async fn run(&self, op: Op) -> Result<(), ChannelError> {
        let command = self
            .target
            .command(op)
            .ok_or(ChannelError::Unsupported(op.name()))?;
        self.bridge.send(command, self.target.zone_byte()).await
    }
}

impl DeviceChannel for MiLightChannel {
    async fn set_power(&self, state: PowerState) -> Result<(), ChannelError> {
        self.run(if state.is_on() { Op::On } else { Op::Off }).await
    }

    async fn set_brightness(&self, value: i32) -> Result<(), ChannelError> {
        self.run(Op::Brightness(byte("brightness", value)?)).await
    }

    async fn set_color(&self, value: i32) -> Result<(), ChannelError> {
        self.run(Op::Color(byte("color", value)?)).await
    }

    async fn set_saturation(&self, value: i32) -> Result<(), ChannelError> {
        self.run(Op::Saturation(byte("saturation", value)?)).await
    }

    async fn set_color_temperature(&self, value: i32) -> Result<(), ChannelError> {
        self.run(Op::Temperature(byte("color temperature", value)?))
            .await
    }

    async fn set_disco_mode(&self, mode: i32) -> Result<(), ChannelError> {
        self.run(Op::Disco(byte("disco mode", mode)?)).await
    }

    async fn set_white_mode(&self) -> Result<(), ChannelError> {
        self.run(Op::White).await
    }

    async fn set_night_mode(&self) -> Result<(), ChannelError> {
        self.run(Op::Night).await
    }
}
