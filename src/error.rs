// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `lightnode` library.
//!
//! Errors are grouped by concern: configuration, pairing, device channel
//! communication, command validation, the local effect cache, the persisted
//! credential store and the generated capability profile. None of them is
//! meant to escape the supervisory loop; callers log them and move on.

use std::path::PathBuf;

use thiserror::Error;

use crate::command::CommandName;
use crate::event::DeviceId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or inconsistent settings. Fatal to startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A device did not hand out a token.
    #[error("pairing failed: {0}")]
    Pairing(#[from] PairingError),

    /// A query or command could not reach the device.
    #[error("device unreachable: {0}")]
    Unreachable(#[from] ChannelError),

    /// A command was rejected before reaching the device.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The local effect catalog cache could not be read or written.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The persisted credential store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The capability profile could not be generated or installed.
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    /// No device with this id is registered.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// A device with this id is already registered.
    #[error("device already registered: {0}")]
    DuplicateDevice(DeviceId),

    /// A discovery pass is already running.
    #[error("discovery already in progress")]
    DiscoveryInProgress,
}

/// Errors in the operator-supplied configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither `host` nor `ip` was supplied.
    #[error("a 'host' or 'ip' parameter is required")]
    MissingHost,

    /// An entry of a comma-separated list was empty.
    #[error("empty entry at position {position} in '{list}'")]
    EmptyEntry {
        /// The list that was being parsed.
        list: String,
        /// Zero-based position of the empty entry.
        position: usize,
    },

    /// The port could not be parsed.
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// A boolean-like flag had an unrecognized value.
    #[error("invalid value '{value}' for '{key}'")]
    InvalidFlag {
        /// The parameter name.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// The address and token lists do not pair up one-to-one.
    #[error("{addresses} address(es) configured but {tokens} token(s)")]
    AddressTokenMismatch {
        /// Number of configured addresses.
        addresses: usize,
        /// Number of configured tokens.
        tokens: usize,
    },
}

/// Errors raised while obtaining a token from a device.
#[derive(Debug, Error)]
pub enum PairingError {
    /// The device answered but granted no token (not in linking mode).
    #[error("{address} returned no token; is it in linking mode?")]
    NoToken {
        /// The device address.
        address: String,
    },

    /// The pairing request did not finish in time.
    #[error("pairing with {address} timed out after {millis} ms")]
    TimedOut {
        /// The device address.
        address: String,
        /// The timeout that elapsed.
        millis: u64,
    },

    /// The pairing request failed at the transport level.
    #[error("pairing with {address} failed: {source}")]
    Channel {
        /// The device address.
        address: String,
        /// The underlying channel error.
        #[source]
        source: ChannelError,
    },
}

impl PairingError {
    /// Returns the address the failure belongs to.
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::NoToken { address }
            | Self::TimedOut { address, .. }
            | Self::Channel { address, .. } => address,
        }
    }
}

/// Errors raised by a device control channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed.
    #[cfg(feature = "nanoleaf")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered with an unexpected HTTP status.
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The device rejected the token.
    #[error("device rejected the authentication token")]
    NotAuthorized,

    /// The device answer could not be decoded.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// JSON decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No answer within the channel timeout.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// A value does not fit the native encoding.
    #[error("value {value} cannot be encoded for {operation}")]
    ValueOutOfRange {
        /// The operation being encoded.
        operation: &'static str,
        /// The rejected value.
        value: i32,
    },

    /// The channel does not implement the operation.
    #[error("operation not supported by this device: {0}")]
    Unsupported(&'static str),

    /// The device address could not be turned into a request target.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors raised while validating a command against a device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The command name is not recognized.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// The device lacks the capability the command needs.
    #[error("{device} does not support {command}")]
    Unsupported {
        /// The targeted device.
        device: DeviceId,
        /// The rejected command.
        command: CommandName,
    },

    /// The command needs a value and none was given.
    #[error("{0} requires a value")]
    MissingValue(CommandName),

    /// The value is not an integer.
    #[error("invalid value '{value}' for {command}")]
    InvalidValue {
        /// The command the value was given to.
        command: CommandName,
        /// The rejected raw value.
        value: String,
    },

    /// The effect index is outside the device's catalog.
    #[error("effect index {index} is out of range [1, {len}]")]
    EffectOutOfRange {
        /// The requested 1-based index.
        index: i32,
        /// The catalog length.
        len: usize,
    },

    /// The device has no credential and is inert.
    #[error("{0} is not paired")]
    Unauthenticated(DeviceId),

    /// The command only makes sense for the controller itself.
    #[error("{0} is a controller command")]
    ControllerCommand(CommandName),
}

/// Errors raised by the local effect catalog cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing the cache file failed.
    #[error("cache file {path}: {source}")]
    Io {
        /// The cache file.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The cache file holds invalid JSON.
    #[error("cache contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the persisted key/value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the store failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored value could not be (de)serialized.
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while generating or installing the capability profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// A template could not be read or an output could not be written.
    #[error("profile file {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The host refused to reload the profile.
    #[error("profile installation failed: {0}")]
    Install(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
