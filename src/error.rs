// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Errors that can happen while talking to the MVD service.

use remain::sorted;
use thiserror::Error as ThisError;

use crate::format::InputFormat;
use crate::format::Mode;
use crate::memory::VirtAddr;
use crate::status::ResultCode;

#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("an MVD session is already open in this process")]
    AlreadyInitialized,
    #[error("buffer of {0} bytes is too large for a single request")]
    BufferTooLarge(usize),
    #[error("failed to load session parameters: {0}")]
    InvalidParams(String),
    #[error("NAL unit does not start with the 00 00 01 start code")]
    MissingStartCode,
    #[error("no configuration was given and none was set on the session")]
    NoConfig,
    #[error("address {0} is not in DMA-visible memory")]
    NotDmaVisible(VirtAddr),
    #[error("failed to allocate {0} bytes of linear memory")]
    OutOfLinearMemory(usize),
    #[error("MVD service returned {0}")]
    Service(ResultCode),
    #[error("MVD service is unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("input format {input} is not supported in {mode} mode")]
    UnsupportedFormat { mode: Mode, input: InputFormat },
    #[error("operation requires {expected} mode but the session is in {actual} mode")]
    WrongMode { expected: Mode, actual: Mode },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`Transport`](crate::ipc::Transport) implementation.
#[sorted]
#[derive(ThisError, Debug)]
pub enum TransportError {
    #[error("failed to connect to service {0}: {1}")]
    Connect(String, ResultCode),
    #[error("not connected to a service")]
    NotConnected,
    #[error("malformed reply: {0}")]
    Reply(String),
    #[error("request failed in the kernel: {0}")]
    SendRequest(ResultCode),
}
