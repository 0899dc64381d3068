// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Result codes returned by the MVD service.

use std::fmt;
use std::fmt::Display;

use crate::error::Error;
use crate::error::Result;

/// A raw result code, kept exactly as the service returned it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ResultCode(pub u32);

impl ResultCode {
    /// The request completed.
    pub const OK: ResultCode = ResultCode(0x17000);
    /// The service is still working on the request; poll again.
    pub const BUSY: ResultCode = ResultCode(0x17002);
    /// Generic system success, returned by session-level requests.
    pub const SUCCESS: ResultCode = ResultCode(0);

    pub fn raw(self) -> u32 {
        self.0
    }

    /// System-level failure check: a code with the top bit set is a failure.
    pub fn is_failure(self) -> bool {
        (self.0 as i32) < 0
    }

    /// Interprets the code as a conversion/render status.
    ///
    /// Only `OK` and `BUSY` have a meaning at this layer. Any other code is returned verbatim as
    /// `Error::Service`.
    pub fn into_status(self) -> Result<Status> {
        match self {
            ResultCode::OK => Ok(Status::Ok),
            ResultCode::BUSY => Ok(Status::Busy),
            code => Err(Error::Service(code)),
        }
    }
}

impl Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Non-error outcome of a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Ok,
    /// Work is in progress. The caller decides when to call again.
    Busy,
}

impl Status {
    pub fn is_busy(self) -> bool {
        self == Status::Busy
    }

    pub fn code(self) -> ResultCode {
        match self {
            Status::Ok => ResultCode::OK,
            Status::Busy => ResultCode::BUSY,
        }
    }
}
