// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Command buffers for requests to the `mvd:STD` service.
//!
//! A request is a sequence of 32-bit words. The first word is a header holding the command id and
//! the number of normal and translate parameters that follow. After the call, word 0 holds the
//! reply header and word 1 the result code.

use std::fmt;
use std::fmt::Display;

use enumn::N;
use log::debug;
use zerocopy::IntoBytes;

use crate::config::Config;
use crate::config::CONFIG_SIZE;
use crate::error::TransportError;
use crate::memory::PhysAddr;
use crate::status::ResultCode;

/// Name of the service port.
pub const SERVICE_NAME: &str = "mvd:STD";

/// Number of words in a command buffer.
pub const COMMAND_BUFFER_WORDS: usize = 64;

/// Translate descriptor asking the kernel to pass the caller's process handle.
pub const DESC_CURRENT_PROCESS: u32 = 0x20;

const DESC_STATIC_BUFFER: u32 = 0x8;
const BUFFER_READ: u32 = 0x2;

/// Descriptor for a buffer the service may read.
pub fn read_buffer_desc(size: usize) -> u32 {
    ((size as u32) << 4) | DESC_STATIC_BUFFER | BUFFER_READ
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, N)]
#[repr(u16)]
pub enum CommandId {
    Initialize = 0x0001,
    Shutdown = 0x0002,
    ProcessNalUnit = 0x0008,
    RenderFrame = 0x0009,
    BeginColorConversion = 0x0018,
    EndColorConversion = 0x0019,
    ConvertImage = 0x001A,
    SetConfig = 0x001E,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub command: u16,
    pub normal_words: u8,
    pub translate_words: u8,
}

impl Header {
    pub fn new(command: CommandId, normal_words: u8, translate_words: u8) -> Self {
        Header {
            command: command as u16,
            normal_words,
            translate_words,
        }
    }

    pub fn encode(self) -> u32 {
        ((self.command as u32) << 16)
            | (((self.normal_words & 0x3F) as u32) << 6)
            | (self.translate_words & 0x3F) as u32
    }

    pub fn decode(word: u32) -> Self {
        Header {
            command: (word >> 16) as u16,
            normal_words: ((word >> 6) & 0x3F) as u8,
            translate_words: (word & 0x3F) as u8,
        }
    }

    fn param_words(self) -> usize {
        self.normal_words as usize + self.translate_words as usize
    }
}

/// The words of one request or reply.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandBuffer {
    words: [u32; COMMAND_BUFFER_WORDS],
}

impl Default for CommandBuffer {
    fn default() -> Self {
        CommandBuffer {
            words: [0; COMMAND_BUFFER_WORDS],
        }
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let len = 1 + self.header().param_words().min(COMMAND_BUFFER_WORDS - 1);
        f.debug_list()
            .entries(self.words[..len].iter().map(|w| format!("{:#010x}", w)))
            .finish()
    }
}

impl CommandBuffer {
    fn with_words(header: Header, params: &[u32]) -> Self {
        let mut cmd = CommandBuffer::default();
        cmd.words[0] = header.encode();
        cmd.words[1..=params.len()].copy_from_slice(params);
        cmd
    }

    pub fn header(&self) -> Header {
        Header::decode(self.words[0])
    }

    pub fn word(&self, index: usize) -> u32 {
        self.words[index]
    }

    pub fn set_word(&mut self, index: usize, value: u32) {
        self.words[index] = value;
    }

    /// Result code of a reply.
    pub fn result(&self) -> ResultCode {
        ResultCode(self.words[1])
    }

    /// Turns this buffer into a reply for `command` carrying `code`.
    pub fn set_reply(&mut self, command: u16, code: ResultCode) {
        self.words[0] = Header {
            command,
            normal_words: 1,
            translate_words: 0,
        }
        .encode();
        self.words[1] = code.raw();
    }
}

/// A request understood by the service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Request {
    Initialize {
        work_buffer: PhysAddr,
        size: u32,
    },
    Shutdown,
    ProcessNalUnit {
        buffer: PhysAddr,
        /// Low 32 bits of the buffer's virtual address; the service runs in a 32-bit address
        /// space.
        vaddr: u32,
        size: u32,
        frame_id: u32,
    },
    RenderFrame,
    BeginColorConversion,
    EndColorConversion,
    ConvertImage,
    SetConfig(Config),
}

impl Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Request::*;
        match self {
            Initialize { work_buffer, size } => {
                write!(f, "Initialize(work_buffer={}, size={:#x})", work_buffer, size)
            }
            Shutdown => write!(f, "Shutdown"),
            ProcessNalUnit {
                buffer,
                size,
                frame_id,
                ..
            } => write!(
                f,
                "ProcessNalUnit(buffer={}, size={:#x}, frame_id={})",
                buffer, size, frame_id
            ),
            RenderFrame => write!(f, "RenderFrame"),
            BeginColorConversion => write!(f, "BeginColorConversion"),
            EndColorConversion => write!(f, "EndColorConversion"),
            ConvertImage => write!(f, "ConvertImage"),
            SetConfig(_) => write!(f, "SetConfig"),
        }
    }
}

impl Request {
    pub fn command_id(&self) -> CommandId {
        use self::Request::*;
        match self {
            Initialize { .. } => CommandId::Initialize,
            Shutdown => CommandId::Shutdown,
            ProcessNalUnit { .. } => CommandId::ProcessNalUnit,
            RenderFrame => CommandId::RenderFrame,
            BeginColorConversion => CommandId::BeginColorConversion,
            EndColorConversion => CommandId::EndColorConversion,
            ConvertImage => CommandId::ConvertImage,
            SetConfig(_) => CommandId::SetConfig,
        }
    }

    /// Encodes the request words.
    pub fn encode(&self) -> CommandBuffer {
        use self::Request::*;
        let id = self.command_id();
        match self {
            Initialize { work_buffer, size } => CommandBuffer::with_words(
                Header::new(id, 2, 2),
                &[work_buffer.offset(), *size, DESC_CURRENT_PROCESS, 0],
            ),
            ProcessNalUnit {
                buffer,
                vaddr,
                size,
                frame_id,
            } => CommandBuffer::with_words(
                Header::new(id, 4, 0),
                &[buffer.offset(), *vaddr, *size, *frame_id],
            ),
            RenderFrame => {
                CommandBuffer::with_words(Header::new(id, 1, 2), &[0, DESC_CURRENT_PROCESS, 0])
            }
            // The buffer address word is filled in by the transport.
            SetConfig(_) => CommandBuffer::with_words(
                Header::new(id, 1, 4),
                &[
                    CONFIG_SIZE as u32,
                    DESC_CURRENT_PROCESS,
                    0,
                    read_buffer_desc(CONFIG_SIZE),
                    0,
                ],
            ),
            Shutdown | BeginColorConversion | EndColorConversion | ConvertImage => {
                CommandBuffer::with_words(Header::new(id, 0, 0), &[])
            }
        }
    }

    /// Bytes the service reads through the static buffer descriptor, if any.
    pub fn buffer(&self) -> Option<&[u8]> {
        match self {
            Request::SetConfig(config) => Some(config.as_bytes()),
            _ => None,
        }
    }

    /// Decodes a request as the service sees it.
    pub fn decode(
        cmd: &CommandBuffer,
        buffer: Option<&[u8]>,
    ) -> std::result::Result<Request, TransportError> {
        let header = cmd.header();
        let id = CommandId::n(header.command).ok_or_else(|| {
            TransportError::Reply(format!("unknown command {:#06x}", header.command))
        })?;
        let expected = match id {
            CommandId::Initialize => (2, 2),
            CommandId::ProcessNalUnit => (4, 0),
            CommandId::RenderFrame => (1, 2),
            CommandId::SetConfig => (1, 4),
            _ => (0, 0),
        };
        if (header.normal_words, header.translate_words) != expected {
            return Err(TransportError::Reply(format!(
                "bad header {:#010x} for {:?}",
                header.encode(),
                id
            )));
        }
        let request = match id {
            CommandId::Initialize => Request::Initialize {
                work_buffer: PhysAddr::new(cmd.word(1)),
                size: cmd.word(2),
            },
            CommandId::Shutdown => Request::Shutdown,
            CommandId::ProcessNalUnit => Request::ProcessNalUnit {
                buffer: PhysAddr::new(cmd.word(1)),
                vaddr: cmd.word(2),
                size: cmd.word(3),
                frame_id: cmd.word(4),
            },
            CommandId::RenderFrame => Request::RenderFrame,
            CommandId::BeginColorConversion => Request::BeginColorConversion,
            CommandId::EndColorConversion => Request::EndColorConversion,
            CommandId::ConvertImage => Request::ConvertImage,
            CommandId::SetConfig => {
                let config = buffer
                    .filter(|b| b.len() == cmd.word(1) as usize)
                    .and_then(Config::from_wire)
                    .ok_or_else(|| TransportError::Reply("bad configuration buffer".into()))?;
                Request::SetConfig(config)
            }
        };
        Ok(request)
    }
}

/// The channel to the system service. Implemented on top of the OS's IPC primitives.
pub trait Transport {
    /// Opens a session with the service port `service`.
    fn connect(&mut self, service: &str) -> std::result::Result<(), TransportError>;

    /// Closes the session opened by `connect`.
    fn disconnect(&mut self);

    /// Sends `cmd` and blocks until the reply has been written back into it. `buffer` backs the
    /// static buffer descriptor of the request, if it has one.
    fn send_sync_request(
        &mut self,
        cmd: &mut CommandBuffer,
        buffer: Option<&[u8]>,
    ) -> std::result::Result<(), TransportError>;
}

/// Sends `request` and returns the result code of the reply.
pub(crate) fn call<T: Transport + ?Sized>(
    transport: &mut T,
    request: &Request,
) -> std::result::Result<ResultCode, TransportError> {
    let mut cmd = request.encode();
    debug!("mvd: sending {}", request);
    transport.send_sync_request(&mut cmd, request.buffer())?;
    let code = cmd.result();
    debug!("mvd: {} returned {}", request, code);
    Ok(code)
}
