// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The client side of an MVD session.
//!
//! A [`Session`] is the process-wide connection to the coprocessor service. Only one can be open
//! at a time; opening a second one fails with [`Error::AlreadyInitialized`] until the first is
//! shut down or dropped.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;

use log::info;
use log::warn;

use crate::config::Config;
use crate::config::ConfigBuffers;
use crate::config::Dimensions;
use crate::error::Error;
use crate::error::Result;
use crate::format::InputFormat;
use crate::format::Mode;
use crate::format::OutputFormat;
use crate::ipc::call;
use crate::ipc::Request;
use crate::ipc::Transport;
use crate::ipc::SERVICE_NAME;
use crate::memory::LinearAllocation;
use crate::memory::LinearAllocator;
use crate::memory::VirtAddr;
use crate::params::SessionParams;
use crate::status::ResultCode;
use crate::status::Status;

/// Every NAL unit handed to the decoder starts with this prefix.
pub const NAL_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// Frame ids attached to NAL units wrap around at this value.
pub const FRAME_ID_COUNT: u32 = 0x12;

const WORK_BUFFER_ALIGN: usize = 0x40;

static SESSION_OPEN: AtomicBool = AtomicBool::new(false);

// Claim on the process-wide session, released when dropped.
struct SessionSlot;

impl SessionSlot {
    fn acquire() -> Result<Self> {
        SESSION_OPEN
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SessionSlot)
            .map_err(|_| Error::AlreadyInitialized)
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        SESSION_OPEN.store(false, Ordering::Release);
    }
}

/// An open session with the MVD service.
///
/// `T` carries requests to the service and `M` provides linear memory for the work buffer and
/// address translation for every buffer the service touches. Methods take `&mut self`, so at most
/// one request is outstanding at any time.
pub struct Session<T: Transport, M: LinearAllocator> {
    transport: T,
    memory: M,
    params: SessionParams,
    work_buffer: Option<LinearAllocation>,
    installed_config: Option<Config>,
    render_busy: bool,
    frame_id: u32,
    connected: bool,
    service_initialized: bool,
    colorconv_active: bool,
    // Dropped last, after teardown.
    _slot: SessionSlot,
}

impl<T: Transport, M: LinearAllocator> Session<T, M> {
    /// Opens the session described by `params`.
    ///
    /// Anything acquired before a failure is released again, so a failed `init` leaves the
    /// process free to try again.
    pub fn init(transport: T, memory: M, params: SessionParams) -> Result<Self> {
        params.validate()?;
        let slot = SessionSlot::acquire()?;

        let mut session = Session {
            transport,
            memory,
            params,
            work_buffer: None,
            installed_config: None,
            render_busy: false,
            frame_id: 0,
            connected: false,
            service_initialized: false,
            colorconv_active: false,
            _slot: slot,
        };

        session
            .transport
            .connect(SERVICE_NAME)
            .map_err(|e| Error::ServiceUnavailable(e.to_string()))?;
        session.connected = true;

        let size = session.params.effective_work_buffer_size();
        let work_buffer = session
            .memory
            .allocate(size as usize, WORK_BUFFER_ALIGN)
            .ok_or(Error::OutOfLinearMemory(size as usize))?;
        session.work_buffer = Some(work_buffer);
        let work_phys = session
            .memory
            .virt_to_phys(work_buffer.addr)
            .ok_or(Error::NotDmaVisible(work_buffer.addr))?;

        let code = call(
            &mut session.transport,
            &Request::Initialize {
                work_buffer: work_phys,
                size,
            },
        )?;
        if code.is_failure() {
            return Err(Error::ServiceUnavailable(format!(
                "initialize returned {}",
                code
            )));
        }
        session.service_initialized = true;

        if session.params.mode == Mode::ColorFormatConversion {
            let code = call(&mut session.transport, &Request::BeginColorConversion)?;
            if code.is_failure() {
                return Err(Error::Service(code));
            }
            session.colorconv_active = true;
        }

        info!(
            "mvd: opened session in {} mode ({} -> {})",
            session.params.mode, session.params.input_format, session.params.output_format
        );
        Ok(session)
    }

    /// Closes the session. Failures during teardown are logged and otherwise ignored.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.colorconv_active {
            self.colorconv_active = false;
            match call(&mut self.transport, &Request::EndColorConversion) {
                Ok(code) if code.is_failure() => {
                    warn!("mvd: ending color conversion returned {}", code)
                }
                Ok(_) => {}
                Err(e) => warn!("mvd: failed to end color conversion: {}", e),
            }
        }
        if self.service_initialized {
            self.service_initialized = false;
            match call(&mut self.transport, &Request::Shutdown) {
                Ok(code) if code.is_failure() => warn!("mvd: shutdown returned {}", code),
                Ok(_) => {}
                Err(e) => warn!("mvd: failed to shut down the service: {}", e),
            }
        }
        if self.connected {
            self.connected = false;
            self.transport.disconnect();
            info!("mvd: session closed");
        }
        if let Some(work_buffer) = self.work_buffer.take() {
            self.memory.free(work_buffer);
        }
        self.installed_config = None;
        self.render_busy = false;
    }

    pub fn mode(&self) -> Mode {
        self.params.mode
    }

    pub fn input_format(&self) -> InputFormat {
        self.params.input_format
    }

    pub fn output_format(&self) -> OutputFormat {
        self.params.output_format
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// The configuration last accepted by the service, used by renders that do not supply one.
    pub fn installed_config(&self) -> Option<&Config> {
        self.installed_config.as_ref()
    }

    /// Whether the last render returned `Busy` and has not completed yet.
    pub fn render_busy(&self) -> bool {
        self.render_busy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    fn require_mode(&self, expected: Mode) -> Result<()> {
        if self.params.mode != expected {
            return Err(Error::WrongMode {
                expected,
                actual: self.params.mode,
            });
        }
        Ok(())
    }

    /// Builds the default configuration for this session's formats.
    ///
    /// Does not talk to the service. Fails only if one of `buffers` is not in DMA-visible
    /// memory.
    pub fn default_config(
        &self,
        input: Dimensions,
        output: Dimensions,
        buffers: &ConfigBuffers,
    ) -> Result<Config> {
        let addresses = buffers.translate(&self.memory)?;
        Ok(Config::new_default(
            self.params.mode,
            self.params.input_format,
            self.params.output_format,
            input,
            output,
            addresses,
        ))
    }

    /// Installs `config` on the service for later renders.
    ///
    /// Only `OK` counts as success here; a busy service is reported as [`Error::Service`].
    pub fn set_config(&mut self, config: &Config) -> Result<()> {
        match self.send_config(config)? {
            Status::Ok => Ok(()),
            Status::Busy => Err(Error::Service(ResultCode::BUSY)),
        }
    }

    // Sends SetConfig and remembers `config` once the service accepts it.
    fn send_config(&mut self, config: &Config) -> Result<Status> {
        let status = call(&mut self.transport, &Request::SetConfig(*config))?.into_status()?;
        if status == Status::Ok {
            self.installed_config = Some(*config);
        }
        Ok(status)
    }

    /// Runs a one-shot color-format conversion described by `config`.
    ///
    /// `Status::Busy` means the service could not take the configuration or the request; the
    /// caller may retry.
    pub fn convert_image(&mut self, config: &Config) -> Result<Status> {
        self.require_mode(Mode::ColorFormatConversion)?;
        if self.send_config(config)?.is_busy() {
            return Ok(Status::Busy);
        }
        call(&mut self.transport, &Request::ConvertImage)?.into_status()
    }

    /// Queues one NAL unit for decoding. `nal` must start with [`NAL_START_CODE`] and live in
    /// DMA-visible memory. Nothing is rendered until [`Session::render_video_frame`] is called.
    pub fn process_video_frame(&mut self, nal: &[u8]) -> Result<Status> {
        self.require_mode(Mode::VideoProcessing)?;
        if !nal.starts_with(&NAL_START_CODE) {
            return Err(Error::MissingStartCode);
        }
        let size = u32::try_from(nal.len()).map_err(|_| Error::BufferTooLarge(nal.len()))?;
        let vaddr = VirtAddr::of_slice(nal);
        let buffer = self
            .memory
            .virt_to_phys(vaddr)
            .ok_or(Error::NotDmaVisible(vaddr))?;

        let code = call(
            &mut self.transport,
            &Request::ProcessNalUnit {
                buffer,
                vaddr: vaddr.offset() as u32,
                size,
                frame_id: self.frame_id,
            },
        )?;
        self.frame_id = (self.frame_id + 1) % FRAME_ID_COUNT;
        code.into_status()
    }

    /// Renders the most recently decoded frame.
    ///
    /// With `Some(config)` the configuration is installed first; with `None` the installed one
    /// is used, and [`Error::NoConfig`] is returned if there is none. If the service is too busy
    /// to take the configuration, `Status::Busy` is returned without rendering.
    ///
    /// When `wait` is true this polls the service until the render is no longer busy. Otherwise
    /// it returns after one poll and `Status::Busy` tells the caller to call again later.
    pub fn render_video_frame(&mut self, config: Option<&Config>, wait: bool) -> Result<Status> {
        self.require_mode(Mode::VideoProcessing)?;
        match config {
            Some(config) => match self.send_config(config) {
                Ok(Status::Ok) => {}
                // No render was issued.
                Ok(Status::Busy) => {
                    self.render_busy = false;
                    return Ok(Status::Busy);
                }
                Err(e) => {
                    self.render_busy = false;
                    return Err(e);
                }
            },
            None if self.installed_config.is_none() => return Err(Error::NoConfig),
            None => {}
        }

        loop {
            let status = match call(&mut self.transport, &Request::RenderFrame)
                .map_err(Error::from)
                .and_then(ResultCode::into_status)
            {
                Ok(status) => status,
                Err(e) => {
                    self.render_busy = false;
                    return Err(e);
                }
            };
            self.render_busy = status.is_busy();
            if !self.render_busy || !wait {
                return Ok(status);
            }
            thread::sleep(self.params.poll_interval());
        }
    }

    /// Returns the frame id the next NAL unit will carry.
    pub fn next_frame_id(&self) -> u32 {
        self.frame_id
    }
}

impl<T: Transport, M: LinearAllocator> Drop for Session<T, M> {
    fn drop(&mut self) {
        self.teardown();
    }
}
