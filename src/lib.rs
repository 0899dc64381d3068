// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Client for the MVD service, the console's hardware H.264 decoder and color-format converter.
//!
//! The service is reached through a [`Transport`] and every buffer it touches must live in linear
//! memory provided by a [`LinearAllocator`]. Both are supplied by the caller; [`fake`] has
//! software versions of each.
//!
//! ```
//! use mvd::fake::FakeLinearMemory;
//! use mvd::fake::FakeService;
//! use mvd::*;
//!
//! # fn main() -> mvd::Result<()> {
//! let memory = FakeLinearMemory::new();
//! let input = vec![0u8; 640 * 480 * 2];
//! let output = vec![0u8; 640 * 480 * 2];
//! memory.register(&input);
//! memory.register(&output);
//!
//! let params = SessionParams::new(
//!     Mode::ColorFormatConversion,
//!     InputFormat::YUYV422,
//!     OutputFormat::RGB565,
//!     0,
//! );
//! let mut session = Session::init(FakeService::new(), memory, params)?;
//! let config = session.default_config(
//!     Dimensions::new(640, 480),
//!     Dimensions::new(640, 480),
//!     &ConfigBuffers {
//!         colorconv_input: Some(VirtAddr::of_slice(&input)),
//!         output0: Some(VirtAddr::of_slice(&output)),
//!         colorconv_output1: None,
//!     },
//! )?;
//! assert_eq!(session.convert_image(&config)?, Status::Ok);
//! session.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fake;
pub mod format;
pub mod ipc;
pub mod memory;
pub mod params;
pub mod session;
pub mod status;

pub use config::Config;
pub use config::ConfigAddresses;
pub use config::ConfigBuffers;
pub use config::Dimensions;
pub use error::Error;
pub use error::Result;
pub use error::TransportError;
pub use format::InputFormat;
pub use format::Mode;
pub use format::OutputFormat;
pub use ipc::Transport;
pub use memory::AddressTranslator;
pub use memory::CtrMemoryMap;
pub use memory::Le32;
pub use memory::LinearAllocation;
pub use memory::LinearAllocator;
pub use memory::PhysAddr;
pub use memory::VirtAddr;
pub use params::SessionParams;
pub use session::Session;
pub use status::ResultCode;
pub use status::Status;
