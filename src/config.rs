// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The processing configuration record exchanged with the MVD service.
//!
//! [`Config`] mirrors the record the firmware reads, byte for byte. Fields whose meaning is not
//! known are kept as opaque byte regions so that their size and offset are preserved.

use std::ops::Range;

use zerocopy::FromBytes;
use zerocopy::FromZeros;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

use crate::error::Error;
use crate::error::Result;
use crate::format::InputFormat;
use crate::format::Mode;
use crate::format::OutputFormat;
use crate::memory::translate_optional;
use crate::memory::AddressTranslator;
use crate::memory::Le32;
use crate::memory::PhysAddr;
use crate::memory::VirtAddr;

/// Size in bytes of the configuration record.
pub const CONFIG_SIZE: usize = 0x11C;

/// Byte ranges of the record the client does not interpret.
pub const RESERVED_RANGES: &[Range<usize>] = &[
    0x04..0x0C,
    0x28..0x40,
    0x44..0x4C,
    0x54..0x58,
    0x6C..0x110,
    0x118..0x11C,
];

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Dimensions { width, height }
    }
}

/// Physical addresses of the buffers referenced by a configuration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConfigAddresses {
    /// Input data for color conversion.
    pub colorconv_input: PhysAddr,
    /// Primary output.
    pub output0: PhysAddr,
    /// Secondary output, used by color conversion.
    pub colorconv_output1: PhysAddr,
}

/// Virtual addresses of the buffers a configuration should reference. `None` leaves the field
/// null.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConfigBuffers {
    pub colorconv_input: Option<VirtAddr>,
    pub output0: Option<VirtAddr>,
    pub colorconv_output1: Option<VirtAddr>,
}

impl ConfigBuffers {
    pub fn translate<M: AddressTranslator + ?Sized>(&self, memory: &M) -> Result<ConfigAddresses> {
        let t = |v| translate_optional(memory, v).map_err(Error::NotDmaVisible);
        Ok(ConfigAddresses {
            colorconv_input: t(self.colorconv_input)?,
            output0: t(self.output0)?,
            colorconv_output1: t(self.colorconv_output1)?,
        })
    }
}

/// Processing configuration, laid out exactly as the firmware expects it. Every word is
/// little-endian.
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromBytes, Immutable, IntoBytes, KnownLayout)]
#[repr(C)]
pub struct Config {
    /// Raw [`InputFormat`] value.
    pub input_type: Le32,
    reserved_04: [u8; 0x8],
    pub input_width: Le32,
    pub input_height: Le32,
    pub colorconv_input: PhysAddr,
    /// Work buffers used by color conversion.
    pub colorconv_work: [PhysAddr; 4],
    reserved_28: [u8; 0x18],
    /// 0 for color conversion, 1 for H.264.
    pub video_flag: Le32,
    reserved_44: [u8; 0x8],
    /// Only set in video-processing mode.
    pub output_height0: Le32,
    /// Only set in video-processing mode.
    pub output_width0: Le32,
    reserved_54: [u8; 0x4],
    /// Raw [`OutputFormat`] value.
    pub output_type: Le32,
    pub output_width1: Le32,
    pub output_height1: Le32,
    pub output0: PhysAddr,
    pub colorconv_output1: PhysAddr,
    reserved_6c: [u8; 0xA4],
    /// Aligns the output width when larger than it, overrides it when smaller.
    pub output_width_override: Le32,
    pub output_height_override: Le32,
    reserved_118: [u8; 0x4],
}

const _: () = assert!(std::mem::size_of::<Config>() == CONFIG_SIZE);

impl Default for Config {
    fn default() -> Self {
        Config::new_zeroed()
    }
}

impl Config {
    /// Builds the default configuration for a session in `mode` converting `input` to `output`.
    ///
    /// Every byte not listed below is zero:
    /// - the formats and both dimension pairs, copied without rounding;
    /// - in video-processing mode, the H.264 flag and the first output dimensions;
    /// - the buffer addresses from `addresses`.
    pub fn new_default(
        mode: Mode,
        input: InputFormat,
        output: OutputFormat,
        input_dims: Dimensions,
        output_dims: Dimensions,
        addresses: ConfigAddresses,
    ) -> Config {
        let mut config = Config::new_zeroed();
        config.input_type = Le32::new(input.to_raw());
        config.input_width = Le32::new(input_dims.width);
        config.input_height = Le32::new(input_dims.height);
        config.colorconv_input = addresses.colorconv_input;
        if mode == Mode::VideoProcessing {
            config.video_flag = Le32::new(1);
            config.output_height0 = Le32::new(output_dims.height);
            config.output_width0 = Le32::new(output_dims.width);
        }
        config.output_type = Le32::new(output.to_raw());
        config.output_width1 = Le32::new(output_dims.width);
        config.output_height1 = Le32::new(output_dims.height);
        config.output0 = addresses.output0;
        config.colorconv_output1 = addresses.colorconv_output1;
        config
    }

    /// Sets the output override dimensions.
    pub fn with_output_override(mut self, width: u32, height: u32) -> Config {
        self.output_width_override = Le32::new(width);
        self.output_height_override = Le32::new(height);
        self
    }

    pub fn input_format(&self) -> Option<InputFormat> {
        InputFormat::n(self.input_type.get())
    }

    pub fn output_format(&self) -> Option<OutputFormat> {
        OutputFormat::n(self.output_type.get())
    }

    /// Dimensions the hardware will produce: the override when one is set, the configured output
    /// size otherwise.
    pub fn effective_output(&self) -> Dimensions {
        let pick = |o: Le32, d: Le32| if o.get() != 0 { o.get() } else { d.get() };
        Dimensions {
            width: pick(self.output_width_override, self.output_width1),
            height: pick(self.output_height_override, self.output_height1),
        }
    }

    /// True when every opaque region is zero.
    pub fn reserved_is_zero(&self) -> bool {
        let bytes = self.as_bytes();
        RESERVED_RANGES
            .iter()
            .all(|r| bytes[r.clone()].iter().all(|&b| b == 0))
    }

    /// Decodes a record received over the wire.
    pub fn from_wire(bytes: &[u8]) -> Option<Config> {
        Config::read_from_bytes(bytes).ok()
    }
}
