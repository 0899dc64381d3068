// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Processing modes and pixel/stream formats understood by the MVD service.
//!
//! The numeric value of each format is what the hardware expects in the
//! configuration record and in the `Initialize` request, so the
//! representations are fixed.

use std::fmt;
use std::fmt::Display;

use enumn::N;
use serde::Deserialize;
use serde::Serialize;

/// Mode the service is opened in. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, N, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum Mode {
    /// Reformat pixel data only, no decoding.
    ColorFormatConversion = 0,
    /// Decode an H.264 stream and render frames.
    VideoProcessing = 1,
}

impl Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Mode::*;
        match self {
            ColorFormatConversion => write!(f, "color-format-conversion"),
            VideoProcessing => write!(f, "video-processing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, N, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum InputFormat {
    YUYV422 = 0x00010001,
    H264 = 0x00020001,
}

impl InputFormat {
    /// The only input format a session opened in `mode` can consume.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::ColorFormatConversion => InputFormat::YUYV422,
            Mode::VideoProcessing => InputFormat::H264,
        }
    }

    pub fn to_raw(self) -> u32 {
        self as u32
    }
}

impl Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::InputFormat::*;
        match self {
            YUYV422 => write!(f, "YUYV422"),
            H264 => write!(f, "H264"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, N, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum OutputFormat {
    BGR565 = 0x00040002,
    RGB565 = 0x00040004,
}

impl OutputFormat {
    pub fn to_raw(self) -> u32 {
        self as u32
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::OutputFormat::*;
        match self {
            BGR565 => write!(f, "BGR565"),
            RGB565 => write!(f, "RGB565"),
        }
    }
}
