// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Parameters used to open a session.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::format::InputFormat;
use crate::format::Mode;
use crate::format::OutputFormat;

fn default_poll_interval_us() -> u64 {
    100
}

/// How to open a session with the service.
///
/// Can be loaded from JSON, for example:
///
/// ```
/// # use mvd::SessionParams;
/// let params = SessionParams::from_json(
///     r#"{ "mode": "color-format-conversion", "input_format": "yuyv422", "output_format": "rgb565" }"#,
/// )
/// .unwrap();
/// assert_eq!(params.work_buffer_size, 0);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionParams {
    pub mode: Mode,
    pub input_format: InputFormat,
    pub output_format: OutputFormat,
    /// Size of the work buffer handed to the service. Ignored in color-format-conversion mode.
    #[serde(default)]
    pub work_buffer_size: u32,
    /// Delay between two status polls when blocking on a render.
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
}

impl SessionParams {
    pub fn new(
        mode: Mode,
        input_format: InputFormat,
        output_format: OutputFormat,
        work_buffer_size: u32,
    ) -> Self {
        SessionParams {
            mode,
            input_format,
            output_format,
            work_buffer_size,
            poll_interval_us: default_poll_interval_us(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidParams(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::InvalidParams(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Checks that the input format can be consumed in the selected mode.
    pub fn validate(&self) -> Result<()> {
        if InputFormat::for_mode(self.mode) != self.input_format {
            return Err(Error::UnsupportedFormat {
                mode: self.mode,
                input: self.input_format,
            });
        }
        Ok(())
    }

    /// Size of the work buffer to allocate. Color conversion still needs a non-empty buffer.
    pub fn effective_work_buffer_size(&self) -> u32 {
        match self.mode {
            Mode::ColorFormatConversion => 1,
            Mode::VideoProcessing => self.work_buffer_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parse_video_params() {
        let params = SessionParams::from_json(
            r#"{
                "mode": "video-processing",
                "input_format": "h264",
                "output_format": "bgr565",
                "work_buffer_size": 9437184,
                "poll_interval_us": 250
            }"#,
        )
        .unwrap();
        assert_eq!(params.mode, Mode::VideoProcessing);
        assert_eq!(params.input_format, InputFormat::H264);
        assert_eq!(params.output_format, OutputFormat::BGR565);
        assert_eq!(params.effective_work_buffer_size(), 9437184);
        assert_eq!(params.poll_interval(), Duration::from_micros(250));
        params.validate().unwrap();
    }

    #[test]
    fn defaults() {
        let params = SessionParams::from_json(
            r#"{"mode":"color-format-conversion","input_format":"yuyv422","output_format":"rgb565"}"#,
        )
        .unwrap();
        assert_eq!(
            params,
            SessionParams::new(
                Mode::ColorFormatConversion,
                InputFormat::YUYV422,
                OutputFormat::RGB565,
                0
            )
        );
        assert_eq!(params.effective_work_buffer_size(), 1);
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(SessionParams::from_json(
            r#"{"mode":"decode","input_format":"h264","output_format":"rgb565"}"#
        )
        .is_err());
        assert!(SessionParams::from_json(
            r#"{"mode":"video-processing","input_format":"h264","output_format":"rgb565","size":1}"#
        )
        .is_err());
    }

    #[test]
    fn mismatched_format() {
        let params = SessionParams::new(
            Mode::ColorFormatConversion,
            InputFormat::H264,
            OutputFormat::RGB565,
            0,
        );
        match params.validate() {
            Err(Error::UnsupportedFormat { mode, input }) => {
                assert_eq!(mode, Mode::ColorFormatConversion);
                assert_eq!(input, InputFormat::H264);
            }
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"mode":"video-processing","input_format":"h264","output_format":"rgb565"}}"#
        )
        .unwrap();
        let params = SessionParams::from_file(file.path()).unwrap();
        assert_eq!(params.mode, Mode::VideoProcessing);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            SessionParams::from_file(missing),
            Err(Error::InvalidParams(_))
        ));
    }
}
