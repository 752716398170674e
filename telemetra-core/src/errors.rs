// Telemetra
// Copyright (c) 2026 The Project Telemetra Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Telemetra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The compressed stream ended before the read could be satisfied, or a cursor advance
    /// overflowed.
    ShortBuffer(&'static str),
    /// The compressed stream contained a bit pattern no conforming encoder produces.
    CorruptionDetected(&'static str),
    /// A decoding parameter was outside its legal range.
    InvalidParameter(&'static str),
    /// The entity declared a data type this decoder does not know.
    UnsupportedDataType(&'static str),
    /// Two entity header fields contradicted each other.
    HeaderMismatch(&'static str),
    /// A model-mode entity was decoded without a model buffer.
    ModelRequired,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::ShortBuffer(msg) => {
                write!(f, "short buffer: {}", msg)
            }
            Error::CorruptionDetected(msg) => {
                write!(f, "malformed stream: {}", msg)
            }
            Error::InvalidParameter(msg) => {
                write!(f, "invalid parameter: {}", msg)
            }
            Error::UnsupportedDataType(msg) => {
                write!(f, "unsupported data type: {}", msg)
            }
            Error::HeaderMismatch(msg) => {
                write!(f, "header mismatch: {}", msg)
            }
            Error::ModelRequired => {
                write!(f, "a model buffer is required for model-mode decoding")
            }
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a short buffer error.
pub fn short_buffer_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::ShortBuffer(msg))
}

/// Convenience function to create a corruption error.
pub fn corruption_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::CorruptionDetected(msg))
}

/// Convenience function to create an invalid parameter error.
pub fn invalid_parameter_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::InvalidParameter(msg))
}

/// Convenience function to create an unsupported data type error.
pub fn unsupported_data_type_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::UnsupportedDataType(msg))
}

/// Convenience function to create a header mismatch error.
pub fn header_mismatch_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::HeaderMismatch(msg))
}

/// Convenience function to create a model required error.
pub fn model_required_error<T>() -> Result<T> {
    Err(Error::ModelRequired)
}
