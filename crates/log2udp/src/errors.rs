// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors that abort configuration loading entirely. These surface to the
/// operator before the first request is handled and are not recoverable at
/// runtime.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("collector address and port must be set")]
    MissingDestination,

    #[error("collector address {addr} did not resolve")]
    Resolve { addr: String },

    #[error("socket setup failed: {0}")]
    Socket(#[from] std::io::Error),
}

/// Raised when appending one more field group would overflow the record
/// cap. The assembler consumes this itself: the field is dropped, the drop
/// is logged, and assembly continues with the remaining fields.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("record cap of {cap} bytes overflowed")]
    Overflow { cap: usize },
}
