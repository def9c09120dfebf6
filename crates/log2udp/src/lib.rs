// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-request telemetry shipping over UDP.
//!
//! This crate turns the observable attributes of one completed HTTP request
//! into a single delimited record and ships it to a remote collector over
//! UDP, with a bounded retry loop driven by the collector echoing back the
//! byte count it received. Delivery is best effort: nothing in here may fail
//! the request that produced the record.
//!
//! The host web server is a collaborator, not a dependency. It supplies a
//! variable namespace to resolve field names against ([`VariableNamespace`]),
//! a per-request view of the resolved variables ([`RequestVariables`]), and
//! an invocation trigger that calls [`RequestLogger::log`] once per
//! completed request, after the response has been sent.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod errors;
pub mod fields;
pub mod logger;
pub mod record;
pub mod time;
pub mod transport;

pub use config::Config;
pub use errors::{RecordError, SetupError};
pub use fields::{
    FieldHandle, FieldRegistry, FieldSpec, RequestSnapshot, RequestVariables, ResponseStatus,
    VariableNamespace, DEFAULT_FIELDS,
};
pub use logger::RequestLogger;
pub use record::{assemble, Record, MAX_RECORD_BYTES};
pub use transport::{DeliveryOutcome, TransportSession, MAX_DELIVERY_RETRIES};
