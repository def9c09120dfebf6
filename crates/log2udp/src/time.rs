// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{Local, SecondsFormat};

/// Current local time in the access-log ISO-8601 shape, e.g.
/// `2024-01-01T00:00:00+00:00`. Hosts that maintain their own cached clock
/// string can bypass this and pass theirs straight to the assembler.
pub fn iso8601_timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}
