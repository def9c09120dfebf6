// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Field registry: the ordered set of request attributes one record carries,
//! resolved once against the host's variable namespace before the first
//! request is processed.

use std::borrow::Cow;

/// The fixed field set, in emission order. These plus the derived `status`
/// and `time_iso8601` groups are always emitted, regardless of request
/// content.
pub const DEFAULT_FIELDS: [&str; 6] = [
    "remote_user",
    "remote_addr",
    "http_referer",
    "body_bytes_sent",
    "request",
    "http_user_agent",
];

/// Opaque handle to one host variable, captured once at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHandle(pub usize);

/// Setup-time collaborator: the host's variable namespace.
pub trait VariableNamespace {
    /// Resolve a field name into a handle, or `None` when the host does not
    /// know the variable. An unresolved field is not a setup error; it is
    /// rendered as the placeholder value at read time.
    fn resolve(&self, name: &str) -> Option<FieldHandle>;
}

/// Per-request collaborator: reads previously resolved variables for one
/// request. `None` means "not found" for this particular request.
pub trait RequestVariables {
    fn get(&self, handle: FieldHandle) -> Option<Cow<'_, str>>;
}

/// One named field and its resolved accessor. Immutable after setup.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub handle: Option<FieldHandle>,
}

/// Ordered list of fields to emit, resolved once per configuration scope.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    specs: Vec<FieldSpec>,
}

impl FieldRegistry {
    /// Resolve `names` against the host namespace, preserving order. Must
    /// be called exactly once, before the first request. No side effects
    /// beyond capturing the handles.
    pub fn resolve(names: &[&str], namespace: &dyn VariableNamespace) -> FieldRegistry {
        let specs = names
            .iter()
            .map(|name| FieldSpec {
                name: (*name).to_string(),
                handle: namespace.resolve(name),
            })
            .collect();
        FieldRegistry { specs }
    }

    /// [`FieldRegistry::resolve`] over [`DEFAULT_FIELDS`].
    pub fn default_fields(namespace: &dyn VariableNamespace) -> FieldRegistry {
        Self::resolve(&DEFAULT_FIELDS, namespace)
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Response status with access-log precedence: an error status set by the
/// server wins over the header status, a legacy HTTP/0.9 request carries no
/// status line and renders as the literal `009`, and nothing known renders
/// as `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseStatus {
    pub err_status: Option<u16>,
    pub status: Option<u16>,
    pub legacy_http09: bool,
}

impl ResponseStatus {
    /// A plain known header status.
    pub fn known(status: u16) -> ResponseStatus {
        ResponseStatus {
            err_status: None,
            status: Some(status),
            legacy_http09: false,
        }
    }

    pub(crate) fn render(&self) -> Cow<'static, str> {
        if let Some(status) = self.err_status {
            Cow::Owned(status.to_string())
        } else if let Some(status) = self.status {
            Cow::Owned(status.to_string())
        } else if self.legacy_http09 {
            Cow::Borrowed("009")
        } else {
            Cow::Borrowed("0")
        }
    }
}

/// Ephemeral per-invocation view of one completed request. Owned by a
/// single delivery-path invocation and dropped when it completes.
pub struct RequestSnapshot<'a> {
    pub vars: &'a dyn RequestVariables,
    pub status: ResponseStatus,
    /// Pre-formatted timestamp supplied by the collaborator clock.
    pub time_iso8601: Cow<'a, str>,
}
