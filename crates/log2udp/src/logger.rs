// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Once-per-scope wiring of field registry, record assembler, and collector
//! session. The host's request-completion hook calls [`RequestLogger::log`]
//! exactly once per finished request; everything recoverable is absorbed
//! here so nothing can escape into the request pipeline.

use std::borrow::Cow;

use crate::config::Config;
use crate::errors::SetupError;
use crate::fields::{
    FieldRegistry, RequestSnapshot, RequestVariables, ResponseStatus, VariableNamespace,
};
use crate::record::assemble;
use crate::time::iso8601_timestamp;
use crate::transport::{DeliveryOutcome, TransportSession};

pub struct RequestLogger {
    config: Config,
    registry: FieldRegistry,
    session: TransportSession,
}

impl RequestLogger {
    /// Set up one configuration scope: resolve the default field set
    /// against the host namespace and open the collector session. Setup
    /// runs even for disabled scopes, so a bad destination is caught at
    /// configuration time rather than on the first enabled request.
    pub async fn new(
        config: Config,
        namespace: &dyn VariableNamespace,
    ) -> Result<RequestLogger, SetupError> {
        let registry = FieldRegistry::default_fields(namespace);
        Self::with_registry(config, registry).await
    }

    /// [`RequestLogger::new`] with a caller-chosen, already resolved field
    /// registry.
    pub async fn with_registry(
        config: Config,
        registry: FieldRegistry,
    ) -> Result<RequestLogger, SetupError> {
        let session = TransportSession::connect(&config).await?;
        Ok(RequestLogger {
            config,
            registry,
            session,
        })
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    /// Ship one completed request, stamping it with the current time.
    /// Returns `None` when the scope is disabled. Assembly overflows and
    /// delivery failures are logged and absorbed; the owning request always
    /// proceeds to completion.
    pub async fn log(
        &self,
        vars: &dyn RequestVariables,
        status: ResponseStatus,
    ) -> Option<DeliveryOutcome> {
        if !self.config.enabled {
            return None;
        }
        let timestamp = iso8601_timestamp();
        Some(self.ship(vars, status, &timestamp).await)
    }

    /// [`RequestLogger::log`] with a caller-supplied clock reading, for
    /// hosts that cache the formatted time once per second.
    pub async fn log_with_timestamp(
        &self,
        vars: &dyn RequestVariables,
        status: ResponseStatus,
        time_iso8601: &str,
    ) -> Option<DeliveryOutcome> {
        if !self.config.enabled {
            return None;
        }
        Some(self.ship(vars, status, time_iso8601).await)
    }

    async fn ship(
        &self,
        vars: &dyn RequestVariables,
        status: ResponseStatus,
        time_iso8601: &str,
    ) -> DeliveryOutcome {
        let snapshot = RequestSnapshot {
            vars,
            status,
            time_iso8601: Cow::Borrowed(time_iso8601),
        };
        let record = assemble(&self.registry, &snapshot);
        self.session.deliver(&record, self.config.debug).await
    }
}
