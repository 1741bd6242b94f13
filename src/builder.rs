// Copyright (C) 2022-2026 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of tracing-gelf-handler.
//
// tracing-gelf-handler is free software: you can redistribute it and/or modify it under the terms
// of the GNU General Public License as published by the Free Software Foundation, either version 3
// of the License, or (at your option) any later version.
//
// mpdpopm is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mpdpopm.  If not,
// see <http://www.gnu.org/licenses/>.
//! Assembling [`GelfMessage`]s.

use crate::{
    config::GelfConfig,
    error::{Error, ErrorClass, ErrorSink},
    message::GelfMessage,
    record::LogRecord,
    render::Rendered,
    severity::map_level,
};

use backtrace::Backtrace;

use std::{ffi::OsString, sync::OnceLock};

/// Additional field naming the record's originating component
pub const COMPONENT_FIELD: &str = "component";
/// Additional field naming the record's originating call site
pub const CALL_SITE_FIELD: &str = "call_site";
/// Additional field naming the instance/environment, when configured
pub const INSTANCE_FIELD: &str = "instance";

/// The `host` we claim our messages come from.
///
/// Either configured explicitly, or looked-up (once) via [gethostname()]. If the look-up fails,
/// that's reported (once) & messages go out with no `host` at all.
///
/// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
pub struct OriginHost {
    configured: Option<String>,
    resolver: fn() -> std::io::Result<OsString>,
    resolved: OnceLock<Option<String>>,
}

impl OriginHost {
    pub fn new(configured: Option<String>) -> OriginHost {
        OriginHost::with_resolver(configured, hostname::get)
    }
    /// Use `resolver` in place of [`hostname::get`] to discover the local hostname.
    pub fn with_resolver(
        configured: Option<String>,
        resolver: fn() -> std::io::Result<OsString>,
    ) -> OriginHost {
        OriginHost {
            configured,
            resolver,
            resolved: OnceLock::new(),
        }
    }
    pub fn get(&self, sink: &dyn ErrorSink) -> Option<&str> {
        if let Some(host) = &self.configured {
            return Some(host);
        }
        self.resolved
            .get_or_init(|| match (self.resolver)() {
                Ok(name) => Some(name.to_string_lossy().into_owned()),
                Err(err) => {
                    sink.report(
                        "Unknown local hostname",
                        Some(&Error::NoHostname {
                            source: err,
                            back: Backtrace::new(),
                        }),
                        ErrorClass::Generic,
                    );
                    None
                }
            })
            .as_deref()
    }
}

/// Builds [`GelfMessage`]s from [`LogRecord`]s & their [`Rendered`] text.
pub struct MessageBuilder {
    origin_host: OriginHost,
    facility: Option<String>,
    diagnostic_tag: String,
    instance_name: Option<String>,
    additional_fields: Vec<(String, String)>,
}

impl MessageBuilder {
    pub fn new(config: &GelfConfig) -> MessageBuilder {
        MessageBuilder::with_origin_host(config, OriginHost::new(config.origin_host.clone()))
    }
    pub fn with_origin_host(config: &GelfConfig, origin_host: OriginHost) -> MessageBuilder {
        MessageBuilder {
            origin_host,
            facility: config.facility.clone(),
            diagnostic_tag: config.diagnostic_tag.clone(),
            instance_name: config.instance_name.clone(),
            additional_fields: config.additional_fields.clone(),
        }
    }

    pub fn build(
        &self,
        record: &dyn LogRecord,
        rendered: Rendered,
        sink: &dyn ErrorSink,
    ) -> GelfMessage {
        let mut msg = GelfMessage::new(
            rendered.short_message,
            rendered.full_message,
            record.timestamp_millis(),
            map_level(record.level()),
        );
        msg.add_field(COMPONENT_FIELD, record.component());
        msg.add_field(CALL_SITE_FIELD, record.call_site());
        if let Some(instance) = &self.instance_name {
            msg.add_field(INSTANCE_FIELD, instance.as_str());
        }
        if let Some(value) = record.diagnostic(&self.diagnostic_tag) {
            msg.add_field(self.diagnostic_tag.as_str(), value);
        }

        msg.host = self.origin_host.get(sink).map(str::to_owned);
        msg.facility = self.facility.clone();

        // Last, so that configuration wins any collision.
        for (key, value) in &self.additional_fields {
            msg.add_field(key.as_str(), value.as_str());
        }
        msg
    }
}
