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
//! Handler configuration.
//!
//! Configuration is read once, when a [`GelfHandler`](crate::handler::GelfHandler) is built, and
//! is immutable thereafter. [`GelfConfig`] may be filled-in by hand, through
//! [`GelfHandlerBuilder`](crate::handler::GelfHandlerBuilder), from a set of properties
//! ([`GelfConfig::from_properties`]) or from the environment ([`GelfConfig::from_env`]).

use crate::{
    error::{Error, Result},
    severity::Severity,
};

use backtrace::Backtrace;

/// Port on which GELF collectors conventionally listen
pub const DEFAULT_GELF_PORT: u16 = 12201;

/// Diagnostic-context key copied into each message by default
pub const DEFAULT_DIAGNOSTIC_TAG: &str = "remoteAddr";

/// Environment variable naming the collector (optionally prefixed with `tcp:` or `udp:`)
pub const GELF_HOST_ENV: &str = "GELF_HOST";
/// Environment variable giving the collector's port
pub const GELF_PORT_ENV: &str = "GELF_PORT";
/// Environment variable overriding the `host` field of outgoing messages
pub const GELF_ORIGIN_HOST_ENV: &str = "GELF_ORIGIN_HOST";
/// Environment variable giving the `facility` field of outgoing messages
pub const GELF_FACILITY_ENV: &str = "GELF_FACILITY";
/// Environment variable enabling stack trace extraction (`true`, case-insensitive)
pub const GELF_EXTRACT_STACKTRACE_ENV: &str = "GELF_EXTRACT_STACKTRACE";
/// Environment variable giving the minimum severity to forward
pub const GELF_LEVEL_ENV: &str = "GELF_LEVEL";
/// Environment variable naming the diagnostic-context key to forward
pub const GELF_DIAGNOSTIC_TAG_ENV: &str = "GELF_DIAGNOSTIC_TAG";
/// Environment variable naming this instance/environment
pub const GELF_INSTANCE_NAME_ENV: &str = "GELF_INSTANCE_NAME";
/// Prefix for the ordered list of `key=value` additional fields: `GELF_ADDITIONAL_FIELD_0`,
/// `GELF_ADDITIONAL_FIELD_1`, ...
pub const GELF_ADDITIONAL_FIELD_ENV_PREFIX: &str = "GELF_ADDITIONAL_FIELD_";

/// Everything a [`GelfHandler`](crate::handler::GelfHandler) needs to know.
#[derive(Clone, Debug, PartialEq)]
pub struct GelfConfig {
    /// The collector; a leading `tcp:` selects a stream transport, `udp:` (or no prefix at all)
    /// a datagram transport
    pub graylog_host: Option<String>,
    pub graylog_port: u16,
    /// Sent as the `host` field in lieu of the local hostname
    pub origin_host: Option<String>,
    pub facility: Option<String>,
    /// Append the trace of any error attached to a record to its `full_message`
    pub extract_stacktrace: bool,
    /// The diagnostic-context key whose value (if present) is sent as an additional field
    pub diagnostic_tag: String,
    /// Records less severe than this are dropped
    pub level: Severity,
    pub instance_name: Option<String>,
    /// Static additional fields, sent with every message
    pub additional_fields: Vec<(String, String)>,
}

impl std::default::Default for GelfConfig {
    fn default() -> Self {
        GelfConfig {
            graylog_host: None,
            graylog_port: DEFAULT_GELF_PORT,
            origin_host: None,
            facility: None,
            extract_stacktrace: false,
            diagnostic_tag: DEFAULT_DIAGNOSTIC_TAG.to_owned(),
            level: Severity::default(),
            instance_name: None,
            additional_fields: Vec::new(),
        }
    }
}

/// Split `key=value` at the first `=`; `None` if there is none.
pub fn parse_additional_field(text: &str) -> Option<(String, String)> {
    text.split_once('=')
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
}

fn parse_port(text: &str) -> Result<u16> {
    text.trim().parse::<u16>().map_err(|_| Error::BadPort {
        text: text.to_owned(),
        back: Backtrace::new(),
    })
}

impl GelfConfig {
    /// Read configuration from properties named `<prefix>.graylogHost`, `<prefix>.graylogPort`,
    /// `<prefix>.originHost`, `<prefix>.facility`, `<prefix>.extractStacktrace`,
    /// `<prefix>.level`, `<prefix>.diagnosticTag`, `<prefix>.instanceName`, and
    /// `<prefix>.additionalField.0`, `<prefix>.additionalField.1`, & so on.
    ///
    /// `lookup` returns the value of the named property, if set. Absent properties take their
    /// defaults; the additional field list ends at the first missing index, and entries without
    /// an `=` are skipped.
    pub fn from_properties<F>(prefix: &str, lookup: F) -> Result<GelfConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}.{}", prefix, name));
        let mut config = GelfConfig {
            graylog_host: get("graylogHost"),
            origin_host: get("originHost"),
            facility: get("facility"),
            instance_name: get("instanceName"),
            extract_stacktrace: get("extractStacktrace")
                .map(|s| s.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            ..Default::default()
        };
        if let Some(port) = get("graylogPort") {
            config.graylog_port = parse_port(&port)?;
        }
        if let Some(level) = get("level") {
            config.level = level.parse::<Severity>()?;
        }
        if let Some(tag) = get("diagnosticTag") {
            config.diagnostic_tag = tag;
        }
        config.additional_fields = (0..)
            .map(|n| get(&format!("additionalField.{}", n)))
            .take_while(Option::is_some)
            .flatten()
            .filter_map(|text| parse_additional_field(&text))
            .collect();
        Ok(config)
    }

    /// Read configuration from the environment (see [`GELF_HOST_ENV`] & friends).
    pub fn from_env() -> Result<GelfConfig> {
        GelfConfig::from_env_with(|key| std::env::var(key).ok())
    }

    fn from_env_with<F>(var: F) -> Result<GelfConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = GelfConfig {
            graylog_host: var(GELF_HOST_ENV),
            origin_host: var(GELF_ORIGIN_HOST_ENV),
            facility: var(GELF_FACILITY_ENV),
            instance_name: var(GELF_INSTANCE_NAME_ENV),
            extract_stacktrace: var(GELF_EXTRACT_STACKTRACE_ENV)
                .map(|s| s.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            ..Default::default()
        };
        if let Some(port) = var(GELF_PORT_ENV) {
            config.graylog_port = parse_port(&port)?;
        }
        if let Some(level) = var(GELF_LEVEL_ENV) {
            config.level = level.parse::<Severity>()?;
        }
        if let Some(tag) = var(GELF_DIAGNOSTIC_TAG_ENV) {
            config.diagnostic_tag = tag;
        }
        config.additional_fields = (0..)
            .map(|n| var(&format!("{}{}", GELF_ADDITIONAL_FIELD_ENV_PREFIX, n)))
            .take_while(Option::is_some)
            .flatten()
            .filter_map(|text| parse_additional_field(&text))
            .collect();
        Ok(config)
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use std::collections::HashMap;

    const PREFIX: &str = "tracing_gelf_handler.GelfHandler";

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (format!("{}.{}", PREFIX, k), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = GelfConfig::from_properties(PREFIX, |_| None).unwrap();
        assert_eq!(config, GelfConfig::default());
        assert_eq!(config.graylog_port, 12201);
        assert_eq!(config.diagnostic_tag, "remoteAddr");
        assert_eq!(config.level, Severity::LOG_INFO);
        assert!(!config.extract_stacktrace);
    }

    #[test]
    fn properties() {
        let p = props(&[
            ("graylogHost", "tcp:graylog.example.com"),
            ("graylogPort", "9000"),
            ("originHost", "web-1"),
            ("facility", "payments"),
            ("extractStacktrace", "TRUE"),
            ("level", "warning"),
            ("diagnosticTag", "requestId"),
            ("instanceName", "staging"),
            ("additionalField.0", "team=core"),
            ("additionalField.1", "malformed"),
            ("additionalField.2", "url=http://x/?a=b"),
            // Never reached: index 3 is missing
            ("additionalField.4", "lost=yes"),
        ]);
        let config = GelfConfig::from_properties(PREFIX, |k| p.get(k).cloned()).unwrap();
        assert_eq!(
            config,
            GelfConfig {
                graylog_host: Some("tcp:graylog.example.com".to_owned()),
                graylog_port: 9000,
                origin_host: Some("web-1".to_owned()),
                facility: Some("payments".to_owned()),
                extract_stacktrace: true,
                diagnostic_tag: "requestId".to_owned(),
                level: Severity::LOG_WARNING,
                instance_name: Some("staging".to_owned()),
                additional_fields: vec![
                    ("team".to_owned(), "core".to_owned()),
                    ("url".to_owned(), "http://x/?a=b".to_owned()),
                ],
            }
        );
    }

    #[test]
    fn bad_values() {
        let p = props(&[("graylogPort", "twelve")]);
        assert!(GelfConfig::from_properties(PREFIX, |k| p.get(k).cloned()).is_err());
        let p = props(&[("graylogPort", "70000")]);
        assert!(GelfConfig::from_properties(PREFIX, |k| p.get(k).cloned()).is_err());
        let p = props(&[("level", "LOUD")]);
        assert!(GelfConfig::from_properties(PREFIX, |k| p.get(k).cloned()).is_err());
    }

    #[test]
    fn environment() {
        let env: HashMap<&str, &str> = [
            (GELF_HOST_ENV, "udp:10.0.0.1"),
            (GELF_PORT_ENV, "12202"),
            (GELF_LEVEL_ENV, "7"),
            ("GELF_ADDITIONAL_FIELD_0", "region=eu"),
        ]
        .into_iter()
        .collect();
        let config = GelfConfig::from_env_with(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.graylog_host.as_deref(), Some("udp:10.0.0.1"));
        assert_eq!(config.graylog_port, 12202);
        assert_eq!(config.level, Severity::LOG_DEBUG);
        assert_eq!(
            config.additional_fields,
            vec![("region".to_owned(), "eu".to_owned())]
        );
    }
}
