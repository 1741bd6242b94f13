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
//! The structured message we send to the collector, & its [GELF] 1.1 encoding.
//!
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html

use crate::{error::Result, severity::Severity};

use serde::Serialize;

use std::collections::{BTreeMap, HashMap};

/// GELF spec version we speak
pub const GELF_VERSION: &str = "1.1";

/// A single structured log message.
///
/// Plain data: built by [`MessageBuilder`](crate::builder::MessageBuilder), handed to a
/// [`MessageSender`](crate::transport::MessageSender), then dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct GelfMessage {
    pub short_message: String,
    pub full_message: String,
    pub timestamp_millis: i64,
    pub level: Severity,
    pub host: Option<String>,
    pub facility: Option<String>,
    pub fields: HashMap<String, String>,
}

impl GelfMessage {
    pub fn new<S: Into<String>, F: Into<String>>(
        short_message: S,
        full_message: F,
        timestamp_millis: i64,
        level: Severity,
    ) -> GelfMessage {
        GelfMessage {
            short_message: short_message.into(),
            full_message: full_message.into(),
            timestamp_millis,
            level,
            host: None,
            facility: None,
            fields: HashMap::new(),
        }
    }
    /// Add (or replace) an additional field.
    pub fn add_field<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.fields.insert(key.into(), value.into());
    }
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
    /// Encode this message as a GELF 1.1 JSON document.
    ///
    /// Additional fields get the leading underscore GELF requires (unless they already have
    /// one); a field named `id` is dropped, since `_id` is reserved.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let fields = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let key = if key.starts_with('_') {
                    key.clone()
                } else {
                    format!("_{}", key)
                };
                if key == "_id" {
                    None
                } else {
                    Some((key, value.as_str()))
                }
            })
            .collect::<BTreeMap<String, &str>>();
        let wire = Wire {
            version: GELF_VERSION,
            host: self.host.as_deref(),
            short_message: &self.short_message,
            full_message: &self.full_message,
            timestamp: self.timestamp_millis as f64 / 1000.0,
            level: self.level as u8,
            facility: self.facility.as_deref(),
            fields,
        };
        Ok(serde_json::to_vec(&wire)?)
    }
}

#[derive(Serialize)]
struct Wire<'a> {
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
    short_message: &'a str,
    full_message: &'a str,
    timestamp: f64,
    level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    facility: Option<&'a str>,
    #[serde(flatten)]
    fields: BTreeMap<String, &'a str>,
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn gelf_json() {
        let mut msg = GelfMessage::new("hi", "hi there", 1_500_000_000_250, Severity::LOG_WARNING);
        msg.host = Some("bree.local".to_owned());
        msg.add_field("component", "auth");
        msg.add_field("_already", "prefixed");
        msg.add_field("id", "dropped");

        let json: serde_json::Value = serde_json::from_slice(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "version": "1.1",
                "host": "bree.local",
                "short_message": "hi",
                "full_message": "hi there",
                "timestamp": 1_500_000_000.25,
                "level": 4,
                "_component": "auth",
                "_already": "prefixed",
            })
        );

        msg.host = None;
        msg.facility = Some("payments".to_owned());
        let json: serde_json::Value = serde_json::from_slice(&msg.to_json().unwrap()).unwrap();
        assert!(json.get("host").is_none());
        assert_eq!(json["facility"], "payments");
        assert_eq!(msg.field("id"), Some("dropped"));
    }
}
