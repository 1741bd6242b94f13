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
//! Log records: what the handler reads from, never writes to.
//!
//! [`LogRecord`] is the read-only capability the rest of the crate consumes. [`Record`] is an
//! owned implementation; it's what [`Layer`](crate::layer::Layer) builds from a `tracing`
//! [`Event`](tracing::Event), and it's convenient for callers who want to hand records to a
//! [`GelfHandler`](crate::handler::GelfHandler) directly.

use crate::severity::SourceLevel;

use chrono::prelude::*;

use std::collections::HashMap;

type StdResult<T, E> = std::result::Result<T, E>;

/// A positional parameter to be substituted into a record's message.
///
/// Typed, because printf-style conversions care: `%d` will take an [`Param::Int`] but not a
/// [`Param::Str`].
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        match self {
            Param::Null => write!(f, "null"),
            Param::Bool(b) => write!(f, "{}", b),
            Param::Char(c) => write!(f, "{}", c),
            Param::Int(i) => write!(f, "{}", i),
            Param::UInt(u) => write!(f, "{}", u),
            Param::Float(x) => write!(f, "{}", x),
            Param::Str(s) => write!(f, "{}", s),
        }
    }
}

macro_rules! param_from {
    ($variant:ident, $as:ty; $($t:ty),*) => {
        $(
            impl std::convert::From<$t> for Param {
                fn from(x: $t) -> Self {
                    Param::$variant(x as $as)
                }
            }
        )*
    };
}

param_from!(Int, i64; i8, i16, i32, i64, isize);
param_from!(UInt, u64; u8, u16, u32, u64, usize);
param_from!(Float, f64; f32, f64);

impl std::convert::From<bool> for Param {
    fn from(x: bool) -> Self {
        Param::Bool(x)
    }
}

impl std::convert::From<char> for Param {
    fn from(x: char) -> Self {
        Param::Char(x)
    }
}

impl std::convert::From<&str> for Param {
    fn from(x: &str) -> Self {
        Param::Str(x.to_owned())
    }
}

impl std::convert::From<String> for Param {
    fn from(x: String) -> Self {
        Param::Str(x)
    }
}

impl<T: Into<Param>> std::convert::From<Option<T>> for Param {
    fn from(x: Option<T>) -> Self {
        x.map(Into::into).unwrap_or(Param::Null)
    }
}

/// An error attached to a record, captured at the time the record was made.
///
/// `std::error::Error` trait objects can't generally be cloned or kept past the logging call,
/// so we render the chain of causes eagerly.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorReport {
    message: String,
    causes: Vec<String>,
    backtrace: Option<String>,
}

impl ErrorReport {
    /// Capture `err` along with its chain of [`source`](std::error::Error::source)s.
    pub fn new(err: &(dyn std::error::Error + 'static)) -> ErrorReport {
        let mut causes = Vec::new();
        let mut next = err.source();
        while let Some(cause) = next {
            causes.push(cause.to_string());
            next = cause.source();
        }
        ErrorReport {
            message: err.to_string(),
            causes,
            backtrace: None,
        }
    }
    /// Like [`ErrorReport::new`], but also capture a backtrace of the calling thread.
    pub fn with_backtrace(err: &(dyn std::error::Error + 'static)) -> ErrorReport {
        let mut report = ErrorReport::new(err);
        report.backtrace = Some(format!("{:?}", backtrace::Backtrace::new()));
        report
    }
    pub fn message(&self) -> &str {
        &self.message
    }
    pub fn causes(&self) -> &[String] {
        &self.causes
    }
}

impl std::fmt::Display for ErrorReport {
    /// The full trace: the error, each cause on its own line, and the backtrace (if captured).
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        writeln!(f, "{}", self.message)?;
        for cause in &self.causes {
            writeln!(f, "Caused by: {}", cause)?;
        }
        if let Some(back) = &self.backtrace {
            write!(f, "{}", back)?;
        }
        Ok(())
    }
}

/// Read-only access to a log record.
pub trait LogRecord {
    /// When the record was made, in milliseconds since the Unix epoch
    fn timestamp_millis(&self) -> i64;
    /// The record's level, as the originating framework named it
    fn level(&self) -> &SourceLevel;
    /// The message, if a formatter has already been applied to it
    fn formatted_message(&self) -> Option<&str> {
        None
    }
    /// The raw message, possibly containing `{0}`-style or `%s`-style placeholders
    fn message(&self) -> Option<&str>;
    fn parameters(&self) -> &[Param];
    fn error(&self) -> Option<&ErrorReport>;
    /// The originating component (logger name, `tracing` target, ...)
    fn component(&self) -> &str;
    /// The originating call site (method, file & line, ...)
    fn call_site(&self) -> &str;
    /// Look-up `key` in the record's diagnostic context
    fn diagnostic(&self, key: &str) -> Option<&str>;
}

/// An owned [`LogRecord`].
///
/// ```rust
/// use tracing_gelf_handler::record::{LogRecord, Record};
/// use tracing_gelf_handler::severity::SourceLevel;
///
/// let record = Record::new(SourceLevel::Info, "user {0} logged in")
///     .param("alice")
///     .component("auth")
///     .diagnostic("remoteAddr", "203.0.113.5");
/// assert_eq!(LogRecord::diagnostic(&record, "remoteAddr"), Some("203.0.113.5"));
/// ```
#[derive(Clone, Debug)]
pub struct Record {
    timestamp_millis: i64,
    level: SourceLevel,
    formatted: Option<String>,
    message: Option<String>,
    parameters: Vec<Param>,
    error: Option<ErrorReport>,
    component: String,
    call_site: String,
    context: HashMap<String, String>,
}

impl Record {
    /// A record timestamped now, with no parameters, error or diagnostic context.
    pub fn new<M: Into<String>>(level: SourceLevel, message: M) -> Record {
        Record {
            timestamp_millis: Utc::now().timestamp_millis(),
            level,
            formatted: None,
            message: Some(message.into()),
            parameters: Vec::new(),
            error: None,
            component: String::new(),
            call_site: String::new(),
            context: HashMap::new(),
        }
    }
    /// A record whose message has already been rendered (no substitution will be attempted).
    pub fn preformatted<M: Into<String>>(level: SourceLevel, message: M) -> Record {
        let message = message.into();
        let mut record = Record::new(level, message.clone());
        record.formatted = Some(message);
        record
    }
    /// A record with no message at all.
    pub fn empty(level: SourceLevel) -> Record {
        let mut record = Record::new(level, "");
        record.message = None;
        record
    }
    pub fn timestamp_millis(mut self, millis: i64) -> Self {
        self.timestamp_millis = millis;
        self
    }
    pub fn param<P: Into<Param>>(mut self, param: P) -> Self {
        self.parameters.push(param.into());
        self
    }
    pub fn params<I, P>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.parameters.extend(params.into_iter().map(Into::into));
        self
    }
    pub fn error(mut self, error: ErrorReport) -> Self {
        self.error = Some(error);
        self
    }
    pub fn component<S: Into<String>>(mut self, component: S) -> Self {
        self.component = component.into();
        self
    }
    pub fn call_site<S: Into<String>>(mut self, call_site: S) -> Self {
        self.call_site = call_site.into();
        self
    }
    pub fn diagnostic<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl LogRecord for Record {
    fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }
    fn level(&self) -> &SourceLevel {
        &self.level
    }
    fn formatted_message(&self) -> Option<&str> {
        self.formatted.as_deref()
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
    fn parameters(&self) -> &[Param] {
        &self.parameters
    }
    fn error(&self) -> Option<&ErrorReport> {
        self.error.as_ref()
    }
    fn component(&self) -> &str {
        &self.component
    }
    fn call_site(&self) -> &str {
        &self.call_site
    }
    fn diagnostic(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "couldn't load settings")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn error_report() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "settings.toml not found",
        ));
        let report = ErrorReport::new(&err);
        assert_eq!(report.message(), "couldn't load settings");
        assert_eq!(report.causes(), &["settings.toml not found".to_owned()]);
        assert_eq!(
            format!("{}", report),
            "couldn't load settings\nCaused by: settings.toml not found\n"
        );

        let report = ErrorReport::with_backtrace(&err);
        assert!(format!("{}", report).starts_with("couldn't load settings\nCaused by: "));
    }

    #[test]
    fn params() {
        let record = Record::new(SourceLevel::Info, "{0} {1} {2} {3}")
            .param("a")
            .param(2i64)
            .param(Option::<u8>::None)
            .params([1.5f64, 2.5]);
        assert_eq!(
            record.parameters(),
            &[
                Param::Str("a".to_owned()),
                Param::Int(2),
                Param::Null,
                Param::Float(1.5),
                Param::Float(2.5)
            ]
        );
        assert_eq!(format!("{}", Param::Null), "null");
        assert!(record.formatted_message().is_none());
        assert!(Record::empty(SourceLevel::Info).message().is_none());
        assert_eq!(
            Record::preformatted(SourceLevel::Info, "done").formatted_message(),
            Some("done")
        );
    }
}
