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
//! Severities, and the mapping onto them from the levels of whatever logging facility produced a
//! record.
//!
//! [`Severity`] replicates the names used in `<syslog.h>`; GELF borrowed syslog's eight levels
//! wholesale. [`SourceLevel`] is the level as the originating framework understood it, and
//! [`map_level`] is the (total) function from the one to the other.

use crate::error::{Error, Result};

use backtrace::Backtrace;

use std::borrow::Cow;

type StdResult<T, E> = std::result::Result<T, E>;

/// The eight standard severity levels, most severe first. The enumeration values duplicate the
/// constants documented in the `syslog()` manual [page] & defined in `<syslog.h>`; they are what
/// goes out in the GELF `level` field.
///
/// Since the values are ordered by urgency, "at least as severe as" is `<=`.
///
/// [page]: https://man7.org/linux/man-pages/man3/syslog.3.html
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// system is unusable
    LOG_EMERG = 0,
    /// action must be take immediately
    LOG_ALERT = 1,
    /// critical conditions
    LOG_CRIT = 2,
    /// error conditions
    LOG_ERR = 3,
    /// warning conditions
    LOG_WARNING = 4,
    /// normal, but significant condition
    LOG_NOTICE = 5,
    /// informational message
    LOG_INFO = 6,
    /// debug-level message
    LOG_DEBUG = 7,
}

impl std::default::Default for Severity {
    /// The default threshold is `LOG_INFO`.
    fn default() -> Self {
        Severity::LOG_INFO
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Severity::LOG_EMERG => "LOG_EMERG",
                Severity::LOG_ALERT => "LOG_ALERT",
                Severity::LOG_CRIT => "LOG_CRIT",
                Severity::LOG_ERR => "LOG_ERR",
                Severity::LOG_WARNING => "LOG_WARNING",
                Severity::LOG_NOTICE => "LOG_NOTICE",
                Severity::LOG_INFO => "LOG_INFO",
                Severity::LOG_DEBUG => "LOG_DEBUG",
            }
        )
    }
}

impl std::convert::TryFrom<u8> for Severity {
    type Error = Error;
    fn try_from(x: u8) -> StdResult<Self, Self::Error> {
        Ok(match x {
            0 => Severity::LOG_EMERG,
            1 => Severity::LOG_ALERT,
            2 => Severity::LOG_CRIT,
            3 => Severity::LOG_ERR,
            4 => Severity::LOG_WARNING,
            5 => Severity::LOG_NOTICE,
            6 => Severity::LOG_INFO,
            7 => Severity::LOG_DEBUG,
            _ => {
                return Err(Error::BadLevel {
                    text: x.to_string(),
                    back: Backtrace::new(),
                })
            }
        })
    }
}

impl std::str::FromStr for Severity {
    type Err = Error;
    /// Parse a configured threshold: either a number in `0..=7`, or one of the usual names
    /// (with or without the `LOG_` prefix, case-insensitive).
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        if let Ok(n) = text.parse::<u8>() {
            return Severity::try_from(n);
        }
        let upper = text.to_ascii_uppercase();
        let name = upper.strip_prefix("LOG_").unwrap_or(upper.as_str());
        Ok(match name {
            "EMERG" | "EMERGENCY" | "PANIC" => Severity::LOG_EMERG,
            "ALERT" => Severity::LOG_ALERT,
            "CRIT" | "CRITICAL" | "FATAL" => Severity::LOG_CRIT,
            "ERR" | "ERROR" | "SEVERE" => Severity::LOG_ERR,
            "WARNING" | "WARN" => Severity::LOG_WARNING,
            "NOTICE" => Severity::LOG_NOTICE,
            "INFO" | "INFORMATIONAL" => Severity::LOG_INFO,
            "DEBUG" | "TRACE" => Severity::LOG_DEBUG,
            _ => {
                return Err(Error::BadLevel {
                    text: s.to_owned(),
                    back: Backtrace::new(),
                })
            }
        })
    }
}

/// A record's level, as the originating logging facility named it.
///
/// The three tiers of the classic SEVERE/WARNING/INFO hierarchy are recognized directly;
/// everything else (CONFIG, FINE, or the five/six-level ERROR/WARN/INFO/DEBUG/TRACE scheme used
/// by `tracing`, `log` & friends) is carried by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLevel {
    Severe,
    Warning,
    Info,
    Named(Cow<'static, str>),
}

impl SourceLevel {
    pub fn name(&self) -> &str {
        match self {
            SourceLevel::Severe => "SEVERE",
            SourceLevel::Warning => "WARNING",
            SourceLevel::Info => "INFO",
            SourceLevel::Named(name) => name,
        }
    }
}

impl std::fmt::Display for SourceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.name())
    }
}

impl std::convert::From<&tracing::Level> for SourceLevel {
    fn from(level: &tracing::Level) -> Self {
        SourceLevel::Named(Cow::Borrowed(level.as_str()))
    }
}

impl std::convert::From<tracing::Level> for SourceLevel {
    fn from(level: tracing::Level) -> Self {
        SourceLevel::from(&level)
    }
}

/// Levels named by the five/six-level scheme (log4j, `log`, `tracing`).
const NAMED_LEVELS: &[(&str, Severity)] = &[
    ("FATAL", Severity::LOG_CRIT),
    ("ERROR", Severity::LOG_ERR),
    ("WARN", Severity::LOG_WARNING),
    ("INFO", Severity::LOG_INFO),
    ("DEBUG", Severity::LOG_DEBUG),
    ("TRACE", Severity::LOG_DEBUG),
];

/// Map a [`SourceLevel`] onto the standard eight-level scale.
///
/// Total: anything unrecognized maps to [`Severity::LOG_DEBUG`].
pub fn map_level(level: &SourceLevel) -> Severity {
    match level {
        SourceLevel::Severe => Severity::LOG_ERR,
        SourceLevel::Warning => Severity::LOG_WARNING,
        SourceLevel::Info => Severity::LOG_INFO,
        SourceLevel::Named(name) => NAMED_LEVELS
            .iter()
            .find(|(candidate, _)| *candidate == name.as_ref())
            .map(|(_, severity)| *severity)
            .unwrap_or(Severity::LOG_DEBUG),
    }
}
