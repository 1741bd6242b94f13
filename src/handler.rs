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

//! The delivery pipeline: [`GelfHandler`].
//!
//! A [`GelfHandler`] owns at most one [`MessageSender`] at a time. It's created lazily, on the
//! first publish; until that succeeds, every publish retries (there is no backoff). Once closed,
//! the handler stays closed.
//!
//! ```text
//!                  first publish (ok)
//!   Uninitialized ---------------------> Ready ---+
//!        |    ^                            |  ^   | publish
//!        |    +----------------------------+  +---+
//!        |    first publish (failed)       |
//!        |                                 | close
//!        +-------------> Closed <----------+
//!               close
//! ```
//!
//! Publish calls are serialized: constructing the transport & sending on it both happen under
//! one lock, so messages reach the transport in the order their callers acquired it.

use crate::{
    builder::{MessageBuilder, OriginHost},
    config::GelfConfig,
    error::{Error, ErrorClass, ErrorSink, TracingErrorSink, INTERNAL_TARGET},
    record::LogRecord,
    render::Renderer,
    severity::{map_level, Severity, SourceLevel},
    transport::{Connector, MessageSender, NetConnector, Target},
};

use std::sync::{Mutex, MutexGuard, PoisonError};

type Filter = Box<dyn Fn(&dyn LogRecord) -> bool + Send + Sync>;

enum State {
    Uninitialized,
    Ready(Box<dyn MessageSender>),
    Closed,
}

/// Forwards [`LogRecord`]s to a GELF collector.
///
/// Nothing [`GelfHandler`] does will return an error or panic into the caller: every failure is
/// handed to the configured [`ErrorSink`] instead.
///
/// ```rust
/// use tracing_gelf_handler::{handler::GelfHandler, record::Record, severity::SourceLevel};
///
/// let handler = GelfHandler::builder()
///     .graylog_host("udp:127.0.0.1")
///     .facility("payments")
///     .additional_field("team", "core")
///     .build();
/// handler.publish(&Record::new(SourceLevel::Info, "user {0} logged in").param("alice"));
/// handler.close();
/// ```
pub struct GelfHandler {
    target: Option<Target>,
    threshold: Severity,
    diagnostic_tag: String,
    filter: Option<Filter>,
    renderer: Renderer,
    builder: MessageBuilder,
    connector: Box<dyn Connector>,
    sink: Box<dyn ErrorSink>,
    state: Mutex<State>,
}

impl GelfHandler {
    pub fn new(config: GelfConfig) -> GelfHandler {
        GelfHandler::builder().config(config).build()
    }

    pub fn builder() -> GelfHandlerBuilder {
        GelfHandlerBuilder {
            config: GelfConfig::default(),
            filter: None,
            connector: None,
            sink: None,
            origin_host: None,
        }
    }

    /// The diagnostic-context key whose value is forwarded with each message.
    pub fn diagnostic_tag(&self) -> &str {
        &self.diagnostic_tag
    }

    /// Would a record at `level` pass the severity threshold?
    pub fn accepts_level(&self, level: &SourceLevel) -> bool {
        map_level(level) <= self.threshold
    }

    /// Would `record` be forwarded?
    pub fn is_loggable(&self, record: &dyn LogRecord) -> bool {
        self.accepts_level(record.level())
            && self.filter.as_ref().map_or(true, |filter| filter(record))
    }

    /// Forward `record` to the collector (if it passes the level threshold & filter).
    pub fn publish(&self, record: &dyn LogRecord) {
        if !self.is_loggable(record) {
            return;
        }

        let rendered = self.renderer.render(record, &*self.sink);
        let message = self.builder.build(record, rendered, &*self.sink);

        let mut state = self.lock();
        if let State::Uninitialized = *state {
            if let Some(sender) = self.connect() {
                *state = State::Ready(sender);
            }
        }
        match &mut *state {
            State::Ready(sender) => match sender.send_message(&message) {
                Ok(true) => (),
                Ok(false) => self.report("Could not send GELF message", None, ErrorClass::Write),
                Err(err) => {
                    self.report("Could not send GELF message", Some(&err), ErrorClass::Write)
                }
            },
            State::Closed => self.report(
                "GELF handler is closed; message dropped",
                None,
                ErrorClass::Write,
            ),
            // `connect()` has already said why
            State::Uninitialized => (),
        }
    }

    /// Nothing is buffered, so there's nothing to flush.
    pub fn flush(&self) {}

    /// Release the transport (if any). Idempotent; the handler will send nothing further.
    pub fn close(&self) {
        let mut state = self.lock();
        if let State::Ready(mut sender) = std::mem::replace(&mut *state, State::Closed) {
            tracing::debug!(target: INTERNAL_TARGET, "closing the GELF transport");
            if let Err(err) = sender.close() {
                self.report(
                    "Could not close the GELF transport",
                    Some(&err),
                    ErrorClass::Close,
                );
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), State::Closed)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic elsewhere while holding the lock mustn't turn every subsequent log call into
        // one, too.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, msg: &str, cause: Option<&Error>, class: ErrorClass) {
        self.sink.report(msg, cause, class)
    }

    fn connect(&self) -> Option<Box<dyn MessageSender>> {
        let target = match &self.target {
            Some(target) => target,
            None => {
                self.report("GELF collector hostname is empty!", None, ErrorClass::Write);
                return None;
            }
        };
        match self.connector.connect(target) {
            Ok(sender) => {
                tracing::debug!(target: INTERNAL_TARGET, %target, "connected to GELF collector");
                Some(sender)
            }
            Err(err) => {
                let msg = match &err {
                    Error::UnknownHost { .. } => {
                        format!("Unknown GELF collector hostname: {}", target.host)
                    }
                    Error::Socket { .. } => format!("Socket exception connecting to {}", target),
                    _ => format!("IO exception connecting to {}", target),
                };
                self.report(&msg, Some(&err), ErrorClass::Write);
                None
            }
        }
    }
}

impl Drop for GelfHandler {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build a [`GelfHandler`]: start from [`GelfConfig::default`] (or a whole [`GelfConfig`]) &
/// override settings one at a time.
pub struct GelfHandlerBuilder {
    config: GelfConfig,
    filter: Option<Filter>,
    connector: Option<Box<dyn Connector>>,
    sink: Option<Box<dyn ErrorSink>>,
    origin_host: Option<OriginHost>,
}

impl GelfHandlerBuilder {
    /// Replace the entire configuration.
    pub fn config(mut self, config: GelfConfig) -> Self {
        self.config = config;
        self
    }
    pub fn graylog_host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.graylog_host = Some(host.into());
        self
    }
    pub fn graylog_port(mut self, port: u16) -> Self {
        self.config.graylog_port = port;
        self
    }
    pub fn origin_host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.origin_host = Some(host.into());
        self
    }
    pub fn facility<S: Into<String>>(mut self, facility: S) -> Self {
        self.config.facility = Some(facility.into());
        self
    }
    pub fn extract_stacktrace(mut self, extract_stacktrace: bool) -> Self {
        self.config.extract_stacktrace = extract_stacktrace;
        self
    }
    pub fn diagnostic_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.config.diagnostic_tag = tag.into();
        self
    }
    pub fn level(mut self, level: Severity) -> Self {
        self.config.level = level;
        self
    }
    pub fn instance_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.instance_name = Some(name.into());
        self
    }
    pub fn additional_field<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config
            .additional_fields
            .push((key.into(), value.into()));
        self
    }
    /// Only forward records for which `filter` returns true (in addition to the level threshold).
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&dyn LogRecord) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }
    /// Construct transports with `connector` rather than opening real sockets.
    pub fn connector<C: Connector + 'static>(mut self, connector: C) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }
    /// Report failures to `sink` rather than to [`TracingErrorSink`].
    pub fn error_sink<E: ErrorSink + 'static>(mut self, sink: E) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
    /// Use `origin_host` to determine the `host` field, rather than the configured override or
    /// the local hostname.
    pub fn origin(mut self, origin_host: OriginHost) -> Self {
        self.origin_host = Some(origin_host);
        self
    }
    pub fn build(self) -> GelfHandler {
        let config = self.config;
        let origin_host = self
            .origin_host
            .unwrap_or_else(|| OriginHost::new(config.origin_host.clone()));
        GelfHandler {
            target: config
                .graylog_host
                .as_deref()
                .filter(|host| !host.is_empty())
                .map(|host| Target::parse(host, config.graylog_port)),
            threshold: config.level,
            diagnostic_tag: config.diagnostic_tag.clone(),
            filter: self.filter,
            renderer: Renderer::new(config.extract_stacktrace),
            builder: MessageBuilder::with_origin_host(&config, origin_host),
            connector: self.connector.unwrap_or_else(|| Box::new(NetConnector)),
            sink: self.sink.unwrap_or_else(|| Box::new(TracingErrorSink)),
            state: Mutex::new(State::Uninitialized),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_doubles {
    //! A [`Connector`] & [`MessageSender`] that record what happens to them, and an
    //! [`ErrorSink`] that records what's reported to it.

    use super::*;

    use crate::{error::Result, message::GelfMessage};

    use backtrace::Backtrace;

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[derive(Clone, Copy, Debug, PartialEq)]
    pub enum Outcome {
        Sent,
        Declined,
        Failed,
    }

    pub struct Shared {
        pub connects: AtomicUsize,
        pub closes: AtomicUsize,
        /// Fail this many connection attempts before succeeding
        pub failing_connects: AtomicUsize,
        pub targets: Mutex<Vec<Target>>,
        pub sent: Mutex<Vec<GelfMessage>>,
        pub outcome: Mutex<Outcome>,
    }

    impl Shared {
        pub fn new() -> Arc<Shared> {
            Arc::new(Shared {
                connects: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                failing_connects: AtomicUsize::new(0),
                targets: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                outcome: Mutex::new(Outcome::Sent),
            })
        }
        pub fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
        pub fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
        pub fn sent(&self) -> Vec<GelfMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    pub struct CountingConnector(pub Arc<Shared>);

    impl Connector for CountingConnector {
        fn connect(&self, target: &Target) -> Result<Box<dyn MessageSender>> {
            self.0.targets.lock().unwrap().push(target.clone());
            let failing = self.0.failing_connects.load(Ordering::SeqCst);
            if failing > 0 {
                self.0.failing_connects.store(failing - 1, Ordering::SeqCst);
                return Err(Error::UnknownHost {
                    host: target.host.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "nope"),
                    back: Backtrace::new(),
                });
            }
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingSender(self.0.clone())))
        }
    }

    pub struct RecordingSender(pub Arc<Shared>);

    impl MessageSender for RecordingSender {
        fn send_message(&mut self, message: &GelfMessage) -> Result<bool> {
            match *self.0.outcome.lock().unwrap() {
                Outcome::Sent => {
                    self.0.sent.lock().unwrap().push(message.clone());
                    Ok(true)
                }
                Outcome::Declined => Ok(false),
                Outcome::Failed => Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "collector went away",
                )
                .into()),
            }
        }
        fn close(&mut self) -> Result<()> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    pub struct Reports(pub Arc<Mutex<Vec<(String, ErrorClass)>>>);

    impl Reports {
        pub fn messages(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|(msg, _)| msg.clone())
                .collect()
        }
    }

    impl ErrorSink for Reports {
        fn report(&self, msg: &str, _cause: Option<&Error>, class: ErrorClass) {
            self.0.lock().unwrap().push((msg.to_owned(), class));
        }
    }
}
