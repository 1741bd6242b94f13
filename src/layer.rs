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
//! [tracing-gelf-handler](crate) [`Layer`] implementation.
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! [`Layer`] turns each [`tracing`] [`Event`] into a [`Record`] & hands it to a [`GelfHandler`]:
//!
//! - the event's `message` becomes the (already formatted) message
//! - its target becomes the originating component, & its file & line the call site
//! - an `error` recorded as a `&dyn std::error::Error` becomes the record's attached error
//! - the field named by the handler's diagnostic tag, taken from the event or else from the
//!   innermost enclosing span that has it, becomes the record's diagnostic context (so
//!   `info_span!("request", remoteAddr = %peer)` tags everything logged within that span)
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html

use crate::{
    config::GelfConfig,
    error::{report_to, Result, INTERNAL_TARGET},
    handler::GelfHandler,
    record::{ErrorReport, Record},
    severity::SourceLevel,
};

use tracing::{
    dispatcher::WeakDispatch,
    field::{Field, Visit},
    span, Dispatch, Event,
};
use tracing_core::Metadata;
use tracing_subscriber::{layer::Context, registry::LookupSpan};

use std::sync::{Arc, OnceLock};

// When the tracing-log feature is enabled, use NormalizeEvent to extract target/file/line
// metadata from events that originated from the `log` crate. This follows the same pattern used
// by tracing-subscriber's fmt layer.
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

/// The diagnostic-tag value recorded on a span, stashed in its extensions.
#[derive(Debug)]
struct SpanDiagnostic(String);

/// Picks the message, the first error & the diagnostic-tag value out of a set of fields; all
/// other fields are skipped without being formatted.
struct FieldVisitor<'a> {
    tag: &'a str,
    message: Option<String>,
    diagnostic: Option<String>,
    error: Option<ErrorReport>,
}

impl<'a> FieldVisitor<'a> {
    fn new(tag: &'a str) -> FieldVisitor<'a> {
        FieldVisitor {
            tag,
            message: None,
            diagnostic: None,
            error: None,
        }
    }
    fn wants(&self, field: &Field) -> bool {
        field.name() == "message" || field.name() == self.tag
    }
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.diagnostic = Some(value);
        }
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if self.wants(field) {
            self.insert(field, value.to_owned());
        }
    }
    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if self.error.is_none() {
            self.error = Some(ErrorReport::new(value));
        }
        if self.wants(field) {
            self.insert(field, value.to_string());
        }
    }
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // The tracing macros take care to "pre-format" the `message` field so that `value`
        // refers to a `std::fmt::Arguments` instance, which prints without enclosing quotes.
        if self.wants(field) {
            self.insert(field, format!("{:?}", value));
        }
    }
}

/// `file:line`, if the callsite knows them, else the callsite's name
fn call_site(meta: &Metadata<'_>) -> String {
    match (meta.file(), meta.line()) {
        (Some(file), Some(line)) => format!("{}:{}", file, line),
        _ => meta.name().to_owned(),
    }
}

/// A [`tracing-subscriber`]-compliant [`Layer`] implementation that forwards [`Event`]s to a
/// GELF collector.
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
///
/// ```no_run
/// use tracing::info;
/// use tracing_gelf_handler::{handler::GelfHandler, layer::Layer};
/// use tracing_subscriber::{layer::SubscriberExt, registry::Registry};
///
/// let layer = Layer::new(
///     GelfHandler::builder()
///         .graylog_host("tcp:graylog.example.com")
///         .build(),
/// );
/// let handler = layer.handler().clone();
/// let subscriber = Registry::default().with(layer);
/// tracing::subscriber::with_default(subscriber, || {
///     info!(remoteAddr = "203.0.113.5", "user {} logged in", "alice");
/// });
/// handler.close();
/// ```
pub struct Layer {
    handler: Arc<GelfHandler>,
    /// The dispatcher this layer was registered with; the default error sink reports here when
    /// it can't get at the current one.
    dispatch: OnceLock<WeakDispatch>,
}

impl Layer {
    pub fn new(handler: GelfHandler) -> Layer {
        Layer::with_handler(Arc::new(handler))
    }
    /// Share `handler` with the caller (so that, e.g., it can be closed on shutdown).
    pub fn with_handler(handler: Arc<GelfHandler>) -> Layer {
        Layer {
            handler,
            dispatch: OnceLock::new(),
        }
    }
    pub fn with_config(config: GelfConfig) -> Layer {
        Layer::new(GelfHandler::new(config))
    }
    /// Attempt to construct a [`Layer`] configured from the environment (see
    /// [`GelfConfig::from_env`]).
    pub fn try_from_env() -> Result<Layer> {
        Ok(Layer::with_config(GelfConfig::from_env()?))
    }
    pub fn handler(&self) -> &Arc<GelfHandler> {
        &self.handler
    }
}

impl<S> tracing_subscriber::layer::Layer<S> for Layer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_register_dispatch(&self, subscriber: &Dispatch) {
        // Only the first registration counts.
        let _ = self.dispatch.set(subscriber.downgrade());
    }

    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = FieldVisitor::new(self.handler.diagnostic_tag());
            attrs.record(&mut visitor);
            if let Some(value) = visitor.diagnostic {
                span.extensions_mut().replace(SpanDiagnostic(value));
            }
        }
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = FieldVisitor::new(self.handler.diagnostic_tag());
            values.record(&mut visitor);
            if let Some(value) = visitor.diagnostic {
                span.extensions_mut().replace(SpanDiagnostic(value));
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        // When the tracing-log feature is enabled, use normalized_metadata() to get the
        // target, file & line of events that originated from the `log` crate. For native
        // tracing events, normalized_metadata() returns None and we use the event's own
        // metadata.
        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        // Our own complaints go elsewhere.
        if meta.target().starts_with(INTERNAL_TARGET) {
            return;
        }
        let level = SourceLevel::from(meta.level());
        if !self.handler.accepts_level(&level) {
            return;
        }

        let tag = self.handler.diagnostic_tag();
        let mut visitor = FieldVisitor::new(tag);
        event.record(&mut visitor);
        let message = visitor.message.take().unwrap_or_default();
        let error = visitor.error.take();
        // The event's own field wins; else the innermost span carrying one.
        let diagnostic = visitor.diagnostic.take().or_else(|| {
            ctx.event_scope(event)?
                .find_map(|span| span.extensions().get::<SpanDiagnostic>().map(|d| d.0.clone()))
        });

        let mut record = Record::preformatted(level, message)
            .component(meta.target())
            .call_site(call_site(meta));
        if let Some(error) = error {
            record = record.error(error);
        }
        if let Some(value) = diagnostic {
            record = record.diagnostic(tag, value);
        }

        let _scope = report_to(self.dispatch.get().and_then(WeakDispatch::upgrade));
        self.handler.publish(&record);
    }
}

#[cfg(test)]
mod smoke {

    use super::*;

    use crate::{
        error::{ErrorClass, ErrorSink, TracingErrorSink},
        handler::test_doubles::{CountingConnector, Outcome, Reports, Shared},
        severity::Severity,
    };

    use tracing::{debug, error, info, info_span, warn};
    use tracing_subscriber::{
        layer::SubscriberExt, // Needed to get `with()`
        registry::Registry,
    };

    use std::sync::Mutex;

    fn layer(shared: &Arc<Shared>, reports: &Reports, extract_stacktrace: bool) -> Layer {
        Layer::new(
            GelfHandler::builder()
                .graylog_host("udp:127.0.0.1")
                .origin_host("bree.local")
                .extract_stacktrace(extract_stacktrace)
                .connector(CountingConnector(shared.clone()))
                .error_sink(reports.clone())
                .build(),
        )
    }

    /// Records the target, message & `class` field of every event it sees.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<(String, String, Option<String>)>>>);

    impl Capture {
        fn events(&self) -> Vec<(String, String, Option<String>)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::layer::Layer<S> for Capture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = FieldVisitor::new("class");
            event.record(&mut visitor);
            self.0.lock().unwrap().push((
                event.metadata().target().to_owned(),
                visitor.message.unwrap_or_default(),
                visitor.diagnostic,
            ));
        }
    }

    #[test]
    fn events() {
        let shared = Shared::new();
        let reports = Reports::default();
        let subscriber = Registry::default().with(layer(&shared, &reports, false));
        tracing::subscriber::with_default(subscriber, || {
            info!(remoteAddr = "203.0.113.5", "user {} logged in", "alice");
            debug!("below the threshold");
            warn!(attempt = 3, "Hello, 世界!");
        });

        let sent = shared.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].short_message, "user alice logged in");
        assert_eq!(sent[0].level, Severity::LOG_INFO);
        assert_eq!(sent[0].host.as_deref(), Some("bree.local"));
        assert_eq!(sent[0].field("remoteAddr"), Some("203.0.113.5"));
        assert_eq!(sent[0].field("component"), Some(module_path!()));
        assert!(sent[0]
            .field("call_site")
            .unwrap()
            .starts_with(&format!("{}:", file!())));

        assert_eq!(sent[1].short_message, "Hello, 世界!");
        assert_eq!(sent[1].level, Severity::LOG_WARNING);
        // Only the configured diagnostic tag is forwarded
        assert!(sent[1].field("attempt").is_none());
        assert!(sent[1].field("remoteAddr").is_none());
        assert!(reports.messages().is_empty());
    }

    #[test]
    fn span_context() {
        let shared = Shared::new();
        let reports = Reports::default();
        let subscriber = Registry::default().with(layer(&shared, &reports, false));
        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("request", remoteAddr = "198.51.100.7");
            let _guard = span.enter();
            warn!("slow request");
            {
                let inner = info_span!("inner", remoteAddr = tracing::field::Empty);
                let _inner = inner.enter();
                inner.record("remoteAddr", "192.0.2.1");
                warn!("slower request");
                warn!(remoteAddr = "203.0.113.9", "slowest request");
            }
            {
                // A span without the tag doesn't hide its parent's.
                let other = info_span!("other", user = "alice");
                let _other = other.enter();
                warn!("still slow");
            }
        });

        let sent = shared.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].field("remoteAddr"), Some("198.51.100.7"));
        assert_eq!(sent[1].field("remoteAddr"), Some("192.0.2.1"));
        assert_eq!(sent[2].field("remoteAddr"), Some("203.0.113.9"));
        assert_eq!(sent[3].field("remoteAddr"), Some("198.51.100.7"));
        assert!(sent[3].field("user").is_none());
    }

    #[derive(Debug)]
    struct Boom;
    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }
    impl std::error::Error for Boom {}

    #[test]
    fn errors() {
        let shared = Shared::new();
        let reports = Reports::default();
        let subscriber = Registry::default().with(layer(&shared, &reports, true));
        tracing::subscriber::with_default(subscriber, || {
            let err = Boom;
            error!(error = &err as &dyn std::error::Error, "request failed");
        });

        let sent = shared.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].short_message, "request failed");
        assert_eq!(sent[0].full_message, "request failed\n\rboom\n");
        assert_eq!(sent[0].level, Severity::LOG_ERR);
    }

    #[test]
    fn internal_events_are_not_forwarded() {
        let shared = Shared::new();
        let reports = Reports::default();
        let subscriber = Registry::default().with(layer(&shared, &reports, false));
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: INTERNAL_TARGET, "talking to myself");
        });
        assert_eq!(shared.connects(), 0);
    }

    #[test]
    fn default_sink_reports_to_other_layers() {
        let shared = Shared::new();
        *shared.outcome.lock().unwrap() = Outcome::Failed;
        let layer = Layer::new(
            GelfHandler::builder()
                .graylog_host("udp:127.0.0.1")
                .connector(CountingConnector(shared.clone()))
                .build(),
        );
        let handler = layer.handler().clone();
        let capture = Capture::default();
        let subscriber = Registry::default().with(layer).with(capture.clone());
        tracing::subscriber::with_default(subscriber, || {
            error!("this will fail to send");
        });
        assert_eq!(shared.connects(), 1);
        assert!(shared.sent().is_empty());

        // The failure reached the capturing layer (& wasn't fed back into delivery).
        let events = capture.events();
        assert_eq!(events.len(), 2);
        assert!(events.contains(&(
            INTERNAL_TARGET.to_owned(),
            "Could not send GELF message".to_owned(),
            Some("WRITE_FAILURE".to_owned())
        )));
        assert!(events.contains(&(
            module_path!().to_owned(),
            "this will fail to send".to_owned(),
            None
        )));

        handler.close();
        assert_eq!(shared.closes(), 1);
    }

    #[test]
    fn default_sink_outside_the_layer() {
        let capture = Capture::default();
        let subscriber = Registry::default().with(capture.clone());
        tracing::subscriber::with_default(subscriber, || {
            TracingErrorSink.report("GELF collector hostname is empty!", None, ErrorClass::Write);
        });
        assert_eq!(
            capture.events(),
            vec![(
                INTERNAL_TARGET.to_owned(),
                "GELF collector hostname is empty!".to_owned(),
                Some("WRITE_FAILURE".to_owned())
            )]
        );
    }
}
