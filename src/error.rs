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
//! [tracing-gelf-handler](crate) errors & the error-reporting side channel.
//!
//! Nothing in this crate is permitted to raise a failure into the application's logging call
//! sites. Instead, every failure is turned into an [`Error`] and handed to an [`ErrorSink`],
//! along with a short human-readable message and an [`ErrorClass`].

use backtrace::Backtrace;
use tracing::{
    dispatcher,
    field::{display, FieldSet, Value},
    subscriber::{Interest, NoSubscriber},
    Dispatch, Event, Level, Metadata,
};
use tracing_core::{callsite::Callsite, identify_callsite, Kind};

use std::cell::RefCell;

/// The `tracing` target under which this crate reports on itself.
///
/// [`Layer`](crate::layer::Layer) drops any event carrying this target, so that reporting a
/// failure can never loop back around into another delivery attempt.
pub const INTERNAL_TARGET: &str = "tracing_gelf_handler::internal";

/// [tracing-gelf-handler](crate) error type
///
/// This crate eschews libraries like [thiserror] & [anyhow] in favor of a straightforward
/// enumeration with a few match arms chosen on the basis of what the error sink will need to
/// report.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
#[non_exhaustive]
pub enum Error {
    /// The collector's hostname could not be resolved
    UnknownHost {
        host: String,
        source: std::io::Error,
        back: Backtrace,
    },
    /// Failed to set-up (bind or connect) a socket
    Socket {
        source: std::io::Error,
        back: Backtrace,
    },
    /// General I/O error on an established transport
    Io {
        source: std::io::Error,
        back: Backtrace,
    },
    /// Failed to encode a message as GELF JSON
    Encoding {
        source: serde_json::Error,
        back: Backtrace,
    },
    /// Failed to substitute parameters into a message
    Format {
        message: String,
        reason: String,
        back: Backtrace,
    },
    /// Failed to fetch the local hostname
    NoHostname {
        source: std::io::Error,
        back: Backtrace,
    },
    /// A configured port was not a valid port number
    BadPort { text: String, back: Backtrace },
    /// A configured level was not a recognizable severity
    BadLevel { text: String, back: Backtrace },
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::UnknownHost { host, source, .. } => {
                write!(f, "Couldn't resolve GELF collector {}: {}", host, source)
            }
            Error::Socket { source, .. } => write!(f, "Socket error: {}", source),
            Error::Io { source, .. } => write!(f, "I/O error: {}", source),
            Error::Encoding { source, .. } => {
                write!(f, "While encoding a GELF message, got {}", source)
            }
            Error::Format {
                message, reason, ..
            } => write!(
                f,
                "While substituting parameters into {:?}, got {}",
                message, reason
            ),
            Error::NoHostname { source, .. } => {
                write!(f, "Failed to fetch the local hostname: {}", source)
            }
            Error::BadPort { text, .. } => write!(f, "{:?} is not a valid port", text),
            Error::BadLevel { text, .. } => write!(f, "{:?} is not a recognized level", text),
            _ => write!(f, "Other tracing-gelf-handler error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::UnknownHost { back, .. } => write!(f, "{}\n{:#?}", self, back),
            Error::Socket { back, .. } => write!(f, "{}\n{:#?}", self, back),
            Error::Io { back, .. } => write!(f, "{}\n{:#?}", self, back),
            Error::Encoding { back, .. } => write!(f, "{}\n{:#?}", self, back),
            Error::Format { back, .. } => write!(f, "{}\n{:#?}", self, back),
            Error::NoHostname { back, .. } => write!(f, "{}\n{:#?}", self, back),
            _ => write!(f, "{}", self),
        }
    }
}

impl std::error::Error for Error {
    #[allow(unreachable_patterns)]
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UnknownHost { source, .. }
            | Error::Socket { source, .. }
            | Error::Io { source, .. }
            | Error::NoHostname { source, .. } => Some(source),
            Error::Encoding { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            source: err,
            back: Backtrace::new(),
        }
    }
}

impl std::convert::From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding {
            source: err,
            back: Backtrace::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         error reporting                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Broad classification of a reported failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Doesn't fit anywhere else (e.g. the local hostname couldn't be determined)
    Generic,
    /// Failed to construct a transport or to send a message
    Write,
    /// Failed to flush
    Flush,
    /// Failed to release the transport
    Close,
    /// Failed to open a resource
    Open,
    /// Failed to render a message
    Format,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ErrorClass::Generic => "GENERIC_FAILURE",
                ErrorClass::Write => "WRITE_FAILURE",
                ErrorClass::Flush => "FLUSH_FAILURE",
                ErrorClass::Close => "CLOSE_FAILURE",
                ErrorClass::Open => "OPEN_FAILURE",
                ErrorClass::Format => "FORMAT_FAILURE",
            }
        )
    }
}

/// Where failures go to be reported.
///
/// Implementations are invoked from inside the application's logging call sites (and, in the
/// case of [`GelfHandler`](crate::handler::GelfHandler), while holding its transport lock). They
/// must not panic, and must not log through the handler that is reporting to them.
pub trait ErrorSink: Send + Sync {
    fn report(&self, msg: &str, cause: Option<&Error>, class: ErrorClass);
}

impl<F> ErrorSink for F
where
    F: Fn(&str, Option<&Error>, ErrorClass) + Send + Sync,
{
    fn report(&self, msg: &str, cause: Option<&Error>, class: ErrorClass) {
        self(msg, cause, class)
    }
}

/// The default [`ErrorSink`]: re-emit the failure as a `tracing` event under [`INTERNAL_TARGET`].
///
/// Whatever other layers are installed (a `fmt` layer writing to stderr, say) will see these;
/// this crate's own [`Layer`](crate::layer::Layer) will not.
///
/// Failures are usually discovered while the [`Layer`](crate::layer::Layer) is itself handling an
/// event, and a scoped dispatcher (`set_default`, `with_default`) won't dispatch an event from
/// inside another. In that case the report is handed directly to the dispatcher the layer is
/// registered with. With no dispatcher to be had at all, the report goes to stderr.
#[derive(Clone, Debug, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, msg: &str, cause: Option<&Error>, class: ErrorClass) {
        let live = dispatcher::get_default(|current| !current.is::<NoSubscriber>());
        if live {
            match cause {
                Some(err) => {
                    tracing::error!(target: INTERNAL_TARGET, %class, error = %err, "{}", msg)
                }
                None => tracing::error!(target: INTERNAL_TARGET, %class, "{}", msg),
            }
            return;
        }
        let dispatched = REPORT_DISPATCH.with(|current| match &*current.borrow() {
            Some(dispatch) => {
                dispatch_report(dispatch, msg, cause, class);
                true
            }
            None => false,
        });
        if !dispatched {
            match cause {
                Some(err) => eprintln!("{} [{}]: {}: {}", INTERNAL_TARGET, class, msg, err),
                None => eprintln!("{} [{}]: {}", INTERNAL_TARGET, class, msg),
            }
        }
    }
}

thread_local! {
    /// The dispatcher to report to when the current one is unavailable
    static REPORT_DISPATCH: RefCell<Option<Dispatch>> = RefCell::new(None);
}

/// Restores the previous reporting dispatcher on drop.
pub(crate) struct ReportingScope(Option<Dispatch>);

/// Send [`TracingErrorSink`] reports on this thread to `dispatch` until the returned guard is
/// dropped.
pub(crate) fn report_to(dispatch: Option<Dispatch>) -> ReportingScope {
    ReportingScope(REPORT_DISPATCH.with(|current| current.replace(dispatch)))
}

impl Drop for ReportingScope {
    fn drop(&mut self) {
        let prior = self.0.take();
        REPORT_DISPATCH.with(|current| *current.borrow_mut() = prior);
    }
}

struct ReportCallsite;
static REPORT_CALLSITE: ReportCallsite = ReportCallsite;
static REPORT_META: Metadata<'static> = Metadata::new(
    "GELF delivery failure",
    INTERNAL_TARGET,
    Level::ERROR,
    Some(file!()),
    Some(line!()),
    Some(module_path!()),
    FieldSet::new(
        &["message", "class", "error"],
        identify_callsite!(&REPORT_CALLSITE),
    ),
    Kind::EVENT,
);

impl Callsite for ReportCallsite {
    fn set_interest(&self, _: Interest) {}
    fn metadata(&self) -> &'static Metadata<'static> {
        &REPORT_META
    }
}

fn dispatch_report(dispatch: &Dispatch, msg: &str, cause: Option<&Error>, class: ErrorClass) {
    let meta = REPORT_CALLSITE.metadata();
    if !dispatch.enabled(meta) {
        return;
    }
    let fields = meta.fields();
    if let (Some(message), Some(class_field), Some(error_field)) = (
        fields.field("message"),
        fields.field("class"),
        fields.field("error"),
    ) {
        let class = display(class);
        let cause = cause.map(display);
        dispatch.event(&Event::new(
            meta,
            &fields.value_set(&[
                (&message, Some(&msg as &dyn Value)),
                (&class_field, Some(&class as &dyn Value)),
                (&error_field, cause.as_ref().map(|cause| cause as &dyn Value)),
            ]),
        ));
    }
}
