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
//! A [`tracing-subscriber`] [`Layer`] implementation for forwarding [`tracing`] [`Event`]s to a
//! [GELF] collector such as [Graylog]
//!
//! [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//! [`tracing`]: https://docs.rs/tracing/0.1.35/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//! [Graylog]: https://graylog.org/
//!
//! # Introduction
//!
//! The Graylog Extended Log Format (GELF) is a JSON message format for structured log records: a
//! `short_message`, an optional `full_message`, a timestamp, a syslog severity level, the
//! originating host & an open-ended set of "additional" fields (named with a leading underscore).
//! Collectors accept GELF messages over UDP (chunked, when a message won't fit in a single
//! datagram) or over TCP (each message terminated by a NUL byte).
//!
//! This crate is organized as a small pipeline:
//!
//! 1. a [`LogRecord`](record::LogRecord) is checked against the configured severity threshold &
//!    filter
//! 2. its message is [rendered](render) (placeholders substituted, the short form truncated, any
//!    attached error's trace appended to the full form)
//! 3. a [`GelfMessage`](message::GelfMessage) is [built](builder) from the record & the
//!    [configuration](config)
//! 4. the message is handed to a [transport](transport), which is only opened when the first
//!    message is published & which is re-opened if opening it failed
//!
//! Failures never propagate to the code doing the logging; they're handed to an
//! [`ErrorSink`](error::ErrorSink) instead.
//!
//! # Usage
//!
//! [`GelfHandler`](handler::GelfHandler) can be used on its own:
//!
//! ```no_run
//! use tracing_gelf_handler::{
//!     handler::GelfHandler,
//!     record::{Param, Record},
//!     severity::SourceLevel,
//! };
//!
//! let handler = GelfHandler::builder()
//!     .graylog_host("tcp:graylog.example.com")
//!     .facility("billing")
//!     .additional_field("environment", "production")
//!     .build();
//! handler.publish(
//!     &Record::new(SourceLevel::Warning, "Invoice {0} is overdue")
//!         .param(Param::from(1187_i64))
//!         .component("billing::invoices"),
//! );
//! handler.close();
//! ```
//!
//! but is more commonly wrapped in a [`Layer`](layer::Layer):
//!
//! ```no_run
//! use tracing::info;
//! use tracing_gelf_handler::layer::Layer;
//! use tracing_subscriber::registry::Registry;
//! use tracing_subscriber::layer::SubscriberExt; // Needed to get `with()`
//!
//! // Read GELF_HOST, GELF_PORT & friends from the environment.
//! let subscriber = Registry::default().with(Layer::try_from_env().unwrap());
//! let _guard = tracing::subscriber::set_default(subscriber);
//!
//! info!(remoteAddr = "203.0.113.5", "Hello, world!");
//! ```
//!
//! Problems encountered while delivering messages are, by default, reported as [`tracing`]
//! events with target [`INTERNAL_TARGET`](error::INTERNAL_TARGET); the [`Layer`](layer::Layer)
//! never forwards those, so they may be safely routed to another layer (stderr, say).

pub mod builder;
pub mod config;
pub mod error;
pub mod handler;
pub mod layer;
pub mod message;
pub mod record;
pub mod render;
pub mod severity;
pub mod transport;
