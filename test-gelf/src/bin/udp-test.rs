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

//! Send one event at each level to a GELF collector listening on port 12201 on the local host
//! (over UDP). Override the collector with `GELF_HOST` & `GELF_PORT`.

use tracing::{debug, error, info, info_span, trace, warn};
use tracing_gelf_handler::{config::GelfConfig, layer::Layer, severity::Severity};
use tracing_subscriber::{
    layer::SubscriberExt, // Needed to get `with()`
    registry::Registry,
};

pub fn main() {
    let mut config = GelfConfig::from_env().unwrap();
    let host = config
        .graylog_host
        .take()
        .unwrap_or_else(|| "localhost".to_owned());
    let host = host
        .trim_start_matches("tcp:")
        .trim_start_matches("udp:");
    config.graylog_host = Some(format!("udp:{}", host));
    config.level = Severity::LOG_DEBUG;
    config.facility = Some("gelf-test".to_owned());

    let layer = Layer::with_config(config);
    let handler = layer.handler().clone();
    // Setup the real subsriber...
    let subscriber = Registry::default().with(layer);
    // and install it.
    let _guard = tracing::subscriber::set_default(subscriber);

    let span = info_span!("session", remoteAddr = "127.0.0.1");
    let _enter = span.enter();
    trace!("Hello, 世界!");
    debug!("Hello, 世界!");
    info!("Hello, 世界!");
    warn!("Hello, 世界!");
    error!("Hello, 世界!");

    handler.close();
}
