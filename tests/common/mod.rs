//! Shared test scaffolding.

#![allow(dead_code)]

use std::sync::Arc;
use trellis::{HandlerFn, RequestContext};

/// Install a fmt subscriber once per test binary so failing tests print the
/// framework's structured logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Handler that ends the request with 200 and `marker` as the body.
pub fn ok_handler(marker: &'static str) -> HandlerFn {
    Arc::new(move |ctx: &mut RequestContext| {
        ctx.end(200, Some(marker.as_bytes()));
        Ok(())
    })
}
