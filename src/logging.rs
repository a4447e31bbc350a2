//! # Structured Logging Module
//!
//! Environment-aware console logging using the tracing ecosystem.
//!
//! The level comes from `RUST_LOG` when set, otherwise from the environment
//! name (`LIFECYCLE_ENV`, falling back to `APP_ENV`). Set
//! `LIFECYCLE_LOG_FORMAT=json` for one JSON object per line.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging; safe to call more than once
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if use_json_format() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter)
                .boxed()
        };

        // A global subscriber may already be installed by the host application
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
            return;
        }

        tracing::info!(environment = %environment, "Structured logging initialized");
    });
}

fn get_environment() -> String {
    std::env::var("LIFECYCLE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_format() -> bool {
    std::env::var("LIFECYCLE_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for registry operations
pub fn log_registry_operation(operation: &str, handler_name: &str, priority: i32, status: &str) {
    tracing::info!(
        operation = %operation,
        handler_name = %handler_name,
        priority = priority,
        status = %status,
        "REGISTRY_OPERATION"
    );
}

/// Log structured data for dispatch operations
pub fn log_dispatch_operation(
    event: &str,
    entity_type: &str,
    subject_id: &str,
    applicable_handlers: usize,
) {
    tracing::debug!(
        event = %event,
        entity_type = %entity_type,
        subject_id = %subject_id,
        applicable_handlers = applicable_handlers,
        "DISPATCH_OPERATION"
    );
}
