use std::sync::Arc;

use context_redact_logger::{
    Context, ContextLogger, ContextValue, ContextualLog, LogBridge, LoggerWithContext, Severity,
    WriterSink,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Operation {
    action: String,
    name: String,
}

fn try_init_logger() -> Result<Arc<ContextLogger>, Box<dyn std::error::Error>> {
    let logger = ContextLogger::builder()
        .level(Severity::Info)
        .progname("contexted_log_sync")
        .global_context(Context::new().record("instance", "contexted_log_sync"))
        .sink(WriterSink::new(std::io::stdout()))
        .build();
    logger.register_secret("correct horse battery staple")?;

    let logger = Arc::new(logger);
    LogBridge::new(logger.clone()).try_init()?;
    Ok(logger)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = try_init_logger()?;

    log::info!("Initialized context logger");

    // Create a new context with properties
    {
        let _guard = logger.push_context(&Context::new().record("user_id", "12345"));

        log::info!(password = "correct horse battery staple"; "Logging in");

        // Create a nested context with additional properties
        let action = ContextValue::serde(Operation {
            action: "login".to_string(),
            name: "user".to_string(),
        })?;
        logger.with_context(&Context::new().record("action", action), || {
            logger.info("User logged in successfully");
        });

        log::info!("Login completed");
    }

    let sessions = LoggerWithContext::for_log_source(logger.clone(), "session_store");
    sessions.warn_with("Session store is almost full", Context::new().record("usage", 0.93));

    Ok(())
}
