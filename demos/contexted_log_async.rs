use std::{sync::Arc, time::Duration};

use context_redact_logger::{
    Context, ContextLogger, ContextValue, ContextualLog, FutureExt, LogBridge, WriterSink,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Operation {
    action: String,
    name: String,
}

fn try_init_logger() -> Result<Arc<ContextLogger>, Box<dyn std::error::Error>> {
    let logger = Arc::new(
        ContextLogger::builder()
            .global_context(Context::new().record("instance", "contexted_log_async"))
            .sink(WriterSink::new(std::io::stdout()))
            .build(),
    );
    logger.set_level("info")?;
    LogBridge::new(logger.clone()).try_init()?;
    Ok(logger)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = try_init_logger()?;

    log::info!("Initialized context logger");

    // Create a new context with properties.
    let log_context = Context::new().record("user_id", "12345");
    let login = Context::new().record(
        "action",
        ContextValue::serde(Operation {
            action: "login".to_string(),
            name: "user".to_string(),
        })?,
    );
    let inner_logger = logger.clone();
    let first_future = async move {
        log::info!("Logging in");
        // Create a nested context with additional properties
        async {
            log::info!("User logged in successfully");
            tokio::task::yield_now().await;
        }
        .in_log_context(&*inner_logger, &login)
        .await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        log::info!("Login completed");
    }
    .in_log_context(&*logger, &log_context);

    let log_context = Context::new()
        .record("name", "Alice")
        .record("age", 25)
        .record("married", true)
        .record("email", "alice@example.com");
    let second_future = async move {
        tokio::task::yield_now().await;

        log::info!("Another future pending");
        tokio::time::sleep(Duration::from_millis(100)).await;
        log::info!("Future completed");
    }
    .in_log_context(&*logger, &log_context);

    let log_context = Context::new()
        .record("name", "Bob")
        .record("age", 30)
        .record("email", "bob@example.com");
    let logout = Context::new().record(
        "operation",
        ContextValue::serde(Operation {
            action: "logout".to_owned(),
            name: "Bob".to_owned(),
        })?,
    );
    let task_logger = logger.clone();
    let third_future = tokio::spawn(
        async move {
            tokio::task::yield_now().await;

            log::info!("Third future pending");
            tokio::time::sleep(Duration::from_millis(100)).await;

            task_logger.with_context(&logout, || log::info!("Third future completed"));
        }
        .in_log_context(&*logger, &log_context),
    );

    let ((), (), res) = tokio::join!(first_future, second_future, third_future);
    res?;

    let context = Context::new()
        .record("name", "Charlie")
        .record("age", 35)
        .record("email", "charlie@example.com");

    let _guard = logger.push_context(&context);

    log::info!("Last call completed");

    Ok(())
}
