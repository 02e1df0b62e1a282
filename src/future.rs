//! Context propagation across `.await` points.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context as TaskContext, Poll},
};

use pin_project::pin_project;

use crate::{
    Context, ContextualLog,
    store::{self, StoreKey},
};

/// Extension trait attaching a logging context to a future.
///
/// Thread-bound guards cannot follow a task that migrates between worker
/// threads, and two tasks interleaved on one thread would see each other's
/// guards. A wrapped future instead carries its context slot with it and
/// installs it only while it is being polled.
pub trait FutureExt: Future + Sized {
    /// Runs this future with `context` deep-merged on top of the logger's
    /// current context.
    fn in_log_context<L>(self, logger: &L, context: &Context) -> LogContextFuture<Self>
    where
        L: ContextualLog;
}

impl<F> FutureExt for F
where
    F: Future,
{
    fn in_log_context<L>(self, logger: &L, context: &Context) -> LogContextFuture<Self>
    where
        L: ContextualLog,
    {
        let scope = logger.scope();
        LogContextFuture {
            inner: self,
            key: scope.key(),
            context: Some(scope.stacked(context)),
        }
    }
}

#[pin_project]
#[derive(Debug)]
pub struct LogContextFuture<F> {
    #[pin]
    inner: F,
    key: StoreKey,
    context: Option<Arc<Context>>,
}

impl<F> Future for LogContextFuture<F>
where
    F: Future,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let previous = store::set_current(*this.key, this.context.take());
        let result = this.inner.poll(cx);
        // Whatever the task left installed is its context for the next poll.
        *this.context = store::set_current(*this.key, previous);

        result
    }
}
