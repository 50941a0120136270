use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::reader::Reader;
use crate::result::RuleResult;

pub type RuleFuture<R, O, E> = BoxFuture<'static, RuleResult<R, O, E>>;

/// A parsing rule: given ownership of a [`Reader`], produces a [`RuleResult`].
///
/// Modeled as a boxed-future trait object rather than via `async-trait`, so
/// that heterogeneous async closures can be stored behind one type and
/// cheaply cloned (via the `Arc` in [`Rule`]) when the same alternative is
/// raced across many branches, e.g. by [`crate::combinators::repetition`]
/// on every iteration.
pub trait RuleFn<R, O, E>: Send + Sync {
    fn call(&self, reader: Reader<R>) -> RuleFuture<R, O, E>;
}

impl<R, O, E, F, Fut> RuleFn<R, O, E> for F
where
    F: Fn(Reader<R>) -> Fut + Send + Sync,
    Fut: Future<Output = RuleResult<R, O, E>> + Send + 'static,
{
    fn call(&self, reader: Reader<R>) -> RuleFuture<R, O, E> {
        Box::pin(self(reader))
    }
}

/// A reference-counted, cheaply-cloneable handle to a [`RuleFn`].
pub type Rule<R, O, E> = Arc<dyn RuleFn<R, O, E>>;

/// Wrap a plain async closure as a [`Rule`].
pub fn rule<R, O, E, F, Fut>(f: F) -> Rule<R, O, E>
where
    F: Fn(Reader<R>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RuleResult<R, O, E>> + Send + 'static,
{
    Arc::new(f)
}

/// Run a rule to completion by spawning it as its own task and awaiting the
/// result — the same mechanism [`crate::parallel::Parallel`] uses per branch,
/// exposed directly for driving a single top-level rule over a stream.
pub async fn run_rule<R, O, E>(rule: Rule<R, O, E>, reader: Reader<R>) -> RuleResult<R, O, E>
where
    R: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    let handle = tokio::spawn(async move { rule.call(reader).await });
    handle.await.expect("rule task panicked")
}
