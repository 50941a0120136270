use std::sync::Arc;

/// Produce the initial accumulator for a fold (e.g. the starting value of a
/// [`crate::combinators::sequence`] or [`crate::combinators::repetition`]).
pub type InitAccu<A> = Arc<dyn Fn() -> A + Send + Sync>;

/// Fold one more piece into the running accumulator.
pub type CombineAccu<A, P> = Arc<dyn Fn(A, P) -> A + Send + Sync>;

/// Fold one more separator/item pair into the running accumulator, as used
/// by [`crate::combinators::repetition`].
pub type CombineBiAccu<A, S, I> = Arc<dyn Fn(A, S, I) -> A + Send + Sync>;

/// An [`InitAccu`] that always yields a clone of `value` — for accumulators
/// with a fixed starting point, such as `option`'s `none`.
pub fn the<A: Clone + Send + Sync + 'static>(value: A) -> InitAccu<A> {
    Arc::new(move || value.clone())
}

/// A [`CombineAccu`] that forwards every piece to a side-effecting `sink` and
/// passes the accumulator through unchanged — for callers that want to
/// observe each item as it is folded (e.g. streaming them out to a channel)
/// without building an aggregate value.
pub fn bypass_accu<A, P, F>(sink: F) -> CombineAccu<A, P>
where
    A: Send + Sync + 'static,
    P: Send + Sync + 'static,
    F: Fn(&P) + Send + Sync + 'static,
{
    Arc::new(move |accu, piece| {
        sink(&piece);
        accu
    })
}

/// The two-argument counterpart of [`bypass_accu`] for [`CombineBiAccu`].
pub fn bypass_bi_accu<A, S, I, F>(sink: F) -> CombineBiAccu<A, S, I>
where
    A: Send + Sync + 'static,
    S: Send + Sync + 'static,
    I: Send + Sync + 'static,
    F: Fn(&S, &I) + Send + Sync + 'static,
{
    Arc::new(move |accu, sep, item| {
        sink(&sep, &item);
        accu
    })
}
