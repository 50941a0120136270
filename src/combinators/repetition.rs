use crate::ack::Acknowledgement;
use crate::accumulator::{the, CombineBiAccu, InitAccu};
use crate::combinators::empty_sequence::empty_sequence;
use crate::error::ParseError;
use crate::parallel::Parallel;
use crate::reader::Reader;
use crate::result::RuleResult;
use crate::rule::{rule, Rule};

/// Bounded or unbounded iteration of `item_rule`, optionally interleaved
/// with `separator_rule`, folding `(separator, item)` pairs into an
/// accumulator of type `A` via `combine_accu` (the very first item is
/// folded against `S::default()`, since there is no separator before it).
///
/// Each iteration races, over a fresh [`split`](Reader::split) pair,
/// [`empty_sequence`] against the real rule (item first, then separator) —
/// the empty branch is how the loop learns "this would fail" without
/// disturbing the reader it needs to fall back to. `separator_consumed` is
/// recomputed fresh at the top of every loop head from the separator
/// branch's own offset delta, and a nullable item rule with no separator
/// raises [`ParseError::InfiniteRepetition`] rather than spinning. A trailing
/// separator accepted under `allow_trailing_separator` is never itself
/// folded into the accumulator — it terminates the repetition with the
/// accumulator exactly as it stood after the last real item.
#[allow(clippy::too_many_arguments)]
pub fn repetition<R, A, I, S, E>(
    init_accu: Option<InitAccu<A>>,
    combine_accu: Option<CombineBiAccu<A, S, I>>,
    no_item_expectation: E,
    item_rule: Option<Rule<R, I, E>>,
    separator_rule: Option<Rule<R, S, E>>,
    min_items: u64,
    max_items: u64,
    allow_trailing_separator: bool,
) -> Rule<R, A, E>
where
    R: Clone + Send + 'static,
    A: Default + Send + 'static,
    I: Default + Clone + Send + 'static,
    S: Default + Clone + Send + 'static,
    E: Clone + Send + Sync + 'static,
{
    rule(move |reader: Reader<R>| {
        let init_accu = init_accu.clone();
        let combine_accu = combine_accu.clone();
        let no_item_expectation = no_item_expectation.clone();
        let item_rule = item_rule.clone();
        let separator_rule = separator_rule.clone();
        async move {
            run_repetition(
                init_accu,
                combine_accu,
                no_item_expectation,
                item_rule,
                separator_rule,
                min_items,
                max_items,
                allow_trailing_separator,
                reader,
            )
            .await
        }
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_repetition<R, A, I, S, E>(
    init_accu: Option<InitAccu<A>>,
    combine_accu: Option<CombineBiAccu<A, S, I>>,
    no_item_expectation: E,
    item_rule: Option<Rule<R, I, E>>,
    separator_rule: Option<Rule<R, S, E>>,
    min_items: u64,
    max_items: u64,
    allow_trailing_separator: bool,
    mut reader: Reader<R>,
) -> RuleResult<R, A, E>
where
    R: Clone + Send + 'static,
    A: Default + Send + 'static,
    I: Default + Clone + Send + 'static,
    S: Default + Clone + Send + 'static,
    E: Clone + Send + Sync + 'static,
{
    let Some(item_rule) = item_rule else {
        reader.acknowledge(Acknowledgement::UnsubscribeOnError).await;
        let current = reader.current().cloned();
        let offset = current.as_ref().map(|p| p.offset).unwrap_or(0);
        let error = ParseError::syntax(current, vec![no_item_expectation]);
        return RuleResult::err(offset, A::default(), error, reader);
    };

    let mut accumulator = init_accu.as_ref().map(|f| f()).unwrap_or_default();
    let mut have_item_count: u64 = 0;
    let mut separator_value = S::default();
    let mut separator_consumed = false;

    loop {
        if have_item_count == max_items {
            break;
        }

        let offset_before_item = reader.current().map(|p| p.offset);
        let split = reader.split().await;
        let mut item_parallel: Parallel<R, I, E> = Parallel::new();
        item_parallel.add(split, empty_sequence(I::default()));
        item_parallel.add(reader, item_rule.clone());
        let mut item_results = item_parallel.await_all().await;
        let item_result = item_results.remove(1);
        let mut empty_result = item_results.remove(0);

        if item_result.is_err() {
            if have_item_count >= min_items && (allow_trailing_separator || !separator_consumed) {
                // A trailing separator with no item after it is accepted, but
                // not folded into the accumulator: nothing was actually
                // parsed at this position, so `combine_accu` is not called
                // with a synthesized `I::default()` on its behalf. Folding
                // here would inject a spurious zero item into
                // item-accumulating grammars (`"1,2,"` with
                // `allow_trailing_separator` must yield `[1, 2]`, not
                // `[1, 2, I::default()]`).
                return empty_result.with_value(accumulator);
            }
            empty_result.reader.acknowledge_on_channel(Acknowledgement::UnsubscribeOnSuccess).await;
            return item_result.with_value(accumulator);
        }

        empty_result.reader.acknowledge_on_channel(Acknowledgement::UnsubscribeOnSuccess).await;
        reader = item_result.reader;
        if let Some(combine) = &combine_accu {
            accumulator = combine(accumulator, separator_value.clone(), item_result.value);
        }
        have_item_count += 1;
        separator_consumed = false;

        if have_item_count == max_items && (!allow_trailing_separator || separator_rule.is_none()) {
            break;
        }

        let Some(sep_rule) = &separator_rule else {
            if reader.current().map(|p| p.offset) == offset_before_item {
                reader.acknowledge_on_channel(Acknowledgement::UnsubscribeOnError).await;
                let error = ParseError::infinite_repetition(reader.current().cloned());
                let offset = offset_before_item.unwrap_or(0);
                return RuleResult::err(offset, accumulator, error, reader);
            }
            continue;
        };

        let offset_before_separator = reader.current().map(|p| p.offset);
        let split = reader.split().await;
        let mut sep_parallel: Parallel<R, S, E> = Parallel::new();
        sep_parallel.add(split, empty_sequence(S::default()));
        sep_parallel.add(reader, sep_rule.clone());
        let mut sep_results = sep_parallel.await_all().await;
        let sep_result = sep_results.remove(1);
        let mut sep_empty_result = sep_results.remove(0);

        if sep_result.is_err() {
            if have_item_count >= min_items {
                return sep_empty_result.with_value(accumulator);
            }
            sep_empty_result.reader.acknowledge_on_channel(Acknowledgement::UnsubscribeOnSuccess).await;
            return sep_result.with_value(accumulator);
        }

        reader = sep_result.reader;
        if reader.current().map(|p| p.offset) == offset_before_item {
            reader.acknowledge_on_channel(Acknowledgement::UnsubscribeOnError).await;
            let error = ParseError::infinite_repetition(reader.current().cloned());
            let offset = offset_before_item.unwrap_or(0);
            return RuleResult::err(offset, accumulator, error, reader);
        }

        sep_empty_result.reader.acknowledge_on_channel(Acknowledgement::UnsubscribeOnSuccess).await;
        separator_value = sep_result.value;

        if have_item_count == max_items {
            // Same rule as the trailing-separator accept path above: the
            // separator just consumed is trailing (no further item follows
            // because `max_items` is reached), so it is not folded into the
            // accumulator with a synthesized `I::default()`.
            let offset = reader.current().map(|p| p.offset).or(offset_before_separator).unwrap_or(0);
            return RuleResult::ok(offset, accumulator, reader);
        }

        separator_consumed = reader.current().map(|p| p.offset) != offset_before_separator;
    }

    let offset = reader.current().map(|p| p.offset).unwrap_or(0);
    RuleResult::ok(offset, accumulator, reader)
}

/// `repetition` specialized to zero-or-one occurrences: yields `none` if
/// `rule` does not match at the current offset, else the rule's value.
/// If `rule` itself is absent, this is just [`empty_sequence`].
pub fn option<R, O, E>(none: O, rule: Option<Rule<R, O, E>>) -> Rule<R, O, E>
where
    R: Clone + Send + 'static,
    O: Default + Clone + Send + Sync + 'static,
    E: Clone + Default + Send + Sync + 'static,
{
    match rule {
        None => empty_sequence(none),
        Some(inner) => repetition(
            Some(the(none)),
            Some(std::sync::Arc::new(|_accumulator: O, _separator: (), item: O| item)),
            E::default(),
            Some(inner),
            None,
            0,
            1,
            false,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::the;
    use crate::dispatcher::Dispatcher;
    use crate::error::ParseError;
    use crate::rule::run_rule;
    use crate::token::token;
    use std::sync::Arc;

    fn digit() -> Rule<char, char, &'static str> {
        token(|c: &char| c.is_ascii_digit(), "a digit")
    }

    fn comma() -> Rule<char, char, &'static str> {
        token(|c: &char| *c == ',', "a comma")
    }

    fn digit_list(min: u64, max: u64, trailing: bool) -> Rule<char, Vec<char>, &'static str> {
        repetition(
            Some(the(Vec::new())),
            Some(Arc::new(|mut acc: Vec<char>, _sep: char, item: char| {
                acc.push(item);
                acc
            })),
            "a digit",
            Some(digit()),
            Some(comma()),
            min,
            max,
            trailing,
        )
    }

    #[tokio::test]
    async fn separated_items_accumulate_in_order() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;
        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            for c in "1,2,3".chars() {
                d.send(c, false).await;
            }
            d.send('\0', true).await;
        });

        let result = run_rule(digit_list(1, u64::MAX, false), reader).await;
        sender.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(result.value, vec!['1', '2', '3']);
        assert!(result.reader.current().unwrap().eof);
    }

    #[tokio::test]
    async fn trailing_separator_rejected_by_default() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;
        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            for c in "1,2,".chars() {
                d.send(c, false).await;
            }
            d.send('\0', true).await;
        });

        let result = run_rule(digit_list(1, u64::MAX, false), reader).await;
        sender.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn trailing_separator_accepted_when_allowed() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;
        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            for c in "1,2,".chars() {
                d.send(c, false).await;
            }
            d.send('\0', true).await;
        });

        let result = run_rule(digit_list(1, u64::MAX, true), reader).await;
        sender.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(result.value, vec!['1', '2']);
    }

    #[tokio::test]
    async fn zero_bounds_consume_nothing() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let mut reader = dispatcher.subscribe().await;
        reader.next().await;

        let rule: Rule<char, Vec<char>, &'static str> = repetition(
            Some(the(Vec::new())),
            Some(Arc::new(|acc: Vec<char>, _sep: char, _item: char| acc)),
            "a digit",
            Some(digit()),
            Some(comma()),
            0,
            0,
            false,
        );
        let result = run_rule(rule, reader).await;
        assert!(result.is_ok());
        assert!(result.value.is_empty());
    }

    #[tokio::test]
    async fn nullable_item_without_separator_is_infinite() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;
        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send('x', false).await;
            d.send('\0', true).await;
        });

        let nullable: Rule<char, char, &'static str> = option('\0', None);
        let rule: Rule<char, Vec<char>, &'static str> = repetition(
            Some(the(Vec::new())),
            Some(Arc::new(|mut acc: Vec<char>, _sep: (), item: char| {
                acc.push(item);
                acc
            })),
            "anything",
            Some(nullable),
            None,
            0,
            u64::MAX,
            false,
        );
        let result = run_rule(rule, reader).await;
        sender.await.unwrap();

        assert!(result.is_err());
        match result.error.unwrap() {
            ParseError::InfiniteRepetition(_) => {}
            other => panic!("expected infinite repetition error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn option_matches_when_present() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;
        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send('1', false).await;
            d.send('\0', true).await;
        });

        let rule: Rule<char, char, &'static str> = option('-', Some(digit()));
        let result = run_rule(rule, reader).await;
        sender.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(result.value, '1');
    }

    #[tokio::test]
    async fn option_falls_back_to_none_when_absent() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;
        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send('x', false).await;
            d.send('\0', true).await;
        });

        let rule: Rule<char, char, &'static str> = option('-', Some(digit()));
        let result = run_rule(rule, reader).await;
        sender.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(result.value, '-');
    }
}
