use crate::accumulator::{CombineAccu, InitAccu};
use crate::reader::Reader;
use crate::result::RuleResult;
use crate::rule::{rule, run_rule, Rule};

/// Run `children` serially over one shared reader, folding each child's
/// value into an accumulator with `combine_accu` (starting from
/// `init_accu()`, or `A::default()` if no initializer is given).
///
/// `None` entries in `children` are skipped entirely — this mirrors grammars
/// that conditionally omit a piece of a sequence at rule-construction time
/// rather than at parse time. The first child that fails stops the sequence;
/// its error is propagated with the accumulator as it stood just before that
/// child ran, per [`RuleResult::with_value`].
pub fn sequence<R, A, P, E>(
    init_accu: Option<InitAccu<A>>,
    combine_accu: Option<CombineAccu<A, P>>,
    children: Vec<Option<Rule<R, P, E>>>,
) -> Rule<R, A, E>
where
    R: Send + 'static,
    A: Default + Send + 'static,
    P: Send + 'static,
    E: Send + 'static,
{
    rule(move |mut reader: Reader<R>| {
        let init_accu = init_accu.clone();
        let combine_accu = combine_accu.clone();
        let children = children.clone();
        async move {
            let mut accumulator = init_accu.as_ref().map(|f| f()).unwrap_or_default();
            for child in children.into_iter().flatten() {
                let child_result = run_rule(child, reader).await;
                if child_result.is_err() {
                    return child_result.with_value(accumulator);
                }
                if let Some(combine) = &combine_accu {
                    accumulator = combine(accumulator, child_result.value);
                }
                reader = child_result.reader;
            }
            let offset = reader.current().map(|p| p.offset).unwrap_or(0);
            RuleResult::ok(offset, accumulator, reader)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::the;
    use crate::dispatcher::Dispatcher;
    use crate::error::ParseError;
    use crate::token::token;
    use std::sync::Arc;

    fn match_char(expected: char) -> Rule<char, char, &'static str> {
        token(move |c: &char| *c == expected, "letter")
    }

    #[tokio::test]
    async fn folds_children_into_a_string() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;

        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send('a', false).await;
            d.send('b', false).await;
            d.send('\0', true).await;
        });

        let rule: Rule<char, String, &'static str> = sequence(
            Some(the(String::new())),
            Some(Arc::new(|mut acc: String, piece: char| {
                acc.push(piece);
                acc
            })),
            vec![Some(match_char('a')), Some(match_char('b'))],
        );
        let result = crate::rule::run_rule(rule, reader).await;
        sender.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(result.value, "ab");
    }

    #[tokio::test]
    async fn propagates_first_child_error() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;

        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send('a', false).await;
            d.send('x', false).await;
            d.send('\0', true).await;
        });

        let rule: Rule<char, String, &'static str> = sequence(
            Some(the(String::new())),
            Some(Arc::new(|mut acc: String, piece: char| {
                acc.push(piece);
                acc
            })),
            vec![Some(match_char('a')), Some(match_char('b'))],
        );
        let result = crate::rule::run_rule(rule, reader).await;
        sender.await.unwrap();

        assert!(result.is_err());
        match result.error.unwrap() {
            ParseError::Syntax(s) => assert_eq!(s.found.unwrap().item, 'x'),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }
}
