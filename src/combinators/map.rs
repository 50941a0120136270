use crate::error::ParseError;
use crate::reader::Reader;
use crate::result::RuleResult;
use crate::rule::{rule, run_rule, Rule};

/// Run `inner`, then remap its success value through `mapping`, leaving
/// offset, structure, error, and reader untouched.
///
/// If `inner` is `None`, synthesizes a Syntax error carrying `unmapped` as
/// the sole expectation instead of running anything.
pub fn map_rule<R, From, To, E>(
    inner: Option<Rule<R, From, E>>,
    unmapped: E,
    mapping: impl Fn(From) -> To + Send + Sync + 'static,
) -> Rule<R, To, E>
where
    R: Send + 'static,
    From: Send + 'static,
    To: Default + Send + 'static,
    E: Clone + Send + 'static,
{
    let mapping = std::sync::Arc::new(mapping);
    rule(move |reader: Reader<R>| {
        let inner = inner.clone();
        let unmapped = unmapped.clone();
        let mapping = mapping.clone();
        async move {
            match inner {
                None => {
                    let current = reader.current().cloned();
                    let offset = current.as_ref().map(|p| p.offset).unwrap_or(0);
                    RuleResult::err(offset, To::default(), ParseError::syntax(current, vec![unmapped]), reader)
                }
                Some(inner) => {
                    let result = run_rule(inner, reader).await;
                    let value = mapping(result.value);
                    result.with_value(value)
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::rule::run_rule;
    use crate::token::token;

    #[tokio::test]
    async fn maps_the_success_value() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;
        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send('a', false).await;
            d.send('\0', true).await;
        });

        let inner = token::<char, &'static str>(|c| *c == 'a', "a");
        let mapped: Rule<char, u32, &'static str> = map_rule(Some(inner), "unreachable", |c: char| c as u32);
        let result = run_rule(mapped, reader).await;
        sender.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(result.value, 'a' as u32);
    }

    #[tokio::test]
    async fn identity_mapping_preserves_offset_and_error() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;
        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send('x', false).await;
            d.send('\0', true).await;
        });

        let inner = token::<char, &'static str>(|c| *c == 'a', "a");
        let identity_mapped: Rule<char, char, &'static str> = map_rule(Some(inner), "unreachable", |c| c);
        let result = run_rule(identity_mapped, reader).await;
        sender.await.unwrap();

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_inner_rule_synthesizes_error() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let mut reader = dispatcher.subscribe().await;
        reader.next().await;

        let mapped: Rule<char, u32, &'static str> = map_rule(None, "no mapping available", |c: char| c as u32);
        let result = run_rule(mapped, reader).await;
        assert!(result.is_err());
    }
}
