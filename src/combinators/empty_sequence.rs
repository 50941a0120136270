use crate::reader::Reader;
use crate::result::RuleResult;
use crate::rule::{rule, Rule};

/// A rule that always succeeds at the reader's current offset without
/// consuming anything, producing a clone of `value` every time it runs.
///
/// Used on its own as the "nothing happened" alternative raced alongside a
/// real rule (see [`crate::combinators::repetition::repetition`] and
/// [`crate::combinators::repetition::option`]), and directly as the body of
/// [`crate::combinators::map::map_rule`] and
/// [`crate::combinators::choice::choice`] when no real rule is available.
pub fn empty_sequence<R, O, E>(value: O) -> Rule<R, O, E>
where
    R: Send + 'static,
    O: Clone + Send + 'static,
    E: Send + 'static,
{
    rule(move |reader: Reader<R>| {
        let value = value.clone();
        async move {
            let offset = reader.current().map(|p| p.offset).unwrap_or(0);
            RuleResult::ok(offset, value, reader)
        }
    })
}
