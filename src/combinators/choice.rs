use crate::ack::Acknowledgement;
use crate::error::{merge_expectations, AmbiguityChoice, Commission, CompareExpect, ParseError, SyntaxError};
use crate::parallel::Parallel;
use crate::reader::Reader;
use crate::result::RuleResult;
use crate::rule::{rule, Rule};

/// Speculative alternation: race every non-null choice over its own
/// [`split`](Reader::split) of the reader (the first choice keeps the
/// original reader) and resolve by longest match.
///
/// - Zero choices: a Syntax error naming `no_choice_expectation`, reader
///   unsubscribed with an error.
/// - One error-free result at the maximum offset among error-free results:
///   that is the winner; every shorter error-free branch is acknowledged
///   `UnsubscribeOnSuccess` on its own channel (it is already inert — this
///   just records its final state with the dispatcher).
/// - More than one error-free result tied at the maximum offset: an
///   Ambiguity error naming every tied branch, carrying one of their
///   readers; every error-free branch (including the tied winners) is
///   acknowledged `UnsubscribeOnSuccess`.
/// - No error-free results, exactly one error: propagated unchanged.
/// - No error-free results, more than one error: a composite Syntax error at
///   the deepest failing branch, with the deduplicated union (via
///   `compare_expect`) of every failing branch's expectations and the full
///   list of sub-errors.
pub fn choice<R, O, E>(
    structure: impl Into<String>,
    no_choice_expectation: E,
    compare_expect: Option<CompareExpect<E>>,
    choices: Vec<Option<Rule<R, O, E>>>,
) -> Rule<R, O, E>
where
    R: Clone + Send + 'static,
    O: Default + Send + 'static,
    E: Clone + Send + Sync + 'static,
{
    let structure = structure.into();
    rule(move |reader: Reader<R>| {
        let structure = structure.clone();
        let no_choice_expectation = no_choice_expectation.clone();
        let compare_expect = compare_expect.clone();
        let choices = choices.clone();
        run_choice(structure, no_choice_expectation, compare_expect, choices, reader)
    })
}

async fn run_choice<R, O, E>(
    structure: String,
    no_choice_expectation: E,
    compare_expect: Option<CompareExpect<E>>,
    choices: Vec<Option<Rule<R, O, E>>>,
    mut reader: Reader<R>,
) -> RuleResult<R, O, E>
where
    R: Clone + Send + 'static,
    O: Default + Send + 'static,
    E: Clone + Send + 'static,
{
    let start_packet = reader.current().cloned();
    let mut non_null: Vec<Rule<R, O, E>> = choices.into_iter().flatten().collect();

    if non_null.is_empty() {
        reader.acknowledge(Acknowledgement::UnsubscribeOnError).await;
        let offset = start_packet.as_ref().map(|p| p.offset).unwrap_or(0);
        let mut error = ParseError::syntax(start_packet, vec![no_choice_expectation]);
        error.offer_structure(Commission::Unknown, structure);
        return RuleResult::err(offset, O::default(), error, reader);
    }

    // Split off one reader per choice after the first, before the original
    // reader is handed to `Parallel` for the first choice.
    let mut splits = Vec::with_capacity(non_null.len().saturating_sub(1));
    for _ in 1..non_null.len() {
        splits.push(reader.split().await);
    }

    let mut parallel: Parallel<R, O, E> = Parallel::new();
    let mut iter = non_null.drain(..);
    let first_choice = iter.next().expect("checked non-empty above");
    parallel.add(reader, first_choice);
    for (choice_rule, split_reader) in iter.zip(splits) {
        parallel.add(split_reader, choice_rule);
    }

    let results = parallel.await_all().await;

    let mut max_positive_offset: Option<u64> = None;
    for result in &results {
        if result.is_ok() {
            max_positive_offset = Some(max_positive_offset.map_or(result.offset, |m| m.max(result.offset)));
        }
    }

    let mut positives = Vec::new();
    let mut negatives = Vec::new();
    for result in results {
        if result.is_ok() {
            positives.push(result);
        } else {
            negatives.push(result);
        }
    }

    if !positives.is_empty() {
        let max_offset = max_positive_offset.expect("positives is non-empty");
        let winner_indices: Vec<usize> =
            positives.iter().enumerate().filter(|(_, r)| r.offset == max_offset).map(|(i, _)| i).collect();

        if winner_indices.len() == 1 {
            let winner_index = winner_indices[0];
            for (i, result) in positives.iter_mut().enumerate() {
                if i != winner_index {
                    result.reader.acknowledge_on_channel(Acknowledgement::UnsubscribeOnSuccess).await;
                }
            }
            return positives.remove(winner_index);
        }

        let mut ambiguity_choices = Vec::new();
        for result in &mut positives {
            if result.offset == max_offset {
                let end_before =
                    result.reader.current().cloned().expect("a finished branch's reader has a current packet");
                ambiguity_choices.push(AmbiguityChoice { structure: result.structure_name.clone(), end_before });
            }
            result.reader.acknowledge_on_channel(Acknowledgement::UnsubscribeOnSuccess).await;
        }
        let winner_reader = positives
            .into_iter()
            .find(|r| r.offset == max_offset)
            .expect("at least one winner at the max offset")
            .reader;
        let mut error = ParseError::ambiguity(
            start_packet.unwrap_or_else(|| winner_reader.current().cloned().expect("current packet available")),
            ambiguity_choices,
        );
        error.offer_structure(Commission::Unknown, structure);
        return RuleResult::err(max_offset, O::default(), error, winner_reader);
    }

    if negatives.len() == 1 {
        return negatives.into_iter().next().expect("checked len == 1");
    }

    let mut max_negative_offset = 0u64;
    let mut max_negative_index = 0usize;
    for (i, result) in negatives.iter().enumerate() {
        if i == 0 || result.offset > max_negative_offset {
            max_negative_offset = result.offset;
            max_negative_index = i;
        }
    }

    let mut expectations = Vec::new();
    let mut choice_errors = Vec::new();
    for result in &negatives {
        if let Some(error) = &result.error {
            let expected = error.expected();
            if !expected.is_empty() {
                expectations.push(expected.to_vec());
            }
            choice_errors.push(error.clone());
        }
    }
    let compare_fn = compare_expect.as_deref().map(|f| f as &dyn Fn(&E, &E) -> bool);
    let merged = merge_expectations(compare_fn, expectations);

    let max_result = negatives.remove(max_negative_index);
    let found = max_result.reader.current().cloned();
    let mut error = ParseError::Syntax(SyntaxError {
        found,
        expected: merged,
        committed: Commission::Unknown,
        structure: None,
        choice_errors,
    });
    error.offer_structure(Commission::Unknown, structure);
    RuleResult::err(max_negative_offset, max_result.value, error, max_result.reader)
}
