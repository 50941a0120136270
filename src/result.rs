use crate::error::{Commission, ParseError};
use crate::reader::Reader;

/// The outcome of running a rule: either a value or an error, the offset at
/// which the rule finished, the smallest named structure it could be
/// attributed to, and the reader positioned just past what it consumed.
///
/// Named `RuleResult` (rather than `Result`) to avoid colliding with
/// [`std::result::Result`], which this type deliberately does not implement
/// `From`/`Into` conversions with: a parse failure is a value carried
/// alongside the reader, not an early return.
pub struct RuleResult<R, O, E> {
    pub offset: u64,
    pub value: O,
    pub structure_name: Option<String>,
    pub error: Option<ParseError<R, E>>,
    pub reader: Reader<R>,
}

impl<R, O, E> RuleResult<R, O, E> {
    pub fn ok(offset: u64, value: O, reader: Reader<R>) -> Self {
        RuleResult { offset, value, structure_name: None, error: None, reader }
    }

    pub fn err(offset: u64, value: O, error: ParseError<R, E>, reader: Reader<R>) -> Self {
        RuleResult { offset, value, structure_name: None, error: Some(error), reader }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Attribute this result's error, if any, to the named enclosing
    /// structure. A no-op on success, and a no-op if the error already
    /// carries a structure name (innermost wins).
    pub fn offer_structure(&mut self, commission: Commission, name: impl Into<String>) {
        if let Some(error) = &mut self.error {
            error.offer_structure(commission, name);
            if self.structure_name.is_none() {
                self.structure_name = error.structure().map(|s| s.to_string());
            }
        }
    }

    /// Replace the success value, keeping offset, structure, error, and
    /// reader untouched. Used by [`crate::combinators::sequence`] to
    /// substitute the running accumulator into a failing child's result, and
    /// by [`crate::combinators::map::map_rule`] to transform a success value.
    pub fn with_value<O2>(self, value: O2) -> RuleResult<R, O2, E> {
        RuleResult {
            offset: self.offset,
            value,
            structure_name: self.structure_name,
            error: self.error,
            reader: self.reader,
        }
    }
}
