use std::fmt;
use std::sync::Arc;

use crate::packet::Packet;

/// An equality predicate over expectations, used by
/// [`crate::combinators::choice::choice`] to deduplicate the union of its
/// losing branches' expectations via [`merge_expectations`].
pub type CompareExpect<E> = Arc<dyn Fn(&E, &E) -> bool + Send + Sync>;

/// The role a named structure played at the point an error occurred: did the
/// offending token fail to *start*, *continue*, or *complete* it, or is the
/// relationship simply unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Commission {
    #[default]
    Unknown,
    Start,
    Continue,
    Complete,
}

/// One alternative that tied for longest match in an [`Ambiguity`](ParseError::Ambiguity) error.
#[derive(Debug, Clone)]
pub struct AmbiguityChoice<R> {
    pub structure: Option<String>,
    pub end_before: Packet<R>,
}

#[derive(Debug, Clone)]
pub struct SyntaxError<R, E> {
    pub found: Option<Packet<R>>,
    pub expected: Vec<E>,
    pub committed: Commission,
    pub structure: Option<String>,
    pub choice_errors: Vec<ParseError<R, E>>,
}

#[derive(Debug, Clone)]
pub struct AmbiguityError<R> {
    pub structure: Option<String>,
    pub starts_at: Packet<R>,
    pub choices: Vec<AmbiguityChoice<R>>,
}

#[derive(Debug, Clone)]
pub struct InfiniteRepetitionError<R> {
    pub found: Option<Packet<R>>,
    pub structure: Option<String>,
}

/// The three ways a rule can fail.
#[derive(Debug, Clone)]
pub enum ParseError<R, E> {
    /// The input did not match at a particular packet.
    Syntax(SyntaxError<R, E>),
    /// The grammar admits more than one maximal parse at this location; not
    /// recoverable by feeding more input.
    Ambiguity(AmbiguityError<R>),
    /// A nullable rule inside unbounded repetition would loop forever.
    InfiniteRepetition(InfiniteRepetitionError<R>),
}

impl<R, E> ParseError<R, E> {
    pub fn syntax(found: Option<Packet<R>>, expected: Vec<E>) -> Self {
        ParseError::Syntax(SyntaxError {
            found,
            expected,
            committed: Commission::Unknown,
            structure: None,
            choice_errors: Vec::new(),
        })
    }

    pub fn ambiguity(starts_at: Packet<R>, choices: Vec<AmbiguityChoice<R>>) -> Self {
        ParseError::Ambiguity(AmbiguityError { structure: None, starts_at, choices })
    }

    pub fn infinite_repetition(found: Option<Packet<R>>) -> Self {
        ParseError::InfiniteRepetition(InfiniteRepetitionError { found, structure: None })
    }

    /// Record the name of the smallest enclosing named structure, but only
    /// if none has been recorded yet — the innermost caller always wins.
    pub fn offer_structure(&mut self, commission: Commission, name: impl Into<String>) {
        match self {
            ParseError::Syntax(s) => {
                if s.structure.is_none() {
                    s.structure = Some(name.into());
                    s.committed = commission;
                }
            }
            ParseError::Ambiguity(a) => {
                if a.structure.is_none() {
                    a.structure = Some(name.into());
                }
            }
            ParseError::InfiniteRepetition(i) => {
                if i.structure.is_none() {
                    i.structure = Some(name.into());
                }
            }
        }
    }

    pub fn structure(&self) -> Option<&str> {
        match self {
            ParseError::Syntax(s) => s.structure.as_deref(),
            ParseError::Ambiguity(a) => a.structure.as_deref(),
            ParseError::InfiniteRepetition(i) => i.structure.as_deref(),
        }
    }

    /// The packet nearest to where this error was raised, for ordering
    /// alternatives by how deep they got.
    pub fn near(&self) -> Option<&Packet<R>> {
        match self {
            ParseError::Syntax(s) => s.found.as_ref(),
            ParseError::InfiniteRepetition(i) => i.found.as_ref(),
            ParseError::Ambiguity(a) => Some(&a.starts_at),
        }
    }

    pub fn expected(&self) -> &[E] {
        match self {
            ParseError::Syntax(s) => &s.expected,
            _ => &[],
        }
    }
}

fn describe_packet<R: fmt::Display>(packet: &Packet<R>) -> String {
    if packet.eof {
        "end of input".to_string()
    } else {
        packet.item.to_string()
    }
}

/// Join `items` with commas and a trailing "or", e.g. `"a, b, or c"`.
fn oxford_or(items: &[String]) -> String {
    match items.len() {
        0 => String::new(),
        1 => items[0].clone(),
        _ => {
            let (last, rest) = items.split_last().expect("non-empty");
            format!("{}, or {}", rest.join(", "), last)
        }
    }
}

impl<R: fmt::Display, E: fmt::Display> fmt::Display for SyntaxError<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.expected.is_empty() {
            let items: Vec<String> = self.expected.iter().map(|e| e.to_string()).collect();
            parts.push(format!("Expected {}", oxford_or(&items)));
        }
        if let Some(found) = &self.found {
            parts.push(format!("near {}", describe_packet(found)));
        }
        if let Some(name) = &self.structure {
            parts.push(match self.committed {
                Commission::Start => format!("to start {}", name),
                Commission::Continue => format!("to continue {}", name),
                Commission::Complete => format!("to complete {}", name),
                Commission::Unknown => format!("for {}", name),
            });
        }
        write!(f, "{}", parts.join(" "))
    }
}

impl<R: fmt::Display> fmt::Display for AmbiguityError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let structure_clause = match &self.structure {
            Some(name) => format!(" in {}", name),
            None => String::new(),
        };
        let same_end = self.choices.is_empty()
            || self
                .choices
                .windows(2)
                .all(|w| w[0].end_before.offset == w[1].end_before.offset);
        let overall_end = if same_end && !self.choices.is_empty() {
            format!(" and ending at {}", describe_packet(&self.choices[0].end_before))
        } else {
            String::new()
        };
        let choice_strs: Vec<String> = self
            .choices
            .iter()
            .map(|choice| {
                let name = choice.structure.clone().unwrap_or_else(|| "<anonymous choice>".into());
                if same_end {
                    name
                } else {
                    format!("{} ending before {}", name, describe_packet(&choice.end_before))
                }
            })
            .collect();
        write!(
            f,
            "Ambiguity{} starting at {}{}: Could be any of: {}",
            structure_clause,
            describe_packet(&self.starts_at),
            overall_end,
            oxford_or(&choice_strs)
        )
    }
}

impl<R: fmt::Display> fmt::Display for InfiniteRepetitionError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec!["Repetition".to_string()];
        if let Some(name) = &self.structure {
            parts.push(format!("in {}", name));
        }
        if let Some(found) = &self.found {
            parts.push(format!("near {}", describe_packet(found)));
        }
        parts.push("would be infinite: Iteration consumed no packets but did not fail, either".to_string());
        write!(f, "{}", parts.join(" "))
    }
}

impl<R: fmt::Display, E: fmt::Display> fmt::Display for ParseError<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Syntax(e) => e.fmt(f),
            ParseError::Ambiguity(e) => e.fmt(f),
            ParseError::InfiniteRepetition(e) => e.fmt(f),
        }
    }
}

impl<R: fmt::Debug + fmt::Display, E: fmt::Debug + fmt::Display> std::error::Error for ParseError<R, E> {}

/// Union the expectation lists of several alternatives, deduplicating with
/// `compare` (an equality predicate) when one is supplied. With no
/// `compare`, subsets are simply concatenated in order.
pub fn merge_expectations<E: Clone>(
    compare: Option<&dyn Fn(&E, &E) -> bool>,
    subsets: impl IntoIterator<Item = Vec<E>>,
) -> Vec<E> {
    let mut merged: Vec<E> = Vec::new();
    for subset in subsets {
        for item in subset {
            let duplicate = match compare {
                Some(eq) => merged.iter().any(|existing| eq(existing, &item)),
                None => false,
            };
            if !duplicate {
                merged.push(item);
            }
        }
    }
    merged
}
