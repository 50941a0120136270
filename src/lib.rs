//! Speculative, fully-backtracking recursive-descent parser combinators over
//! a broadcast token dispatcher.
//!
//! A single [`Dispatcher`] fans a token stream out to any number of
//! independent [`Reader`] cursors; [`Reader::split`] forks a new cursor at
//! the current position so that alternatives raced by
//! [`combinators::choice`] or [`combinators::repetition`] can each advance
//! the input on their own without disturbing one another or the dispatcher.
//! A [`Rule`] consumes a `Reader` and produces a [`RuleResult`]; the
//! `combinators` module builds rules out of smaller rules, and [`token`]
//! builds the terminal ones.

mod ack;
mod accumulator;
pub mod combinators;
mod debug;
mod dispatcher;
mod error;
mod location;
mod packet;
mod parallel;
mod reader;
mod result;
mod rule;
mod stream;
mod token;

pub use ack::Acknowledgement;
pub use accumulator::{bypass_accu, bypass_bi_accu, the, CombineAccu, CombineBiAccu, InitAccu};
pub use dispatcher::Dispatcher;
pub use error::{
    AmbiguityChoice, AmbiguityError, Commission, CompareExpect, InfiniteRepetitionError, ParseError, SyntaxError,
    merge_expectations,
};
pub use location::{Locatable, Location, RangeLocatable};
pub use packet::Packet;
pub use parallel::Parallel;
pub use reader::Reader;
pub use result::RuleResult;
pub use rule::{rule, run_rule, Rule, RuleFn, RuleFuture};
pub use stream::{send_bytes, send_runes, StreamError};
pub use token::{token, token_predicate, token_return};
