use std::sync::Arc;

use crate::ack::Acknowledgement;
use crate::error::ParseError;
use crate::packet::Packet;
use crate::reader::Reader;
use crate::result::RuleResult;
use crate::rule::{rule, Rule};

/// Lift a per-item predicate into a packet-level one: a `None` packet or an
/// EOF packet never satisfies it, and a `None` predicate lifts to `None`.
pub fn token_predicate<R>(
    sub_predicate: Option<Arc<dyn Fn(&R) -> bool + Send + Sync>>,
) -> Option<Arc<dyn Fn(&Packet<R>) -> bool + Send + Sync>>
where
    R: Send + Sync + 'static,
{
    sub_predicate.map(|predicate| {
        let lifted: Arc<dyn Fn(&Packet<R>) -> bool + Send + Sync> =
            Arc::new(move |packet: &Packet<R>| !packet.eof && predicate(&packet.item));
        lifted
    })
}

/// Lift the trivial "return the packet's item" extractor to packet level.
pub fn token_return<R: Clone>() -> impl Fn(&Packet<R>) -> R {
    |packet: &Packet<R>| packet.item.clone()
}

/// Build a terminal [`Rule`] that matches one token against `predicate`.
///
/// Per the reader invariant that `current` always holds the first
/// not-yet-consumed packet: if `current` is empty this primes it with one
/// `next`, tests `predicate` against it without acknowledging yet, then
/// either acknowledges `KeepSubscription` and advances the lookahead by one
/// more `next` (success — `current` now holds the packet after the matched
/// one, itself not yet acknowledged — *unless* that lookahead packet is EOF,
/// in which case it is acknowledged `UnsubscribeOnSuccess` immediately: no
/// rule ever matches an EOF packet, so nothing downstream will ever examine
/// it to close out that ack the way a later `token` call closes out an
/// ordinary lookahead, and the dispatcher's `send` of that EOF packet would
/// otherwise never see every live subscriber acknowledge it), or
/// acknowledges `UnsubscribeOnError` and fails in place. This is the one
/// place in the crate where a packet is actually consumed; every combinator
/// above it only observes `current`.
pub fn token<R, E>(predicate: impl Fn(&R) -> bool + Send + Sync + 'static, expected: E) -> Rule<R, R, E>
where
    R: Clone + Default + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    rule(move |mut reader: Reader<R>| {
        let predicate = predicate.clone();
        let expected = expected.clone();
        async move {
            if reader.current().is_none() {
                reader.next().await;
            }
            let packet = reader.current().cloned().expect("primed above");
            if !packet.eof && predicate(&packet.item) {
                reader.acknowledge(Acknowledgement::KeepSubscription).await;
                let lookahead = reader.next().await;
                if lookahead.eof {
                    reader.acknowledge(Acknowledgement::UnsubscribeOnSuccess).await;
                }
                let offset = reader.current().map(|p| p.offset).unwrap_or(packet.offset + 1);
                RuleResult::ok(offset, packet.item, reader)
            } else {
                let offset = packet.offset;
                reader.acknowledge(Acknowledgement::UnsubscribeOnError).await;
                RuleResult::err(offset, R::default(), ParseError::syntax(Some(packet), vec![expected]), reader)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::rule::run_rule;

    #[tokio::test]
    async fn matches_a_single_char_and_leaves_reader_at_eof() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;

        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send('a', false).await;
            d.send('\0', true).await;
        });

        let result = run_rule(token::<char, &'static str>(|c| *c == 'a', "the letter a"), reader).await;
        sender.await.unwrap();

        assert!(result.is_ok());
        assert_eq!(result.value, 'a');
        assert!(result.reader.current().unwrap().eof);
    }

    #[tokio::test]
    async fn mismatch_fails_without_advancing() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let reader = dispatcher.subscribe().await;

        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send('x', false).await;
            d.send('\0', true).await;
        });

        let result = run_rule(token::<char, &'static str>(|c| *c == 'a', "the letter a"), reader).await;
        sender.await.unwrap();

        assert!(result.is_err());
        match result.error.unwrap() {
            ParseError::Syntax(s) => {
                assert_eq!(s.found.unwrap().item, 'x');
                assert_eq!(s.expected, vec!["the letter a"]);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn token_predicate_lifts_and_rejects_eof() {
        let lifted = token_predicate::<char>(Some(Arc::new(|c: &char| *c == 'a'))).unwrap();
        assert!(lifted(&Packet::new(0, 'a', false)));
        assert!(!lifted(&Packet::eof(1)));
    }

    #[test]
    fn token_return_extracts_the_item() {
        let extract = token_return::<u32>();
        assert_eq!(extract(&Packet::new(3, 42, false)), 42);
    }
}
