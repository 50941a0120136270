use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ack::Acknowledgement;
use crate::packet::Packet;
use crate::reader::Reader;
use crate::result::RuleResult;
use crate::rule::Rule;

enum State<R, O, E> {
    Running,
    Frozen { result: RuleResult<R, O, E>, skipped: Vec<Packet<R>> },
    Done { result: RuleResult<R, O, E> },
}

struct Branch<R, O, E> {
    outer_ack: mpsc::Sender<Acknowledgement>,
    inner_ack_rx: mpsc::Receiver<Acknowledgement>,
    handle: Option<JoinHandle<RuleResult<R, O, E>>>,
    state: State<R, O, E>,
}

/// Races N `(Reader, Rule)` branches that share one dispatcher, mediating
/// their acknowledgements so the dispatcher never stalls on a branch whose
/// rule has already finished.
///
/// A branch that finishes without error "wins but must wait": `Parallel`
/// overrides its final ack to `KeepSubscription` and, every round until the
/// last remaining branch resolves, drains one packet on its behalf and
/// forwards another `KeepSubscription` — the dispatcher thinks it is still a
/// live subscriber, so it must keep receiving and acking broadcasts. A
/// branch that finishes with an error forwards its real terminal ack and is
/// immediately, fully unsubscribed.
pub struct Parallel<R, O, E> {
    branches: Vec<Branch<R, O, E>>,
}

impl<R, O, E> Default for Parallel<R, O, E>
where
    R: Clone + Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, O, E> Parallel<R, O, E>
where
    R: Clone + Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        Parallel { branches: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Add a `(reader, rule)` branch. `reader`'s outward ack sender is
    /// intercepted: acks the rule sends are redirected here, to be mediated
    /// round by round in `await_all`.
    pub fn add(&mut self, mut reader: Reader<R>, rule: Rule<R, O, E>) {
        let (inner_tx, inner_ack_rx) = mpsc::channel(1);
        let outer_ack = reader.replace_ack_sender(inner_tx);
        let handle = tokio::spawn(async move { rule.call(reader).await });
        self.branches.push(Branch { outer_ack, inner_ack_rx, handle: Some(handle), state: State::Running });
    }

    /// Run every branch to completion, returning their results in the order
    /// they were added.
    pub async fn await_all(mut self) -> Vec<RuleResult<R, O, E>> {
        loop {
            let mut newly_frozen = vec![false; self.branches.len()];

            for (i, branch) in self.branches.iter_mut().enumerate() {
                if !matches!(branch.state, State::Running) {
                    continue;
                }
                let ack = branch.inner_ack_rx.recv().await.unwrap_or(Acknowledgement::UnsubscribeOnError);
                if ack.keeps_subscription() {
                    let _ = branch.outer_ack.send(Acknowledgement::KeepSubscription).await;
                    continue;
                }
                let handle = branch.handle.take().expect("a running branch still owns its join handle");
                let result = handle.await.expect("rule task panicked");
                if result.is_ok() {
                    // Override: this subscription must look alive to the
                    // dispatcher until every other branch is done.
                    let _ = branch.outer_ack.send(Acknowledgement::KeepSubscription).await;
                    newly_frozen[i] = true;
                    branch.state = State::Frozen { result, skipped: Vec::new() };
                } else {
                    let _ = branch.outer_ack.send(ack).await;
                    branch.state = State::Done { result };
                }
            }

            let still_running = self.branches.iter().any(|b| matches!(b.state, State::Running));

            for (i, branch) in self.branches.iter_mut().enumerate() {
                if newly_frozen[i] {
                    continue;
                }
                if let State::Frozen { result, skipped } = &mut branch.state {
                    let packet = result.reader.next_from_channel().await;
                    skipped.push(packet);
                    let _ = branch.outer_ack.send(Acknowledgement::KeepSubscription).await;
                }
            }

            if !still_running {
                break;
            }
        }

        let mut results = Vec::with_capacity(self.branches.len());
        for branch in self.branches {
            let Branch { outer_ack, state, .. } = branch;
            let (mut result, skipped) = match state {
                State::Frozen { result, skipped } => (result, skipped),
                State::Done { result } => (result, Vec::new()),
                State::Running => unreachable!("every branch is resolved once await_all returns"),
            };
            result.reader.replace_ack_sender(outer_ack);
            if !skipped.is_empty() {
                result.reader.reprovide(skipped, false);
            }
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;

    #[tokio::test]
    async fn a_winning_branch_is_kept_alive_until_the_other_finishes() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let r_fast = dispatcher.subscribe().await;
        let r_slow = dispatcher.subscribe().await;

        let mut parallel: Parallel<u32, &'static str, &'static str> = Parallel::new();
        parallel.add(
            r_fast,
            crate::rule::rule(|mut reader: Reader<u32>| async move {
                let p = reader.next().await;
                reader.acknowledge(Acknowledgement::UnsubscribeOnSuccess).await;
                RuleResult::ok(p.offset, "fast", reader)
            }),
        );
        parallel.add(
            r_slow,
            crate::rule::rule(|mut reader: Reader<u32>| async move {
                let _first = reader.next().await;
                reader.acknowledge(Acknowledgement::KeepSubscription).await;
                let second = reader.next().await;
                reader.acknowledge(Acknowledgement::UnsubscribeOnSuccess).await;
                RuleResult::ok(second.offset, "slow", reader)
            }),
        );

        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send(1, false).await;
            d.send(2, false).await;
        });

        let results = parallel.await_all().await;
        sender.await.unwrap();

        assert_eq!(results.len(), 2);
        let mut results = results.into_iter();
        let mut fast = results.next().unwrap();
        let slow = results.next().unwrap();
        assert_eq!(fast.value, "fast");
        assert_eq!(slow.value, "slow");

        // The fast branch's reader was kept subscribed through round 2 (so the
        // dispatcher didn't stall on it); the packet it was forced to consume
        // must be queued for replay, not lost.
        let replayed = fast.reader.next().await;
        assert_eq!(replayed.offset, 1);
        assert_eq!(replayed.item, 2);
    }
}
