use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::ack::Acknowledgement;
use crate::dispatcher::Dispatcher;
use crate::packet::Packet;

/// An independent cursor over a [`Dispatcher`]'s broadcast stream.
///
/// A `Reader` is exclusively owned by whichever rule is currently consuming
/// it. `split` forks a new, independently-paced `Reader` so that speculative
/// alternatives (see [`crate::combinators::choice`]) can each advance the
/// shared input without disturbing one another.
pub struct Reader<R> {
    dispatcher: Dispatcher<R>,
    id: u64,
    packet_rx: mpsc::Receiver<Packet<R>>,
    ack_tx: mpsc::Sender<Acknowledgement>,
    current: Option<Packet<R>>,
    /// Packets pushed back in front of the live channel by `reprovide`, most
    /// recently pushed batch first. Never flattened: each batch drains fully
    /// before the next is considered, so that `has_buffered` sees an empty
    /// front as "move on to the next batch or the channel", not "done".
    reprovided: VecDeque<VecDeque<Packet<R>>>,
}

impl<R> Reader<R> {
    pub(crate) fn new(
        dispatcher: Dispatcher<R>,
        id: u64,
        packet_rx: mpsc::Receiver<Packet<R>>,
        ack_tx: mpsc::Sender<Acknowledgement>,
    ) -> Self {
        Reader { dispatcher, id, packet_rx, ack_tx, current: None, reprovided: VecDeque::new() }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn current(&self) -> Option<&Packet<R>> {
        self.current.as_ref()
    }

    fn has_buffered(&self) -> bool {
        self.reprovided.front().map_or(false, |batch| !batch.is_empty())
    }

    fn pop_buffered(&mut self) -> Option<Packet<R>> {
        while let Some(front) = self.reprovided.front_mut() {
            if let Some(packet) = front.pop_front() {
                if front.is_empty() {
                    self.reprovided.pop_front();
                }
                return Some(packet);
            }
            self.reprovided.pop_front();
        }
        None
    }
}

impl<R: Clone> Reader<R> {
    /// Return the next packet: from the reprovide buffer if non-empty,
    /// otherwise from the live channel.
    pub async fn next(&mut self) -> Packet<R> {
        if let Some(packet) = self.pop_buffered() {
            self.current = Some(packet.clone());
            return packet;
        }
        self.next_from_channel().await
    }

    /// Force a read from the live channel, bypassing the reprovide buffer.
    /// Used by [`crate::parallel::Parallel`] to keep a frozen branch's
    /// subscription in lockstep with the dispatcher even though its rule has
    /// already finished consuming.
    pub async fn next_from_channel(&mut self) -> Packet<R> {
        let packet = self
            .packet_rx
            .recv()
            .await
            .expect("dispatcher dropped this subscription's packet sender while still subscribed");
        self.current = Some(packet.clone());
        packet
    }

    /// Fork a new `Reader` subscribed to the same dispatcher, synchronized to
    /// this reader's current packet.
    pub async fn split(&self) -> Reader<R> {
        let mut clone = self.dispatcher.subscribe().await;
        clone.current = self.current.clone();
        clone
    }

    /// Push `packets` back in front of the cursor, to be replayed by future
    /// calls to `next` before the live channel is consulted again. If
    /// `include_current` is set, the current packet is appended after them.
    pub fn reprovide(&mut self, mut packets: Vec<Packet<R>>, include_current: bool) {
        if include_current {
            if let Some(current) = self.current.clone() {
                packets.push(current);
            }
        }
        if packets.is_empty() {
            return;
        }
        self.reprovided.push_front(packets.into_iter().collect());
    }
}

impl<R> Reader<R> {
    /// Acknowledge the last packet read from the channel. Dropped silently if
    /// the reprovide buffer is non-empty: in that case this reader is serving
    /// packets from memory and owes the dispatcher nothing for this step.
    pub async fn acknowledge(&mut self, ack: Acknowledgement) {
        if self.has_buffered() {
            return;
        }
        let _ = self.ack_tx.send(ack).await;
    }

    /// Acknowledge on the channel unconditionally, even if the reprovide
    /// buffer is non-empty. Used to definitively close out a split reader's
    /// subscription from outside the rule that owns it (see
    /// [`crate::combinators::choice::choice`] and
    /// [`crate::parallel::Parallel`]).
    pub async fn acknowledge_on_channel(&mut self, ack: Acknowledgement) {
        let _ = self.ack_tx.send(ack).await;
    }

    /// Replace the outward ack sender, returning the previous one. Used by
    /// [`crate::parallel::Parallel`] to intercept a branch's acks so it can
    /// forward them on the branch's behalf.
    pub(crate) fn replace_ack_sender(
        &mut self,
        sender: mpsc::Sender<Acknowledgement>,
    ) -> mpsc::Sender<Acknowledgement> {
        std::mem::replace(&mut self.ack_tx, sender)
    }
}
