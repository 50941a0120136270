use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::ack::Acknowledgement;
use crate::packet::Packet;
use crate::reader::Reader;

struct Subscription<R> {
    packet_tx: mpsc::Sender<Packet<R>>,
    ack_rx: Arc<Mutex<mpsc::Receiver<Acknowledgement>>>,
}

struct Inner<R> {
    next_offset: Mutex<u64>,
    next_cookie: Mutex<u64>,
    send_lock: Mutex<()>,
    subscriptions: Mutex<HashMap<u64, Subscription<R>>>,
}

/// Broadcasts a single producer's packet stream to any number of
/// independently-paced [`Reader`] subscribers.
///
/// Every packet sent is delivered to every subscriber live at send time, and
/// `send` does not return until every one of them has acknowledged it. New
/// subscriptions created while a broadcast is in flight only observe packets
/// sent after that broadcast completes.
pub struct Dispatcher<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for Dispatcher<R> {
    fn clone(&self) -> Self {
        Dispatcher { inner: self.inner.clone() }
    }
}

impl<R> Default for Dispatcher<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Dispatcher<R> {
    pub fn new() -> Self {
        Dispatcher {
            inner: Arc::new(Inner {
                next_offset: Mutex::new(0),
                next_cookie: Mutex::new(0),
                send_lock: Mutex::new(()),
                subscriptions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe a new [`Reader`] at the current broadcast position.
    pub async fn subscribe(&self) -> Reader<R> {
        let id = {
            let mut next_cookie = self.inner.next_cookie.lock().await;
            let id = *next_cookie;
            *next_cookie += 1;
            id
        };
        let (packet_tx, packet_rx) = mpsc::channel(1);
        let (ack_tx, ack_rx) = mpsc::channel(1);
        let subscription = Subscription { packet_tx, ack_rx: Arc::new(Mutex::new(ack_rx)) };
        self.inner.subscriptions.lock().await.insert(id, subscription);
        crate::debug::trace_subscribe(id);
        Reader::new(self.clone(), id, packet_rx, ack_tx)
    }

    /// Broadcast one packet, stamped with the next offset, to every live
    /// subscriber, and wait for every one of them to acknowledge it.
    pub async fn send(&self, item: R, eof: bool)
    where
        R: Clone,
    {
        let _serialize = self.inner.send_lock.lock().await;

        let offset = {
            let mut next_offset = self.inner.next_offset.lock().await;
            let offset = *next_offset;
            *next_offset += 1;
            offset
        };
        let packet = Packet::new(offset, item, eof);
        crate::debug::trace_send(&packet);

        let ack_receivers = {
            let subs = self.inner.subscriptions.lock().await;
            let mut ack_receivers = Vec::with_capacity(subs.len());
            for (cookie, subscription) in subs.iter() {
                let _ = subscription.packet_tx.send(packet.clone()).await;
                ack_receivers.push((*cookie, subscription.ack_rx.clone()));
            }
            ack_receivers
        };

        let mut to_remove = Vec::new();
        for (cookie, ack_rx) in ack_receivers {
            let mut rx = ack_rx.lock().await;
            if let Some(ack) = rx.recv().await {
                crate::debug::trace_ack(cookie, ack);
                if !ack.keeps_subscription() {
                    to_remove.push(cookie);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.inner.subscriptions.lock().await;
            for cookie in to_remove {
                subs.remove(&cookie);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::Acknowledgement;

    #[tokio::test]
    async fn single_subscriber_receives_offsets_in_order() {
        let dispatcher: Dispatcher<char> = Dispatcher::new();
        let mut reader = dispatcher.subscribe().await;

        let sender = tokio::spawn(async move {
            dispatcher.send('a', false).await;
            dispatcher.send('b', false).await;
            dispatcher.send('\0', true).await;
        });

        let p0 = reader.next().await;
        reader.acknowledge(Acknowledgement::KeepSubscription).await;
        assert_eq!(p0.offset, 0);
        assert_eq!(p0.item, 'a');

        let p1 = reader.next().await;
        reader.acknowledge(Acknowledgement::KeepSubscription).await;
        assert_eq!(p1.offset, 1);
        assert_eq!(p1.item, 'b');

        let p2 = reader.next().await;
        reader.acknowledge(Acknowledgement::UnsubscribeOnSuccess).await;
        assert!(p2.eof);

        sender.await.unwrap();
    }

    #[tokio::test]
    async fn two_subscribers_see_the_same_broadcast() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let mut r1 = dispatcher.subscribe().await;
        let mut r2 = dispatcher.subscribe().await;

        let d = dispatcher.clone();
        let sender = tokio::spawn(async move {
            d.send(42, false).await;
        });

        let (p1, p2) = tokio::join!(
            async {
                let p = r1.next().await;
                r1.acknowledge(Acknowledgement::KeepSubscription).await;
                p
            },
            async {
                let p = r2.next().await;
                r2.acknowledge(Acknowledgement::KeepSubscription).await;
                p
            }
        );
        assert_eq!(p1.item, 42);
        assert_eq!(p2.item, 42);
        assert_eq!(p1.offset, p2.offset);

        sender.await.unwrap();
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_broadcasts() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let mut early = dispatcher.subscribe().await;

        dispatcher.send(1, false).await;
        let p = early.next().await;
        early.acknowledge(Acknowledgement::KeepSubscription).await;
        assert_eq!(p.offset, 0);

        let mut late = dispatcher.subscribe().await;
        dispatcher.send(2, false).await;

        let p_late = late.next().await;
        late.acknowledge(Acknowledgement::KeepSubscription).await;
        assert_eq!(p_late.offset, 1);
        assert_eq!(p_late.item, 2);
    }
}
