/// Flow-control reply a [`crate::Reader`] sends back to its [`crate::Dispatcher`]
/// after receiving a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Keep the subscription; expect more packets.
    KeepSubscription,
    /// Unsubscribe; the rule consuming this reader finished without error.
    UnsubscribeOnSuccess,
    /// Unsubscribe; the rule consuming this reader finished with an error.
    UnsubscribeOnError,
}

impl Acknowledgement {
    /// Whether this ack tells the dispatcher to keep the subscription alive.
    pub fn keeps_subscription(self) -> bool {
        matches!(self, Acknowledgement::KeepSubscription)
    }
}
