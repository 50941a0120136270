/// One unit of input flowing through a [`crate::Dispatcher`].
///
/// Offsets are assigned by the dispatcher in strict monotonic order starting
/// at zero. The final packet of a stream is the one with `eof == true`; no
/// packet follows it.
#[derive(Debug, Clone)]
pub struct Packet<R> {
    pub offset: u64,
    pub item: R,
    pub eof: bool,
}

impl<R> Packet<R> {
    pub fn new(offset: u64, item: R, eof: bool) -> Self {
        Packet { offset, item, eof }
    }
}

impl<R: Default> Packet<R> {
    /// An EOF packet carrying the default value of `R`, at the given offset.
    pub fn eof(offset: u64) -> Self {
        Packet { offset, item: R::default(), eof: true }
    }
}
