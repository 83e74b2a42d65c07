use flume::{Receiver, Sender, TrySendError};

/// Single-slot handoff where the newest item wins.
///
/// Posting while an item is pending evicts the pending one. Clones share the slot.
pub struct Mailbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(1);
        Self { tx, rx }
    }

    /// Posts `item`. Returns how many pending items were evicted.
    pub fn post(&self, item: T) -> usize {
        let mut item = item;
        let mut evicted = 0;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(back)) => {
                    if self.rx.try_recv().is_ok() {
                        evicted += 1;
                    }
                    item = back;
                }
                // unreachable while `self` holds a receiver
                Err(TrySendError::Disconnected(_)) => return evicted,
            }
        }
    }

    pub fn take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Drops the pending item, if any.
    pub fn clear(&self) -> bool {
        self.take().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_item_wins() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.post(1), 0);
        assert_eq!(mailbox.post(2), 1);
        assert_eq!(mailbox.post(3), 1);
        assert_eq!(mailbox.take(), Some(3));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_clones_share_the_slot() {
        let producer = Mailbox::new();
        let consumer = producer.clone();
        producer.post("frame");
        assert!(!consumer.is_empty());
        assert!(consumer.clear());
        assert!(producer.is_empty());
    }
}
