use crate::batch::Batch;

/// An event tagged with the batch that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    pub batch_index: u64,
    pub payload: E,
}

/// Outbox of events waiting to be observed.
///
/// Ordering contract:
/// - Events are kept in emission order, across batches.
/// - `drain()` hands them out in that order and empties the outbox.
#[derive(Debug)]
pub struct EventBus<E> {
    events: Vec<Event<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, batch: Batch, payload: E) {
        self.events.push(Event {
            batch_index: batch.index,
            payload,
        });
    }

    pub fn events(&self) -> &[Event<E>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Event<E>> {
        std::mem::take(&mut self.events)
    }
}
