use std::collections::VecDeque;

use crate::batch::Batch;
use crate::event_bus::EventBus;

/// State that changes only in response to actions.
///
/// `reduce` must not block or await. Work that has to wait is handed back as
/// an effect through [`BatchContext::spawn`] and completes later as a new
/// action in its own batch.
pub trait Reducer {
    type Action;
    type Event;
    type Effect;

    fn reduce(&mut self, action: Self::Action, cx: &mut BatchContext<'_, Self::Action, Self::Event, Self::Effect>);
}

/// What a reducer may do while handling one action.
pub struct BatchContext<'a, A, E, X> {
    batch: Batch,
    follow_ups: VecDeque<A>,
    effects: Vec<X>,
    bus: &'a mut EventBus<E>,
}

impl<'a, A, E, X> BatchContext<'a, A, E, X> {
    pub fn batch(&self) -> Batch {
        self.batch
    }

    /// Queues `action` to run in the current batch, after the actions already
    /// queued.
    pub fn dispatch(&mut self, action: A) {
        self.follow_ups.push_back(action);
    }

    /// Hands `effect` to the caller once the batch has drained.
    pub fn spawn(&mut self, effect: X) {
        self.effects.push(effect);
    }

    pub fn emit(&mut self, event: E) {
        self.bus.emit(self.batch, event);
    }
}

#[derive(Debug)]
pub struct BatchOutcome<X> {
    pub batch: Batch,
    /// Number of actions reduced, the initial one included.
    pub actions: usize,
    /// Effects spawned during the batch, in spawn order.
    pub effects: Vec<X>,
}

/// Runs actions to completion one batch at a time.
///
/// Ordering contract:
/// - Follow-up actions are reduced first-in first-out within their batch.
/// - Effects are returned only after the last follow-up has been reduced,
///   so no effect observes a half-applied batch.
/// - Batch indices increase by one per `run` call.
#[derive(Debug)]
pub struct Dispatcher<E> {
    next: Batch,
    bus: EventBus<E>,
}

impl<E> Default for Dispatcher<E> {
    fn default() -> Self {
        Self {
            next: Batch::default(),
            bus: EventBus::new(),
        }
    }
}

impl<E> Dispatcher<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(&self) -> &EventBus<E> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus<E> {
        &mut self.bus
    }

    /// Index the next batch will get.
    pub fn next_batch(&self) -> Batch {
        self.next
    }

    pub fn run<R>(&mut self, reducer: &mut R, action: R::Action) -> BatchOutcome<R::Effect>
    where
        R: Reducer<Event = E>,
    {
        let batch = self.next;
        self.next = batch.next();

        let mut cx = BatchContext {
            batch,
            follow_ups: VecDeque::from([action]),
            effects: Vec::new(),
            bus: &mut self.bus,
        };
        let mut actions = 0usize;
        while let Some(next) = cx.follow_ups.pop_front() {
            actions += 1;
            reducer.reduce(next, &mut cx);
        }

        BatchOutcome {
            batch,
            actions,
            effects: cx.effects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Add(i32),
        Double,
        Fetch,
    }

    #[derive(Default)]
    struct Counter {
        value: i32,
        seen: Vec<i32>,
    }

    impl Reducer for Counter {
        type Action = Action;
        type Event = i32;
        type Effect = &'static str;

        fn reduce(&mut self, action: Action, cx: &mut BatchContext<'_, Action, i32, &'static str>) {
            match action {
                Action::Add(n) => {
                    self.value += n;
                    if n > 1 {
                        cx.dispatch(Action::Double);
                        cx.dispatch(Action::Add(n - 1));
                    }
                }
                Action::Double => self.value *= 2,
                Action::Fetch => cx.spawn("fetch"),
            }
            self.seen.push(self.value);
            cx.emit(self.value);
        }
    }

    #[test]
    fn follow_ups_run_fifo_in_the_same_batch() {
        let mut d = Dispatcher::new();
        let mut c = Counter::default();
        let out = d.run(&mut c, Action::Add(2));
        // Add(2) -> 2, Double -> 4, Add(1) -> 5
        assert_eq!(c.seen, vec![2, 4, 5]);
        assert_eq!(out.actions, 3);
        assert!(d.bus().events().iter().all(|e| e.batch_index == 0));
    }

    #[test]
    fn effects_wait_for_the_batch_and_batches_advance() {
        let mut d = Dispatcher::new();
        let mut c = Counter::default();
        let first = d.run(&mut c, Action::Fetch);
        assert_eq!(first.effects, vec!["fetch"]);
        let second = d.run(&mut c, Action::Add(1));
        assert_eq!(second.batch.index, 1);
        assert!(second.effects.is_empty());
        assert_eq!(d.next_batch().index, 2);
        assert_eq!(d.bus_mut().drain().len(), 2);
    }
}
