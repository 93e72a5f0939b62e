use crate::domain::{DataSnapshot, Fill, OrderIntent};
use std::collections::VecDeque;

/// Messages passed between the orchestrator's stages within one instant.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Market(DataSnapshot),
    Order(OrderIntent),
    Fill(Fill),
}

/// FIFO channel; events are handled in the order they were pushed.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Queue `event` ahead of everything already waiting.
    pub fn push_front(&mut self, event: Event) {
        self.events.push_front(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use chrono::NaiveDateTime;

    #[test]
    fn fifo_order() {
        let mut queue = EventQueue::new();
        let order = |q| Event::Order(OrderIntent::market(NaiveDateTime::MIN, "X", OrderSide::Buy, q));
        queue.push(order(1.0));
        queue.push(Event::Market(DataSnapshot::new(NaiveDateTime::MIN)));
        queue.push(order(2.0));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(order(1.0)));
        assert!(matches!(queue.pop(), Some(Event::Market(_))));
        assert_eq!(queue.pop(), Some(order(2.0)));
        assert!(queue.is_empty());
    }

    #[test]
    fn push_front_jumps_the_queue() {
        let mut queue = EventQueue::new();
        queue.push(Event::Market(DataSnapshot::new(NaiveDateTime::MIN)));
        queue.push_front(Event::Order(OrderIntent::market(
            NaiveDateTime::MIN,
            "X",
            OrderSide::Sell,
            1.0,
        )));
        assert!(matches!(queue.pop(), Some(Event::Order(_))));
    }
}
