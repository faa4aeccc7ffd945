//! Ordered raw-packet subscriptions.
//!
//! Subscribers run in ascending `order`; ties run in subscription order. A
//! high order lets an observer see packets after the regular handlers have
//! had their turn.

use crate::protocol::RawPacket;
use tracing::trace;

/// Handle returned by [`HookBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Which packets a subscriber receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookFilter {
    /// Only packets sent by a real peer
    #[default]
    Real,
    /// Only packets injected by the proxy
    Synthetic,
    /// Everything
    All,
}

impl HookFilter {
    fn accepts(self, packet: &RawPacket) -> bool {
        match self {
            HookFilter::Real => !packet.synthetic,
            HookFilter::Synthetic => packet.synthetic,
            HookFilter::All => true,
        }
    }
}

type Handler = Box<dyn FnMut(&RawPacket)>;

struct Subscription {
    id: HookId,
    order: i32,
    filter: HookFilter,
    handler: Handler,
}

/// Delivers observed packets to subscribers
#[derive(Default)]
pub struct HookBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookBus")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl HookBus {
    /// Creates a bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler
    pub fn subscribe<F>(&mut self, order: i32, filter: HookFilter, handler: F) -> HookId
    where
        F: FnMut(&RawPacket) + 'static,
    {
        let id = HookId(self.next_id);
        self.next_id += 1;

        // Insert after every subscription with order <= ours to keep ties stable
        let position = self
            .subscriptions
            .iter()
            .position(|s| s.order > order)
            .unwrap_or(self.subscriptions.len());
        self.subscriptions.insert(
            position,
            Subscription {
                id,
                order,
                filter,
                handler: Box::new(handler),
            },
        );

        trace!("Subscribed hook {:?} at order {}", id, order);
        id
    }

    /// Removes a handler. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: HookId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    /// Returns true if the handle is currently subscribed
    pub fn is_subscribed(&self, id: HookId) -> bool {
        self.subscriptions.iter().any(|s| s.id == id)
    }

    /// Number of active subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Delivers a packet to every matching subscriber, returning how many ran
    pub fn deliver(&mut self, packet: &RawPacket) -> usize {
        let mut delivered = 0;
        for subscription in &mut self.subscriptions {
            if subscription.filter.accepts(packet) {
                (subscription.handler)(packet);
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Direction;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn packet(synthetic: bool) -> RawPacket {
        RawPacket::new(1, vec![4, 0, 1, 0], Direction::Incoming).synthetic(synthetic)
    }

    #[test]
    fn test_delivery_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = HookBus::new();

        for (order, tag) in [(999, "late"), (-10, "early"), (0, "first-zero"), (0, "second-zero")] {
            let seen = Rc::clone(&seen);
            bus.subscribe(order, HookFilter::All, move |_| seen.borrow_mut().push(tag));
        }

        assert_eq!(bus.deliver(&packet(false)), 4);
        assert_eq!(
            *seen.borrow(),
            vec!["early", "first-zero", "second-zero", "late"]
        );
    }

    #[test]
    fn test_filters() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = HookBus::new();
        let counter = Rc::clone(&count);
        bus.subscribe(0, HookFilter::Real, move |_| *counter.borrow_mut() += 1);
        let counter = Rc::clone(&count);
        bus.subscribe(0, HookFilter::Synthetic, move |_| *counter.borrow_mut() += 10);

        assert_eq!(bus.deliver(&packet(false)), 1);
        assert_eq!(bus.deliver(&packet(true)), 1);
        assert_eq!(*count.borrow(), 11);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = HookBus::new();
        let id = bus.subscribe(0, HookFilter::All, |_| {});
        assert!(bus.is_subscribed(id));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.is_empty());
        assert_eq!(bus.deliver(&packet(false)), 0);
    }
}
