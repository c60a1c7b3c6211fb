//! Event publishing seam between the engines and the realtime hub.

use crate::events::RealtimeEvent;

/// Sink for change events.
///
/// Publishing never blocks and never fails from the caller's point of
/// view: the mutation that produced the event has already been committed.
pub trait EventPublisher: Send + Sync + std::fmt::Debug + 'static {
    /// Hand an event over for fan-out.
    fn publish(&self, event: RealtimeEvent);
}
