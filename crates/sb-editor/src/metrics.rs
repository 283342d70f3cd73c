//! Observability collector injected into the board.

use sb_core::id::CardId;
use std::cell::Cell;
use std::rc::Rc;

/// Lifecycle events the board reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    Mounted(CardId),
    Unmounted(CardId),
}

pub trait Collector {
    fn record(&self, event: BoardEvent);
}

impl<T: Collector + ?Sized> Collector for Rc<T> {
    fn record(&self, event: BoardEvent) {
        (**self).record(event);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCollector;

impl Collector for NoopCollector {
    fn record(&self, _event: BoardEvent) {}
}

/// Counts mounted cards; logs each transition at debug level.
#[derive(Debug, Default)]
pub struct MountCounter {
    live: Cell<usize>,
    total: Cell<usize>,
}

impl MountCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cards currently mounted.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    /// Mounts since creation.
    pub fn total(&self) -> usize {
        self.total.get()
    }
}

impl Collector for MountCounter {
    fn record(&self, event: BoardEvent) {
        match event {
            BoardEvent::Mounted(id) => {
                self.live.set(self.live.get() + 1);
                self.total.set(self.total.get() + 1);
                log::debug!("{id} mounted, live: {}", self.live.get());
            }
            BoardEvent::Unmounted(id) => {
                self.live.set(self.live.get().saturating_sub(1));
                log::debug!("{id} unmounted, live: {}", self.live.get());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_tracks_live_and_total() {
        let counter = Rc::new(MountCounter::new());
        let shared: Box<dyn Collector> = Box::new(Rc::clone(&counter));
        let id = CardId::intern("metrics_a");
        shared.record(BoardEvent::Mounted(id));
        shared.record(BoardEvent::Mounted(id));
        shared.record(BoardEvent::Unmounted(id));
        assert_eq!(counter.live(), 1);
        assert_eq!(counter.total(), 2);
    }

    #[test]
    fn unmount_never_underflows() {
        let counter = MountCounter::new();
        counter.record(BoardEvent::Unmounted(CardId::intern("metrics_b")));
        assert_eq!(counter.live(), 0);
    }
}
