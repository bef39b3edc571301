use crate::Node;
use smallvec::SmallVec;
use std::{fmt, str::FromStr};

/// Lifecycle events an [`Overlay`](crate::Overlay) can notify listeners of.
///
/// Only [`Event::Commit`] and [`Event::Rollback`] are ever emitted.
/// [`Event::Timeout`] and [`Event::Change`] accept listeners but nothing
/// fires them; they are reserved for callers that layer timeouts or change
/// notification on top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Event {
    Commit,
    Rollback,
    Timeout,
    Change,
}

impl Event {
    pub const ALL: [Event; 4] = [Event::Commit, Event::Rollback, Event::Timeout, Event::Change];

    pub fn name(self) -> &'static str {
        match self {
            Event::Commit => "commit",
            Event::Rollback => "rollback",
            Event::Timeout => "timeout",
            Event::Change => "change",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an [`Event`] from an unrecognized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent(pub String);

impl fmt::Display for UnknownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event {:?}, expected one of commit, rollback, timeout, change",
            self.0
        )
    }
}

impl std::error::Error for UnknownEvent {}

impl FromStr for Event {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .into_iter()
            .find(|event| event.name() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// A callback receiving the base node of the overlay that emitted the event.
pub type Listener = Box<dyn FnMut(&Node)>;

type Slot = SmallVec<[Listener; 1]>;

/// Listeners per event, in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    commit: Slot,
    rollback: Slot,
    timeout: Slot,
    change: Slot,
}

impl Listeners {
    fn slot_mut(&mut self, event: Event) -> &mut Slot {
        match event {
            Event::Commit => &mut self.commit,
            Event::Rollback => &mut self.rollback,
            Event::Timeout => &mut self.timeout,
            Event::Change => &mut self.change,
        }
    }

    pub fn register(&mut self, event: Event, listener: Listener) {
        self.slot_mut(event).push(listener);
    }

    pub fn count(&self, event: Event) -> usize {
        match event {
            Event::Commit => self.commit.len(),
            Event::Rollback => self.rollback.len(),
            Event::Timeout => self.timeout.len(),
            Event::Change => self.change.len(),
        }
    }

    /// Takes the listeners of `event` out for emission.
    ///
    /// Must be paired with [`Listeners::restore`].
    pub fn take(&mut self, event: Event) -> Slot {
        std::mem::take(self.slot_mut(event))
    }

    /// Puts back listeners taken by [`Listeners::take`], ahead of any
    /// registered while they were out.
    pub fn restore(&mut self, event: Event, mut taken: Slot) {
        let slot = self.slot_mut(event);
        taken.extend(slot.drain(..));
        *slot = taken;
    }
}
