//! Collision lifecycle events.
//!
//! Each step the simulator reports the set of touching body pairs. The event
//! system diffs that set against the previous step's and reports:
//!
//! - [`CollisionEventKind::Start`] for pairs that began touching,
//! - [`CollisionEventKind::Collision`] for pairs still touching,
//! - [`CollisionEventKind::End`] for pairs that separated.
//!
//! Events are delivered synchronously to pair, body and global listeners.
//! Listeners cannot reach the managers; they queue mutations in [`Deferred`]
//! and the owner applies them once delivery is finished.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{PhysicsError, Result};
use crate::handle::{BodyHandle, ConstraintHandle};
use crate::scene::EntityId;

/// Order-independent key for a pair of bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: BodyHandle,
    high: BodyHandle,
}

impl PairKey {
    /// Key for `{a, b}`. Returns `None` when `a == b`.
    pub fn new(a: BodyHandle, b: BodyHandle) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Both bodies, smaller handle first.
    pub fn bodies(&self) -> (BodyHandle, BodyHandle) {
        (self.low, self.high)
    }

    /// Returns true if `body` is one of the pair.
    pub fn contains(&self, body: BodyHandle) -> bool {
        self.low == body || self.high == body
    }
}

/// Phase of a contact between two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionEventKind {
    /// The pair started touching this step.
    Start,
    /// The pair was touching last step and still is.
    Collision,
    /// The pair touched last step and no longer does.
    End,
}

/// A collision notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    /// Phase.
    pub kind: CollisionEventKind,
    /// First body.
    pub body_a: BodyHandle,
    /// Second body.
    pub body_b: BodyHandle,
    /// Entity of the first body, if it still resolves.
    pub entity_a: Option<EntityId>,
    /// Entity of the second body, if it still resolves.
    pub entity_b: Option<EntityId>,
}

impl CollisionEvent {
    /// Pair key of the two bodies.
    pub fn pair(&self) -> Option<PairKey> {
        PairKey::new(self.body_a, self.body_b)
    }

    fn swapped(&self) -> Self {
        Self {
            kind: self.kind,
            body_a: self.body_b,
            body_b: self.body_a,
            entity_a: self.entity_b,
            entity_b: self.entity_a,
        }
    }
}

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Mutation queued by a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredCommand {
    /// Destroy a body.
    DestroyBody(BodyHandle),
    /// Remove a constraint.
    RemoveConstraint(ConstraintHandle),
    /// Stop delivering to a listener.
    UnregisterListener(ListenerId),
}

/// Commands queued during event delivery.
#[derive(Debug, Default)]
pub struct Deferred {
    commands: Vec<DeferredCommand>,
}

impl Deferred {
    /// Queue destruction of a body.
    pub fn destroy_body(&mut self, body: BodyHandle) {
        self.commands.push(DeferredCommand::DestroyBody(body));
    }

    /// Queue removal of a constraint.
    pub fn remove_constraint(&mut self, constraint: ConstraintHandle) {
        self.commands.push(DeferredCommand::RemoveConstraint(constraint));
    }

    /// Queue unregistration of a listener.
    pub fn unregister_listener(&mut self, listener: ListenerId) {
        self.commands.push(DeferredCommand::UnregisterListener(listener));
    }

    /// Queued commands in order.
    pub fn commands(&self) -> &[DeferredCommand] {
        &self.commands
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn drain(&mut self) -> std::vec::Drain<'_, DeferredCommand> {
        self.commands.drain(..)
    }
}

/// Listener callback.
pub type CollisionCallback = Box<dyn FnMut(&CollisionEvent, &mut Deferred)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerTarget {
    /// Events for one pair, reported with `first` as body A.
    Pair { key: PairKey, first: BodyHandle },
    /// Events involving a body, reported with that body as body A.
    Body(BodyHandle),
    /// Every event.
    Global,
}

impl ListenerTarget {
    fn involves(&self, body: BodyHandle) -> bool {
        match self {
            ListenerTarget::Pair { key, .. } => key.contains(body),
            ListenerTarget::Body(b) => *b == body,
            ListenerTarget::Global => false,
        }
    }
}

struct Listener {
    id: ListenerId,
    target: ListenerTarget,
    callback: CollisionCallback,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Turns per-step touching pairs into lifecycle events.
#[derive(Debug, Default)]
pub struct CollisionEventSystem {
    previous: BTreeSet<PairKey>,
    listeners: Vec<Listener>,
    next_listener: u64,
}

impl CollisionEventSystem {
    /// Create an empty event system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff this step's touching pairs against the previous step's.
    ///
    /// `entity_of` resolves bodies to entities for the emitted events.
    /// Events come out in pair order, `Start` and `Collision` interleaved,
    /// followed by every `End`.
    pub fn process(
        &mut self,
        touching: impl IntoIterator<Item = PairKey>,
        entity_of: impl Fn(BodyHandle) -> Option<EntityId>,
    ) -> Vec<CollisionEvent> {
        let current: BTreeSet<PairKey> = touching.into_iter().collect();
        let event = |kind, key: &PairKey| CollisionEvent {
            kind,
            body_a: key.low,
            body_b: key.high,
            entity_a: entity_of(key.low),
            entity_b: entity_of(key.high),
        };

        let mut events: Vec<CollisionEvent> = current
            .iter()
            .map(|key| {
                let kind = if self.previous.contains(key) {
                    CollisionEventKind::Collision
                } else {
                    CollisionEventKind::Start
                };
                event(kind, key)
            })
            .collect();
        events.extend(
            self.previous
                .difference(&current)
                .map(|key| event(CollisionEventKind::End, key)),
        );

        self.previous = current;
        events
    }

    /// Deliver events to listeners in registration order.
    pub fn dispatch(&mut self, events: &[CollisionEvent], deferred: &mut Deferred) {
        for event in events {
            let Some(key) = event.pair() else {
                continue;
            };
            for listener in &mut self.listeners {
                match listener.target {
                    ListenerTarget::Pair { key: k, first } if k == key => {
                        if first == event.body_a {
                            (listener.callback)(event, deferred);
                        } else {
                            (listener.callback)(&event.swapped(), deferred);
                        }
                    }
                    ListenerTarget::Body(body) if body == event.body_a => {
                        (listener.callback)(event, deferred);
                    }
                    ListenerTarget::Body(body) if body == event.body_b => {
                        (listener.callback)(&event.swapped(), deferred);
                    }
                    ListenerTarget::Global => (listener.callback)(event, deferred),
                    _ => {}
                }
            }
        }
    }

    /// Listen for events between two bodies. Events report `body_a` first.
    pub fn register_pair(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        callback: CollisionCallback,
    ) -> Result<ListenerId> {
        let key = PairKey::new(body_a, body_b).ok_or(PhysicsError::SelfPair(body_a))?;
        Ok(self.push(ListenerTarget::Pair { key, first: body_a }, callback))
    }

    /// Listen for events involving `body`. Events report `body` first.
    pub fn register_body(&mut self, body: BodyHandle, callback: CollisionCallback) -> ListenerId {
        self.push(ListenerTarget::Body(body), callback)
    }

    /// Listen for every event.
    pub fn register_global(&mut self, callback: CollisionCallback) -> ListenerId {
        self.push(ListenerTarget::Global, callback)
    }

    fn push(&mut self, target: ListenerTarget, callback: CollisionCallback) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(Listener {
            id,
            target,
            callback,
        });
        id
    }

    /// Stop delivering to a listener. Returns false if it was not registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Forget every pair and listener involving `body`.
    ///
    /// The next diff will not report `End` for pairs that were touching.
    pub fn purge_body(&mut self, body: BodyHandle) {
        self.previous.retain(|key| !key.contains(body));
        self.listeners.retain(|l| !l.target.involves(body));
    }

    /// Pairs with at least one pair listener.
    pub fn tracked_pairs(&self) -> BTreeSet<PairKey> {
        self.listeners
            .iter()
            .filter_map(|l| match l.target {
                ListenerTarget::Pair { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Pairs touching as of the last diff.
    pub fn touching(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.previous.iter().copied()
    }

    /// Returns true if the pair was touching as of the last diff.
    pub fn is_touching(&self, key: PairKey) -> bool {
        self.previous.contains(&key)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
