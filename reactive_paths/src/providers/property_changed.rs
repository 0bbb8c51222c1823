use super::changes_of;
use crate::{
    change::{ChangeEvent, Direction},
    object::{ObjectRef, TypeInfo},
    observable::Observable,
    path::Link,
    registry::ChangeSourceProvider,
};

/// Observes objects through the conventional "property changing" and
/// "property changed" events.
#[derive(Clone, Copy, Debug, Default)]
pub struct PropertyChangedProvider;

impl PropertyChangedProvider {
    /// The affinity claimed for conventional notifiers.
    pub const AFFINITY: i32 = 5;
}

impl ChangeSourceProvider for PropertyChangedProvider {
    fn affinity(&self, ty: TypeInfo, _link: &Link, direction: Direction) -> i32 {
        let caps = ty.capabilities();
        let supported = match direction {
            Direction::Before => caps.notifies_changing(),
            Direction::After => caps.notifies_changed(),
        };
        if supported {
            Self::AFFINITY
        } else {
            0
        }
    }

    fn observe(
        &self,
        sender: &ObjectRef,
        link: &Link,
        direction: Direction,
    ) -> Observable<ChangeEvent> {
        let notifications = match direction {
            Direction::Before => sender
                .as_property_changing()
                .map(|source| source.property_changing().observe()),
            Direction::After => sender
                .as_property_changed()
                .map(|source| source.property_changed().observe()),
        };
        match notifications {
            Some(notifications) => changes_of(notifications, sender, link),
            None => Observable::never(),
        }
    }

    fn name(&self) -> &'static str {
        "PropertyChangedProvider"
    }
}
