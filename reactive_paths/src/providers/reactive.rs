use super::changes_of;
use crate::{
    change::{ChangeEvent, Direction},
    object::{ObjectRef, TypeInfo},
    observable::Observable,
    path::Link,
    registry::ChangeSourceProvider,
};

/// Observes objects through their structured `changing`/`changed` streams.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReactiveObjectProvider;

impl ReactiveObjectProvider {
    /// The affinity claimed for reactive types.
    pub const AFFINITY: i32 = 10;
}

impl ChangeSourceProvider for ReactiveObjectProvider {
    fn affinity(&self, ty: TypeInfo, _link: &Link, _: Direction) -> i32 {
        if ty.capabilities().is_reactive() {
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
        // the type claimed the capability, but this instance may not have it
        let Some(reactive) = sender.as_reactive() else {
            return Observable::never();
        };
        let notifications = match direction {
            Direction::Before => reactive.changing(),
            Direction::After => reactive.changed(),
        };
        changes_of(notifications, sender, link)
    }

    fn name(&self) -> &'static str {
        "ReactiveObjectProvider"
    }
}
