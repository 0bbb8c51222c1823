use crate::{
    change::{ChangeEvent, Direction},
    object::{ObjectRef, TypeInfo},
    observable::Observable,
    path::Link,
    registry::ChangeSourceProvider,
};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::{any::TypeId, sync::Arc};

/// The fallback for objects without change notification: reports the
/// current value once, on subscription, and nothing afterwards.
///
/// The first time a type is observed this way, a warning is logged, since
/// later changes to it will go unnoticed.
#[derive(Debug)]
pub struct SnapshotProvider {
    warn: bool,
    warned: Mutex<FxHashSet<TypeId>>,
}

impl Default for SnapshotProvider {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SnapshotProvider {
    /// The affinity claimed for every type.
    pub const AFFINITY: i32 = 1;

    /// Creates the provider. With `warn` unset, no warning is ever logged.
    pub fn new(warn: bool) -> Self {
        Self {
            warn,
            warned: Mutex::new(FxHashSet::default()),
        }
    }

    /// Whether a warning has been logged for `ty`.
    pub fn has_warned(&self, ty: TypeInfo) -> bool {
        self.warned.lock().contains(&ty.id())
    }
}

impl ChangeSourceProvider for SnapshotProvider {
    fn affinity(&self, _: TypeInfo, _: &Link, _: Direction) -> i32 {
        Self::AFFINITY
    }

    fn observe(
        &self,
        sender: &ObjectRef,
        link: &Link,
        _: Direction,
    ) -> Observable<ChangeEvent> {
        let ty = sender.type_info();
        if self.warn && self.warned.lock().insert(ty.id()) {
            tracing::warn!(
                "`{}.{}` has no change notification; only its current value \
                 will be observed",
                ty.name(),
                link.name()
            );
        }
        Observable::just(ChangeEvent::new(Arc::clone(sender), link.clone()))
    }

    fn name(&self) -> &'static str {
        "SnapshotProvider"
    }
}
