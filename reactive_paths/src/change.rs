//! Change events emitted by providers and by path observations.

use crate::{
    error::Result,
    object::ObjectRef,
    path::{Link, Path},
    reflection::AccessorResolver,
    value::Value,
};
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// Whether to be notified just before or just after a member changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Notify immediately before the member changes. Values read at that
    /// point are the old values.
    Before,
    /// Notify after the member has changed.
    #[default]
    After,
}

impl Direction {
    /// Whether this is [`Direction::Before`].
    pub fn is_before(self) -> bool {
        matches!(self, Direction::Before)
    }
}

/// A notification that one link of a path changed.
///
/// `value` is often left out by providers, since the engine reads it anyway.
/// Use [`fetch_value`](ChangeEvent::fetch_value) to get it on demand.
///
/// An event without a sender marks a chain that stopped at a null
/// intermediate value.
#[derive(Clone)]
pub struct ChangeEvent {
    /// The object on which the change was reported.
    pub sender: Option<ObjectRef>,
    /// The link the change pertains to.
    pub link: Option<Link>,
    /// The new value, when it was requested.
    pub value: Option<Value>,
}

impl ChangeEvent {
    /// An event for `link` on `sender`, without a value.
    pub fn new(sender: ObjectRef, link: Link) -> Self {
        Self {
            sender: Some(sender),
            link: Some(link),
            value: None,
        }
    }

    /// Attaches the value.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// The synthetic event that seeds a chain with its root.
    pub(crate) fn root(value: Value) -> Self {
        Self {
            sender: None,
            link: None,
            value: Some(value),
        }
    }

    /// The marker for a link that cannot be reached because the previous
    /// value in the chain is null.
    pub fn incomplete(link: Link) -> Self {
        Self {
            sender: None,
            link: Some(link),
            value: None,
        }
    }

    /// Whether the event has a sender, i.e. the chain reached this link.
    pub fn is_complete(&self) -> bool {
        self.sender.is_some()
    }

    /// Returns the value, reading it from the sender when it was not
    /// captured. `None` for incomplete events.
    pub fn fetch_value(
        &self,
        resolver: &AccessorResolver,
    ) -> Result<Option<Value>> {
        if let Some(value) = &self.value {
            return Ok(Some(value.clone()));
        }
        match (&self.sender, &self.link) {
            (Some(sender), Some(link)) => {
                resolver.get_value(sender.as_ref(), link).map(Some)
            }
            _ => Ok(None),
        }
    }
}

impl Debug for ChangeEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("sender", &self.sender.clone().map(Value::Object))
            .field("link", &self.link)
            .field("value", &self.value)
            .finish()
    }
}

/// A change observed along a whole path.
///
/// Unlike [`ChangeEvent`], the value is always present.
#[derive(Clone)]
pub struct ObservedChange {
    /// The root object the path is observed on.
    pub sender: ObjectRef,
    /// The observed path.
    pub path: Path,
    /// The value at the end of the path.
    pub value: Value,
}

impl ObservedChange {
    /// Whether `self.sender` is `object`.
    pub fn is_from(&self, object: &ObjectRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.sender), Arc::as_ptr(object))
    }
}

impl Debug for ObservedChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedChange")
            .field("sender", &Value::Object(Arc::clone(&self.sender)))
            .field("path", &self.path.to_string())
            .field("value", &self.value)
            .finish()
    }
}
