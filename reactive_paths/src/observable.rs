//! A minimal push-based stream abstraction.
//!
//! An [`Observable`] is a recipe for a stream: nothing happens until it is
//! subscribed to, and every subscription runs the recipe again. Subscribing
//! returns a [`Subscription`], an RAII guard that tears the stream down when
//! dropped.
//!
//! Streams deliver values on the thread that produces them. No lock is held
//! while an observer runs, so an observer may emit, subscribe or unsubscribe
//! re-entrantly.
//!
//! Streams never complete; they either keep emitting or stop with an
//! [`Error`].

use crate::error::{Error, Result};
use futures::{
    channel::mpsc::{self, UnboundedReceiver},
    Stream, StreamExt,
};
use parking_lot::Mutex;
use std::{
    fmt::{self, Debug, Formatter},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Weak,
    },
    task::{Context, Poll},
};

/// Cancels a stream when dropped.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// A subscription that runs `teardown` once, when cancelled.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    /// Cancels the stream now. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

type NextFn<T> = Box<dyn Fn(T) + Send + Sync>;
type ErrorFn = Box<dyn Fn(Error) + Send + Sync>;

struct ObserverInner<T> {
    on_next: NextFn<T>,
    on_error: ErrorFn,
    stopped: AtomicBool,
}

/// The receiving end of a stream.
///
/// Once an error has been delivered, the observer ignores everything else.
pub struct Observer<T> {
    inner: Arc<ObserverInner<T>>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Observer<T> {
    /// An observer made of two callbacks.
    pub fn new(
        on_next: impl Fn(T) + Send + Sync + 'static,
        on_error: impl Fn(Error) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                on_next: Box::new(on_next),
                on_error: Box::new(on_error),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// An observer that passes errors through to `downstream` and handles
    /// values with `on_next`.
    fn forward<U: 'static>(
        downstream: Observer<U>,
        on_next: impl Fn(&Observer<U>, T) + Send + Sync + 'static,
    ) -> Self {
        let errors = downstream.clone();
        Observer::new(
            move |value| on_next(&downstream, value),
            move |err| errors.error(err),
        )
    }

    /// Delivers a value, unless the stream has stopped.
    pub fn next(&self, value: T) {
        if !self.inner.stopped.load(Ordering::Acquire) {
            (self.inner.on_next)(value);
        }
    }

    /// Stops the stream with an error. Only the first error is delivered.
    pub fn error(&self, err: Error) {
        if !self.inner.stopped.swap(true, Ordering::AcqRel) {
            (self.inner.on_error)(err);
        }
    }

    /// Whether an error has been delivered.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }
}

type SubscribeFn<T> = dyn Fn(Observer<T>) -> Subscription + Send + Sync;

/// A lazily evaluated stream of `T`.
pub struct Observable<T> {
    subscribe: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe: Arc::clone(&self.subscribe),
        }
    }
}

impl<T> Debug for Observable<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

enum Slot {
    Pending,
    Active(Subscription),
    Terminated,
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An observable whose subscriptions run `subscribe`.
    pub fn create(
        subscribe: impl Fn(Observer<T>) -> Subscription + Send + Sync + 'static,
    ) -> Self {
        Self {
            subscribe: Arc::new(subscribe),
        }
    }

    /// Emits `value` on subscription, then nothing.
    pub fn just(value: T) -> Self {
        Self::create(move |observer| {
            observer.next(value.clone());
            Subscription::empty()
        })
    }

    /// Never emits.
    pub fn never() -> Self {
        Self::create(|_| Subscription::empty())
    }

    /// Fails with `err` on subscription.
    pub fn throw(err: Error) -> Self {
        Self::create(move |observer| {
            observer.error(err.clone());
            Subscription::empty()
        })
    }

    /// Subscribes a raw observer. Operators use this; the stream is not torn
    /// down on error, which is left to the outermost subscriber.
    pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        (self.subscribe)(observer)
    }

    /// Subscribes to values. An error is logged and ends the subscription.
    pub fn subscribe(
        &self,
        on_next: impl Fn(T) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_with(on_next, |err| {
            tracing::warn!("observable terminated with an error: {err}");
        })
    }

    /// Subscribes to values and errors. After an error, the whole stream is
    /// torn down before `on_error` runs.
    pub fn subscribe_with(
        &self,
        on_next: impl Fn(T) + Send + Sync + 'static,
        on_error: impl Fn(Error) + Send + Sync + 'static,
    ) -> Subscription {
        let slot = Arc::new(Mutex::new(Slot::Pending));
        let terminate = {
            let slot = Arc::clone(&slot);
            move |err| {
                let previous =
                    std::mem::replace(&mut *slot.lock(), Slot::Terminated);
                drop(previous);
                on_error(err);
            }
        };
        let subscription =
            self.subscribe_observer(Observer::new(on_next, terminate));
        let stale = {
            let mut guard = slot.lock();
            if matches!(*guard, Slot::Pending) {
                *guard = Slot::Active(subscription);
                None
            } else {
                Some(subscription)
            }
        };
        drop(stale);
        Subscription::new(move || {
            let previous =
                std::mem::replace(&mut *slot.lock(), Slot::Terminated);
            drop(previous);
        })
    }

    /// Transforms every value.
    pub fn map<U>(&self, f: impl Fn(T) -> U + Send + Sync + 'static) -> Observable<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |downstream| {
            let f = Arc::clone(&f);
            source.subscribe_observer(Observer::forward(
                downstream,
                move |downstream, value| downstream.next(f(value)),
            ))
        })
    }

    /// Transforms every value; a failed transformation stops the stream.
    pub fn try_map<U>(
        &self,
        f: impl Fn(T) -> Result<U> + Send + Sync + 'static,
    ) -> Observable<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |downstream| {
            let f = Arc::clone(&f);
            source.subscribe_observer(Observer::forward(
                downstream,
                move |downstream, value| match f(value) {
                    Ok(value) => downstream.next(value),
                    Err(err) => downstream.error(err),
                },
            ))
        })
    }

    /// Keeps the values that satisfy `predicate`.
    pub fn filter(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Self::create(move |downstream| {
            let predicate = Arc::clone(&predicate);
            source.subscribe_observer(Observer::forward(
                downstream,
                move |downstream, value| {
                    if predicate(&value) {
                        downstream.next(value);
                    }
                },
            ))
        })
    }

    /// Drops the first `count` values of each subscription.
    pub fn skip(&self, count: usize) -> Self {
        let source = self.clone();
        Self::create(move |downstream| {
            let seen = AtomicUsize::new(0);
            source.subscribe_observer(Observer::forward(
                downstream,
                move |downstream, value| {
                    if seen.fetch_add(1, Ordering::AcqRel) >= count {
                        downstream.next(value);
                    }
                },
            ))
        })
    }

    /// Emits `value` first, then the values of this stream.
    pub fn start_with(&self, value: T) -> Self {
        let source = self.clone();
        Self::create(move |downstream| {
            downstream.next(value.clone());
            source.subscribe_observer(downstream)
        })
    }

    /// Drops values equal to the one before them.
    pub fn distinct_until_changed(&self) -> Self
    where
        T: PartialEq,
    {
        self.distinct_until_changed_by(|a, b| a == b)
    }

    /// Drops values that `same` considers equal to the one before them.
    pub fn distinct_until_changed_by(
        &self,
        same: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) -> Self {
        let source = self.clone();
        let same = Arc::new(same);
        Self::create(move |downstream| {
            let same = Arc::clone(&same);
            let last: Mutex<Option<T>> = Mutex::new(None);
            source.subscribe_observer(Observer::forward(
                downstream,
                move |downstream, value| {
                    let changed = {
                        let mut last = last.lock();
                        let changed =
                            last.as_ref().is_none_or(|prev| !same(prev, &value));
                        if changed {
                            *last = Some(value.clone());
                        }
                        changed
                    };
                    if changed {
                        downstream.next(value);
                    }
                },
            ))
        })
    }

    /// Maps each value to an inner stream and mirrors the most recent one.
    ///
    /// When a new value arrives, the previous inner subscription is dropped
    /// before the next one is made. Values still in flight from a superseded
    /// inner stream are discarded.
    pub fn switch_map<U>(
        &self,
        f: impl Fn(T) -> Result<Observable<U>> + Send + Sync + 'static,
    ) -> Observable<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |downstream: Observer<U>| {
            let state = Arc::new(Mutex::new(SwitchState::default()));
            let errors = downstream.clone();
            let outer = {
                let state = Arc::clone(&state);
                let f = Arc::clone(&f);
                Observer::new(
                    move |value| {
                        switch_to(&state, &downstream, || f(value));
                    },
                    move |err| errors.error(err),
                )
            };
            let upstream = source.subscribe_observer(outer);
            Subscription::new(move || {
                let inner = {
                    let mut state = state.lock();
                    state.disposed = true;
                    state.inner.take()
                };
                drop(inner);
                drop(upstream);
            })
        })
    }

    /// Converts into a [`Stream`] of results. The stream ends after the first
    /// error; dropping it cancels the subscription.
    pub fn into_stream(self) -> ObservableStream<T> {
        let (sender, receiver) = mpsc::unbounded();
        let errors = sender.clone();
        let subscription = self.subscribe_observer(Observer::new(
            move |value| {
                // the receiver may already be gone
                let _ = sender.unbounded_send(Ok(value));
            },
            move |err| {
                let _ = errors.unbounded_send(Err(err));
                errors.close_channel();
            },
        ));
        ObservableStream {
            receiver,
            _subscription: subscription,
        }
    }
}

#[derive(Default)]
struct SwitchState {
    generation: u64,
    inner: Option<Subscription>,
    disposed: bool,
}

fn switch_to<U>(
    state: &Arc<Mutex<SwitchState>>,
    downstream: &Observer<U>,
    next: impl FnOnce() -> Result<Observable<U>>,
) where
    U: Clone + Send + Sync + 'static,
{
    let (generation, previous) = {
        let mut state = state.lock();
        if state.disposed {
            return;
        }
        state.generation += 1;
        (state.generation, state.inner.take())
    };
    drop(previous);

    let inner = match next() {
        Ok(inner) => inner,
        Err(err) => {
            downstream.error(err);
            return;
        }
    };
    let is_current = {
        let state = Arc::clone(state);
        move || state.lock().generation == generation
    };
    let is_current = Arc::new(is_current);
    let forward = {
        let is_current = Arc::clone(&is_current);
        let downstream = downstream.clone();
        let errors = downstream.clone();
        let errors_current = Arc::clone(&is_current);
        Observer::new(
            move |value| {
                if is_current() {
                    downstream.next(value);
                }
            },
            move |err| {
                if errors_current() {
                    errors.error(err);
                }
            },
        )
    };
    let subscription = inner.subscribe_observer(forward);

    let stale = {
        let mut state = state.lock();
        if !state.disposed && state.generation == generation {
            state.inner = Some(subscription);
            None
        } else {
            Some(subscription)
        }
    };
    drop(stale);
}

/// The [`Stream`] returned by [`Observable::into_stream`].
pub struct ObservableStream<T> {
    receiver: UnboundedReceiver<Result<T>>,
    _subscription: Subscription,
}

impl<T> Stream for ObservableStream<T> {
    type Item = Result<T>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

struct HandlerSlot<T> {
    active: AtomicBool,
    handler: Box<dyn Fn(&T) + Send + Sync>,
}

struct EventSourceInner<T> {
    handlers: Mutex<Vec<(u64, Arc<HandlerSlot<T>>)>>,
    next_id: AtomicU64,
}

/// A multicast event with attachable handlers.
///
/// Handlers run in attachment order. A handler detached while an event is
/// being delivered is not invoked for the rest of that delivery.
pub struct EventSource<T> {
    inner: Arc<EventSourceInner<T>>,
}

impl<T> Default for EventSource<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(EventSourceInner {
                handlers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }
}

impl<T> Debug for EventSource<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("handlers", &self.inner.handlers.lock().len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> EventSource<T> {
    /// An event with no handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every attached handler with `args`.
    pub fn emit(&self, args: &T) {
        let handlers = self
            .inner
            .handlers
            .lock()
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect::<Vec<_>>();
        for slot in handlers {
            if slot.active.load(Ordering::Acquire) {
                (slot.handler)(args);
            }
        }
    }

    /// Attaches a handler until the returned subscription is dropped.
    pub fn attach(
        &self,
        handler: impl Fn(&T) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(HandlerSlot {
            active: AtomicBool::new(true),
            handler: Box::new(handler),
        });
        self.inner.handlers.lock().push((id, Arc::clone(&slot)));
        let source: Weak<EventSourceInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            slot.active.store(false, Ordering::Release);
            if let Some(source) = source.upgrade() {
                source.handlers.lock().retain(|(other, _)| *other != id);
            }
        })
    }

    /// The number of attached handlers.
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }

    /// The event as an observable. Each subscription attaches one handler.
    pub fn observe(&self) -> Observable<T>
    where
        T: Clone,
    {
        let source = Self {
            inner: Arc::clone(&self.inner),
        };
        Observable::create(move |observer| {
            source.attach(move |args: &T| observer.next(args.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{EventSource, Observable, Subscription};
    use crate::error::Error;
    use futures::{executor::block_on, StreamExt};
    use parking_lot::Mutex;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    fn collect<T: Clone + Send + Sync + 'static>(
        observable: &Observable<T>,
    ) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sub = observable.subscribe({
            let seen = Arc::clone(&seen);
            move |value| seen.lock().push(value)
        });
        (seen, sub)
    }

    #[test]
    fn operators_compose() {
        let source = EventSource::<i64>::new();
        let numbers = source
            .observe()
            .start_with(0)
            .skip(1)
            .filter(|n| n % 2 == 0)
            .map(|n| n * 10)
            .distinct_until_changed();
        let (seen, _sub) = collect(&numbers);

        for n in [1, 2, 2, 3, 4, 4, 6] {
            source.emit(&n);
        }
        assert_eq!(*seen.lock(), vec![20, 40, 60]);
    }

    #[test]
    fn dropping_the_subscription_detaches() {
        let source = EventSource::<i64>::new();
        let (seen, sub) = collect(&source.observe());
        assert_eq!(source.handler_count(), 1);
        source.emit(&1);
        drop(sub);
        assert_eq!(source.handler_count(), 0);
        source.emit(&2);
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn handler_detached_during_emit_is_skipped() {
        let source = Arc::new(EventSource::<()>::new());
        let second: Arc<Mutex<Option<Subscription>>> = Default::default();
        let second_ran = Arc::new(AtomicBool::new(false));

        let _first = source.attach({
            let second = Arc::clone(&second);
            move |_| drop(second.lock().take())
        });
        *second.lock() = Some(source.attach({
            let second_ran = Arc::clone(&second_ran);
            move |_| second_ran.store(true, Ordering::SeqCst)
        }));

        source.emit(&());
        assert!(!second_ran.load(Ordering::SeqCst));
        assert_eq!(source.handler_count(), 1);
    }

    #[test]
    fn switch_map_follows_the_latest_inner() {
        let outer = EventSource::<usize>::new();
        let inners = [EventSource::<&'static str>::new(), EventSource::new()];
        let observables = [inners[0].observe(), inners[1].observe()];

        let switched = outer
            .observe()
            .switch_map(move |idx| Ok(observables[idx].clone()));
        let (seen, sub) = collect(&switched);

        outer.emit(&0);
        inners[0].emit(&"a");
        outer.emit(&1);
        assert_eq!(inners[0].handler_count(), 0);
        assert_eq!(inners[1].handler_count(), 1);
        inners[0].emit(&"stale");
        inners[1].emit(&"b");
        assert_eq!(*seen.lock(), vec!["a", "b"]);

        drop(sub);
        assert_eq!(outer.handler_count(), 0);
        assert_eq!(inners[1].handler_count(), 0);
    }

    #[test]
    fn errors_tear_the_stream_down() {
        let source = EventSource::<i64>::new();
        let failed = Arc::new(Mutex::new(None));
        let values = source.observe().try_map(|n| {
            if n < 0 {
                Err(Error::fault("negative"))
            } else {
                Ok(n)
            }
        });
        let _sub = values.subscribe_with(|_| {}, {
            let failed = Arc::clone(&failed);
            move |err| *failed.lock() = Some(err)
        });

        source.emit(&1);
        assert_eq!(source.handler_count(), 1);
        source.emit(&-1);
        assert_eq!(*failed.lock(), Some(Error::fault("negative")));
        assert_eq!(source.handler_count(), 0);
    }

    #[test]
    fn synchronous_errors_are_delivered_once() {
        let errors = Arc::new(Mutex::new(0));
        let _sub = Observable::<i64>::throw(Error::fault("boom"))
            .subscribe_with(|_| {}, {
                let errors = Arc::clone(&errors);
                move |_| *errors.lock() += 1
            });
        assert_eq!(*errors.lock(), 1);
    }

    #[test]
    fn into_stream_yields_values_then_the_error() {
        let source = EventSource::<i64>::new();
        let stream = source
            .observe()
            .try_map(|n| if n > 2 { Err(Error::fault("big")) } else { Ok(n) })
            .into_stream();
        source.emit(&1);
        source.emit(&2);
        source.emit(&3);
        let items = block_on(stream.collect::<Vec<_>>());
        assert_eq!(items, vec![Ok(1), Ok(2), Err(Error::fault("big"))]);
    }

    #[test]
    fn just_and_never() {
        let (seen, _sub) = collect(&Observable::just(7));
        assert_eq!(*seen.lock(), vec![7]);
        let (seen, _sub) = collect(&Observable::<i64>::never());
        assert!(seen.lock().is_empty());
    }
}
