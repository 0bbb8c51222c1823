//! The registry that picks a change source provider for each link.

use crate::{
    cache::{CacheStats, MemoizingCache},
    change::{ChangeEvent, Direction},
    config::ObserveConfig,
    object::{ObjectRef, TypeInfo},
    observable::Observable,
    path::{Link, LinkKey},
};
use parking_lot::RwLock;
use std::{
    fmt::{self, Debug, Formatter},
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// A source of change notifications for some kinds of objects.
///
/// The registry asks every provider how well it supports a member, and uses
/// the one with the highest [`affinity`](ChangeSourceProvider::affinity).
pub trait ChangeSourceProvider: Send + Sync + 'static {
    /// How well this provider supports `link` on objects of type `ty`. Zero
    /// or less means not at all.
    fn affinity(&self, ty: TypeInfo, link: &Link, direction: Direction) -> i32;

    /// A stream that emits whenever `link` changes on `sender`. Events need
    /// not carry the value.
    fn observe(
        &self,
        sender: &ObjectRef,
        link: &Link,
        direction: Direction,
    ) -> Observable<ChangeEvent>;

    /// A name for diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

type ResolutionKey = (TypeInfo, LinkKey, Direction);
type ProviderRef = Arc<dyn ChangeSourceProvider>;

/// The registered change source providers, with memoized resolution.
pub struct ProviderRegistry {
    providers: RwLock<Vec<Arc<dyn ChangeSourceProvider>>>,
    // bumped under the `providers` write lock on every change
    generation: AtomicU64,
    resolved: MemoizingCache<ResolutionKey, Option<ProviderRef>>,
}

impl Debug for ProviderRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field(
                "providers",
                &self
                    .providers
                    .read()
                    .iter()
                    .map(|provider| provider.name())
                    .collect::<Vec<_>>(),
            )
            .field("resolved", &self.resolved.len())
            .finish()
    }
}

impl ProviderRegistry {
    /// An empty registry whose resolution cache holds `cache_limit` entries.
    pub fn new(cache_limit: NonZeroUsize) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
            resolved: MemoizingCache::new(cache_limit),
        }
    }

    /// A registry holding the built-in providers, sized by `config`.
    pub fn with_defaults(config: &ObserveConfig) -> Self {
        let registry = Self::new(config.big_cache_limit);
        crate::providers::register_defaults(&registry, config);
        registry
    }

    /// Adds a provider. Cached resolutions are dropped, since the new
    /// provider may outrank them.
    pub fn register(&self, provider: Arc<dyn ChangeSourceProvider>) {
        tracing::debug!(
            provider = provider.name(),
            "registering change source provider"
        );
        {
            let mut providers = self.providers.write();
            providers.push(provider);
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.resolved.clear();
    }

    /// The best provider for `link` on objects of type `ty`, if any claims
    /// it.
    ///
    /// Providers are scored in registration order; the first one with the
    /// strictly highest positive affinity wins. Scoring runs without any
    /// lock held. A resolution that overlaps a registration is returned but
    /// not cached.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn resolve(
        &self,
        ty: TypeInfo,
        link: &Link,
        direction: Direction,
    ) -> Option<Arc<dyn ChangeSourceProvider>> {
        let key = (ty, link.key(), direction);
        let (providers, generation) = {
            let providers = self.providers.read();
            (providers.clone(), self.generation.load(Ordering::Acquire))
        };
        let still_valid =
            || self.generation.load(Ordering::Acquire) == generation;
        let pick = || {
            let mut best: Option<(i32, Arc<dyn ChangeSourceProvider>)> = None;
            for provider in providers {
                let score = provider.affinity(ty, link, direction);
                if score > best.as_ref().map_or(0, |(top, _)| *top) {
                    best = Some((score, provider));
                }
            }
            match &best {
                Some((score, provider)) => tracing::debug!(
                    ty = ty.name(),
                    member = %link.name(),
                    ?direction,
                    provider = provider.name(),
                    score,
                    "resolved change source provider"
                ),
                None => tracing::debug!(
                    ty = ty.name(),
                    member = %link.name(),
                    ?direction,
                    "no change source provider"
                ),
            }
            best.map(|(_, provider)| provider)
        };
        self.resolved.get_or_insert_if(&key, pick, still_valid)
    }

    /// Removes every provider and cached resolution.
    pub fn clear(&self) {
        {
            let mut providers = self.providers.write();
            providers.clear();
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.resolved.clear();
    }

    /// The number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Whether no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics of the resolution cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.resolved.stats()
    }
}
