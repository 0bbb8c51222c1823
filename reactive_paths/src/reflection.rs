//! Member metadata and cached accessors.
//!
//! Types register their members once, through [`ObjectType::describe`]. The
//! [`AccessorResolver`] turns those registrations into type-erased
//! [`Getter`]s and [`Setter`]s, memoized per `(type, member)`, and uses them
//! to read or write whole paths at once.

use crate::{
    cache::{CacheStats, MemoizingCache},
    change::ChangeEvent,
    config::ObserveConfig,
    error::{Error, Result},
    object::{Object, ObjectType, TypeInfo},
    path::{Link, LinkKey, Path},
    value::Value,
};
use std::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    num::NonZeroUsize,
    sync::Arc,
};

/// A type-erased member reader. The slice holds indexer arguments, and is
/// empty for fields and properties.
pub type Getter =
    Arc<dyn Fn(&dyn Object, &[Value]) -> Result<Value> + Send + Sync>;

/// A type-erased member writer.
pub type Setter =
    Arc<dyn Fn(&dyn Object, Value, &[Value]) -> Result<()> + Send + Sync>;

/// The kind of a registered member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// A stored field.
    Field,
    /// A computed property.
    Property,
    /// A parameterized member, accessed with `name[args]`.
    Indexer,
    /// A method. Methods are known to the resolver, but have no accessors.
    Method,
}

impl MemberKind {
    /// A lowercase name for diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            MemberKind::Field => "field",
            MemberKind::Property => "property",
            MemberKind::Indexer => "indexer",
            MemberKind::Method => "method",
        }
    }
}

/// One registered member of a type.
#[derive(Clone)]
pub struct MemberDef {
    name: Arc<str>,
    kind: MemberKind,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl MemberDef {
    /// The member name.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// What kind of member this is.
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Whether the member has a reader.
    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    /// Whether the member has a writer.
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl Debug for MemberDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Collects the members of `T` inside [`ObjectType::describe`].
///
/// Registering a name twice replaces the earlier registration.
pub struct MemberTable<T> {
    members: Vec<MemberDef>,
    ty: PhantomData<fn(&T)>,
}

impl<T: ObjectType> MemberTable<T> {
    pub(crate) fn collect() -> Vec<MemberDef> {
        let mut table = Self {
            members: Vec::new(),
            ty: PhantomData,
        };
        T::describe(&mut table);
        table.members
    }

    /// A readable and writable stored field.
    pub fn field(
        &mut self,
        name: &str,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
        set: impl Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.push(
            name,
            MemberKind::Field,
            Some(erase_getter::<T>(name, move |this, _| Ok(get(this)))),
            Some(erase_setter::<T>(name, move |this, value, _| {
                set(this, value)
            })),
        )
    }

    /// A stored field without a writer.
    pub fn readonly_field(
        &mut self,
        name: &str,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.push(
            name,
            MemberKind::Field,
            Some(erase_getter::<T>(name, move |this, _| Ok(get(this)))),
            None,
        )
    }

    /// A computed, read-only property. The reader may fail with
    /// [`Error::fault`].
    pub fn property(
        &mut self,
        name: &str,
        get: impl Fn(&T) -> Result<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        self.push(
            name,
            MemberKind::Property,
            Some(erase_getter::<T>(name, move |this, _| get(this))),
            None,
        )
    }

    /// A computed property with a writer.
    pub fn property_mut(
        &mut self,
        name: &str,
        get: impl Fn(&T) -> Result<Value> + Send + Sync + 'static,
        set: impl Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.push(
            name,
            MemberKind::Property,
            Some(erase_getter::<T>(name, move |this, _| get(this))),
            Some(erase_setter::<T>(name, move |this, value, _| {
                set(this, value)
            })),
        )
    }

    /// A readable and writable indexer.
    pub fn indexer(
        &mut self,
        name: &str,
        get: impl Fn(&T, &[Value]) -> Result<Value> + Send + Sync + 'static,
        set: impl Fn(&T, Value, &[Value]) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.push(
            name,
            MemberKind::Indexer,
            Some(erase_getter::<T>(name, get)),
            Some(erase_setter::<T>(name, set)),
        )
    }

    /// An indexer without a writer.
    pub fn readonly_indexer(
        &mut self,
        name: &str,
        get: impl Fn(&T, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> &mut Self {
        self.push(
            name,
            MemberKind::Indexer,
            Some(erase_getter::<T>(name, get)),
            None,
        )
    }

    /// Declares a method. Paths may not read through it.
    pub fn method(&mut self, name: &str) -> &mut Self {
        self.push(name, MemberKind::Method, None, None)
    }

    fn push(
        &mut self,
        name: &str,
        kind: MemberKind,
        getter: Option<Getter>,
        setter: Option<Setter>,
    ) -> &mut Self {
        let indexer = kind == MemberKind::Indexer;
        self.members.retain(|def| {
            &*def.name != name || (def.kind == MemberKind::Indexer) != indexer
        });
        self.members.push(MemberDef {
            name: Arc::from(name),
            kind,
            getter,
            setter,
        });
        self
    }
}

fn downcast<T: ObjectType>(object: &dyn Object) -> Result<&T> {
    object
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::TypeMismatch {
            expected: T::type_name(),
            found: object.type_info().name(),
        })
}

fn erase_getter<T: ObjectType>(
    name: &str,
    get: impl Fn(&T, &[Value]) -> Result<Value> + Send + Sync + 'static,
) -> Getter {
    let name: Arc<str> = Arc::from(name);
    Arc::new(move |object: &dyn Object, args: &[Value]| {
        get(downcast::<T>(object)?, args)
            .map_err(|err| err.in_member(T::type_name(), &name))
    })
}

fn erase_setter<T: ObjectType>(
    name: &str,
    set: impl Fn(&T, Value, &[Value]) -> Result<()> + Send + Sync + 'static,
) -> Setter {
    let name: Arc<str> = Arc::from(name);
    Arc::new(move |object: &dyn Object, value: Value, args: &[Value]| {
        set(downcast::<T>(object)?, value, args)
            .map_err(|err| err.in_member(T::type_name(), &name))
    })
}

/// The registered members of one type.
#[derive(Debug)]
pub struct TypeMembers {
    ty: TypeInfo,
    members: Vec<MemberDef>,
}

impl TypeMembers {
    /// The described type.
    pub fn type_info(&self) -> TypeInfo {
        self.ty
    }

    /// Looks up a field, property or method by name.
    pub fn get(&self, name: &str) -> Option<&MemberDef> {
        self.members
            .iter()
            .find(|def| def.kind != MemberKind::Indexer && &*def.name == name)
    }

    /// Looks up an indexer by name.
    pub fn get_indexer(&self, name: &str) -> Option<&MemberDef> {
        self.members
            .iter()
            .find(|def| def.kind == MemberKind::Indexer && &*def.name == name)
    }

    /// The member a link reads.
    pub fn find(&self, link: &Link) -> Option<&MemberDef> {
        if link.is_indexer() {
            self.get_indexer(link.name())
        } else {
            self.get(link.name())
        }
    }

    /// All members, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &MemberDef> {
        self.members.iter()
    }

    /// The number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the type registered no member.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The values read along a path by
/// [`AccessorResolver::try_get_all_values`].
#[derive(Clone, Debug)]
pub struct ChainValues {
    /// One event per link. Once an intermediate value is null, the
    /// remaining events are [`incomplete`](ChangeEvent::incomplete).
    pub changes: Vec<ChangeEvent>,
    /// Whether every link could be read.
    pub complete: bool,
}

impl ChainValues {
    /// The value at the end of the path, if the chain is complete.
    pub fn last_value(&self) -> Option<&Value> {
        if !self.complete {
            return None;
        }
        self.changes.last().and_then(|change| change.value.as_ref())
    }
}

/// Resolves members to cached accessors.
///
/// A member is identified by its type and by the link that reads it, so an
/// indexer and a field may share a name. Member tables are kept in a small
/// cache, readers and writers in two big ones. All three are bounded LRU
/// caches and safe to share between threads.
pub struct AccessorResolver {
    tables: MemoizingCache<TypeInfo, Arc<TypeMembers>>,
    readers: MemoizingCache<(TypeInfo, LinkKey), Result<Option<Getter>>>,
    writers: MemoizingCache<(TypeInfo, LinkKey), Result<Option<Setter>>>,
}

impl Default for AccessorResolver {
    fn default() -> Self {
        Self::from_config(&ObserveConfig::default())
    }
}

impl Debug for AccessorResolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorResolver")
            .field("tables", &self.tables.len())
            .field("readers", &self.readers.len())
            .field("writers", &self.writers.len())
            .finish()
    }
}

impl AccessorResolver {
    /// Creates a resolver with explicit cache bounds.
    pub fn new(small_limit: NonZeroUsize, big_limit: NonZeroUsize) -> Self {
        Self {
            tables: MemoizingCache::new(small_limit),
            readers: MemoizingCache::new(big_limit),
            writers: MemoizingCache::new(big_limit),
        }
    }

    /// Creates a resolver sized by `config`.
    pub fn from_config(config: &ObserveConfig) -> Self {
        Self::new(config.small_cache_limit, config.big_cache_limit)
    }

    /// The members registered by `ty`.
    pub fn members(&self, ty: TypeInfo) -> Arc<TypeMembers> {
        self.tables.get_or_insert_with(&ty, || {
            Arc::new(TypeMembers {
                ty,
                members: ty.describe_members(),
            })
        })
    }

    /// The reader of `member` on `ty`, or `None` if the type has no such
    /// member.
    ///
    /// # Errors
    /// [`Error::UnsupportedMember`] when the member is a method.
    pub fn getter(&self, ty: TypeInfo, member: &Link) -> Result<Option<Getter>> {
        self.readers.get_or_insert_with(&(ty, member.key()), || {
            match self.members(ty).find(member) {
                None => Ok(None),
                Some(def) if def.kind == MemberKind::Method => {
                    Err(unsupported(ty, def))
                }
                Some(def) => Ok(def.getter.clone()),
            }
        })
    }

    /// Like [`getter`](Self::getter), but a missing member is an error.
    pub fn getter_or_err(&self, ty: TypeInfo, member: &Link) -> Result<Getter> {
        self.getter(ty, member)?
            .ok_or_else(|| missing(ty.name(), member))
    }

    /// The writer of `member` on `ty`, or `None` if there is no such member
    /// or it is read-only.
    ///
    /// # Errors
    /// [`Error::UnsupportedMember`] when the member is a method.
    pub fn setter(&self, ty: TypeInfo, member: &Link) -> Result<Option<Setter>> {
        self.writers.get_or_insert_with(&(ty, member.key()), || {
            match self.members(ty).find(member) {
                None => Ok(None),
                Some(def) if def.kind == MemberKind::Method => {
                    Err(unsupported(ty, def))
                }
                Some(def) => Ok(def.setter.clone()),
            }
        })
    }

    /// Like [`setter`](Self::setter), but a missing or read-only member is an
    /// error.
    pub fn setter_or_err(&self, ty: TypeInfo, member: &Link) -> Result<Setter> {
        if let Some(setter) = self.setter(ty, member)? {
            return Ok(setter);
        }
        if self.members(ty).find(member).is_some() {
            Err(Error::ReadOnlyMember {
                type_name: ty.name(),
                member: display_name(member),
            })
        } else {
            Err(missing(ty.name(), member))
        }
    }

    /// Reads one link from `object`.
    pub fn get_value(&self, object: &dyn Object, link: &Link) -> Result<Value> {
        let getter = self.getter_or_err(object.type_info(), link)?;
        getter(object, link.args())
    }

    /// Writes one link on `object`.
    pub fn set_value(
        &self,
        object: &dyn Object,
        link: &Link,
        value: Value,
    ) -> Result<()> {
        let setter = self.setter_or_err(object.type_info(), link)?;
        setter(object, value, link.args())
    }

    /// Reads the value at the end of `path`, starting at `root`.
    ///
    /// Returns `Ok(None)` when the root or an intermediate value is null.
    ///
    /// # Errors
    /// Missing members, non-object intermediate values and accessor faults.
    pub fn try_get_value(
        &self,
        root: &Value,
        path: &Path,
    ) -> Result<Option<Value>> {
        let mut current = root.clone();
        for link in path.links() {
            let object = match step(&current, link)? {
                Some(object) => object,
                None => return Ok(None),
            };
            current = self.get_value(object.as_ref(), link)?;
        }
        Ok(Some(current))
    }

    /// Reads every link of `path`, starting at `root`, recording the sender
    /// and value of each one.
    pub fn try_get_all_values(
        &self,
        root: &Value,
        path: &Path,
    ) -> Result<ChainValues> {
        let mut changes = Vec::with_capacity(path.len());
        let mut current = root.clone();
        let mut complete = true;
        for link in path.links() {
            let object = if complete { step(&current, link)? } else { None };
            match object {
                Some(object) => {
                    current = self.get_value(object.as_ref(), link)?;
                    changes.push(
                        ChangeEvent::new(object, link.clone())
                            .with_value(current.clone()),
                    );
                }
                None => {
                    complete = false;
                    changes.push(ChangeEvent::incomplete(link.clone()));
                }
            }
        }
        Ok(ChainValues { changes, complete })
    }

    /// Writes `value` to the last link of `path`, starting at `root`.
    ///
    /// Returns `Ok(false)` without writing when the root or an intermediate
    /// value is null.
    pub fn try_set_value(
        &self,
        root: &Value,
        path: &Path,
        value: Value,
    ) -> Result<bool> {
        let (last, intermediate) = path.split_last();
        let mut current = root.clone();
        for link in intermediate {
            let object = match step(&current, link)? {
                Some(object) => object,
                None => return Ok(false),
            };
            current = self.get_value(object.as_ref(), link)?;
        }
        match step(&current, last)? {
            Some(object) => {
                self.set_value(object.as_ref(), last, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Statistics of the member-table cache.
    pub fn table_stats(&self) -> CacheStats {
        self.tables.stats()
    }

    /// Statistics of the reader cache.
    pub fn reader_stats(&self) -> CacheStats {
        self.readers.stats()
    }
}

/// Indexers are reported as `name[]`.
fn display_name(link: &Link) -> Arc<str> {
    link.notification_name()
}

fn missing(type_name: &'static str, link: &Link) -> Error {
    Error::MissingMember {
        type_name,
        member: display_name(link),
    }
}

fn unsupported(ty: TypeInfo, def: &MemberDef) -> Error {
    Error::UnsupportedMember {
        type_name: ty.name(),
        member: Arc::clone(&def.name),
        kind: def.kind.as_str(),
    }
}

/// The object `link` is read from, `None` for null, or an error when a
/// member is requested on a primitive.
fn step(
    current: &Value,
    link: &Link,
) -> Result<Option<crate::object::ObjectRef>> {
    match current {
        Value::Null => Ok(None),
        Value::Object(object) => Ok(Some(Arc::clone(object))),
        other => Err(missing(other.kind(), link)),
    }
}
