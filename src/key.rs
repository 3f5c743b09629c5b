//! Service keys and instance identity.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Key for service storage and lookup.
///
/// A key is the identity of a registered type: its `TypeId`, plus the
/// `type_name` kept only for diagnostics. Equality and hashing look at the
/// `TypeId` alone.
///
/// # Examples
///
/// ```rust
/// use jobscope::{Key, key_of_type};
///
/// let a = Key::of::<String>();
/// let b = key_of_type::<String>();
/// assert_eq!(a, b);
/// assert_eq!(a.display_name(), "alloc::string::String");
/// assert_ne!(a, Key::of::<u32>());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Key {
    id: TypeId,
    name: &'static str,
}

impl Key {
    /// Key for the concrete type `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` this key identifies.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Get the type name for display
    ///
    /// This is the `std::any::type_name` result and is only meant for
    /// error messages and logs.
    #[inline]
    pub fn display_name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// Helper function for creating type keys
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::of::<T>()
}

/// Reference identity of a shared instance.
///
/// Two handles have the same `InstanceId` exactly when they point at the same
/// allocation, regardless of the values inside. This is the identity used to
/// associate a running job with the scope that produced it.
///
/// ```rust
/// use jobscope::InstanceId;
/// use std::sync::Arc;
///
/// let a = Arc::new(5);
/// let b = a.clone();
/// let c = Arc::new(5);
/// assert_eq!(InstanceId::of(&a), InstanceId::of(&b));
/// assert_ne!(InstanceId::of(&a), InstanceId::of(&c));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
    /// Identity of the allocation behind `instance`.
    ///
    /// Works for sized and unsized (`dyn Any`, `dyn Trait`) handles alike, so
    /// a typed `Arc<T>` and the type-erased handle it was downcast from yield
    /// the same id.
    #[inline]
    pub fn of<T: ?Sized>(instance: &Arc<T>) -> Self {
        InstanceId(Arc::as_ptr(instance) as *const () as usize)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_name() {
        let a = Key::of::<u32>();
        let b = Key { id: TypeId::of::<u32>(), name: "renamed" };
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn distinct_types_are_distinct_keys() {
        assert_ne!(Key::of::<u32>(), Key::of::<u64>());
        assert_ne!(Key::of::<String>(), Key::of::<&'static str>());
    }

    #[test]
    fn instance_id_survives_type_erasure() {
        let typed: Arc<String> = Arc::new("job".to_string());
        let erased: Arc<dyn Any + Send + Sync> = typed.clone();
        assert_eq!(InstanceId::of(&typed), InstanceId::of(&erased));

        let back = erased.downcast::<String>().unwrap();
        assert_eq!(InstanceId::of(&typed), InstanceId::of(&back));
    }

    #[test]
    fn zero_sized_instances_have_distinct_identity() {
        struct Unit;
        let a = Arc::new(Unit);
        let b = Arc::new(Unit);
        assert_ne!(InstanceId::of(&a), InstanceId::of(&b));
    }
}
