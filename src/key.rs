//! Service key types for the dependency injection container.

use std::any::TypeId;
use std::fmt;

/// Key for registration storage and lookup.
///
/// A key is the stable type identifier of a bound type. Equality and hashing
/// use the `TypeId` only; the type name is carried for diagnostics.
///
/// # Examples
///
/// ```rust
/// use modular_di::{Key, key_of_type};
///
/// let a = key_of_type::<String>();
/// let b = Key::of::<String>();
/// assert_eq!(a, b);
/// assert_eq!(a.display_name(), "alloc::string::String");
/// assert_ne!(a, Key::of::<u32>());
/// ```
#[derive(Clone, Copy)]
pub struct Key {
    id: TypeId,
    name: &'static str,
}

impl Key {
    /// Key for the type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` backing this key.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Get the type name for display
    pub fn display_name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, e.g. `Counter` for `app::state::Counter`.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) if !self.name[pos..].contains('<') => &self.name[pos + 2..],
            _ => self.name,
        }
    }
}

impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// Helper function for creating type keys
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> Key {
    Key::of::<T>()
}
