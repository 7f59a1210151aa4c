//! Stable identities for the callables being intercepted.
//!
//! Every Rust fn item, method item (`Type::method`, `<dyn Trait>::method`) and
//! non-capturing closure has its own zero-sized type. The `TypeId` of that type
//! is therefore a deterministic identity that tells distinct callables apart,
//! and `type_name` gives a readable path for diagnostics.
//!
//! Fn pointers share one type per signature and capturing closures carry
//! state, so neither has a per-callable identity. [`FnItemResolver`] refuses
//! them.

use std::any::TypeId;
use std::fmt;

use crate::error::MockError;

/// Opaque, equality-comparable identity of a callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(TypeId);

impl TargetId {
    /// The identity of `callable`'s type.
    pub fn of<F: 'static>(_callable: &F) -> Self {
        Self(TypeId::of::<F>())
    }
}

/// What a resolver gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct Callable {
    id: TargetId,
    type_name: &'static str,
    size: usize,
}

impl Callable {
    pub fn of<F: 'static>(callable: &F) -> Self {
        Self {
            id: TargetId::of(callable),
            type_name: std::any::type_name::<F>(),
            size: std::mem::size_of::<F>(),
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Size of the callable's type; zero for fn items and stateless closures.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// A resolved target: identity plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    id: TargetId,
    name: String,
}

impl Target {
    pub fn new(id: TargetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Resolve with the default [`FnItemResolver`].
    pub fn of<F: 'static>(callable: &F) -> Result<Self, MockError> {
        FnItemResolver.resolve(Callable::of(callable))
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Turns a callable into a [`Target`].
///
/// Must be deterministic and must give distinct callables distinct ids.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, callable: Callable) -> Result<Target, MockError>;
}

/// Resolves fn items, method items and stateless closures by type.
#[derive(Debug, Clone, Copy, Default)]
pub struct FnItemResolver;

impl IdentityResolver for FnItemResolver {
    fn resolve(&self, callable: Callable) -> Result<Target, MockError> {
        if callable.size() != 0 {
            let reason = if callable.type_name().starts_with("fn(")
                || callable.type_name().contains(" fn(")
            {
                "fn pointers share one type per signature; pass the function item itself"
            } else {
                "the callable carries state; pass a function item or a non-capturing closure"
            };
            return Err(MockError::Unresolvable {
                name: callable.type_name().to_string(),
                reason: reason.to_string(),
            });
        }
        Ok(Target::new(callable.id(), callable.type_name()))
    }
}
