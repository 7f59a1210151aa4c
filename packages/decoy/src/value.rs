//! Type-erased argument and return values.
//!
//! The engine never understands what a target's arguments mean. It needs
//! exactly four capabilities from them, captured by [`Arg`]:
//!
//! - structural equality against another erased value,
//! - "is this the zero value of its type" (what a [`Nil`] expectation checks),
//! - the concrete type (for return-slot checks and typed extraction),
//! - a `Debug` rendering for diagnostics.
//!
//! `Arg` is implemented for every `Any + Debug + PartialEq + Default + Send + Sync`
//! type, so plain literals (`1`, `"x"`, `Some(3)`, `vec![]`, your own
//! `#[derive(Debug, Default, PartialEq)]` structs) work directly.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Capabilities the engine needs from an argument or return value.
pub trait Arg: Any + fmt::Debug + Send + Sync {
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality; false when the concrete types differ.
    fn eq_arg(&self, other: &dyn Arg) -> bool;

    /// True when the value equals its type's default.
    fn is_zero(&self) -> bool;

    /// Concrete type name, for diagnostics.
    fn arg_type_name(&self) -> &'static str;
}

impl<T> Arg for T
where
    T: Any + fmt::Debug + PartialEq + Default + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_arg(&self, other: &dyn Arg) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn is_zero(&self) -> bool {
        *self == T::default()
    }

    fn arg_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A shared, type-erased argument or return value.
///
/// Cloning is cheap (reference counted); the wrapped value is immutable.
#[derive(Clone)]
pub struct Value(Arc<dyn Arg>);

impl Value {
    /// Wrap a concrete value.
    pub fn new<T: Arg>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// The `TypeId` of the wrapped value.
    pub fn concrete_type(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    /// The type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.0.arg_type_name()
    }

    /// True when the wrapped value equals its type's default.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// True when the wrapped value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Borrow the wrapped value as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Clone the wrapped value out as a `T`.
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_arg(other.0.as_ref())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// The "nil" marker.
///
/// As an expected parameter it matches any zero-valued actual (`None`, `0`,
/// `""`, empty collections, `T::default()`). As a return value it stands for
/// the zero value of the declared return type.
#[derive(Clone, Copy)]
pub struct Nil;

impl fmt::Debug for Nil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("nil")
    }
}

// =============================================================================
// Return values
// =============================================================================

/// A registered return value; `None` is nil.
pub type ReturnValue = Option<Value>;

/// Conversion into a registered return value. Used by [`values!`](crate::values).
pub trait IntoReturn {
    fn into_return(self) -> ReturnValue;
}

impl<T: Arg> IntoReturn for T {
    fn into_return(self) -> ReturnValue {
        Some(Value::new(self))
    }
}

impl IntoReturn for Value {
    fn into_return(self) -> ReturnValue {
        Some(self)
    }
}

impl IntoReturn for Nil {
    fn into_return(self) -> ReturnValue {
        None
    }
}

/// Build a list of return values from literals, [`Nil`] and [`Value`]s.
///
/// ```
/// use decoy::{values, Nil};
/// let returns = values![42, Nil, "done"];
/// assert_eq!(returns.len(), 3);
/// assert!(returns[1].is_none());
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::ReturnValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::IntoReturn::into_return($value)),+]
    };
}

/// One declared return position of an intercepted call.
#[derive(Clone, Copy)]
pub struct ReturnSlot {
    type_id: TypeId,
    type_name: &'static str,
    zero: fn() -> Value,
}

impl ReturnSlot {
    /// The slot for a return of type `T`.
    pub fn of<T: Arg + Default>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            zero: zero_of::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The zero value of the slot's type.
    pub fn zero(&self) -> Value {
        (self.zero)()
    }

    /// True when `value` can fill this slot.
    pub fn accepts(&self, value: &Value) -> bool {
        value.concrete_type() == self.type_id
    }
}

impl fmt::Debug for ReturnSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReturnSlot").field(&self.type_name).finish()
    }
}

fn zero_of<T: Arg + Default>() -> Value {
    Value::new(T::default())
}

/// A typed return shape: `()` for no returns, tuples for one or more.
///
/// Converts between the typed return of an intercepted function and the
/// erased slot list the dispatcher works with.
pub trait Outputs: Sized + Default {
    /// One slot per declared return position.
    fn slots() -> Vec<ReturnSlot>;

    /// Rebuild the typed return; `None` on arity or type mismatch.
    fn from_values(values: Vec<Value>) -> Option<Self>;
}

impl Outputs for () {
    fn slots() -> Vec<ReturnSlot> {
        Vec::new()
    }

    fn from_values(values: Vec<Value>) -> Option<Self> {
        values.is_empty().then_some(())
    }
}

macro_rules! impl_outputs {
    ($($name:ident),+) => {
        impl<$($name),+> Outputs for ($($name,)+)
        where
            $($name: Arg + Default + Clone,)+
        {
            fn slots() -> Vec<ReturnSlot> {
                vec![$(ReturnSlot::of::<$name>()),+]
            }

            fn from_values(values: Vec<Value>) -> Option<Self> {
                let mut values = values.into_iter();
                let outputs = ($(values.next()?.get::<$name>()?,)+);
                values.next().is_none().then_some(outputs)
            }
        }
    };
}

impl_outputs!(A);
impl_outputs!(A, B);
impl_outputs!(A, B, C);
impl_outputs!(A, B, C, D);
impl_outputs!(A, B, C, D, E);
impl_outputs!(A, B, C, D, E, F);
