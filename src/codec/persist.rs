//! Conversions between Rust values and [`Value`]
//!
//! [`ToValue`] lowers a value for `put`; [`FromValue`] rebuilds it for `get`.
//! User-defined types implement [`PersistObject`] and pick up both
//! conversions through [`persist_object!`](crate::persist_object).

use std::collections::{BTreeMap, HashMap};

use super::Value;
use crate::error::{Result, StashError};

/// Lower a Rust value into the dynamic value model
pub trait ToValue {
    fn to_value(&self) -> Result<Value>;
}

/// Rebuild a Rust value from the dynamic value model
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

/// A user-defined type stored as its type identifier plus attribute map
///
/// ```
/// use std::collections::BTreeMap;
/// use stashkv::codec::{PersistObject, Value, FromValue, ToValue};
///
/// struct Greeter {
///     name: String,
/// }
///
/// impl PersistObject for Greeter {
///     const TYPE_NAME: &'static str = "example.Greeter";
///
///     fn to_attributes(&self) -> stashkv::Result<BTreeMap<String, Value>> {
///         let mut attrs = BTreeMap::new();
///         attrs.insert("name".to_string(), self.name.to_value()?);
///         Ok(attrs)
///     }
///
///     fn from_attributes(mut attrs: BTreeMap<String, Value>) -> stashkv::Result<Self> {
///         Ok(Self { name: stashkv::codec::take_attr(&mut attrs, "name")? })
///     }
/// }
///
/// stashkv::persist_object!(Greeter);
/// ```
pub trait PersistObject: Sized {
    /// Stable identifier written to the log; must not change across releases
    const TYPE_NAME: &'static str;

    /// Capture the instance's attribute state
    fn to_attributes(&self) -> Result<BTreeMap<String, Value>>;

    /// Reconstruct an instance from its attribute state
    fn from_attributes(attrs: BTreeMap<String, Value>) -> Result<Self>;
}

/// Implements [`ToValue`] and [`FromValue`] for a [`PersistObject`] type
#[macro_export]
macro_rules! persist_object {
    ($ty:ty) => {
        impl $crate::codec::ToValue for $ty {
            fn to_value(&self) -> $crate::Result<$crate::codec::Value> {
                $crate::codec::object_to_value(self)
            }
        }

        impl $crate::codec::FromValue for $ty {
            fn from_value(value: $crate::codec::Value) -> $crate::Result<Self> {
                $crate::codec::object_from_value(value)
            }
        }
    };
}

/// Lower a [`PersistObject`] into `Value::Object`
pub fn object_to_value<T: PersistObject>(object: &T) -> Result<Value> {
    Ok(Value::object(T::TYPE_NAME, object.to_attributes()?))
}

/// Rebuild a [`PersistObject`], checking the stored type identifier
pub fn object_from_value<T: PersistObject>(value: Value) -> Result<T> {
    match value {
        Value::Object { type_name, attrs } if type_name == T::TYPE_NAME => {
            T::from_attributes(attrs)
        }
        Value::Object { .. } => Err(StashError::TypeMismatch {
            expected: T::TYPE_NAME,
            found: "object of another type",
        }),
        other => Err(mismatch(T::TYPE_NAME, &other)),
    }
}

/// Remove and convert one attribute, failing if it is missing
pub fn take_attr<T: FromValue>(attrs: &mut BTreeMap<String, Value>, name: &str) -> Result<T> {
    let value = attrs.remove(name).ok_or_else(|| {
        StashError::CorruptRecord(format!("missing attribute `{}`", name))
    })?;
    T::from_value(value)
}

fn mismatch(expected: &'static str, found: &Value) -> StashError {
    StashError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

// =============================================================================
// Identity
// =============================================================================

impl ToValue for Value {
    fn to_value(&self) -> Result<Value> {
        Ok(self.clone())
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

// =============================================================================
// Scalars
// =============================================================================

impl ToValue for bool {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bool(*self))
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl ToValue for str {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Str(self.to_string()))
    }
}

impl ToValue for String {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Str(self.clone()))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Result<Value> {
        Ok(Value::Float(*self))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(x) => Ok(x),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Result<Value> {
        // f32 -> f64 is exact
        Ok(Value::Float(f64::from(*self)))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(x) => Ok(x as f32),
            other => Err(mismatch("float", &other)),
        }
    }
}

macro_rules! impl_int {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Result<Value> {
                    i64::try_from(*self).map(Value::Int).map_err(|_| {
                        StashError::unsupported(format!(
                            "integer {} does not fit in 64 signed bits",
                            self
                        ))
                    })
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(i).map_err(|_| StashError::TypeMismatch {
                            expected: stringify!($ty),
                            found: "int out of range",
                        }),
                        other => Err(mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

impl_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

// =============================================================================
// Containers
// =============================================================================

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Result<Value> {
        self.iter()
            .map(ToValue::to_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Result<Value> {
        self.as_slice().to_value()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Result<Value> {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for BTreeMap<String, T> {
    fn to_value(&self) -> Result<Value> {
        self.iter()
            .map(|(k, v)| Ok((k.clone(), v.to_value()?)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Value::Map)
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((k, T::from_value(v)?)))
                .collect(),
            other => Err(mismatch("map", &other)),
        }
    }
}

impl<T: ToValue, S> ToValue for HashMap<String, T, S> {
    fn to_value(&self) -> Result<Value> {
        self.iter()
            .map(|(k, v)| Ok((k.clone(), v.to_value()?)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Value::Map)
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((k, T::from_value(v)?)))
                .collect(),
            other => Err(mismatch("map", &other)),
        }
    }
}

// Tuples are stored as plain lists; reading one back checks the arity.
macro_rules! impl_tuple {
    ($len:expr; $($name:ident),+) => {
        impl<$($name: ToValue),+> ToValue for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_value(&self) -> Result<Value> {
                let ($($name,)+) = self;
                Ok(Value::List(vec![$($name.to_value()?),+]))
            }
        }

        impl<$($name: FromValue),+> FromValue for ($($name,)+) {
            #[allow(non_snake_case)]
            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::List(items) if items.len() == $len => {
                        let mut items = items.into_iter();
                        $(
                            let $name = match items.next() {
                                Some(item) => $name::from_value(item)?,
                                None => return Err(StashError::TypeMismatch {
                                    expected: concat!("tuple of ", stringify!($len)),
                                    found: "shorter list",
                                }),
                            };
                        )+
                        Ok(($($name,)+))
                    }
                    Value::List(_) => Err(StashError::TypeMismatch {
                        expected: concat!("tuple of ", stringify!($len)),
                        found: "list of another length",
                    }),
                    other => Err(mismatch("tuple", &other)),
                }
            }
        }
    };
}

impl_tuple!(2; A, B);
impl_tuple!(3; A, B, C);
impl_tuple!(4; A, B, C, D);
