pub use enclose::*;

/// Builds a [`ValueMap`](crate::ValueMap) from `key => value` pairs. A
/// repeated key keeps the last value.
#[macro_export]
macro_rules! value_map {
    () => {
        $crate::ValueMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::ValueMap::new().with([$(($key, $value)),+])
    };
}

/// Reference resolved from the caller's local map.
#[macro_export]
macro_rules! local {
    ($key:expr) => {
        $crate::ValueRef::local($key)
    };
}

/// Reference bound to (a handle to) the given value.
#[macro_export]
macro_rules! fixed {
    ($value:expr) => {
        $crate::ValueRef::fixed(::std::clone::Clone::clone(&$value))
    };
}
