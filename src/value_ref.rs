use std::fmt;

use crate::error::{ConfigurationError, Result};
use crate::value::Value;
use crate::value_map::ValueMap;

/// Where a combinator gets a [`Value`] from.
#[derive(Clone)]
pub enum ValueRef {
	/// Always the same value.
	Fixed(Value),
	/// The value under this key in the caller's local map.
	Local(String),
}

impl ValueRef {
	pub fn fixed(value: Value) -> Self {
		ValueRef::Fixed(value)
	}

	pub fn local(key: impl Into<String>) -> Self {
		ValueRef::Local(key.into())
	}

	/// `None` when a local key is missing from `local` (or no local map
	/// was given).
	pub fn get(&self, local: Option<&ValueMap>) -> Option<Value> {
		match self {
			ValueRef::Fixed(value) => Some(value.clone()),
			ValueRef::Local(key) => local.filter(|map| map.has(key)).and_then(|map| map.get(key).ok()),
		}
	}

	pub(crate) fn resolve(&self, local: Option<&ValueMap>, component: &str) -> Result<Value> {
		self.get(local).ok_or_else(|| ConfigurationError::new(component, format!("no value for {self:?}")))
	}
}

impl fmt::Debug for ValueRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValueRef::Fixed(value) => write!(f, "fixed value '{value}'"),
			ValueRef::Local(key) => write!(f, "local value '{key}'"),
		}
	}
}

/// Several named [`ValueRef`]s resolved together into one map.
#[derive(Clone, Debug, Default)]
pub struct ValueRefMap {
	refs: Vec<(String, ValueRef)>,
}

impl ValueRefMap {
	pub fn new<K: Into<String>>(refs: impl IntoIterator<Item = (K, ValueRef)>) -> Self {
		ValueRefMap {
			refs: refs.into_iter().map(|(key, value_ref)| (key.into(), value_ref)).collect(),
		}
	}

	/// Refs that do not resolve are left out.
	pub fn get(&self, local: Option<&ValueMap>) -> ValueMap {
		ValueMap::new().with(
			self.refs
				.iter()
				.filter_map(|(key, value_ref)| value_ref.get(local).map(|value| (key.clone(), value))),
		)
	}
}
