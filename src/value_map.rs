use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use fxhash::FxHashMap;

use crate::error::{ConfigurationError, Result};
use crate::signal::Signal;
use crate::time::{Duration, Timestamp};
use crate::value::{Payload, Value};
use crate::wire::{lookup, V};

fn error(message: impl Into<String>) -> ConfigurationError {
	ConfigurationError::new("value_map", message)
}

/// Key of a wire pair: a string-table index or a literal name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
	Index(usize),
	Name(String),
}

/// Ordered string-keyed collection of shared [`Value`]s.
///
/// The shape never changes after construction; `with` and `without` build
/// new maps sharing the same values.
#[derive(Clone, Default)]
pub struct ValueMap {
	entries: Rc<Vec<(String, Value)>>,
	index: Rc<FxHashMap<String, usize>>,
}

impl ValueMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Result<Self> {
		let mut list = Vec::new();
		let mut index = FxHashMap::default();
		for (key, value) in entries {
			let key = key.into();
			if index.contains_key(&key) {
				return Err(error(format!("duplicate key '{key}'")));
			}
			index.insert(key.clone(), list.len());
			list.push((key, value));
		}
		Ok(ValueMap {
			entries: Rc::new(list),
			index: Rc::new(index),
		})
	}

	pub fn from_wire(pairs: &[(Key, V)], table: Option<&[String]>) -> Result<Self> {
		let entries = pairs
			.iter()
			.map(|(key, v)| {
				let key = match key {
					Key::Index(idx) => lookup(table, *idx)?.to_owned(),
					Key::Name(name) => name.clone(),
				};
				Ok((key, Value::from_v(v, table)?))
			})
			.collect::<Result<Vec<_>>>()?;
		ValueMap::from_entries(entries)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn has(&self, key: &str) -> bool {
		self.index.contains_key(key)
	}

	pub fn get(&self, key: &str) -> Result<Value> {
		self.index
			.get(key)
			.map(|idx| self.entries[*idx].1.clone())
			.ok_or_else(|| error(format!("no value for key '{key}'")))
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|(key, _)| key.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.entries.iter().map(|(key, value)| (key.as_str(), value))
	}

	fn expect<T>(&self, key: &str, expected: &str, func: impl FnOnce(&Payload) -> Option<T>) -> Result<T> {
		let value = self.get(key)?;
		let payload = value.get();
		func(&payload).ok_or_else(|| {
			error(format!(
				"expected '{key}' to be a {expected}, but it is a {}",
				payload.kind()
			))
		})
	}

	pub fn expect_string(&self, key: &str) -> Result<String> {
		self.expect(key, "string", |payload| match payload {
			Payload::String(s) => Some(s.clone()),
			_ => None,
		})
	}

	/// Integers and doubles both count as numbers.
	pub fn expect_number(&self, key: &str) -> Result<f64> {
		self.expect(key, "number", |payload| match payload {
			Payload::Integer(i) => Some(*i as f64),
			Payload::Double(d) => Some(*d),
			_ => None,
		})
	}

	pub fn expect_string_list(&self, key: &str) -> Result<Vec<String>> {
		self.expect(key, "string list", |payload| match payload {
			Payload::StringList(list) => Some(list.clone()),
			_ => None,
		})
	}

	pub fn expect_integer_list(&self, key: &str) -> Result<Vec<i64>> {
		self.expect(key, "integer list", |payload| match payload {
			Payload::IntegerList(list) => Some(list.clone()),
			_ => None,
		})
	}

	pub fn expect_timestamp(&self, key: &str) -> Result<Timestamp> {
		self.expect(key, "timestamp", |payload| match payload {
			Payload::Timestamp(t) => Some(*t),
			_ => None,
		})
	}

	pub fn expect_duration(&self, key: &str) -> Result<Duration> {
		self.expect(key, "duration", |payload| match payload {
			Payload::Duration(d) => Some(*d),
			_ => None,
		})
	}

	/// Substitutes `$(key)` with the rendered value at `key`; `$$` is a
	/// literal `$`.
	pub fn format(&self, template: &str) -> Result<String> {
		let mut out = String::with_capacity(template.len());
		let mut rest = template;
		while let Some(pos) = rest.find('$') {
			out.push_str(&rest[..pos]);
			let tail = &rest[pos + 1..];
			if let Some(after) = tail.strip_prefix('$') {
				out.push('$');
				rest = after;
			} else if let Some(open) = tail.strip_prefix('(') {
				let close = open
					.find(')')
					.ok_or_else(|| error(format!("unterminated reference in '{template}'")))?;
				let key = &open[..close];
				out.push_str(&self.get(key)?.to_string());
				rest = &open[close + 1..];
			} else {
				return Err(error(format!("stray '$' in '{template}'")));
			}
		}
		out.push_str(rest);
		Ok(out)
	}

	pub fn without(&self, keys: &[&str]) -> ValueMap {
		let entries = self
			.entries
			.iter()
			.filter(|(key, _)| !keys.contains(&key.as_str()))
			.cloned()
			.collect::<Vec<_>>();
		ValueMap::rebuild(entries)
	}

	/// Copy of this map with `entries` added; existing keys are overridden
	/// in place.
	pub fn with<K: Into<String>>(&self, entries: impl IntoIterator<Item = (K, Value)>) -> ValueMap {
		let mut list = self.entries.as_ref().clone();
		let mut index = self.index.as_ref().clone();
		for (key, value) in entries {
			let key = key.into();
			match index.get(&key) {
				Some(idx) => list[*idx].1 = value,
				None => {
					index.insert(key.clone(), list.len());
					list.push((key, value));
				}
			}
		}
		ValueMap {
			entries: Rc::new(list),
			index: Rc::new(index),
		}
	}

	fn rebuild(list: Vec<(String, Value)>) -> ValueMap {
		let index = list
			.iter()
			.enumerate()
			.map(|(idx, (key, _))| (key.clone(), idx))
			.collect();
		ValueMap {
			entries: Rc::new(list),
			index: Rc::new(index),
		}
	}

	/// Emits this map once per contained value on subscription, then again
	/// whenever any contained value changes.
	pub fn watch(&self) -> Signal<ValueMap> {
		let this = self.clone();
		let signals = self.entries.iter().map(|(_, value)| value.signal()).collect();
		Signal::merge(signals).map(move |_: &Value| this.clone())
	}

	/// Merges several maps. A key defined by more than one map must hold
	/// equal values in each of them.
	pub fn union(maps: &[&ValueMap]) -> Result<ValueMap> {
		let mut list: Vec<(String, Value)> = Vec::new();
		let mut index: FxHashMap<String, usize> = FxHashMap::default();
		for map in maps {
			for (key, value) in map.entries.iter() {
				match index.get(key) {
					Some(idx) => {
						let existing = &list[*idx].1;
						if !existing.ptr_eq(value) && existing.compare(value) != Ordering::Equal {
							return Err(error(format!(
								"conflicting values for key '{key}': '{existing}' and '{value}'"
							)));
						}
					}
					None => {
						index.insert(key.clone(), list.len());
						list.push((key.clone(), value.clone()));
					}
				}
			}
		}
		Ok(ValueMap {
			entries: Rc::new(list),
			index: Rc::new(index),
		})
	}

	pub fn export_to(&self) -> serde_json::Value {
		serde_json::Value::Object(
			self.entries
				.iter()
				.map(|(key, value)| (key.clone(), value.export_to()))
				.collect(),
		)
	}

	pub fn import_from(&self, json: &serde_json::Value) -> Result<()> {
		let object = json
			.as_object()
			.ok_or_else(|| error(format!("cannot import {json} into a value map")))?;
		let decoded = object
			.iter()
			.map(|(key, item)| -> Result<(Value, Payload)> {
				let value = self.get(key)?;
				let payload = value.decode(item)?;
				Ok((value, payload))
			})
			.collect::<Result<Vec<_>>>()?;
		for (value, payload) in decoded {
			value.assign(payload);
		}
		Ok(())
	}
}

impl fmt::Debug for ValueMap {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.iter()).finish()
	}
}
