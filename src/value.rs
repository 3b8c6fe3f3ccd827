use std::cell::{Ref, RefCell};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use serde_json::json;

use crate::error::{ConfigurationError, Result};
use crate::signal::{Listeners, Signal, Sink, Subscription};
use crate::time::{Duration, Timestamp};

fn error(message: impl Into<String>) -> ConfigurationError {
	ConfigurationError::new("value", message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
	Empty,
	String,
	StringList,
	StringSet,
	Integer,
	IntegerList,
	IntegerSet,
	Double,
	Duration,
	Timestamp,
}

impl ValueKind {
	pub fn is_list(&self) -> bool {
		matches!(self, ValueKind::StringList | ValueKind::IntegerList)
	}

	pub fn is_set(&self) -> bool {
		matches!(self, ValueKind::StringSet | ValueKind::IntegerSet)
	}
}

impl fmt::Display for ValueKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ValueKind::Empty => "empty",
			ValueKind::String => "string",
			ValueKind::StringList => "string list",
			ValueKind::StringSet => "string set",
			ValueKind::Integer => "integer",
			ValueKind::IntegerList => "integer list",
			ValueKind::IntegerSet => "integer set",
			ValueKind::Double => "double",
			ValueKind::Duration => "duration",
			ValueKind::Timestamp => "timestamp",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Clone)]
pub enum Payload {
	Empty,
	String(String),
	StringList(Vec<String>),
	StringSet(BTreeSet<String>),
	Integer(i64),
	IntegerList(Vec<i64>),
	IntegerSet(BTreeSet<i64>),
	Double(f64),
	Duration(Duration),
	Timestamp(Timestamp),
}

/// Elements of a string- or integer-family payload, in iteration order.
///
/// Comparison goes through this coercion whenever either side is a
/// collection, so a scalar equals the one-element collection of its family
/// (`"a"` compares equal to `["a"]` and to `{"a"}`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Elements {
	Strings(Vec<String>),
	Integers(Vec<i64>),
}

impl Payload {
	pub fn kind(&self) -> ValueKind {
		match self {
			Payload::Empty => ValueKind::Empty,
			Payload::String(_) => ValueKind::String,
			Payload::StringList(_) => ValueKind::StringList,
			Payload::StringSet(_) => ValueKind::StringSet,
			Payload::Integer(_) => ValueKind::Integer,
			Payload::IntegerList(_) => ValueKind::IntegerList,
			Payload::IntegerSet(_) => ValueKind::IntegerSet,
			Payload::Double(_) => ValueKind::Double,
			Payload::Duration(_) => ValueKind::Duration,
			Payload::Timestamp(_) => ValueKind::Timestamp,
		}
	}

	pub fn zero(kind: ValueKind) -> Payload {
		match kind {
			ValueKind::Empty => Payload::Empty,
			ValueKind::String => Payload::String(String::new()),
			ValueKind::StringList => Payload::StringList(Vec::new()),
			ValueKind::StringSet => Payload::StringSet(BTreeSet::new()),
			ValueKind::Integer => Payload::Integer(0),
			ValueKind::IntegerList => Payload::IntegerList(Vec::new()),
			ValueKind::IntegerSet => Payload::IntegerSet(BTreeSet::new()),
			ValueKind::Double => Payload::Double(0.0),
			ValueKind::Duration => Payload::Duration(Duration::ZERO),
			ValueKind::Timestamp => Payload::Timestamp(Timestamp::EPOCH),
		}
	}

	pub fn is_zero(&self) -> bool {
		*self == Payload::zero(self.kind())
	}

	pub(crate) fn is_collection(&self) -> bool {
		self.kind().is_list() || self.kind().is_set()
	}

	/// Coerces any string- or integer-family payload into its element
	/// sequence. Scalars become one-element sequences.
	pub(crate) fn elements(&self) -> Option<Elements> {
		match self {
			Payload::String(s) => Some(Elements::Strings(vec![s.clone()])),
			Payload::StringList(list) => Some(Elements::Strings(list.clone())),
			Payload::StringSet(set) => Some(Elements::Strings(set.iter().cloned().collect())),
			Payload::Integer(i) => Some(Elements::Integers(vec![*i])),
			Payload::IntegerList(list) => Some(Elements::Integers(list.clone())),
			Payload::IntegerSet(set) => Some(Elements::Integers(set.iter().copied().collect())),
			_ => None,
		}
	}

	pub(crate) fn from_elements(kind: ValueKind, elements: Elements) -> Option<Payload> {
		match (kind, elements) {
			(ValueKind::StringList, Elements::Strings(list)) => Some(Payload::StringList(list)),
			(ValueKind::StringSet, Elements::Strings(list)) => {
				Some(Payload::StringSet(list.into_iter().collect()))
			}
			(ValueKind::IntegerList, Elements::Integers(list)) => Some(Payload::IntegerList(list)),
			(ValueKind::IntegerSet, Elements::Integers(list)) => {
				Some(Payload::IntegerSet(list.into_iter().collect()))
			}
			_ => None,
		}
	}
}

impl PartialEq for Payload {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Payload::Empty, Payload::Empty) => true,
			(Payload::String(a), Payload::String(b)) => a == b,
			(Payload::StringList(a), Payload::StringList(b)) => a == b,
			(Payload::StringSet(a), Payload::StringSet(b)) => a == b,
			(Payload::Integer(a), Payload::Integer(b)) => a == b,
			(Payload::IntegerList(a), Payload::IntegerList(b)) => a == b,
			(Payload::IntegerSet(a), Payload::IntegerSet(b)) => a == b,
			(Payload::Double(a), Payload::Double(b)) => a.total_cmp(b) == Ordering::Equal,
			(Payload::Duration(a), Payload::Duration(b)) => a == b,
			(Payload::Timestamp(a), Payload::Timestamp(b)) => a == b,
			_ => false,
		}
	}
}

impl fmt::Display for Payload {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Payload::Empty => Ok(()),
			Payload::String(s) => f.write_str(s),
			Payload::StringList(list) => f.write_str(&list.join(", ")),
			Payload::StringSet(set) => f.write_str(&set.iter().cloned().collect::<Vec<_>>().join(", ")),
			Payload::Integer(i) => write!(f, "{i}"),
			Payload::IntegerList(list) => write_joined(f, list.iter()),
			Payload::IntegerSet(set) => write_joined(f, set.iter()),
			Payload::Double(d) => write!(f, "{d}"),
			Payload::Duration(d) => write!(f, "{d}"),
			Payload::Timestamp(t) => write!(f, "{t}"),
		}
	}
}

fn write_joined<'a>(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = &'a i64>) -> fmt::Result {
	for (idx, item) in items.enumerate() {
		if idx > 0 {
			f.write_str(", ")?;
		}
		write!(f, "{item}")?;
	}
	Ok(())
}

/// A typed, mutable, observable datum.
///
/// Cloning a `Value` yields another handle to the same datum. The kind is
/// fixed at construction.
#[derive(Clone)]
pub struct Value {
	body: Rc<ValueBody>,
}

struct ValueBody {
	payload: RefCell<Payload>,
	listeners: Listeners<Value>,
}

impl Value {
	pub fn new(payload: Payload) -> Self {
		Value {
			body: Rc::new(ValueBody {
				payload: RefCell::new(payload),
				listeners: Listeners::default(),
			}),
		}
	}

	pub fn empty() -> Self {
		Value::new(Payload::Empty)
	}

	pub fn string(value: impl Into<String>) -> Self {
		Value::new(Payload::String(value.into()))
	}

	pub fn string_list<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
		Value::new(Payload::StringList(values.into_iter().map(Into::into).collect()))
	}

	pub fn string_set<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
		Value::new(Payload::StringSet(values.into_iter().map(Into::into).collect()))
	}

	pub fn integer(value: i64) -> Self {
		Value::new(Payload::Integer(value))
	}

	pub fn integer_from_f64(value: f64) -> Self {
		Value::new(Payload::Integer(value.floor() as i64))
	}

	pub fn integer_list(values: impl IntoIterator<Item = i64>) -> Self {
		Value::new(Payload::IntegerList(values.into_iter().collect()))
	}

	pub fn integer_set(values: impl IntoIterator<Item = i64>) -> Self {
		Value::new(Payload::IntegerSet(values.into_iter().collect()))
	}

	pub fn double(value: f64) -> Self {
		Value::new(Payload::Double(value))
	}

	pub fn duration(value: Duration) -> Self {
		Value::new(Payload::Duration(value))
	}

	pub fn timestamp(value: Timestamp) -> Self {
		Value::new(Payload::Timestamp(value))
	}

	pub fn zero(kind: ValueKind) -> Self {
		Value::new(Payload::zero(kind))
	}

	#[inline]
	pub fn kind(&self) -> ValueKind {
		self.body.payload.borrow().kind()
	}

	#[inline]
	pub fn get(&self) -> Ref<'_, Payload> {
		self.body.payload.borrow()
	}

	#[inline]
	pub fn payload(&self) -> Payload {
		self.body.payload.borrow().clone()
	}

	pub fn is_zero(&self) -> bool {
		self.body.payload.borrow().is_zero()
	}

	pub fn ptr_eq(&self, other: &Value) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}

	/// A detached copy of the current payload.
	pub fn snapshot(&self) -> Value {
		Value::new(self.payload())
	}

	/// Replaces the payload. Emits only if the payload actually changed.
	pub fn set(&self, payload: Payload) -> Result<()> {
		let kind = self.kind();
		if payload.kind() != kind {
			return Err(error(format!(
				"cannot set a {} value to a {} payload",
				kind,
				payload.kind()
			)));
		}
		self.assign(payload);
		Ok(())
	}

	pub(crate) fn assign(&self, next: Payload) {
		let changed = {
			let mut current = self.body.payload.borrow_mut();
			if *current == next {
				false
			} else {
				*current = next;
				true
			}
		};

		if changed {
			tracing::trace!(
				kind = %self.kind(),
				listeners = self.body.listeners.len(),
				"value changed"
			);
			self.body.listeners.emit(self);
		}
	}

	/// Registers `func`, invoking it immediately with this value and then on
	/// every change.
	pub fn subscribe(&self, func: impl Fn(&Value) + 'static) -> Subscription {
		let subscription = Subscription::new();
		self.attach(subscription.guard(func), &subscription);
		subscription
	}

	fn attach(&self, sink: Sink<Value>, subscription: &Subscription) {
		let id = self.body.listeners.insert(sink.clone());
		let weak = Rc::downgrade(&self.body);
		subscription.add(move || {
			if let Some(body) = weak.upgrade() {
				body.listeners.remove(id);
			}
		});
		sink(self);
	}

	pub fn signal(&self) -> Signal<Value> {
		let this = self.clone();
		Signal::from_fn(move |sink, parent| this.attach(sink, parent))
	}

	/// Merges `other` into this value.
	///
	/// Folding an empty value resets this one to its kind's zero. Scalars
	/// take `other` (or reset when `toggle` is set and both are equal).
	/// Lists replace or append; sets replace, union, or toggle per element.
	pub fn fold(&self, other: &Value, toggle: bool, replace: bool) -> Result<()> {
		let next = self.folded(other, toggle, replace)?;
		self.assign(next);
		Ok(())
	}

	/// The payload `fold` would produce, without applying it.
	pub(crate) fn folded(&self, other: &Value, toggle: bool, replace: bool) -> Result<Payload> {
		let incoming = other.payload();
		let current = self.get();
		fold_payload(&current, &incoming, toggle, replace).ok_or_else(|| {
			error(format!(
				"cannot fold a {} value into a {} value",
				incoming.kind(),
				current.kind()
			))
		})
	}

	pub fn compare(&self, other: &Value) -> Ordering {
		let other = other.payload();
		compare_payloads(&self.get(), &other)
	}

	pub fn includes(&self, other: &Value) -> bool {
		let other = other.payload();
		includes_payload(&self.get(), &other)
	}

	pub fn prefix_of(&self, other: &Value) -> bool {
		let other = other.payload();
		prefix_payload(&self.get(), &other)
	}

	pub fn push_left(&self, other: &Value) -> Result<()> {
		let incoming = other.payload();
		let next = {
			let current = self.get();
			if !current.kind().is_list() {
				return Err(error(format!("cannot push onto a {} value", current.kind())));
			}
			match (current.elements(), incoming_elements(&current, &incoming)) {
				(Some(Elements::Strings(tail)), Some(Elements::Strings(mut head))) => {
					head.extend(tail);
					Payload::StringList(head)
				}
				(Some(Elements::Integers(tail)), Some(Elements::Integers(mut head))) => {
					head.extend(tail);
					Payload::IntegerList(head)
				}
				_ => {
					return Err(error(format!(
						"cannot push a {} value onto a {} value",
						incoming.kind(),
						current.kind()
					)))
				}
			}
		};
		self.assign(next);
		Ok(())
	}

	/// Removes and returns the first element of a list value.
	pub fn pop_left(&self) -> Result<Option<Value>> {
		let Some((rest, head)) = self.split_left()? else {
			return Ok(None);
		};
		self.assign(rest);
		Ok(Some(head))
	}

	/// The element `pop_left` would return, leaving the list as it is.
	pub fn peek_left(&self) -> Result<Option<Value>> {
		Ok(self.split_left()?.map(|(_, head)| head))
	}

	fn split_left(&self) -> Result<Option<(Payload, Value)>> {
		match &*self.get() {
			Payload::StringList(list) => Ok(list
				.split_first()
				.map(|(head, rest)| (Payload::StringList(rest.to_vec()), Value::string(head.clone())))),
			Payload::IntegerList(list) => Ok(list
				.split_first()
				.map(|(head, rest)| (Payload::IntegerList(rest.to_vec()), Value::integer(*head)))),
			other => Err(error(format!("cannot pop from a {} value", other.kind()))),
		}
	}

	/// Sets a list value to the concatenation of `parts`.
	pub fn concat(&self, parts: &[Value]) -> Result<()> {
		let kind = self.kind();
		if !kind.is_list() {
			return Err(error(format!("cannot concatenate into a {kind} value")));
		}

		let mut joined = match Payload::zero(kind).elements() {
			Some(elements) => elements,
			None => return Err(error(format!("cannot concatenate into a {kind} value"))),
		};
		for part in parts {
			let payload = part.payload();
			match (&mut joined, payload.elements()) {
				(Elements::Strings(all), Some(Elements::Strings(more))) => all.extend(more),
				(Elements::Integers(all), Some(Elements::Integers(more))) => all.extend(more),
				_ if payload.kind() == ValueKind::Empty => {}
				_ => {
					return Err(error(format!(
						"cannot concatenate a {} value into a {kind} value",
						payload.kind()
					)))
				}
			}
		}

		match Payload::from_elements(kind, joined) {
			Some(next) => {
				self.assign(next);
				Ok(())
			}
			None => Err(error(format!("cannot concatenate into a {kind} value"))),
		}
	}

	/// Encodes the payload for state persistence.
	pub fn export_to(&self) -> serde_json::Value {
		match &*self.get() {
			Payload::Empty => serde_json::Value::Null,
			Payload::String(s) => json!(s),
			Payload::StringList(list) => json!(list),
			Payload::StringSet(set) => json!(set),
			Payload::Integer(i) => json!(i),
			Payload::IntegerList(list) => json!(list),
			Payload::IntegerSet(set) => json!(set),
			Payload::Double(d) => json!(d),
			Payload::Duration(d) => json!(d.nanos()),
			Payload::Timestamp(t) => json!({ "seconds": t.seconds, "nanos": t.nanos }),
		}
	}

	/// Decodes `json` into this value, interpreting it according to this
	/// value's kind.
	pub fn import_from(&self, json: &serde_json::Value) -> Result<()> {
		let payload = self.decode(json)?;
		self.assign(payload);
		Ok(())
	}

	/// The payload `import_from` would store, without storing it.
	pub(crate) fn decode(&self, json: &serde_json::Value) -> Result<Payload> {
		let kind = self.kind();
		let mismatch = || error(format!("cannot import {json} into a {kind} value"));

		let payload = match kind {
			ValueKind::Empty => match json {
				serde_json::Value::Null => Payload::Empty,
				_ => return Err(mismatch()),
			},
			ValueKind::String => Payload::String(json.as_str().ok_or_else(mismatch)?.to_owned()),
			ValueKind::StringList | ValueKind::StringSet => {
				let strings = json
					.as_array()
					.ok_or_else(mismatch)?
					.iter()
					.map(|item| item.as_str().map(str::to_owned))
					.collect::<Option<Vec<_>>>()
					.ok_or_else(mismatch)?;
				Payload::from_elements(kind, Elements::Strings(strings)).ok_or_else(mismatch)?
			}
			ValueKind::Integer => Payload::Integer(json_integer(json).ok_or_else(mismatch)?),
			ValueKind::IntegerList | ValueKind::IntegerSet => {
				let integers = json
					.as_array()
					.ok_or_else(mismatch)?
					.iter()
					.map(json_integer)
					.collect::<Option<Vec<_>>>()
					.ok_or_else(mismatch)?;
				Payload::from_elements(kind, Elements::Integers(integers)).ok_or_else(mismatch)?
			}
			ValueKind::Double => Payload::Double(json.as_f64().ok_or_else(mismatch)?),
			ValueKind::Duration => {
				Payload::Duration(Duration::from_nanos(json_integer(json).ok_or_else(mismatch)?))
			}
			ValueKind::Timestamp => {
				let stamp: Timestamp = serde_json::from_value(json.clone()).map_err(|_| mismatch())?;
				Payload::Timestamp(Timestamp::checked_new(stamp.seconds, stamp.nanos as i64).ok_or_else(mismatch)?)
			}
		};

		Ok(payload)
	}
}

/// Integers are floored when they arrive as floating numbers.
pub(crate) fn json_integer(json: &serde_json::Value) -> Option<i64> {
	json.as_i64().or_else(|| json.as_f64().map(|f| f.floor() as i64))
}

fn incoming_elements(current: &Payload, incoming: &Payload) -> Option<Elements> {
	match incoming {
		Payload::Empty => Payload::zero(current.kind()).elements(),
		other => other.elements(),
	}
}

fn fold_payload(current: &Payload, other: &Payload, toggle: bool, replace: bool) -> Option<Payload> {
	if let Payload::Empty = other {
		return Some(Payload::zero(current.kind()));
	}

	match current {
		Payload::Empty => None,
		Payload::StringList(list) => match other.elements()? {
			Elements::Strings(seq) => Some(Payload::StringList(fold_list(list, seq, toggle, replace))),
			Elements::Integers(_) => None,
		},
		Payload::IntegerList(list) => match other.elements()? {
			Elements::Integers(seq) => Some(Payload::IntegerList(fold_list(list, seq, toggle, replace))),
			Elements::Strings(_) => None,
		},
		Payload::StringSet(set) => match other.elements()? {
			Elements::Strings(seq) => Some(Payload::StringSet(fold_set(set, seq, toggle, replace))),
			Elements::Integers(_) => None,
		},
		Payload::IntegerSet(set) => match other.elements()? {
			Elements::Integers(seq) => Some(Payload::IntegerSet(fold_set(set, seq, toggle, replace))),
			Elements::Strings(_) => None,
		},
		scalar => {
			if scalar.kind() != other.kind() {
				return None;
			}
			if toggle && scalar == other {
				Some(Payload::zero(scalar.kind()))
			} else {
				Some(other.clone())
			}
		}
	}
}

fn fold_list<E: Clone + PartialEq>(current: &[E], seq: Vec<E>, toggle: bool, replace: bool) -> Vec<E> {
	if replace {
		if toggle && current == seq.as_slice() {
			Vec::new()
		} else {
			seq
		}
	} else {
		let mut next = current.to_vec();
		next.extend(seq);
		next
	}
}

fn fold_set<E: Clone + Ord>(current: &BTreeSet<E>, seq: Vec<E>, toggle: bool, replace: bool) -> BTreeSet<E> {
	let incoming: BTreeSet<E> = seq.into_iter().collect();
	if replace {
		if toggle && *current == incoming {
			BTreeSet::new()
		} else {
			incoming
		}
	} else {
		let mut next = current.clone();
		for item in incoming {
			if toggle && next.contains(&item) {
				next.remove(&item);
			} else {
				next.insert(item);
			}
		}
		next
	}
}

pub(crate) fn compare_payloads(a: &Payload, b: &Payload) -> Ordering {
	match (a, b) {
		(Payload::Empty, Payload::Empty) => Ordering::Equal,
		(Payload::Empty, b) => compare_payloads(&Payload::zero(b.kind()), b),
		(a, Payload::Empty) => compare_payloads(a, &Payload::zero(a.kind())),
		(Payload::String(x), Payload::String(y)) => x.cmp(y),
		(Payload::Integer(x), Payload::Integer(y)) => x.cmp(y),
		(Payload::Double(x), Payload::Double(y)) => x.total_cmp(y),
		(Payload::Duration(x), Payload::Duration(y)) => x.cmp(y),
		(Payload::Timestamp(x), Payload::Timestamp(y)) => x.cmp(y),
		(a, b) if a.is_collection() || b.is_collection() => match (a.elements(), b.elements()) {
			(Some(Elements::Strings(x)), Some(Elements::Strings(y))) => compare_sequences(&x, &y),
			(Some(Elements::Integers(x)), Some(Elements::Integers(y))) => compare_sequences(&x, &y),
			_ => a.kind().cmp(&b.kind()),
		},
		(a, b) => a.kind().cmp(&b.kind()),
	}
}

fn compare_sequences<E: Ord>(a: &[E], b: &[E]) -> Ordering {
	a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn includes_payload(a: &Payload, b: &Payload) -> bool {
	match (a, b) {
		(Payload::Empty, Payload::Empty) => true,
		(Payload::Empty, b) => includes_payload(&Payload::zero(b.kind()), b),
		(a, Payload::Empty) => a.is_collection() || a.is_zero(),
		(Payload::StringSet(set), b) => match b.elements() {
			Some(Elements::Strings(items)) => items.iter().all(|item| set.contains(item)),
			_ => false,
		},
		(Payload::IntegerSet(set), b) => match b.elements() {
			Some(Elements::Integers(items)) => items.iter().all(|item| set.contains(item)),
			_ => false,
		},
		// Lists compare positionally, not as a subset.
		(Payload::StringList(list), b) => match b.elements() {
			Some(Elements::Strings(items)) => *list == items,
			_ => false,
		},
		(Payload::IntegerList(list), b) => match b.elements() {
			Some(Elements::Integers(items)) => *list == items,
			_ => false,
		},
		(a, b) => a.kind() == b.kind() && compare_payloads(a, b) == Ordering::Equal,
	}
}

fn prefix_payload(a: &Payload, b: &Payload) -> bool {
	match (a, incoming_elements(a, b)) {
		(Payload::StringList(prefix), Some(Elements::Strings(items))) => items.starts_with(prefix),
		(Payload::IntegerList(prefix), Some(Elements::Integers(items))) => items.starts_with(prefix),
		_ => false,
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.get().fmt(f)
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.get().fmt(f)
	}
}

impl From<Payload> for Value {
	fn from(payload: Payload) -> Self {
		Value::new(payload)
	}
}

