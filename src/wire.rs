use fxhash::FxHashMap;
use serde_json::json;

use crate::error::{ConfigurationError, Result};
use crate::time::{Duration, Timestamp};
use crate::value::{json_integer, Payload, Value};

fn error(message: impl Into<String>) -> ConfigurationError {
	ConfigurationError::new("wire", message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueType {
	Unset = 0,
	String = 1,
	StringIndex = 2,
	Strings = 3,
	StringIndices = 4,
	Integer = 5,
	Integers = 6,
	Double = 7,
	Duration = 8,
	Timestamp = 9,
}

impl TryFrom<u64> for ValueType {
	type Error = ConfigurationError;

	fn try_from(tag: u64) -> Result<Self> {
		Ok(match tag {
			0 => ValueType::Unset,
			1 => ValueType::String,
			2 => ValueType::StringIndex,
			3 => ValueType::Strings,
			4 => ValueType::StringIndices,
			5 => ValueType::Integer,
			6 => ValueType::Integers,
			7 => ValueType::Double,
			8 => ValueType::Duration,
			9 => ValueType::Timestamp,
			other => return Err(error(format!("unknown value type tag {other}"))),
		})
	}
}

/// A value as it travels over the response/request protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum V {
	Unset,
	String(String),
	StringIndex(usize),
	Strings(Vec<String>),
	StringIndices(Vec<usize>),
	Integer(i64),
	Integers(Vec<i64>),
	Double(f64),
	/// Nanoseconds.
	Duration(i64),
	Timestamp(Timestamp),
}

impl V {
	pub fn value_type(&self) -> ValueType {
		match self {
			V::Unset => ValueType::Unset,
			V::String(_) => ValueType::String,
			V::StringIndex(_) => ValueType::StringIndex,
			V::Strings(_) => ValueType::Strings,
			V::StringIndices(_) => ValueType::StringIndices,
			V::Integer(_) => ValueType::Integer,
			V::Integers(_) => ValueType::Integers,
			V::Double(_) => ValueType::Double,
			V::Duration(_) => ValueType::Duration,
			V::Timestamp(_) => ValueType::Timestamp,
		}
	}

	/// Parses the `[tag, payload]` JSON form.
	pub fn from_json(json: &serde_json::Value) -> Result<V> {
		let malformed = || error(format!("malformed wire value {json}"));

		let pair = json.as_array().ok_or_else(malformed)?;
		let tag = pair.first().and_then(|tag| tag.as_u64()).ok_or_else(malformed)?;
		let value_type = ValueType::try_from(tag)?;
		if value_type == ValueType::Unset {
			return Ok(V::Unset);
		}

		let payload = pair.get(1).ok_or_else(malformed)?;
		let index = |item: &serde_json::Value| item.as_u64().map(|i| i as usize);
		let items = || payload.as_array().ok_or_else(malformed);

		Ok(match value_type {
			ValueType::Unset => V::Unset,
			ValueType::String => V::String(payload.as_str().ok_or_else(malformed)?.to_owned()),
			ValueType::StringIndex => V::StringIndex(index(payload).ok_or_else(malformed)?),
			ValueType::Strings => V::Strings(
				items()?
					.iter()
					.map(|item| item.as_str().map(str::to_owned))
					.collect::<Option<_>>()
					.ok_or_else(malformed)?,
			),
			ValueType::StringIndices => V::StringIndices(
				items()?
					.iter()
					.map(index)
					.collect::<Option<_>>()
					.ok_or_else(malformed)?,
			),
			ValueType::Integer => V::Integer(json_integer(payload).ok_or_else(malformed)?),
			ValueType::Integers => V::Integers(
				items()?
					.iter()
					.map(json_integer)
					.collect::<Option<_>>()
					.ok_or_else(malformed)?,
			),
			ValueType::Double => V::Double(payload.as_f64().ok_or_else(malformed)?),
			ValueType::Duration => V::Duration(json_integer(payload).ok_or_else(malformed)?),
			ValueType::Timestamp => {
				let parts = items()?;
				match (parts.first().and_then(json_integer), parts.get(1).and_then(json_integer)) {
					(Some(seconds), Some(nanos)) if parts.len() == 2 => {
						V::Timestamp(Timestamp::checked_new(seconds, nanos).ok_or_else(malformed)?)
					}
					_ => return Err(malformed()),
				}
			}
		})
	}

	pub fn to_json(&self) -> serde_json::Value {
		let tag = self.value_type() as u8;
		match self {
			V::Unset => json!([tag]),
			V::String(s) => json!([tag, s]),
			V::StringIndex(i) => json!([tag, i]),
			V::Strings(list) => json!([tag, list]),
			V::StringIndices(list) => json!([tag, list]),
			V::Integer(i) => json!([tag, i]),
			V::Integers(list) => json!([tag, list]),
			V::Double(d) => json!([tag, d]),
			V::Duration(nanos) => json!([tag, nanos]),
			V::Timestamp(t) => json!([tag, [t.seconds, t.nanos]]),
		}
	}
}

/// Interns strings into a table shipped alongside encoded values.
#[derive(Debug, Default, Clone)]
pub struct StringTableBuilder {
	strings: Vec<String>,
	index: FxHashMap<String, usize>,
}

impl StringTableBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn intern(&mut self, value: &str) -> usize {
		if let Some(idx) = self.index.get(value) {
			return *idx;
		}
		let idx = self.strings.len();
		self.strings.push(value.to_owned());
		self.index.insert(value.to_owned(), idx);
		idx
	}

	pub fn strings(&self) -> &[String] {
		&self.strings
	}

	pub fn into_strings(self) -> Vec<String> {
		self.strings
	}

	pub fn len(&self) -> usize {
		self.strings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.strings.is_empty()
	}
}

pub(crate) fn lookup<'a>(table: Option<&'a [String]>, idx: usize) -> Result<&'a str> {
	let table = table.ok_or_else(|| error(format!("string index {idx} given without a string table")))?;
	table
		.get(idx)
		.map(String::as_str)
		.ok_or_else(|| error(format!("string index {idx} out of range ({} entries)", table.len())))
}

impl Value {
	pub fn from_v(v: &V, table: Option<&[String]>) -> Result<Value> {
		Ok(match v {
			V::Unset => Value::empty(),
			V::String(s) => Value::string(s.clone()),
			V::StringIndex(idx) => Value::string(lookup(table, *idx)?),
			V::Strings(list) => Value::string_list(list.iter().cloned()),
			V::StringIndices(indices) => Value::string_list(
				indices
					.iter()
					.map(|idx| lookup(table, *idx))
					.collect::<Result<Vec<_>>>()?,
			),
			V::Integer(i) => Value::integer(*i),
			V::Integers(list) => Value::integer_list(list.iter().copied()),
			V::Double(d) => Value::double(*d),
			V::Duration(nanos) => Value::duration(Duration::from_nanos(*nanos)),
			V::Timestamp(t) => Value::timestamp(*t),
		})
	}

	/// Encodes this value. Strings are interned into `builder` when one is
	/// given.
	pub fn to_v(&self, builder: Option<&mut StringTableBuilder>) -> V {
		match (&*self.get(), builder) {
			(Payload::Empty, _) => V::Unset,
			(Payload::String(s), Some(builder)) => V::StringIndex(builder.intern(s)),
			(Payload::String(s), None) => V::String(s.clone()),
			(Payload::StringList(list), Some(builder)) => {
				V::StringIndices(list.iter().map(|s| builder.intern(s)).collect())
			}
			(Payload::StringList(list), None) => V::Strings(list.clone()),
			(Payload::StringSet(set), Some(builder)) => {
				V::StringIndices(set.iter().map(|s| builder.intern(s)).collect())
			}
			(Payload::StringSet(set), None) => V::Strings(set.iter().cloned().collect()),
			(Payload::Integer(i), _) => V::Integer(*i),
			(Payload::IntegerList(list), _) => V::Integers(list.clone()),
			(Payload::IntegerSet(set), _) => V::Integers(set.iter().copied().collect()),
			(Payload::Double(d), _) => V::Double(*d),
			(Payload::Duration(d), _) => V::Duration(d.nanos()),
			(Payload::Timestamp(t), _) => V::Timestamp(*t),
		}
	}
}
