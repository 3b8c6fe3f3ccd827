use crate::error::{ConfigurationError, Result};
use crate::predicate::Predicate;
use crate::value::{Payload, Value};
use crate::value_map::ValueMap;
use crate::value_ref::ValueRef;

const COMPONENT: &str = "update";

fn error(message: impl Into<String>) -> ConfigurationError {
	ConfigurationError::new(COMPONENT, message)
}

/// A mutation of one or more values.
#[derive(Clone, Debug)]
pub enum Update {
	/// `dest` takes `src`.
	Set { dest: ValueRef, src: ValueRef },
	/// `dest` takes `src`, or is cleared if it already equals `src`.
	SetOrClear { dest: ValueRef, src: ValueRef },
	/// Scalars behave like `SetOrClear`; sets toggle each element of `src`.
	Toggle { dest: ValueRef, src: ValueRef },
	/// Lists append `src`; sets add its elements.
	Extend { dest: ValueRef, src: ValueRef },
	SetIfEmpty { dest: ValueRef, src: ValueRef },
	Clear(Vec<ValueRef>),
	Swap(ValueRef, ValueRef),
	/// Prepends `src` to the list `dest`.
	PushLeft { dest: ValueRef, src: ValueRef },
	/// Takes the first element off the list `src`, storing it in `dest`.
	PopLeft { src: ValueRef, dest: Option<ValueRef> },
	Concat { dest: ValueRef, srcs: Vec<ValueRef> },
	Do(Vec<Update>),
	If {
		predicate: Predicate,
		then: Vec<Update>,
		otherwise: Vec<Update>,
	},
	Case(Case),
	/// Runs the first case whose predicate currently holds, else `default`.
	Switch { cases: Vec<Case>, default: Vec<Update> },
	/// An update that could not be built; fails when run.
	Invalid(ConfigurationError),
}

#[derive(Clone, Debug)]
pub struct Case {
	pub predicate: Predicate,
	pub updates: Vec<Update>,
}

impl Case {
	pub fn new(predicate: Predicate, updates: Vec<Update>) -> Self {
		Case { predicate, updates }
	}

	/// Runs the updates if the predicate currently holds. Returns whether it
	/// did.
	pub fn update(&self, local: Option<&ValueMap>) -> Result<bool> {
		if !self.predicate.snapshot(local)? {
			return Ok(false);
		}
		run_all(&self.updates, local)?;
		Ok(true)
	}
}

fn run_all(updates: &[Update], local: Option<&ValueMap>) -> Result<()> {
	updates.iter().try_for_each(|update| update.update(local))
}

fn resolve(value_ref: &ValueRef, local: Option<&ValueMap>) -> Result<Value> {
	value_ref.resolve(local, COMPONENT)
}

impl Update {
	pub fn set(dest: ValueRef, src: ValueRef) -> Self {
		Update::Set { dest, src }
	}

	pub fn set_or_clear(dest: ValueRef, src: ValueRef) -> Self {
		Update::SetOrClear { dest, src }
	}

	pub fn toggle(dest: ValueRef, src: ValueRef) -> Self {
		Update::Toggle { dest, src }
	}

	pub fn extend(dest: ValueRef, src: ValueRef) -> Self {
		Update::Extend { dest, src }
	}

	pub fn set_if_empty(dest: ValueRef, src: ValueRef) -> Self {
		Update::SetIfEmpty { dest, src }
	}

	pub fn update(&self, local: Option<&ValueMap>) -> Result<()> {
		match self {
			Update::Set { dest, src } => fold(dest, src, local, false, true),
			Update::SetOrClear { dest, src } => fold(dest, src, local, true, true),
			Update::Toggle { dest, src } => fold(dest, src, local, true, false),
			Update::Extend { dest, src } => fold(dest, src, local, false, false),
			Update::SetIfEmpty { dest, src } => {
				if resolve(dest, local)?.is_zero() {
					fold(dest, src, local, false, true)
				} else {
					Ok(())
				}
			}
			Update::Clear(targets) => {
				let empty = Value::empty();
				for target in targets {
					resolve(target, local)?.fold(&empty, false, true)?;
				}
				Ok(())
			}
			Update::Swap(a, b) => {
				let a = resolve(a, local)?;
				let b = resolve(b, local)?;
				let next_a = folded(&a, &b, false, true)?;
				let next_b = folded(&b, &a, false, true)?;
				a.assign(next_a);
				b.assign(next_b);
				Ok(())
			}
			Update::PushLeft { dest, src } => resolve(dest, local)?.push_left(&resolve(src, local)?),
			Update::PopLeft { src, dest } => {
				let src = resolve(src, local)?;
				let Some(dest) = dest else {
					return src.pop_left().map(drop);
				};
				let dest = resolve(dest, local)?;
				let head = src.peek_left()?.unwrap_or_else(Value::empty);
				let next = folded(&dest, &head, false, true)?;
				src.pop_left()?;
				dest.assign(next);
				Ok(())
			}
			Update::Concat { dest, srcs } => {
				let parts = srcs
					.iter()
					.map(|src| resolve(src, local))
					.collect::<Result<Vec<_>>>()?;
				resolve(dest, local)?.concat(&parts)
			}
			Update::Do(updates) => run_all(updates, local),
			Update::If {
				predicate,
				then,
				otherwise,
			} => {
				if predicate.snapshot(local)? {
					run_all(then, local)
				} else {
					run_all(otherwise, local)
				}
			}
			Update::Case(case) => case.update(local).map(|_| ()),
			Update::Switch { cases, default } => {
				for case in cases {
					if case.update(local)? {
						return Ok(());
					}
				}
				run_all(default, local)
			}
			Update::Invalid(err) => Err(err.clone()),
		}
	}
}

fn fold(dest: &ValueRef, src: &ValueRef, local: Option<&ValueMap>, toggle: bool, replace: bool) -> Result<()> {
	let dest = resolve(dest, local)?;
	let src = resolve(src, local)?;
	let next = folded(&dest, &src, toggle, replace)?;
	dest.assign(next);
	Ok(())
}

fn folded(dest: &Value, src: &Value, toggle: bool, replace: bool) -> Result<Payload> {
	dest.folded(src, toggle, replace)
		.map_err(|err| error(format!("{} (folding into {dest:?})", err.message)))
}

/// The updates run when `target` reports an interaction of `kind`.
#[derive(Clone, Debug)]
pub struct Action {
	pub target: String,
	pub kind: String,
	pub updates: Vec<Update>,
}

impl Action {
	pub fn new(target: impl Into<String>, kind: impl Into<String>, updates: Vec<Update>) -> Self {
		Action {
			target: target.into(),
			kind: kind.into(),
			updates,
		}
	}

	pub fn update(&self, local: Option<&ValueMap>) -> Result<()> {
		run_all(&self.updates, local)
	}
}
