use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use enclose::enclose;

use crate::error::{ConfigurationError, Result};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::signal::{Signal, Sink};
use crate::value::Value;
use crate::value_map::ValueMap;
use crate::value_ref::ValueRef;

fn error(message: impl Into<String>) -> ConfigurationError {
	ConfigurationError::new("predicate", message)
}

/// A live boolean condition over values.
#[derive(Clone, Debug)]
pub enum Predicate {
	Changed(Changed),
	True,
	False,
	Not(Box<Predicate>),
	And(Vec<Predicate>),
	Or(Vec<Predicate>),
	Equals(ValueRef, ValueRef),
	LessThan(ValueRef, ValueRef),
	GreaterThan(ValueRef, ValueRef),
	/// The first value includes the second.
	Includes(ValueRef, ValueRef),
	/// The first value is a positional prefix of the second.
	PrefixOf(ValueRef, ValueRef),
	/// A predicate that could not be built; fails when used.
	Invalid(ConfigurationError),
}

/// True for a while after any of `values` changes.
#[derive(Clone)]
pub struct Changed {
	pub values: Vec<ValueRef>,
	pub window: Option<Duration>,
	pub scheduler: Option<Rc<dyn Scheduler>>,
}

impl fmt::Debug for Changed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Changed")
			.field("values", &self.values)
			.field("window", &self.window)
			.finish()
	}
}

impl Predicate {
	/// Pulses `true` then `false` on every change.
	pub fn changed(values: Vec<ValueRef>) -> Self {
		Predicate::Changed(Changed {
			values,
			window: None,
			scheduler: None,
		})
	}

	/// Stays `true` until `window` passes without another change.
	pub fn changed_within(values: Vec<ValueRef>, window: Duration, scheduler: Rc<dyn Scheduler>) -> Self {
		Predicate::Changed(Changed {
			values,
			window: Some(window),
			scheduler: Some(scheduler),
		})
	}

	pub fn not(predicate: Predicate) -> Self {
		Predicate::Not(Box::new(predicate))
	}

	pub fn matches(&self, local: Option<&ValueMap>) -> Result<Signal<bool>> {
		match self {
			Predicate::Changed(changed) => changed.matches(local),
			Predicate::True => Ok(Signal::just(true)),
			Predicate::False => Ok(Signal::just(false)),
			Predicate::Not(inner) => Ok(inner.matches(local)?.map(|matched: &bool| !matched).distinct()),
			Predicate::And(children) => combine(children, local, true),
			Predicate::Or(children) => combine(children, local, false),
			Predicate::Equals(a, b) => relate(a, b, local, |a, b| a.compare(b) == Ordering::Equal),
			Predicate::LessThan(a, b) => relate(a, b, local, |a, b| a.compare(b) == Ordering::Less),
			Predicate::GreaterThan(a, b) => relate(a, b, local, |a, b| a.compare(b) == Ordering::Greater),
			Predicate::Includes(a, b) => relate(a, b, local, |a, b| a.includes(b)),
			Predicate::PrefixOf(a, b) => relate(a, b, local, |a, b| a.prefix_of(b)),
			Predicate::Invalid(err) => Err(err.clone()),
		}
	}

	/// Reads the current result once: subscribes, takes what the live
	/// signal emits synchronously, and unsubscribes.
	pub fn snapshot(&self, local: Option<&ValueMap>) -> Result<bool> {
		let signal = self.matches(local)?;
		let latest = Rc::new(Cell::new(None));
		let subscription = signal.subscribe(enclose!((latest) move |matched: &bool| latest.set(Some(*matched))));
		subscription.unsubscribe();
		latest
			.get()
			.ok_or_else(|| error(format!("{self:?} produced no current value")))
	}
}

/// `all` selects conjunction, otherwise disjunction. Every child stays
/// subscribed; nothing short-circuits.
fn combine(children: &[Predicate], local: Option<&ValueMap>, all: bool) -> Result<Signal<bool>> {
	if children.is_empty() {
		return Ok(Signal::just(all));
	}
	let signals = children
		.iter()
		.map(|child| child.matches(local))
		.collect::<Result<Vec<_>>>()?;
	Ok(Signal::combine_latest(signals)
		.map(move |latest: &Vec<bool>| {
			if all {
				latest.iter().all(|matched| *matched)
			} else {
				latest.iter().any(|matched| *matched)
			}
		})
		.distinct())
}

fn relate(
	a: &ValueRef,
	b: &ValueRef,
	local: Option<&ValueMap>,
	test: fn(&Value, &Value) -> bool,
) -> Result<Signal<bool>> {
	let a = a.resolve(local, "predicate")?;
	let b = b.resolve(local, "predicate")?;
	Ok(Signal::combine_latest(vec![a.signal(), b.signal()])
		.map(move |values: &Vec<Value>| test(&values[0], &values[1]))
		.distinct())
}

impl Changed {
	fn matches(&self, local: Option<&ValueMap>) -> Result<Signal<bool>> {
		let values = self
			.values
			.iter()
			.map(|value_ref| value_ref.resolve(local, "predicate"))
			.collect::<Result<Vec<_>>>()?;

		let timing = match (self.window, &self.scheduler) {
			(None, _) => None,
			(Some(window), Some(scheduler)) => Some((window, scheduler.clone())),
			(Some(_), None) => return Err(error("a changed window needs a scheduler")),
		};

		let source = Signal::merge(values.iter().map(Value::signal).collect());
		let signal = Signal::from_fn(move |sink: Sink<bool>, parent| {
			// Values replay on subscribe; those replays are not changes.
			let armed = Rc::new(Cell::new(false));
			let pending: Rc<RefCell<Option<TimerHandle>>> = Rc::new(RefCell::new(None));

			source.connect(
				Rc::new(enclose!((armed, pending, sink, timing) move |_: &Value| {
					if !armed.get() {
						return;
					}
					sink(&true);
					match &timing {
						None => sink(&false),
						Some((window, scheduler)) => {
							if let Some(previous) = pending.borrow_mut().take() {
								previous.cancel();
							}
							let handle = scheduler.schedule(*window, Box::new(enclose!((sink) move || sink(&false))));
							*pending.borrow_mut() = Some(handle);
						}
					}
				})),
				parent,
			);

			parent.add(enclose!((pending) move || {
				if let Some(handle) = pending.borrow_mut().take() {
					handle.cancel();
				}
			}));

			armed.set(true);
			sink(&false);
		});

		Ok(signal.distinct())
	}
}
