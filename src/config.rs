//! Interactions described as data.
//!
//! A configuration document names global values by key, refers to per-item
//! values with `{"local": key}`, and spells every update or predicate as a
//! single-key object (`{"set": {...}}`, `{"equals": [a, b]}`, ...). Building
//! never fails on a bad combinator: the broken node turns into an `Invalid`
//! update or predicate that reports its error when it is first run.

use std::rc::Rc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigurationError, Result};
use crate::interactions::{Interactions, Reaction, Watch};
use crate::predicate::Predicate;
use crate::scheduler::Scheduler;
use crate::time::Timestamp;
use crate::update::{Action, Case, Update};
use crate::value::Value;
use crate::value_map::ValueMap;
use crate::value_ref::ValueRef;

fn error(message: impl Into<String>) -> ConfigurationError {
	ConfigurationError::new("config", message)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InteractionsConfig {
	pub actions: Vec<ActionConfig>,
	pub reactions: Vec<ReactionConfig>,
	pub watches: Vec<WatchConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
	pub target: String,
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub updates: Vec<UpdateConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionConfig {
	pub target: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub predicate: PredicateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
	#[serde(rename = "type")]
	pub kind: String,
	pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefConfig {
	Global(String),
	Local(String),
	Literal(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignConfig {
	pub dest: RefConfig,
	pub src: RefConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaseConfig {
	pub predicate: PredicateConfig,
	#[serde(default)]
	pub then: Vec<UpdateConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateConfig {
	Set(AssignConfig),
	SetOrClear(AssignConfig),
	Toggle(AssignConfig),
	Extend(AssignConfig),
	SetIfEmpty(AssignConfig),
	PushLeft(AssignConfig),
	Clear(Vec<RefConfig>),
	Swap(Vec<RefConfig>),
	PopLeft {
		src: RefConfig,
		#[serde(default)]
		dest: Option<RefConfig>,
	},
	Concat {
		dest: RefConfig,
		srcs: Vec<RefConfig>,
	},
	Do(Vec<UpdateConfig>),
	If {
		predicate: PredicateConfig,
		#[serde(default)]
		then: Vec<UpdateConfig>,
		#[serde(default, rename = "else")]
		otherwise: Vec<UpdateConfig>,
	},
	Case(CaseConfig),
	Switch {
		cases: Vec<CaseConfig>,
		#[serde(default)]
		default: Vec<UpdateConfig>,
	},
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateConfig {
	True,
	False,
	Not(Box<PredicateConfig>),
	And(Vec<PredicateConfig>),
	Or(Vec<PredicateConfig>),
	Equals(Vec<RefConfig>),
	LessThan(Vec<RefConfig>),
	GreaterThan(Vec<RefConfig>),
	Includes(Vec<RefConfig>),
	PrefixOf(Vec<RefConfig>),
	Changed {
		values: Vec<RefConfig>,
		#[serde(default)]
		window_ms: Option<u64>,
	},
}

impl InteractionsConfig {
	pub fn from_json(json: &str) -> Result<Self> {
		serde_json::from_str(json).map_err(|err| error(format!("malformed interactions: {err}")))
	}

	/// Resolves global references against `globals`. `scheduler` drives any
	/// `changed` predicate with a window.
	pub fn build(&self, globals: &ValueMap, scheduler: Option<Rc<dyn Scheduler>>) -> Result<Interactions> {
		let builder = Builder { globals, scheduler };
		let mut interactions = Interactions::new();

		for action in &self.actions {
			let updates = action.updates.iter().map(|update| builder.update(update)).collect();
			interactions = interactions.with_action(Action::new(&action.target, &action.kind, updates));
		}

		for reaction in &self.reactions {
			let predicate = builder.predicate(&reaction.predicate);
			interactions = interactions.with_reaction(Reaction::new(&reaction.target, &reaction.kind, predicate));
		}

		for watch in &self.watches {
			let values = watch
				.values
				.iter()
				.map(|key| Ok((key.clone(), globals.get(key)?)))
				.collect::<Result<Vec<_>>>()?;
			interactions = interactions.with_watch(Watch::new(&watch.kind, ValueMap::from_entries(values)?));
		}

		Ok(interactions)
	}
}

struct Builder<'a> {
	globals: &'a ValueMap,
	scheduler: Option<Rc<dyn Scheduler>>,
}

impl Builder<'_> {
	fn value_ref(&self, config: &RefConfig) -> Result<ValueRef> {
		match config {
			RefConfig::Global(key) => Ok(ValueRef::Fixed(self.globals.get(key)?)),
			RefConfig::Local(key) => Ok(ValueRef::Local(key.clone())),
			RefConfig::Literal(json) => Ok(ValueRef::Fixed(literal(json)?)),
		}
	}

	fn value_refs(&self, configs: &[RefConfig]) -> Result<Vec<ValueRef>> {
		configs.iter().map(|config| self.value_ref(config)).collect()
	}

	fn pair(&self, configs: &[RefConfig], name: &str) -> Result<(ValueRef, ValueRef)> {
		match configs {
			[a, b] => Ok((self.value_ref(a)?, self.value_ref(b)?)),
			_ => Err(error(format!("'{name}' takes exactly two values, got {}", configs.len()))),
		}
	}

	fn updates(&self, configs: &[UpdateConfig]) -> Vec<Update> {
		configs.iter().map(|config| self.update(config)).collect()
	}

	fn update(&self, config: &UpdateConfig) -> Update {
		self.try_update(config).unwrap_or_else(Update::Invalid)
	}

	fn try_update(&self, config: &UpdateConfig) -> Result<Update> {
		let assign = |config: &AssignConfig| -> Result<(ValueRef, ValueRef)> {
			Ok((self.value_ref(&config.dest)?, self.value_ref(&config.src)?))
		};

		Ok(match config {
			UpdateConfig::Set(config) => {
				let (dest, src) = assign(config)?;
				Update::Set { dest, src }
			}
			UpdateConfig::SetOrClear(config) => {
				let (dest, src) = assign(config)?;
				Update::SetOrClear { dest, src }
			}
			UpdateConfig::Toggle(config) => {
				let (dest, src) = assign(config)?;
				Update::Toggle { dest, src }
			}
			UpdateConfig::Extend(config) => {
				let (dest, src) = assign(config)?;
				Update::Extend { dest, src }
			}
			UpdateConfig::SetIfEmpty(config) => {
				let (dest, src) = assign(config)?;
				Update::SetIfEmpty { dest, src }
			}
			UpdateConfig::PushLeft(config) => {
				let (dest, src) = assign(config)?;
				Update::PushLeft { dest, src }
			}
			UpdateConfig::Clear(targets) => Update::Clear(self.value_refs(targets)?),
			UpdateConfig::Swap(values) => {
				let (a, b) = self.pair(values, "swap")?;
				Update::Swap(a, b)
			}
			UpdateConfig::PopLeft { src, dest } => Update::PopLeft {
				src: self.value_ref(src)?,
				dest: dest.as_ref().map(|dest| self.value_ref(dest)).transpose()?,
			},
			UpdateConfig::Concat { dest, srcs } => Update::Concat {
				dest: self.value_ref(dest)?,
				srcs: self.value_refs(srcs)?,
			},
			UpdateConfig::Do(updates) => Update::Do(self.updates(updates)),
			UpdateConfig::If {
				predicate,
				then,
				otherwise,
			} => Update::If {
				predicate: self.predicate(predicate),
				then: self.updates(then),
				otherwise: self.updates(otherwise),
			},
			UpdateConfig::Case(case) => Update::Case(self.case(case)),
			UpdateConfig::Switch { cases, default } => Update::Switch {
				cases: cases.iter().map(|case| self.case(case)).collect(),
				default: self.updates(default),
			},
		})
	}

	fn case(&self, config: &CaseConfig) -> Case {
		Case::new(self.predicate(&config.predicate), self.updates(&config.then))
	}

	fn predicate(&self, config: &PredicateConfig) -> Predicate {
		self.try_predicate(config).unwrap_or_else(Predicate::Invalid)
	}

	fn try_predicate(&self, config: &PredicateConfig) -> Result<Predicate> {
		let children = |configs: &[PredicateConfig]| -> Vec<Predicate> {
			configs.iter().map(|config| self.predicate(config)).collect()
		};

		Ok(match config {
			PredicateConfig::True => Predicate::True,
			PredicateConfig::False => Predicate::False,
			PredicateConfig::Not(inner) => Predicate::not(self.predicate(inner)),
			PredicateConfig::And(configs) => Predicate::And(children(configs)),
			PredicateConfig::Or(configs) => Predicate::Or(children(configs)),
			PredicateConfig::Equals(values) => {
				let (a, b) = self.pair(values, "equals")?;
				Predicate::Equals(a, b)
			}
			PredicateConfig::LessThan(values) => {
				let (a, b) = self.pair(values, "less_than")?;
				Predicate::LessThan(a, b)
			}
			PredicateConfig::GreaterThan(values) => {
				let (a, b) = self.pair(values, "greater_than")?;
				Predicate::GreaterThan(a, b)
			}
			PredicateConfig::Includes(values) => {
				let (a, b) = self.pair(values, "includes")?;
				Predicate::Includes(a, b)
			}
			PredicateConfig::PrefixOf(values) => {
				let (a, b) = self.pair(values, "prefix_of")?;
				Predicate::PrefixOf(a, b)
			}
			PredicateConfig::Changed { values, window_ms } => {
				let values = self.value_refs(values)?;
				match window_ms {
					None => Predicate::changed(values),
					Some(window_ms) => {
						let scheduler = self
							.scheduler
							.clone()
							.ok_or_else(|| error("'changed' with a window needs a scheduler"))?;
						Predicate::changed_within(values, Duration::from_millis(*window_ms), scheduler)
					}
				}
			}
		})
	}
}

/// Builds a fixed value from a JSON literal.
fn literal(json: &serde_json::Value) -> Result<Value> {
	use serde_json::Value as Json;

	let unsupported = || error(format!("unsupported literal {json}"));
	Ok(match json {
		Json::Null => Value::empty(),
		Json::String(s) => Value::string(s.clone()),
		Json::Number(n) => match n.as_i64() {
			Some(i) => Value::integer(i),
			None => Value::double(n.as_f64().ok_or_else(unsupported)?),
		},
		Json::Array(items) if items.iter().all(Json::is_string) => {
			Value::string_list(items.iter().filter_map(Json::as_str))
		}
		Json::Array(items) => Value::integer_list(
			items
				.iter()
				.map(Json::as_i64)
				.collect::<Option<Vec<_>>>()
				.ok_or_else(unsupported)?,
		),
		Json::Object(_) => {
			let stamp: Timestamp = serde_json::from_value(json.clone()).map_err(|_| unsupported())?;
			Value::timestamp(Timestamp::checked_new(stamp.seconds, stamp.nanos as i64).ok_or_else(unsupported)?)
		}
		Json::Bool(_) => return Err(unsupported()),
	})
}
