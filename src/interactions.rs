use std::collections::BTreeSet;

use enclose::enclose;
use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{ConfigurationError, Result};
use crate::predicate::Predicate;
use crate::signal::{Signal, Subject, Unsubscribe};
use crate::update::Action;
use crate::value_map::ValueMap;

fn error(message: impl Into<String>) -> ConfigurationError {
	ConfigurationError::new("interactions", message)
}

/// A predicate exposed for `target` to observe as `kind`.
#[derive(Clone, Debug)]
pub struct Reaction {
	pub target: String,
	pub kind: String,
	pub predicate: Predicate,
}

impl Reaction {
	pub fn new(target: impl Into<String>, kind: impl Into<String>, predicate: Predicate) -> Self {
		Reaction {
			target: target.into(),
			kind: kind.into(),
			predicate,
		}
	}

	pub fn matches(&self, local: Option<&ValueMap>) -> Result<Signal<bool>> {
		self.predicate.matches(local)
	}
}

/// A callback fired whenever any of `values` changes.
#[derive(Clone, Debug)]
pub struct Watch {
	pub kind: String,
	pub values: ValueMap,
}

impl Watch {
	pub fn new(kind: impl Into<String>, values: ValueMap) -> Self {
		Watch {
			kind: kind.into(),
			values,
		}
	}

	/// Invokes `callback` with the watched map until `until` fires.
	/// Callback failures are published on the returned channel instead of
	/// reaching whoever changed the value.
	pub fn watch(
		&self,
		callback: impl Fn(&ValueMap) -> Result<()> + 'static,
		until: &Unsubscribe,
	) -> Subject<ConfigurationError> {
		let errors = Subject::replay_all();
		let kind = self.kind.clone();
		self.values.watch().subscribe_until(
			until,
			enclose!((errors) move |values: &ValueMap| {
				if let Err(err) = callback(values) {
					tracing::warn!(watch = %kind, %err, "watch callback failed");
					errors.next(err);
				}
			}),
		);
		errors
	}
}

/// Live predicate for one (target, kind) pair; never emits when nothing is
/// registered for it.
#[derive(Clone, Debug)]
pub struct Matcher {
	predicate: Option<Predicate>,
}

impl Matcher {
	pub fn is_registered(&self) -> bool {
		self.predicate.is_some()
	}

	pub fn matches(&self, local: Option<&ValueMap>) -> Result<Signal<bool>> {
		match &self.predicate {
			Some(predicate) => predicate.matches(local),
			None => Ok(Signal::never()),
		}
	}
}

/// Per-component registry of actions, reactions and watches.
///
/// Built once with the `with_*` methods, then only read.
#[derive(Clone, Debug, Default)]
pub struct Interactions {
	actions: FxHashMap<String, FxHashMap<String, SmallVec<[Action; 1]>>>,
	reactions: FxHashMap<String, FxHashMap<String, Reaction>>,
	watches: FxHashMap<String, Watch>,
}

impl Interactions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Actions sharing a (target, kind) run in registration order.
	pub fn with_action(mut self, action: Action) -> Self {
		self.actions
			.entry(action.target.clone())
			.or_default()
			.entry(action.kind.clone())
			.or_default()
			.push(action);
		self
	}

	pub fn with_reaction(mut self, reaction: Reaction) -> Self {
		let previous = self
			.reactions
			.entry(reaction.target.clone())
			.or_default()
			.insert(reaction.kind.clone(), reaction);
		if let Some(previous) = previous {
			tracing::warn!(on = %previous.target, kind = %previous.kind, "reaction replaced");
		}
		self
	}

	pub fn with_watch(mut self, watch: Watch) -> Self {
		let watch_kind = watch.kind.clone();
		if self.watches.insert(watch_kind.clone(), watch).is_some() {
			tracing::warn!(kind = %watch_kind, "watch replaced");
		}
		self
	}

	/// Runs the actions registered for (`target`, `kind`), if any.
	pub fn update(&self, target: &str, kind: &str, local: Option<&ValueMap>) -> Result<()> {
		let Some(actions) = self.actions.get(target).and_then(|kinds| kinds.get(kind)) else {
			tracing::trace!(on = target, kind, "no action registered");
			return Ok(());
		};
		tracing::debug!(on = target, kind, actions = actions.len(), "running actions");
		actions.iter().try_for_each(|action| action.update(local))
	}

	pub fn match_reaction(&self, target: &str, kind: &str) -> Matcher {
		let predicate = self
			.reactions
			.get(target)
			.and_then(|kinds| kinds.get(kind))
			.map(|reaction| reaction.predicate.clone());
		tracing::debug!(on = target, kind, registered = predicate.is_some(), "reaction matched");
		Matcher { predicate }
	}

	/// Starts the watch registered for `kind`. `None` if there is none.
	pub fn watch(
		&self,
		kind: &str,
		callback: impl Fn(&ValueMap) -> Result<()> + 'static,
		until: &Unsubscribe,
	) -> Option<Subject<ConfigurationError>> {
		self.watches.get(kind).map(|watch| watch.watch(callback, until))
	}

	pub fn check_for_supported_actions(&self, supported: &[(&str, &str)]) -> Result<()> {
		check_pairs("action", pairs(&self.actions), supported)
	}

	pub fn check_for_supported_reactions(&self, supported: &[(&str, &str)]) -> Result<()> {
		check_pairs("reaction", pairs(&self.reactions), supported)
	}

	pub fn check_for_supported_watches(&self, supported: &[&str]) -> Result<()> {
		let unsupported = self
			.watches
			.keys()
			.filter(|kind| !supported.contains(&kind.as_str()))
			.map(|kind| format!("'{kind}'"))
			.collect::<BTreeSet<_>>();
		if unsupported.is_empty() {
			return Ok(());
		}
		Err(error(format!(
			"unsupported watch type(s) {}",
			unsupported.into_iter().collect::<Vec<_>>().join(", ")
		)))
	}
}

fn pairs<T>(registry: &FxHashMap<String, FxHashMap<String, T>>) -> impl Iterator<Item = (&str, &str)> {
	registry
		.iter()
		.flat_map(|(target, kinds)| kinds.keys().map(move |kind| (target.as_str(), kind.as_str())))
}

fn check_pairs<'a>(
	what: &str,
	registered: impl Iterator<Item = (&'a str, &'a str)>,
	supported: &[(&str, &str)],
) -> Result<()> {
	let unsupported = registered
		.filter(|(target, kind)| {
			!supported
				.iter()
				.any(|(allowed_target, allowed_kind)| allowed_target == target && allowed_kind == kind)
		})
		.map(|(target, kind)| format!("{what} type '{kind}' on target '{target}'"))
		.collect::<BTreeSet<_>>();
	if unsupported.is_empty() {
		return Ok(());
	}
	Err(error(format!(
		"unsupported {}",
		unsupported.into_iter().collect::<Vec<_>>().join(", ")
	)))
}
