use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use enclose::enclose;
use smallvec::SmallVec;

pub type Sink<T> = Rc<dyn Fn(&T)>;

type Teardown = Box<dyn FnOnce()>;

/// Cancel handle for one subscription.
///
/// Dropping the handle does not cancel anything: a subscription ends only
/// through [`Subscription::unsubscribe`] or through the [`Unsubscribe`]
/// token it was attached to.
#[derive(Clone)]
pub struct Subscription {
	body: Rc<SubscriptionBody>,
}

struct SubscriptionBody {
	active: Cell<bool>,
	teardown: RefCell<SmallVec<[Teardown; 2]>>,
}

impl Default for Subscription {
	fn default() -> Self {
		Subscription::new()
	}
}

impl Subscription {
	pub fn new() -> Self {
		Subscription {
			body: Rc::new(SubscriptionBody {
				active: Cell::new(true),
				teardown: RefCell::new(SmallVec::new()),
			}),
		}
	}

	#[inline]
	pub fn is_closed(&self) -> bool {
		!self.body.active.get()
	}

	/// Registers `teardown` to run on unsubscribe. Runs it right away when
	/// the subscription is already closed.
	pub fn add(&self, teardown: impl FnOnce() + 'static) {
		if self.is_closed() {
			teardown();
			return;
		}
		self.body.teardown.borrow_mut().push(Box::new(teardown));
	}

	pub fn add_child(&self, child: Subscription) {
		self.add(move || child.unsubscribe())
	}

	pub fn unsubscribe(&self) {
		if !self.body.active.replace(false) {
			return;
		}
		let teardown = std::mem::take(&mut *self.body.teardown.borrow_mut());
		for func in teardown {
			func();
		}
	}

	/// Ties the lifetime of this subscription to `token`.
	pub fn until(self, token: &Unsubscribe) -> Self {
		token.attach(&self);
		self
	}

	/// Wraps `func` so that it is skipped once this subscription is closed,
	/// including for emissions already in flight.
	pub(crate) fn guard<T: ?Sized + 'static>(&self, func: impl Fn(&T) + 'static) -> Sink<T> {
		let body = self.body.clone();
		Rc::new(move |value: &T| {
			if body.active.get() {
				func(value)
			}
		})
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("closed", &self.is_closed())
			.finish()
	}
}

/// Teardown signal owned by a component. Firing it releases every
/// subscription attached to it, exactly once.
#[derive(Clone, Default)]
pub struct Unsubscribe {
	body: Rc<UnsubscribeBody>,
}

#[derive(Default)]
struct UnsubscribeBody {
	fired: Cell<bool>,
	subscriptions: RefCell<Vec<Subscription>>,
}

impl Unsubscribe {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_fired(&self) -> bool {
		self.body.fired.get()
	}

	pub fn attach(&self, subscription: &Subscription) {
		if self.is_fired() {
			subscription.unsubscribe();
			return;
		}
		let mut subscriptions = self.body.subscriptions.borrow_mut();
		subscriptions.retain(|attached| !attached.is_closed());
		subscriptions.push(subscription.clone());
	}

	/// Subscriptions currently held, closed ones included until the next
	/// `attach` drops them.
	pub fn attached(&self) -> usize {
		self.body.subscriptions.borrow().len()
	}

	pub fn fire(&self) {
		if self.body.fired.replace(true) {
			return;
		}
		let subscriptions = std::mem::take(&mut *self.body.subscriptions.borrow_mut());
		tracing::debug!(released = subscriptions.len(), "unsubscribe fired");
		for subscription in subscriptions {
			subscription.unsubscribe();
		}
	}
}

impl std::fmt::Debug for Unsubscribe {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Unsubscribe")
			.field("fired", &self.is_fired())
			.field("attached", &self.attached())
			.finish()
	}
}

/// Subscriber table notified in registration order.
pub struct Listeners<T: ?Sized> {
	next: Cell<u64>,
	table: RefCell<BTreeMap<u64, Sink<T>>>,
}

impl<T: ?Sized> Default for Listeners<T> {
	fn default() -> Self {
		Listeners {
			next: Cell::new(0),
			table: RefCell::new(BTreeMap::new()),
		}
	}
}

impl<T: ?Sized> Listeners<T> {
	pub fn insert(&self, sink: Sink<T>) -> u64 {
		let id = self.next.get();
		self.next.set(id + 1);
		self.table.borrow_mut().insert(id, sink);
		id
	}

	pub fn remove(&self, id: u64) {
		self.table.borrow_mut().remove(&id);
	}

	pub fn len(&self) -> usize {
		self.table.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.table.borrow().is_empty()
	}

	pub fn emit(&self, value: &T) {
		// Listeners may subscribe or unsubscribe while being notified.
		let snapshot: SmallVec<[Sink<T>; 4]> = self.table.borrow().values().cloned().collect();
		for sink in snapshot {
			sink(value);
		}
	}
}

/// A cold live stream: every subscriber gets its own upstream
/// subscriptions, released together with the subscriber's [`Subscription`].
pub struct Signal<T: ?Sized> {
	source: Rc<dyn Fn(Sink<T>, &Subscription)>,
}

impl<T: ?Sized> Clone for Signal<T> {
	fn clone(&self) -> Self {
		Signal {
			source: self.source.clone(),
		}
	}
}

impl<T: ?Sized> std::fmt::Debug for Signal<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Signal").finish_non_exhaustive()
	}
}

impl<T: ?Sized + 'static> Signal<T> {
	pub fn from_fn(source: impl Fn(Sink<T>, &Subscription) + 'static) -> Self {
		Signal {
			source: Rc::new(source),
		}
	}

	pub fn never() -> Self {
		Signal::from_fn(|_, _| {})
	}

	pub fn subscribe(&self, func: impl Fn(&T) + 'static) -> Subscription {
		let subscription = Subscription::new();
		let sink = subscription.guard(func);
		(self.source)(sink, &subscription);
		subscription
	}

	/// Subscribes and attaches the subscription to `token` in one step.
	pub fn subscribe_until(&self, token: &Unsubscribe, func: impl Fn(&T) + 'static) -> Subscription {
		self.subscribe(func).until(token)
	}

	pub(crate) fn connect(&self, sink: Sink<T>, parent: &Subscription) {
		let child = Subscription::new();
		(self.source)(child.guard(move |value: &T| sink(value)), &child);
		parent.add_child(child);
	}

	pub fn map<U: 'static>(&self, func: impl Fn(&T) -> U + 'static) -> Signal<U> {
		let upstream = self.clone();
		let func = Rc::new(func);
		Signal::from_fn(move |sink: Sink<U>, parent| {
			upstream.connect(
				Rc::new(enclose!((func) move |value: &T| sink(&func(value)))),
				parent,
			)
		})
	}

	pub fn merge(signals: Vec<Signal<T>>) -> Self {
		Signal::from_fn(move |sink, parent| {
			for signal in &signals {
				signal.connect(sink.clone(), parent);
			}
		})
	}
}

impl<T: Clone + 'static> Signal<T> {
	pub fn just(value: T) -> Self {
		Signal::from_fn(move |sink, _| sink(&value))
	}

	pub fn of(values: Vec<T>) -> Self {
		Signal::from_fn(move |sink, _| {
			for value in &values {
				sink(value)
			}
		})
	}

	/// Emits the latest value of every input each time any of them emits,
	/// once all of them have emitted at least once.
	pub fn combine_latest(signals: Vec<Signal<T>>) -> Signal<Vec<T>> {
		Signal::from_fn(move |sink: Sink<Vec<T>>, parent| {
			let latest: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; signals.len()]));
			for (slot, signal) in signals.iter().enumerate() {
				signal.connect(
					Rc::new(enclose!((latest, sink) move |value: &T| {
						let ready = {
							let mut latest = latest.borrow_mut();
							latest[slot] = Some(value.clone());
							latest.iter().cloned().collect::<Option<Vec<T>>>()
						};
						if let Some(values) = ready {
							sink(&values);
						}
					})),
					parent,
				);
			}
		})
	}
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
	/// Drops emissions equal to the previous one.
	pub fn distinct(&self) -> Self {
		let upstream = self.clone();
		Signal::from_fn(move |sink: Sink<T>, parent| {
			let last: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
			upstream.connect(
				Rc::new(move |value: &T| {
					let fresh = {
						let mut last = last.borrow_mut();
						if last.as_ref() == Some(value) {
							false
						} else {
							*last = Some(value.clone());
							true
						}
					};
					if fresh {
						sink(value);
					}
				}),
				parent,
			)
		})
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Replay {
	Nothing,
	Latest,
	All,
}

/// Hot multicast channel with a replay buffer.
pub struct Subject<T> {
	body: Rc<SubjectBody<T>>,
}

struct SubjectBody<T> {
	replay: Replay,
	buffer: RefCell<VecDeque<T>>,
	listeners: Listeners<T>,
}

impl<T> Clone for Subject<T> {
	fn clone(&self) -> Self {
		Subject {
			body: self.body.clone(),
		}
	}
}

impl<T: Clone + 'static> Subject<T> {
	pub fn new(replay: Replay) -> Self {
		Subject {
			body: Rc::new(SubjectBody {
				replay,
				buffer: RefCell::new(VecDeque::new()),
				listeners: Listeners::default(),
			}),
		}
	}

	pub fn replay_all() -> Self {
		Subject::new(Replay::All)
	}

	pub fn replay_latest() -> Self {
		Subject::new(Replay::Latest)
	}

	pub fn next(&self, value: T) {
		match self.body.replay {
			Replay::Nothing => {}
			Replay::Latest => {
				let mut buffer = self.body.buffer.borrow_mut();
				buffer.clear();
				buffer.push_back(value.clone());
			}
			Replay::All => self.body.buffer.borrow_mut().push_back(value.clone()),
		}
		self.body.listeners.emit(&value);
	}

	pub fn buffered(&self) -> Vec<T> {
		self.body.buffer.borrow().iter().cloned().collect()
	}

	pub fn subscribe(&self, func: impl Fn(&T) + 'static) -> Subscription {
		self.signal().subscribe(func)
	}

	pub fn signal(&self) -> Signal<T> {
		let body = Rc::downgrade(&self.body);
		Signal::from_fn(move |sink: Sink<T>, parent| {
			let Some(body) = body.upgrade() else {
				return;
			};
			let id = body.listeners.insert(sink.clone());
			let weak = Rc::downgrade(&body);
			parent.add(move || {
				if let Some(body) = weak.upgrade() {
					body.listeners.remove(id)
				}
			});
			let replay = body.buffer.borrow().iter().cloned().collect::<Vec<_>>();
			for value in &replay {
				sink(value)
			}
		})
	}
}
