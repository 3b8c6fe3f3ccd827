use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

pub type Task = Box<dyn FnOnce()>;

/// Runs tasks after a delay on the host's event loop.
pub trait Scheduler {
	fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

#[derive(Clone, Debug, Default)]
pub struct TimerHandle {
	cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.cancelled.set(true)
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.get()
	}
}

/// A scheduler driven by an explicit virtual clock.
#[derive(Clone, Default)]
pub struct ManualScheduler {
	body: Rc<ManualBody>,
}

#[derive(Default)]
struct ManualBody {
	now: Cell<Duration>,
	sequence: Cell<u64>,
	queue: RefCell<BTreeMap<(Duration, u64), (TimerHandle, Task)>>,
}

impl ManualScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn now(&self) -> Duration {
		self.body.now.get()
	}

	/// Number of scheduled, not yet cancelled tasks.
	pub fn pending(&self) -> usize {
		self.body
			.queue
			.borrow()
			.values()
			.filter(|(handle, _)| !handle.is_cancelled())
			.count()
	}

	/// Number of held tasks, cancelled ones included until the next
	/// `schedule` drops them.
	pub fn queued(&self) -> usize {
		self.body.queue.borrow().len()
	}

	/// Moves the clock forward by `by`, running every task that falls due,
	/// in due order.
	pub fn advance(&self, by: Duration) {
		let target = self.now() + by;
		loop {
			let next = {
				let mut queue = self.body.queue.borrow_mut();
				match queue.keys().next().copied() {
					Some(key) if key.0 <= target => queue.remove(&key).map(|entry| (key.0, entry)),
					_ => None,
				}
			};

			let Some((due, (handle, task))) = next else {
				break;
			};

			self.body.now.set(due);
			if !handle.is_cancelled() {
				task();
			}
		}
		self.body.now.set(target);
	}
}

impl Scheduler for ManualScheduler {
	fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
		let handle = TimerHandle::new();
		let sequence = self.body.sequence.get();
		self.body.sequence.set(sequence + 1);

		let due = self.now() + delay;
		tracing::trace!(?due, "timer scheduled");
		let mut queue = self.body.queue.borrow_mut();
		queue.retain(|_, (pending, _)| !pending.is_cancelled());
		queue.insert((due, sequence), (handle.clone(), task));
		handle
	}
}
