
mod config;
mod predicates;
mod updates;

use std::cell::RefCell;
use std::rc::Rc;

use traceviz_core::{Signal, Subscription};

/// Collects every emission of `signal` until the subscription is released.
pub fn record<T: Clone + 'static>(signal: &Signal<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
	let seen = Rc::new(RefCell::new(Vec::new()));
	let subscription = signal.subscribe({
		let seen = seen.clone();
		move |value: &T| seen.borrow_mut().push(value.clone())
	});
	(seen, subscription)
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}
