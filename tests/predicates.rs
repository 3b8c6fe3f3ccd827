use std::rc::Rc;
use std::time::Duration;

use mockall::predicate;
use traceviz_core::macros::enclose;
use traceviz_core::{fixed, local, value_map, ConfigurationError, ManualScheduler, Payload, Predicate, Value};

use crate::mock::{SharedMock, Spy};
use crate::record;

#[test]
fn equals_follows_both_values() {
	let mock = SharedMock::new();
	let selected = Value::integer(0);
	let predicate = Predicate::Equals(fixed!(selected), fixed!(Value::integer(42)));

	mock.get()
		.expect_matched()
		.with(predicate::eq(false))
		.times(1)
		.return_const(());
	let subscription = predicate
		.matches(None)
		.unwrap()
		.subscribe(enclose!((mock) move |matched: &bool| mock.get().matched(*matched)));
	mock.get().checkpoint();

	mock.get()
		.expect_matched()
		.with(predicate::eq(true))
		.times(1)
		.return_const(());
	selected.set(Payload::Integer(42)).unwrap();
	selected.set(Payload::Integer(42)).unwrap();
	mock.get().checkpoint();

	subscription.unsubscribe();
	selected.set(Payload::Integer(1)).unwrap();
	mock.get().checkpoint();
}

#[test]
fn ordering_predicates() {
	let a = Value::integer(1);
	let b = Value::integer(2);
	assert!(Predicate::LessThan(fixed!(a), fixed!(b)).snapshot(None).unwrap());
	assert!(!Predicate::GreaterThan(fixed!(a), fixed!(b)).snapshot(None).unwrap());
	assert!(!Predicate::Equals(fixed!(a), fixed!(b)).snapshot(None).unwrap());

	let (seen, _subscription) = record(&Predicate::GreaterThan(fixed!(a), fixed!(b)).matches(None).unwrap());
	a.set(Payload::Integer(3)).unwrap();
	a.set(Payload::Integer(4)).unwrap();
	a.set(Payload::Integer(0)).unwrap();
	assert_eq!(*seen.borrow(), vec![false, true, false]);
}

#[test]
fn includes_and_prefix_of() {
	let selection = Value::string_set(["a"]);
	let (seen, _subscription) = record(
		&Predicate::Includes(fixed!(selection), local!("id"))
			.matches(Some(&value_map! { "id" => Value::string("b") }))
			.unwrap(),
	);
	selection.fold(&Value::string("b"), true, false).unwrap();
	selection.fold(&Value::string("b"), true, false).unwrap();
	assert_eq!(*seen.borrow(), vec![false, true, false]);

	let path = Value::integer_list([1, 2]);
	let prefix = Predicate::PrefixOf(fixed!(Value::integer_list([1])), fixed!(path));
	assert!(prefix.snapshot(None).unwrap());
	path.set(Payload::IntegerList(vec![2])).unwrap();
	assert!(!prefix.snapshot(None).unwrap());
}

#[test]
fn boolean_combinators() {
	let a = Value::integer(0);
	let is_one = Predicate::Equals(fixed!(a), fixed!(Value::integer(1)));
	let both = Predicate::And(vec![is_one.clone(), Predicate::True]);
	let either = Predicate::Or(vec![is_one.clone(), Predicate::False]);
	let neither = Predicate::not(either.clone());

	let (and_seen, _and) = record(&both.matches(None).unwrap());
	let (or_seen, _or) = record(&either.matches(None).unwrap());
	let (not_seen, _not) = record(&neither.matches(None).unwrap());

	a.set(Payload::Integer(1)).unwrap();
	assert_eq!(*and_seen.borrow(), vec![false, true]);
	assert_eq!(*or_seen.borrow(), vec![false, true]);
	assert_eq!(*not_seen.borrow(), vec![true, false]);
}

#[test]
fn empty_junctions() {
	assert!(Predicate::And(vec![]).snapshot(None).unwrap());
	assert!(!Predicate::Or(vec![]).snapshot(None).unwrap());
}

#[test]
fn children_are_all_recombined() {
	let a = Value::integer(0);
	let b = Value::integer(0);
	let any = Predicate::Or(vec![
		Predicate::Equals(fixed!(a), fixed!(Value::integer(1))),
		Predicate::Equals(fixed!(b), fixed!(Value::integer(1))),
	]);
	let (seen, _subscription) = record(&any.matches(None).unwrap());

	a.set(Payload::Integer(1)).unwrap();
	b.set(Payload::Integer(1)).unwrap();
	a.set(Payload::Integer(0)).unwrap();
	assert_eq!(*seen.borrow(), vec![false, true]);

	b.set(Payload::Integer(0)).unwrap();
	assert_eq!(*seen.borrow(), vec![false, true, false]);
}

#[test]
fn unresolved_locals_fail_at_match_time() {
	let predicate = Predicate::Equals(local!("id"), fixed!(Value::integer(1)));
	assert!(predicate.matches(None).is_err());
	assert!(predicate.matches(Some(&value_map! {})).is_err());
	assert!(predicate
		.snapshot(Some(&value_map! { "id" => Value::integer(1) }))
		.unwrap());
}

#[test]
fn invalid_predicates_fail_when_used() {
	let err = ConfigurationError::new("config", "broken");
	let predicate = Predicate::And(vec![Predicate::True, Predicate::Invalid(err.clone())]);
	assert_eq!(predicate.matches(None).unwrap_err(), err);
	assert_eq!(Predicate::not(Predicate::Invalid(err.clone())).snapshot(None).unwrap_err(), err);
}

#[test]
fn changed_without_window_pulses() {
	let a = Value::string("x");
	let (seen, _subscription) = record(&Predicate::changed(vec![fixed!(a)]).matches(None).unwrap());
	assert_eq!(*seen.borrow(), vec![false]);

	a.set(Payload::String("y".into())).unwrap();
	assert_eq!(*seen.borrow(), vec![false, true, false]);

	a.set(Payload::String("y".into())).unwrap();
	assert_eq!(seen.borrow().len(), 3);
}

#[test]
fn changed_holds_for_its_window() {
	crate::init_tracing();

	let scheduler = ManualScheduler::new();
	let a = Value::integer(0);
	let b = Value::integer(0);
	let predicate = Predicate::changed_within(
		vec![fixed!(a), fixed!(b)],
		Duration::from_millis(100),
		Rc::new(scheduler.clone()),
	);
	let (seen, _subscription) = record(&predicate.matches(None).unwrap());
	assert_eq!(*seen.borrow(), vec![false]);

	a.set(Payload::Integer(1)).unwrap();
	assert_eq!(*seen.borrow(), vec![false, true]);

	scheduler.advance(Duration::from_millis(60));
	b.set(Payload::Integer(1)).unwrap();
	scheduler.advance(Duration::from_millis(60));
	assert_eq!(*seen.borrow(), vec![false, true]);

	scheduler.advance(Duration::from_millis(40));
	assert_eq!(*seen.borrow(), vec![false, true, false]);
	assert_eq!(scheduler.pending(), 0);
}

#[test]
fn cancelling_changed_drops_the_timer() {
	let scheduler = ManualScheduler::new();
	let a = Value::integer(0);
	let predicate = Predicate::changed_within(vec![fixed!(a)], Duration::from_millis(10), Rc::new(scheduler.clone()));
	let (seen, subscription) = record(&predicate.matches(None).unwrap());

	a.set(Payload::Integer(1)).unwrap();
	assert_eq!(scheduler.pending(), 1);

	subscription.unsubscribe();
	assert_eq!(scheduler.pending(), 0);
	scheduler.advance(Duration::from_millis(50));
	a.set(Payload::Integer(2)).unwrap();
	assert_eq!(*seen.borrow(), vec![false, true]);
}

#[test]
fn retriggering_changed_reuses_one_timer() {
	let scheduler = ManualScheduler::new();
	let a = Value::integer(0);
	let predicate = Predicate::changed_within(vec![fixed!(a)], Duration::from_millis(10), Rc::new(scheduler.clone()));
	let (seen, _subscription) = record(&predicate.matches(None).unwrap());

	for n in 1..=50 {
		a.set(Payload::Integer(n)).unwrap();
	}
	assert_eq!(scheduler.pending(), 1);
	assert_eq!(scheduler.queued(), 1);

	scheduler.advance(Duration::from_millis(10));
	assert_eq!(seen.borrow().last(), Some(&false));
	assert_eq!(scheduler.queued(), 0);
}

#[test]
fn changed_snapshot_is_false() {
	let predicate = Predicate::changed(vec![fixed!(Value::integer(0))]);
	assert!(!predicate.snapshot(None).unwrap());
}
