//! Two independent slots for deferred work, one per [`Band`].
//!
//! The adapter owns no timer. The embedding environment decides when each band runs, typically
//! [`Schedule::flush_animation`] once per display refresh and [`Schedule::flush_deferred`] when idle.

use crate::error::HostError;
use core::fmt::{self, Debug, Display, Formatter};
use tracing::{error, instrument, trace, trace_span};

/// Callback for the [`Band::Animation`] slot. Runs against the host `C` that scheduled it.
pub type AnimationCallback<C> = Box<dyn FnOnce(&mut C)>;

/// Callback for the [`Band::Deferred`] slot. Gets a [`Deadline`] to decide when to yield.
pub type DeferredCallback<C> = Box<dyn FnOnce(&mut C, &mut Deadline)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
	Animation,
	Deferred,
}
impl Display for Band {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Band::Animation => "an animation",
			Band::Deferred => "a deferred",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerOptions {
	/// How much [`Deadline::time_remaining`] drops on each read, in milliseconds.
	pub deadline_quantum_millis: f64,
}
impl Default for SchedulerOptions {
	fn default() -> Self {
		Self { deadline_quantum_millis: 5.0 }
	}
}

/// Simulated idle deadline handed to [`DeferredCallback`]s.
///
/// Every read of [`Deadline::time_remaining`] advances the simulated clock by one quantum,
/// so repeated reads never increase and never drop below zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Deadline {
	remaining: f64,
	quantum: f64,
}
impl Deadline {
	#[must_use]
	pub fn new(budget_millis: f64, quantum_millis: f64) -> Self {
		Self {
			remaining: budget_millis.max(0.0),
			quantum: quantum_millis.max(0.0),
		}
	}

	pub fn time_remaining(&mut self) -> f64 {
		self.remaining = (self.remaining - self.quantum).max(0.0);
		self.remaining
	}
}

/// Holds at most one pending callback per [`Band`].
pub struct Scheduler<C> {
	animation: Option<AnimationCallback<C>>,
	deferred: Option<DeferredCallback<C>>,
	options: SchedulerOptions,
}
impl<C> Debug for Scheduler<C> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Scheduler")
			.field("animation", &self.animation.is_some())
			.field("deferred", &self.deferred.is_some())
			.field("options", &self.options)
			.finish()
	}
}
impl<C> Default for Scheduler<C> {
	fn default() -> Self {
		Self::new(SchedulerOptions::default())
	}
}
impl<C> Scheduler<C> {
	#[must_use]
	pub fn new(options: SchedulerOptions) -> Self {
		Self {
			animation: None,
			deferred: None,
			options,
		}
	}

	/// # Errors
	///
	/// Iff an animation callback is already pending.
	pub fn schedule_animation(&mut self, callback: AnimationCallback<C>) -> Result<(), HostError> {
		if self.animation.is_some() {
			error!("Animation callback scheduled twice.");
			return Err(HostError::AlreadyScheduled { band: Band::Animation });
		}
		trace!("Animation callback scheduled.");
		self.animation = Some(callback);
		Ok(())
	}

	/// # Errors
	///
	/// Iff a deferred callback is already pending.
	pub fn schedule_deferred(&mut self, callback: DeferredCallback<C>) -> Result<(), HostError> {
		if self.deferred.is_some() {
			error!("Deferred callback scheduled twice.");
			return Err(HostError::AlreadyScheduled { band: Band::Deferred });
		}
		trace!("Deferred callback scheduled.");
		self.deferred = Some(callback);
		Ok(())
	}

	#[must_use]
	pub fn is_pending(&self, band: Band) -> bool {
		match band {
			Band::Animation => self.animation.is_some(),
			Band::Deferred => self.deferred.is_some(),
		}
	}

	/// Empties the animation slot.
	pub fn take_animation(&mut self) -> Option<AnimationCallback<C>> {
		self.animation.take()
	}

	/// Empties the deferred slot.
	pub fn take_deferred(&mut self) -> Option<DeferredCallback<C>> {
		self.deferred.take()
	}

	#[must_use]
	pub fn options(&self) -> SchedulerOptions {
		self.options
	}
}

/// Implemented by anything that owns a [`Scheduler`] over itself, which makes the flush operations available.
///
/// Each flush empties its slot before invoking the callback, so a callback may schedule its successor.
/// Flushing an empty slot does nothing.
pub trait Schedule: Sized {
	fn scheduler(&mut self) -> &mut Scheduler<Self>;

	#[instrument(skip(self))]
	fn flush_animation(&mut self) {
		match self.scheduler().take_animation() {
			None => trace!("No animation callback pending."),
			Some(callback) => {
				let span = trace_span!("Animation callback");
				let _enter = span.enter();
				callback(self)
			}
		}
	}

	#[instrument(skip(self))]
	fn flush_deferred(&mut self, budget_millis: f64) {
		let scheduler = self.scheduler();
		let quantum = scheduler.options().deadline_quantum_millis;
		match scheduler.take_deferred() {
			None => trace!("No deferred callback pending."),
			Some(callback) => {
				let span = trace_span!("Deferred callback", budget_millis);
				let _enter = span.enter();
				callback(self, &mut Deadline::new(budget_millis, quantum))
			}
		}
	}

	/// Flushes the animation band, then the deferred band with an unbounded budget.
	fn flush(&mut self) {
		self.flush_animation();
		self.flush_deferred(f64::INFINITY);
	}
}
