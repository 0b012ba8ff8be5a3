use crate::error::HostError;
use core::fmt::{self, Display, Formatter};
use hashbrown::HashSet;
use tracing::{error, trace};

/// Stable identity of a backend instance.
///
/// Tags are unique for the lifetime of a [`TagRegistry`] and are never handed out again after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(u64);
impl Tag {
	#[must_use]
	pub fn get(self) -> u64 {
		self.0
	}
}
impl Display for Tag {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Allocates [`Tag`]s from a monotonic counter and tracks which of them are still live.
#[derive(Debug)]
pub struct TagRegistry {
	next: u64,
	live: HashSet<Tag>,
}
impl Default for TagRegistry {
	fn default() -> Self {
		Self::new()
	}
}
impl TagRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self { next: 1, live: HashSet::new() }
	}

	/// Returns a tag that was never returned before.
	///
	/// # Panics
	///
	/// Iff more than [`u64::MAX`] tags were allocated.
	pub fn allocate(&mut self) -> Tag {
		let tag = Tag(self.next);
		self.next = self.next.checked_add(1).expect("Tag space exhausted");
		self.live.insert(tag);
		trace!("Allocated tag {}.", tag);
		tag
	}

	/// Retires `tag`. Its value stays reserved.
	///
	/// # Errors
	///
	/// Iff `tag` is not live.
	pub fn release(&mut self, tag: Tag) -> Result<(), HostError> {
		if self.live.remove(&tag) {
			trace!("Released tag {}.", tag);
			Ok(())
		} else {
			error!("Tried to release tag {} which is not live.", tag);
			Err(HostError::TagNotLive { operation: "release", tag })
		}
	}

	#[must_use]
	pub fn is_live(&self, tag: Tag) -> bool {
		self.live.contains(&tag)
	}

	/// Whether `tag` was allocated by this registry and has since been released.
	#[must_use]
	pub fn is_retired(&self, tag: Tag) -> bool {
		tag.0 != 0 && tag.0 < self.next && !self.live.contains(&tag)
	}

	#[must_use]
	pub fn live_count(&self) -> usize {
		self.live.len()
	}
}
