//! Tracks which containers have a mounted root and drives their mount/update/unmount lifecycle.

use crate::{error::HostError, host::HostConfig, node::ContainerTag};
use core::{
	cell::Cell,
	fmt::{self, Debug, Formatter},
};
use hashbrown::{hash_map::Entry, HashMap};
use std::rc::Rc;
use tracing::{error, instrument, trace, warn};

/// Invoked by the reconciler core once the commit it was passed with has completed.
pub type CommitCallback = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePriority {
	/// Commit before returning.
	Synchronous,
	/// Commit whenever the reconciler core gets to it, usually from a scheduled callback.
	Scheduled,
}

/// The part of a reconciler core the root registry needs.
pub trait Reconciler<H: HostConfig> {
	type Element;
	/// Opaque per-container handle.
	type Root;

	/// # Errors
	///
	/// Iff the host failed to set up the container.
	fn create_container(&mut self, host: &mut H, container: ContainerTag) -> Result<Self::Root, HostError>;

	/// Reconciles `element` into `root`. [`None`] renders an empty tree.
	///
	/// `on_commit` must be called exactly once, after the resulting commit completed.
	///
	/// # Errors
	///
	/// Iff a synchronous commit failed.
	fn update_container(&mut self, host: &mut H, root: &mut Self::Root, element: Option<Self::Element>, priority: UpdatePriority, on_commit: Option<CommitCallback>) -> Result<(), HostError>;

	fn public_root_instance(&self, host: &H, root: &Self::Root) -> Option<H::PublicInstance>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootState {
	Mounted,
	Updated,
	Unmounting,
	Unmounted,
}

struct RootEntry<T> {
	root: T,
	state: Rc<Cell<RootState>>,
}

/// Maps containers to reconciler roots. At most one root exists per container.
pub struct Roots<H: HostConfig, R: Reconciler<H>> {
	host: H,
	reconciler: R,
	roots: HashMap<ContainerTag, RootEntry<R::Root>>,
}
impl<H: HostConfig + Debug, R: Reconciler<H>> Debug for Roots<H, R> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Roots")
			.field("host", &self.host)
			.field("roots", &self.roots.iter().map(|(container, entry)| (*container, entry.state.get())).collect::<Vec<_>>())
			.finish()
	}
}
impl<H: HostConfig, R: Reconciler<H>> Roots<H, R> {
	#[must_use]
	pub fn new(host: H, reconciler: R) -> Self {
		Self {
			host,
			reconciler,
			roots: HashMap::new(),
		}
	}

	#[must_use]
	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	#[must_use]
	pub fn reconciler(&self) -> &R {
		&self.reconciler
	}

	pub fn into_parts(self) -> (H, R) {
		(self.host, self.reconciler)
	}

	/// Reconciles `element` into `container`, creating its root on first use.
	///
	/// The first mount commits synchronously, later calls are ordinary updates of the same root.
	///
	/// # Errors
	///
	/// Iff the reconciler core reported a failed commit.
	pub fn mount(&mut self, container: ContainerTag, element: R::Element) -> Result<Option<H::PublicInstance>, HostError> {
		self.mount_with_callback(container, element, None)
	}

	/// [`Roots::mount`], with `on_commit` called once the resulting commit completed.
	///
	/// # Errors
	///
	/// Iff the reconciler core reported a failed commit.
	#[instrument(skip(self, element, on_commit))]
	pub fn mount_with_callback(&mut self, container: ContainerTag, element: R::Element, on_commit: Option<CommitCallback>) -> Result<Option<H::PublicInstance>, HostError> {
		self.reap();

		let (entry, priority) = match self.roots.entry(container) {
			Entry::Occupied(occupied) => {
				let entry = occupied.into_mut();
				if entry.state.get() == RootState::Unmounting {
					// The pending unmount's completion must not retire this root.
					warn!("Mounting into {} while its unmount is still pending.", container);
					entry.state = Rc::new(Cell::new(RootState::Updated));
				} else {
					entry.state.set(RootState::Updated);
				}
				(entry, UpdatePriority::Scheduled)
			}
			Entry::Vacant(vacant) => {
				trace!("Creating root.");
				let root = self.reconciler.create_container(&mut self.host, container)?;
				let entry = vacant.insert(RootEntry {
					root,
					state: Rc::new(Cell::new(RootState::Mounted)),
				});
				(entry, UpdatePriority::Synchronous)
			}
		};

		self.reconciler.update_container(&mut self.host, &mut entry.root, Some(element), priority, on_commit)?;
		Ok(self.reconciler.public_root_instance(&self.host, &entry.root))
	}

	/// Reconciles an empty tree into `container` and forgets its root once that commit completed.
	///
	/// Does nothing if no root is mounted there. If the commit fails, the root keeps its previous state,
	/// so that the unmount can be retried.
	///
	/// # Errors
	///
	/// Iff the reconciler core reported a failed commit.
	#[instrument(skip(self))]
	pub fn unmount(&mut self, container: ContainerTag) -> Result<(), HostError> {
		self.reap();

		let entry = match self.roots.get_mut(&container) {
			Some(entry) => entry,
			None => {
				warn!("No root mounted at {}. Nothing to unmount.", container);
				return Ok(());
			}
		};
		if entry.state.get() == RootState::Unmounting {
			trace!("Unmount already pending.");
			return Ok(());
		}

		let previous = entry.state.replace(RootState::Unmounting);
		let state = Rc::clone(&entry.state);
		let result = self.reconciler.update_container(
			&mut self.host,
			&mut entry.root,
			None,
			UpdatePriority::Synchronous,
			Some(Box::new(move || {
				if state.get() == RootState::Unmounting {
					state.set(RootState::Unmounted);
				}
			})),
		);
		if let Err(error) = result {
			error!("Unmount of {} failed: {}", container, error);
			entry.state.set(previous);
			return Err(error);
		}

		self.reap();
		Ok(())
	}

	/// [`Roots::unmount`], then has the host discard whatever is still attached to `container`.
	///
	/// # Errors
	///
	/// Iff the unmount commit failed or the host rejected the detachment.
	#[instrument(skip(self))]
	pub fn unmount_and_detach(&mut self, container: ContainerTag) -> Result<(), HostError> {
		self.unmount(container)?;
		self.host.detach_container(container)
	}

	/// [`RootState::Unmounted`] for containers without a root.
	#[must_use]
	pub fn state(&self, container: ContainerTag) -> RootState {
		self.roots.get(&container).map_or(RootState::Unmounted, |entry| entry.state.get())
	}

	/// Number of roots that haven't finished unmounting.
	#[must_use]
	pub fn len(&self) -> usize {
		self.roots.values().filter(|entry| entry.state.get() != RootState::Unmounted).count()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drops entries whose unmount commit has completed.
	fn reap(&mut self) {
		self.roots.retain(|container, entry| {
			let keep = entry.state.get() != RootState::Unmounted;
			if !keep {
				trace!("Forgetting root of {}.", container);
			}
			keep
		});
	}
}
