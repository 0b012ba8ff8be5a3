//! The contract a reconciler core drives during render and commit.

use crate::{
	error::HostError,
	node::{ContainerTag, HostNode, Parent},
	props::Props,
	scheduler::{AnimationCallback, DeferredCallback, Schedule},
	tag::Tag,
};

/// Operations a reconciler core invokes on a host backend.
///
/// All calls come from a single logical caller; there is never more than one structural mutation sequence in flight.
/// Any `Err` aborts the current commit.
pub trait HostConfig: Schedule {
	type HostContext: Clone;
	type UpdatePayload;
	type PublicInstance;

	/// # Errors
	///
	/// Only if the backend is misconfigured.
	fn get_root_host_context(&mut self, root: ContainerTag) -> Result<Self::HostContext, HostError>;
	fn get_child_host_context(&mut self, parent_context: &Self::HostContext, type_name: &str) -> Self::HostContext;
	fn get_public_instance(&self, node: HostNode) -> Self::PublicInstance;

	/// # Errors
	///
	/// Iff the backend failed to create the instance.
	fn create_instance(&mut self, type_name: &str, props: &Props, root: ContainerTag, context: &Self::HostContext) -> Result<HostNode, HostError>;

	/// # Errors
	///
	/// Iff the backend failed to create the text instance.
	fn create_text_instance(&mut self, text: &str, root: ContainerTag, context: &Self::HostContext) -> Result<HostNode, HostError>;

	/// Attaches `child` to a parent that isn't attached to any container yet.
	///
	/// # Errors
	///
	/// Iff `parent` is not a known instance.
	fn append_initial_child(&mut self, parent: Tag, child: HostNode) -> Result<(), HostError>;

	/// Called once all initial children are appended. Returns whether [`HostConfig::commit_mount`] should be called for `instance`.
	///
	/// # Errors
	///
	/// Iff the backend rejected the initial child list.
	fn finalize_initial_children(&mut self, instance: HostNode, type_name: &str, props: &Props, root: ContainerTag) -> Result<bool, HostError>;

	fn should_set_text_content(&self, props: &Props) -> bool;
	fn should_deprioritize_subtree(&self, type_name: &str, props: &Props) -> bool;

	/// Returns [`None`] iff `commit_update` would be a no-op.
	fn prepare_update(&mut self, instance: HostNode, type_name: &str, old_props: &Props, new_props: &Props, context: &Self::HostContext) -> Option<Self::UpdatePayload>;

	/// # Errors
	///
	/// Iff `instance` is unknown or the backend rejected the update.
	fn commit_update(&mut self, instance: HostNode, payload: Self::UpdatePayload, type_name: &str, old_props: &Props, new_props: &Props) -> Result<(), HostError>;

	/// # Errors
	///
	/// Iff the backend rejected the notification.
	fn commit_mount(&mut self, instance: HostNode, type_name: &str, new_props: &Props) -> Result<(), HostError> {
		let _ = (instance, type_name, new_props);
		Ok(())
	}

	/// # Errors
	///
	/// Iff `text_instance` is unknown or the backend rejected the update.
	fn commit_text_update(&mut self, text_instance: HostNode, old_text: &str, new_text: &str) -> Result<(), HostError>;

	/// # Errors
	///
	/// Iff the backend rejected the reset.
	fn reset_text_content(&mut self, instance: HostNode) -> Result<(), HostError> {
		let _ = instance;
		Ok(())
	}

	/// Attaches `child` as last child of `parent`, relocating it if it already is a child there.
	///
	/// # Errors
	///
	/// Iff `parent` is unknown or the backend rejected the change.
	fn append_child(&mut self, parent: Parent, child: HostNode) -> Result<(), HostError>;

	/// Places `child` immediately before `before`.
	///
	/// # Errors
	///
	/// Iff `before` is not a child of `parent`, `parent` doesn't support ordered insertion, or the backend rejected the change.
	fn insert_before(&mut self, parent: Parent, child: HostNode, before: HostNode) -> Result<(), HostError>;

	/// Detaches `child` and retires every tag in its subtree.
	///
	/// # Errors
	///
	/// Iff `child` is not a child of `parent` or the backend rejected the change.
	fn remove_child(&mut self, parent: Parent, child: HostNode) -> Result<(), HostError>;

	fn prepare_for_commit(&mut self) {}

	/// # Errors
	///
	/// Iff the backend rejected commands buffered during the commit.
	fn reset_after_commit(&mut self) -> Result<(), HostError> {
		Ok(())
	}

	/// # Errors
	///
	/// Iff an animation callback is already pending.
	fn schedule_animation_callback(&mut self, callback: AnimationCallback<Self>) -> Result<(), HostError> {
		self.scheduler().schedule_animation(callback)
	}

	/// # Errors
	///
	/// Iff a deferred callback is already pending.
	fn schedule_deferred_callback(&mut self, callback: DeferredCallback<Self>) -> Result<(), HostError> {
		self.scheduler().schedule_deferred(callback)
	}

	/// Discards every remaining top-level child of `container`, for backends that keep stale subviews after an unmount.
	///
	/// # Errors
	///
	/// Iff the backend rejected the request.
	fn detach_container(&mut self, container: ContainerTag) -> Result<(), HostError>;
}
