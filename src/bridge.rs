//! A backend that has no tree of its own on this side and must be told about every change by position.
//!
//! [`BridgeHost`] keeps a mirror of each parent's child order, translates every reconciler operation into
//! index-based [`Command`]s and hands them to a [`Bridge`] as one ordered batch per operation.

use crate::{
	error::{BridgeError, HostError},
	host::HostConfig,
	node::{ContainerTag, HostNode, Parent},
	props::{diff_props, PropPatch, PropValue, Props},
	scheduler::{Schedule, Scheduler, SchedulerOptions},
	tag::{Tag, TagRegistry},
};
use core::mem;
use hashbrown::{HashMap, HashSet};
use std::sync::mpsc::Sender;
use tracing::{error, instrument, trace, trace_span};

/// View name used for text leaves.
pub const TEXT_VIEW_NAME: &str = "RawText";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	/// Create a detached view.
	Create { tag: Tag, type_name: String, root: ContainerTag, props: Props },
	/// Set the complete initial child list of a view that has no children yet.
	SetChildren { parent: Tag, children: Vec<Tag> },
	/// Attach a new child at `index`.
	Attach { parent: Parent, child: Tag, index: usize },
	/// Take the child at `from` and reinsert it in front of the child that was at `to` before the move.
	/// `to` may equal the child count, in which case the child moves to the end.
	Move { parent: Parent, from: usize, to: usize },
	/// Detach and destroy the child at `index`, together with its subtree.
	Detach { parent: Parent, index: usize },
	/// Only the changed keys.
	UpdateProps { tag: Tag, type_name: String, patch: PropPatch },
	UpdateText { tag: Tag, text: String },
	/// Discard all views still attached to `container`.
	RemoveRootView { container: ContainerTag },
}
impl Command {
	#[must_use]
	pub fn kind(&self) -> &'static str {
		match self {
			Command::Create { .. } => "Create",
			Command::SetChildren { .. } => "SetChildren",
			Command::Attach { .. } => "Attach",
			Command::Move { .. } => "Move",
			Command::Detach { .. } => "Detach",
			Command::UpdateProps { .. } => "UpdateProps",
			Command::UpdateText { .. } => "UpdateText",
			Command::RemoveRootView { .. } => "RemoveRootView",
		}
	}
}

/// An ordered command channel to the real backend.
pub trait Bridge {
	/// Delivers `batch` in order.
	///
	/// # Errors
	///
	/// Iff the batch could not be delivered or was rejected. It is not retried.
	fn flush(&mut self, batch: &[Command]) -> Result<(), BridgeError>;
}

impl Bridge for Sender<Vec<Command>> {
	fn flush(&mut self, batch: &[Command]) -> Result<(), BridgeError> {
		self.send(batch.to_vec()).map_err(|_| BridgeError::Disconnected)
	}
}

/// Records every batch it receives. Can be told to reject the next one.
#[derive(Debug, Default, Clone)]
pub struct CommandLog {
	batches: Vec<Vec<Command>>,
	reject_next: Option<String>,
}
impl CommandLog {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn batches(&self) -> &[Vec<Command>] {
		&self.batches
	}

	pub fn commands(&self) -> impl Iterator<Item = &Command> {
		self.batches.iter().flatten()
	}

	/// Removes and returns all recorded commands in order.
	pub fn take(&mut self) -> Vec<Command> {
		mem::take(&mut self.batches).into_iter().flatten().collect()
	}

	pub fn reject_next(&mut self, reason: impl Into<String>) {
		self.reject_next = Some(reason.into());
	}
}
impl Bridge for CommandLog {
	fn flush(&mut self, batch: &[Command]) -> Result<(), BridgeError> {
		if let Some(reason) = self.reject_next.take() {
			return Err(BridgeError::Rejected(reason));
		}
		self.batches.push(batch.to_vec());
		Ok(())
	}
}

#[derive(Debug)]
pub struct BridgeHost<B: Bridge> {
	bridge: B,
	tags: TagRegistry,
	/// Mirror of each instance's child order, as last told to the bridge.
	children: HashMap<Tag, Vec<HostNode>>,
	containers: HashMap<ContainerTag, Vec<HostNode>>,
	pending: Vec<Command>,
	scheduler: Scheduler<Self>,
}
impl<B: Bridge> BridgeHost<B> {
	#[must_use]
	pub fn new(bridge: B) -> Self {
		Self::with_options(bridge, SchedulerOptions::default())
	}

	#[must_use]
	pub fn with_options(bridge: B, options: SchedulerOptions) -> Self {
		Self {
			bridge,
			tags: TagRegistry::new(),
			children: HashMap::new(),
			containers: HashMap::new(),
			pending: Vec::new(),
			scheduler: Scheduler::new(options),
		}
	}

	#[must_use]
	pub fn bridge(&self) -> &B {
		&self.bridge
	}

	pub fn bridge_mut(&mut self) -> &mut B {
		&mut self.bridge
	}

	#[must_use]
	pub fn into_bridge(self) -> B {
		self.bridge
	}

	#[must_use]
	pub fn tags(&self) -> &TagRegistry {
		&self.tags
	}

	/// The mirrored child order of `parent`.
	#[must_use]
	pub fn children(&self, parent: Parent) -> Option<&[HostNode]> {
		let children = match parent {
			Parent::Container(container) => self.containers.get(&container),
			Parent::Instance(tag) => self.children.get(&tag),
		};
		children.map(Vec::as_slice)
	}

	fn queue(&mut self, command: Command) {
		if cfg!(feature = "dangerous-logging") {
			trace!(?command, "Queued command.");
		} else {
			trace!(kind = command.kind(), "Queued command.");
		}
		self.pending.push(command);
	}

	/// Sends everything queued by the current operation as one batch.
	fn flush_pending(&mut self) -> Result<(), HostError> {
		if self.pending.is_empty() {
			return Ok(());
		}
		let batch = mem::take(&mut self.pending);
		trace!("Flushing {} command(s).", batch.len());
		self.bridge.flush(&batch).map_err(|error| {
			error!("Bridge rejected a batch of {} command(s): {}", batch.len(), error);
			HostError::from(error)
		})
	}

	fn children_mut(&mut self, parent: Parent, operation: &'static str) -> Result<&mut Vec<HostNode>, HostError> {
		match parent {
			Parent::Container(container) => self.containers.get_mut(&container).ok_or(HostError::UnknownContainer { operation, container }),
			Parent::Instance(tag) => self.children.get_mut(&tag).ok_or(HostError::UnknownTag { operation, tag }),
		}
	}

	fn check_live(&self, node: HostNode, operation: &'static str) -> Result<(), HostError> {
		if self.tags.is_live(node.tag()) {
			Ok(())
		} else {
			error!("{} was already released.", node);
			Err(HostError::TagNotLive { operation, tag: node.tag() })
		}
	}

	/// Verifies that [`BridgeHost::release_subtree`] would succeed for `node`, without changing anything.
	fn check_subtree(&self, node: HostNode, operation: &'static str) -> Result<(), HostError> {
		let mut seen = HashSet::new();
		let mut stack = vec![node];
		while let Some(node) = stack.pop() {
			self.check_live(node, operation)?;
			if !seen.insert(node.tag()) {
				error!("{} is attached more than once below the removed node.", node);
				return Err(HostError::SharedNode { operation, node });
			}
			if let HostNode::Instance(tag) = node {
				stack.extend(self.children.get(&tag).into_iter().flatten().copied());
			}
		}
		Ok(())
	}

	/// Retires every tag below and including `node` and forgets their mirrors.
	fn release_subtree(&mut self, node: HostNode) -> Result<(), HostError> {
		match node {
			HostNode::Instance(tag) => {
				for child in self.children.remove(&tag).unwrap_or_default() {
					self.release_subtree(child)?;
				}
				self.tags.release(tag)
			}
			HostNode::Text(tag) | HostNode::Raw(tag) => self.tags.release(tag),
		}
	}
}

impl<B: Bridge> Schedule for BridgeHost<B> {
	fn scheduler(&mut self) -> &mut Scheduler<Self> {
		&mut self.scheduler
	}
}

impl<B: Bridge> HostConfig for BridgeHost<B> {
	type HostContext = ();
	type UpdatePayload = PropPatch;
	type PublicInstance = Tag;

	#[instrument(skip(self))]
	fn get_root_host_context(&mut self, root: ContainerTag) -> Result<Self::HostContext, HostError> {
		self.containers.entry(root).or_insert_with(Vec::new);
		Ok(())
	}

	fn get_child_host_context(&mut self, _parent_context: &Self::HostContext, _type_name: &str) -> Self::HostContext {}

	fn get_public_instance(&self, node: HostNode) -> Self::PublicInstance {
		node.tag()
	}

	#[cfg_attr(feature = "dangerous-logging", instrument(skip(self, _context)))]
	#[cfg_attr(not(feature = "dangerous-logging"), instrument(skip(self, props, _context)))]
	fn create_instance(&mut self, type_name: &str, props: &Props, root: ContainerTag, _context: &Self::HostContext) -> Result<HostNode, HostError> {
		let tag = self.tags.allocate();
		self.children.insert(tag, Vec::new());
		self.queue(Command::Create {
			tag,
			type_name: type_name.to_owned(),
			root,
			props: props.clone(),
		});
		self.flush_pending()?;
		Ok(HostNode::Instance(tag))
	}

	#[cfg_attr(feature = "dangerous-logging", instrument(skip(self, _context)))]
	#[cfg_attr(not(feature = "dangerous-logging"), instrument(skip(self, text, _context)))]
	fn create_text_instance(&mut self, text: &str, root: ContainerTag, _context: &Self::HostContext) -> Result<HostNode, HostError> {
		let tag = self.tags.allocate();
		let mut props = Props::new();
		props.insert("text".to_owned(), PropValue::Str(text.to_owned()));
		self.queue(Command::Create {
			tag,
			type_name: TEXT_VIEW_NAME.to_owned(),
			root,
			props,
		});
		self.flush_pending()?;
		Ok(HostNode::Raw(tag))
	}

	#[instrument(skip(self))]
	fn append_initial_child(&mut self, parent: Tag, child: HostNode) -> Result<(), HostError> {
		self.check_live(child, "append_initial_child")?;
		self.children_mut(Parent::Instance(parent), "append_initial_child")?.push(child);
		Ok(())
	}

	#[instrument(skip(self, _props))]
	fn finalize_initial_children(&mut self, instance: HostNode, type_name: &str, _props: &Props, root: ContainerTag) -> Result<bool, HostError> {
		let children: Vec<Tag> = self.children_mut(Parent::Instance(instance.tag()), "finalize_initial_children")?.iter().map(|child| child.tag()).collect();
		if children.is_empty() {
			trace!("No initial children. Not sending a no-op.");
			return Ok(false);
		}
		self.queue(Command::SetChildren { parent: instance.tag(), children });
		self.flush_pending()?;
		Ok(false)
	}

	fn should_set_text_content(&self, _props: &Props) -> bool {
		false
	}

	fn should_deprioritize_subtree(&self, _type_name: &str, _props: &Props) -> bool {
		false
	}

	#[instrument(skip(self, old_props, new_props, _context))]
	fn prepare_update(&mut self, instance: HostNode, type_name: &str, old_props: &Props, new_props: &Props, _context: &Self::HostContext) -> Option<Self::UpdatePayload> {
		diff_props(old_props, new_props)
	}

	#[instrument(skip(self, payload, _old_props, _new_props))]
	fn commit_update(&mut self, instance: HostNode, payload: Self::UpdatePayload, type_name: &str, _old_props: &Props, _new_props: &Props) -> Result<(), HostError> {
		let tag = match instance {
			HostNode::Instance(tag) => tag,
			node => {
				return Err(HostError::WrongKind {
					operation: "commit_update",
					node,
					expected: "an instance",
				})
			}
		};
		if payload.is_empty() {
			trace!("Empty patch. Not sending a no-op.");
			return Ok(());
		}
		self.queue(Command::UpdateProps {
			tag,
			type_name: type_name.to_owned(),
			patch: payload,
		});
		self.flush_pending()
	}

	#[cfg_attr(feature = "dangerous-logging", instrument(skip(self)))]
	#[cfg_attr(not(feature = "dangerous-logging"), instrument(skip(self, _old_text, new_text)))]
	fn commit_text_update(&mut self, text_instance: HostNode, _old_text: &str, new_text: &str) -> Result<(), HostError> {
		let tag = match text_instance {
			HostNode::Raw(tag) | HostNode::Text(tag) => tag,
			node @ HostNode::Instance(_) => {
				return Err(HostError::WrongKind {
					operation: "commit_text_update",
					node,
					expected: "a text instance",
				})
			}
		};
		self.queue(Command::UpdateText { tag, text: new_text.to_owned() });
		self.flush_pending()
	}

	#[instrument(skip(self))]
	fn append_child(&mut self, parent: Parent, child: HostNode) -> Result<(), HostError> {
		self.check_live(child, "append_child")?;
		let children = self.children_mut(parent, "append_child")?;
		let len = children.len();
		let command = match children.iter().position(|c| *c == child) {
			Some(from) if from + 1 == len => {
				trace!("Already the last child.");
				None
			}
			Some(from) => {
				children.remove(from);
				children.push(child);
				Some(Command::Move { parent, from, to: len })
			}
			None => {
				children.push(child);
				Some(Command::Attach {
					parent,
					child: child.tag(),
					index: len,
				})
			}
		};
		if let Some(command) = command {
			self.queue(command);
		}
		self.flush_pending()
	}

	#[instrument(skip(self))]
	fn insert_before(&mut self, parent: Parent, child: HostNode, before: HostNode) -> Result<(), HostError> {
		if let Parent::Container(_) = parent {
			error!("Containers are root wrappers and can't insert before a sibling.");
			return Err(HostError::UnorderedParent { operation: "insert_before", parent });
		}

		self.check_live(child, "insert_before")?;
		let children = self.children_mut(parent, "insert_before")?;
		let to = match children.iter().position(|c| *c == before) {
			Some(to) => to,
			None => {
				error!("Insertion point is not a child of the parent.");
				return Err(HostError::NotAChild {
					operation: "insert_before",
					parent,
					child: before,
				});
			}
		};

		let command = match children.iter().position(|c| *c == child) {
			Some(from) if from == to || from + 1 == to => {
				trace!("Already in place.");
				None
			}
			Some(from) => {
				children.remove(from);
				children.insert(if from < to { to - 1 } else { to }, child);
				Some(Command::Move { parent, from, to })
			}
			None => {
				children.insert(to, child);
				Some(Command::Attach {
					parent,
					child: child.tag(),
					index: to,
				})
			}
		};
		if let Some(command) = command {
			self.queue(command);
		}
		self.flush_pending()
	}

	#[instrument(skip(self))]
	fn remove_child(&mut self, parent: Parent, child: HostNode) -> Result<(), HostError> {
		let index = match self.children_mut(parent, "remove_child")?.iter().position(|c| *c == child) {
			Some(index) => index,
			None => {
				error!("Removed node is not a child of the parent.");
				return Err(HostError::NotAChild {
					operation: "remove_child",
					parent,
					child,
				});
			}
		};
		self.check_subtree(child, "remove_child")?;

		self.children_mut(parent, "remove_child")?.remove(index);
		self.queue(Command::Detach { parent, index });

		{
			let span = trace_span!("Releasing subtree", %child);
			let _enter = span.enter();
			self.release_subtree(child)?;
		}
		self.flush_pending()
	}

	#[instrument(skip(self))]
	fn detach_container(&mut self, container: ContainerTag) -> Result<(), HostError> {
		let remaining = self.containers.remove(&container).unwrap_or_default();
		trace!("Discarding {} remaining top-level child(ren).", remaining.len());
		for child in remaining {
			self.release_subtree(child)?;
		}
		self.queue(Command::RemoveRootView { container });
		self.flush_pending()
	}
}
