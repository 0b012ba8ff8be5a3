//! An in-memory backend whose tree can be inspected directly. Mainly useful for testing reconciler behaviour.

use crate::{
	error::HostError,
	host::HostConfig,
	node::{take_child, ContainerTag, HostNode, Parent},
	props::{apply_patch, diff_props, PropPatch, PropValue, Props},
	scheduler::{Schedule, Scheduler, SchedulerOptions},
	tag::{Tag, TagRegistry},
};
use core::fmt::Write as _;
use hashbrown::{HashMap, HashSet};
use tracing::{error, instrument, trace, trace_span};

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
	pub tag: Tag,
	pub type_name: String,
	pub props: Props,
	pub children: Vec<HostNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextInstance {
	pub tag: Tag,
	pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
	Instance(Instance),
	Text(TextInstance),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
	pub tag: ContainerTag,
	pub children: Vec<HostNode>,
}

/// Owns every live node in an arena keyed by [`Tag`], plus the containers they are attached to.
#[derive(Debug)]
pub struct MemoryHost {
	tags: TagRegistry,
	nodes: HashMap<Tag, Node>,
	containers: HashMap<ContainerTag, Container>,
	scheduler: Scheduler<Self>,
	fail_in_root_context: bool,
}
impl Default for MemoryHost {
	fn default() -> Self {
		Self::new()
	}
}
impl MemoryHost {
	#[must_use]
	pub fn new() -> Self {
		Self::with_options(SchedulerOptions::default())
	}

	#[must_use]
	pub fn with_options(options: SchedulerOptions) -> Self {
		Self {
			tags: TagRegistry::new(),
			nodes: HashMap::new(),
			containers: HashMap::new(),
			scheduler: Scheduler::new(options),
			fail_in_root_context: false,
		}
	}

	/// Registers an empty container. Does nothing if it already exists.
	pub fn create_container(&mut self, tag: ContainerTag) {
		self.containers.entry(tag).or_insert_with(|| {
			trace!("Created container {}.", tag);
			Container { tag, children: Vec::new() }
		});
	}

	#[must_use]
	pub fn container(&self, tag: ContainerTag) -> Option<&Container> {
		self.containers.get(&tag)
	}

	#[must_use]
	pub fn children(&self, container: ContainerTag) -> Option<&[HostNode]> {
		self.containers.get(&container).map(|c| c.children.as_slice())
	}

	#[must_use]
	pub fn node(&self, tag: Tag) -> Option<&Node> {
		self.nodes.get(&tag)
	}

	#[must_use]
	pub fn instance(&self, tag: Tag) -> Option<&Instance> {
		match self.nodes.get(&tag) {
			Some(Node::Instance(instance)) => Some(instance),
			_ => None,
		}
	}

	#[must_use]
	pub fn text(&self, tag: Tag) -> Option<&TextInstance> {
		match self.nodes.get(&tag) {
			Some(Node::Text(text)) => Some(text),
			_ => None,
		}
	}

	#[must_use]
	pub fn tags(&self) -> &TagRegistry {
		&self.tags
	}

	/// Runs `f` while [`HostConfig::get_root_host_context`] fails with [`HostError::Simulated`].
	///
	/// The failure is switched off again even if `f` panics.
	pub fn simulate_error_in_host_config<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
		struct Reset<'a>(&'a mut MemoryHost);
		impl Drop for Reset<'_> {
			fn drop(&mut self) {
				self.0.fail_in_root_context = false;
			}
		}

		self.fail_in_root_context = true;
		let mut guard = Reset(self);
		f(&mut *guard.0)
	}

	/// Renders the host instances below `container` as an indented list, or [`None`] if there is no such container.
	#[must_use]
	pub fn dump(&self, container: ContainerTag) -> Option<String> {
		fn dump_children(host: &MemoryHost, children: &[HostNode], depth: usize, out: &mut String) {
			for child in children {
				let indent = "  ".repeat(depth);
				match *child {
					HostNode::Instance(tag) => match host.instance(tag) {
						Some(instance) => {
							let _ = writeln!(out, "{}- {}{}", indent, instance.type_name, tag);
							dump_children(host, &instance.children, depth + 1, out);
						}
						None => {
							let _ = writeln!(out, "{}- <missing instance {}>", indent, tag);
						}
					},
					HostNode::Text(tag) => match host.text(tag) {
						Some(text) => {
							let _ = writeln!(out, "{}- {}", indent, text.text);
						}
						None => {
							let _ = writeln!(out, "{}- <missing text {}>", indent, tag);
						}
					},
					HostNode::Raw(tag) => {
						let _ = writeln!(out, "{}- <raw {}>", indent, tag);
					}
				}
			}
		}

		let container = self.containers.get(&container)?;
		let mut out = format!("- [{}]\n", container.tag);
		dump_children(self, &container.children, 1, &mut out);
		Some(out)
	}

	fn children_mut(&mut self, parent: Parent, operation: &'static str) -> Result<&mut Vec<HostNode>, HostError> {
		match parent {
			Parent::Container(container) => self
				.containers
				.get_mut(&container)
				.map(|c| &mut c.children)
				.ok_or(HostError::UnknownContainer { operation, container }),
			Parent::Instance(tag) => match self.nodes.get_mut(&tag) {
				Some(Node::Instance(instance)) => Ok(&mut instance.children),
				Some(Node::Text(_)) => Err(HostError::WrongKind {
					operation,
					node: HostNode::Text(tag),
					expected: "a parent",
				}),
				None => Err(HostError::UnknownTag { operation, tag }),
			},
		}
	}

	fn check_known(&self, node: HostNode, operation: &'static str) -> Result<(), HostError> {
		match node {
			HostNode::Instance(tag) | HostNode::Text(tag) if !self.nodes.contains_key(&tag) => Err(HostError::UnknownTag { operation, tag }),
			HostNode::Raw(tag) if !self.tags.is_live(tag) => Err(HostError::TagNotLive { operation, tag }),
			_ => Ok(()),
		}
	}

	/// Verifies that [`MemoryHost::release_subtree`] would succeed for `node`, without changing anything.
	fn check_subtree(&self, node: HostNode, operation: &'static str) -> Result<(), HostError> {
		let mut seen = HashSet::new();
		let mut stack = vec![node];
		while let Some(node) = stack.pop() {
			self.check_known(node, operation)?;
			if !seen.insert(node.tag()) {
				error!("{} is attached more than once below the removed node.", node);
				return Err(HostError::SharedNode { operation, node });
			}
			if let Some(instance) = self.instance(node.tag()) {
				stack.extend(instance.children.iter().copied());
			}
		}
		Ok(())
	}

	/// Drops `node` and everything below it from the arena and retires their tags.
	fn release_subtree(&mut self, node: HostNode) -> Result<(), HostError> {
		match node {
			HostNode::Instance(tag) | HostNode::Text(tag) => {
				if let Some(Node::Instance(instance)) = self.nodes.remove(&tag) {
					for child in instance.children {
						self.release_subtree(child)?;
					}
				}
				self.tags.release(tag)
			}
			HostNode::Raw(tag) => self.tags.release(tag),
		}
	}
}

impl Schedule for MemoryHost {
	fn scheduler(&mut self) -> &mut Scheduler<Self> {
		&mut self.scheduler
	}
}

impl HostConfig for MemoryHost {
	type HostContext = ();
	type UpdatePayload = PropPatch;
	type PublicInstance = HostNode;

	#[instrument(skip(self))]
	fn get_root_host_context(&mut self, root: ContainerTag) -> Result<Self::HostContext, HostError> {
		if self.fail_in_root_context {
			error!("Simulated host config failure.");
			return Err(HostError::Simulated);
		}
		self.create_container(root);
		Ok(())
	}

	fn get_child_host_context(&mut self, _parent_context: &Self::HostContext, _type_name: &str) -> Self::HostContext {}

	fn get_public_instance(&self, node: HostNode) -> Self::PublicInstance {
		node
	}

	#[cfg_attr(feature = "dangerous-logging", instrument(skip(self, _context)))]
	#[cfg_attr(not(feature = "dangerous-logging"), instrument(skip(self, props, _context)))]
	fn create_instance(&mut self, type_name: &str, props: &Props, root: ContainerTag, _context: &Self::HostContext) -> Result<HostNode, HostError> {
		let tag = self.tags.allocate();
		self.nodes.insert(
			tag,
			Node::Instance(Instance {
				tag,
				type_name: type_name.to_owned(),
				props: props.clone(),
				children: Vec::new(),
			}),
		);
		Ok(HostNode::Instance(tag))
	}

	#[cfg_attr(feature = "dangerous-logging", instrument(skip(self, _context)))]
	#[cfg_attr(not(feature = "dangerous-logging"), instrument(skip(self, text, _context)))]
	fn create_text_instance(&mut self, text: &str, root: ContainerTag, _context: &Self::HostContext) -> Result<HostNode, HostError> {
		let tag = self.tags.allocate();
		self.nodes.insert(tag, Node::Text(TextInstance { tag, text: text.to_owned() }));
		Ok(HostNode::Text(tag))
	}

	#[instrument(skip(self))]
	fn append_initial_child(&mut self, parent: Tag, child: HostNode) -> Result<(), HostError> {
		self.check_known(child, "append_initial_child")?;
		self.children_mut(Parent::Instance(parent), "append_initial_child")?.push(child);
		Ok(())
	}

	fn finalize_initial_children(&mut self, _instance: HostNode, _type_name: &str, _props: &Props, _root: ContainerTag) -> Result<bool, HostError> {
		Ok(false)
	}

	fn should_set_text_content(&self, props: &Props) -> bool {
		matches!(props.get("children"), Some(PropValue::Str(_)) | Some(PropValue::Int(_)) | Some(PropValue::Float(_)))
	}

	fn should_deprioritize_subtree(&self, _type_name: &str, props: &Props) -> bool {
		props.get("hidden").map_or(false, PropValue::is_truthy)
	}

	#[instrument(skip(self, old_props, new_props, _context))]
	fn prepare_update(&mut self, instance: HostNode, type_name: &str, old_props: &Props, new_props: &Props, _context: &Self::HostContext) -> Option<Self::UpdatePayload> {
		diff_props(old_props, new_props)
	}

	#[instrument(skip(self, payload, _old_props, _new_props))]
	fn commit_update(&mut self, instance: HostNode, payload: Self::UpdatePayload, type_name: &str, _old_props: &Props, _new_props: &Props) -> Result<(), HostError> {
		match (instance, self.nodes.get_mut(&instance.tag())) {
			(HostNode::Instance(_), Some(Node::Instance(target))) => {
				apply_patch(&mut target.props, &payload);
				Ok(())
			}
			(HostNode::Instance(tag), _) => Err(HostError::UnknownTag { operation: "commit_update", tag }),
			(node, _) => Err(HostError::WrongKind {
				operation: "commit_update",
				node,
				expected: "an instance",
			}),
		}
	}

	#[cfg_attr(feature = "dangerous-logging", instrument(skip(self)))]
	#[cfg_attr(not(feature = "dangerous-logging"), instrument(skip(self, _old_text, new_text)))]
	fn commit_text_update(&mut self, text_instance: HostNode, _old_text: &str, new_text: &str) -> Result<(), HostError> {
		match (text_instance, self.nodes.get_mut(&text_instance.tag())) {
			(HostNode::Text(_), Some(Node::Text(target))) => {
				new_text.clone_into(&mut target.text);
				Ok(())
			}
			(HostNode::Text(tag), _) => Err(HostError::UnknownTag { operation: "commit_text_update", tag }),
			(node, _) => Err(HostError::WrongKind {
				operation: "commit_text_update",
				node,
				expected: "a text instance",
			}),
		}
	}

	#[instrument(skip(self))]
	fn append_child(&mut self, parent: Parent, child: HostNode) -> Result<(), HostError> {
		self.check_known(child, "append_child")?;
		let children = self.children_mut(parent, "append_child")?;
		if let Some(index) = take_child(children, child) {
			trace!("Relocating existing child from index {} to the end.", index);
		}
		children.push(child);
		Ok(())
	}

	#[instrument(skip(self))]
	fn insert_before(&mut self, parent: Parent, child: HostNode, before: HostNode) -> Result<(), HostError> {
		self.check_known(child, "insert_before")?;
		let children = self.children_mut(parent, "insert_before")?;
		if !children.contains(&before) {
			error!("Insertion point is not a child of the parent.");
			return Err(HostError::NotAChild {
				operation: "insert_before",
				parent,
				child: before,
			});
		}
		if child == before {
			return Ok(());
		}

		take_child(children, child);
		let index = children.iter().position(|c| *c == before).ok_or(HostError::NotAChild {
			operation: "insert_before",
			parent,
			child: before,
		})?;
		children.insert(index, child);
		Ok(())
	}

	#[instrument(skip(self))]
	fn remove_child(&mut self, parent: Parent, child: HostNode) -> Result<(), HostError> {
		if !self.children_mut(parent, "remove_child")?.contains(&child) {
			error!("Removed node is not a child of the parent.");
			return Err(HostError::NotAChild {
				operation: "remove_child",
				parent,
				child,
			});
		}
		self.check_subtree(child, "remove_child")?;
		take_child(self.children_mut(parent, "remove_child")?, child);

		let span = trace_span!("Releasing subtree", %child);
		let _enter = span.enter();
		self.release_subtree(child)
	}

	#[instrument(skip(self))]
	fn detach_container(&mut self, container: ContainerTag) -> Result<(), HostError> {
		let container = match self.containers.remove(&container) {
			Some(container) => container,
			None => {
				trace!("Nothing to detach.");
				return Ok(());
			}
		};
		trace!("Discarding {} remaining top-level child(ren).", container.children.len());
		for child in container.children {
			self.release_subtree(child)?;
		}
		Ok(())
	}
}
