//! A small keyed reconciler core for driving hosts through [`Roots`](`lignin_host::root::Roots`) in tests.
//!
//! Render and commit happen in one pass. Children are matched by key (or position if unkeyed), removals are committed
//! first and the surviving and new children are then put in place front to back.

#![allow(dead_code)]

use hashbrown::HashMap;
use lignin_host::{
	props::Props,
	root::{CommitCallback, Reconciler, UpdatePriority},
	scheduler::{Deadline, DeferredCallback},
	ContainerTag, HostConfig, HostError, HostNode, Parent,
};
use std::{cell::RefCell, collections::VecDeque, mem, rc::Rc};

pub fn init_logging() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
	Host {
		type_name: String,
		key: Option<String>,
		props: Props,
		children: Vec<Element>,
	},
	Text {
		key: Option<String>,
		text: String,
	},
}
impl Element {
	#[must_use]
	pub fn with_key(mut self, new_key: &str) -> Self {
		match &mut self {
			Element::Host { key, .. } | Element::Text { key, .. } => *key = Some(new_key.to_owned()),
		}
		self
	}

	fn key(&self, index: usize) -> Key {
		match self {
			Element::Host { key: Some(key), .. } | Element::Text { key: Some(key), .. } => Key::Explicit(key.clone()),
			_ => Key::Index(index),
		}
	}
}

pub fn h(type_name: &str, props: Props, children: Vec<Element>) -> Element {
	Element::Host {
		type_name: type_name.to_owned(),
		key: None,
		props,
		children,
	}
}

pub fn text(text: &str) -> Element {
	Element::Text { key: None, text: text.to_owned() }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
	Explicit(String),
	Index(usize),
}

#[derive(Debug)]
struct Mounted {
	key: Key,
	node: HostNode,
	kind: MountedKind,
}

#[derive(Debug)]
enum MountedKind {
	Host { type_name: String, props: Props, children: Vec<Mounted> },
	Text(String),
}

pub struct RootWork {
	container: ContainerTag,
	children: Vec<Mounted>,
	pending: Option<Option<Element>>,
	callbacks: Vec<CommitCallback>,
}

pub type TestRoot = Rc<RefCell<RootWork>>;

#[derive(Default)]
struct WorkQueue {
	roots: VecDeque<TestRoot>,
	scheduled: bool,
}

#[derive(Default)]
pub struct TestReconciler {
	queue: Rc<RefCell<WorkQueue>>,
	commits: Rc<RefCell<usize>>,
}
impl TestReconciler {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Completed commits so far.
	#[must_use]
	pub fn commits(&self) -> usize {
		*self.commits.borrow()
	}
}

impl<H: HostConfig + 'static> Reconciler<H> for TestReconciler {
	type Element = Element;
	type Root = TestRoot;

	fn create_container(&mut self, host: &mut H, container: ContainerTag) -> Result<Self::Root, HostError> {
		host.get_root_host_context(container)?;
		Ok(Rc::new(RefCell::new(RootWork {
			container,
			children: Vec::new(),
			pending: None,
			callbacks: Vec::new(),
		})))
	}

	fn update_container(&mut self, host: &mut H, root: &mut Self::Root, element: Option<Self::Element>, priority: UpdatePriority, on_commit: Option<CommitCallback>) -> Result<(), HostError> {
		{
			let mut work = root.borrow_mut();
			work.pending = Some(element);
			work.callbacks.extend(on_commit);
		}

		match priority {
			UpdatePriority::Synchronous => perform_work(host, root, &self.commits),
			UpdatePriority::Scheduled => {
				let mut queue = self.queue.borrow_mut();
				if !queue.roots.iter().any(|queued| Rc::ptr_eq(queued, root)) {
					queue.roots.push_back(Rc::clone(root));
				}
				if !queue.scheduled {
					queue.scheduled = true;
					drop(queue);
					host.schedule_deferred_callback(deferred_work(Rc::clone(&self.queue), Rc::clone(&self.commits)))?;
				}
				Ok(())
			}
		}
	}

	fn public_root_instance(&self, host: &H, root: &Self::Root) -> Option<H::PublicInstance> {
		root.borrow().children.first().map(|child| host.get_public_instance(child.node))
	}
}

/// Works through queued roots, one per deadline read, and reschedules itself if time ran out first.
fn deferred_work<H: HostConfig + 'static>(queue: Rc<RefCell<WorkQueue>>, commits: Rc<RefCell<usize>>) -> DeferredCallback<H> {
	Box::new(move |host: &mut H, deadline: &mut Deadline| {
		queue.borrow_mut().scheduled = false;
		while deadline.time_remaining() > 0.0 {
			let next = queue.borrow_mut().roots.pop_front();
			match next {
				Some(root) => perform_work(host, &root, &commits).expect("Deferred commit failed"),
				None => break,
			}
		}

		let mut queue_ref = queue.borrow_mut();
		if !queue_ref.roots.is_empty() {
			queue_ref.scheduled = true;
			drop(queue_ref);
			host.schedule_deferred_callback(deferred_work(Rc::clone(&queue), Rc::clone(&commits)))
				.expect("Deferred work was scheduled twice");
		}
	})
}

fn perform_work<H: HostConfig>(host: &mut H, root: &TestRoot, commits: &Rc<RefCell<usize>>) -> Result<(), HostError> {
	let (callbacks, result) = {
		let mut work = root.borrow_mut();
		let element = match work.pending.take() {
			Some(element) => element,
			None => return Ok(()),
		};
		let container = work.container;

		host.prepare_for_commit();
		let context = host.get_root_host_context(container)?;
		let old = mem::take(&mut work.children);
		let new: Vec<Element> = element.into_iter().collect();
		work.children = reconcile_children(host, Parent::Container(container), container, &context, old, new)?;
		let result = host.reset_after_commit();
		(mem::take(&mut work.callbacks), result)
	};
	result?;

	*commits.borrow_mut() += 1;
	for callback in callbacks {
		callback();
	}
	Ok(())
}

fn reconcile_children<H: HostConfig>(host: &mut H, parent: Parent, root: ContainerTag, context: &H::HostContext, old: Vec<Mounted>, new: Vec<Element>) -> Result<Vec<Mounted>, HostError> {
	let mut current: Vec<HostNode> = old.iter().map(|m| m.node).collect();
	let mut old_by_key: HashMap<Key, Mounted> = old.into_iter().map(|m| (m.key.clone(), m)).collect();

	let mut next = Vec::with_capacity(new.len());
	for (index, element) in new.into_iter().enumerate() {
		let key = element.key(index);
		let reused = match old_by_key.remove(&key) {
			Some(mounted) if same_kind(&mounted, &element) => Some(update(host, root, context, mounted, element.clone())?),
			Some(mounted) => {
				old_by_key.insert(mounted.key.clone(), mounted);
				None
			}
			None => None,
		};
		let mounted = match reused {
			Some(mounted) => mounted,
			None => mount(host, root, context, key, element)?,
		};
		next.push(mounted);
	}

	// Deletions first, so that positions below refer to survivors only.
	let mut removals: Vec<Mounted> = old_by_key.into_iter().map(|(_, mounted)| mounted).collect();
	removals.sort_by_key(|mounted| current.iter().position(|node| *node == mounted.node));
	for removed in removals {
		host.remove_child(parent, removed.node)?;
		current.retain(|node| *node != removed.node);
	}

	for (index, mounted) in next.iter().enumerate() {
		if current.get(index) == Some(&mounted.node) {
			continue;
		}
		match current.get(index) {
			Some(&before) => host.insert_before(parent, mounted.node, before)?,
			None => host.append_child(parent, mounted.node)?,
		}
		current.retain(|node| *node != mounted.node);
		current.insert(index, mounted.node);
	}
	debug_assert_eq!(current, next.iter().map(|m| m.node).collect::<Vec<_>>());

	Ok(next)
}

fn same_kind(mounted: &Mounted, element: &Element) -> bool {
	match (&mounted.kind, element) {
		(MountedKind::Host { type_name: a, .. }, Element::Host { type_name: b, .. }) => a == b,
		(MountedKind::Text(_), Element::Text { .. }) => true,
		_ => false,
	}
}

fn mount<H: HostConfig>(host: &mut H, root: ContainerTag, context: &H::HostContext, key: Key, element: Element) -> Result<Mounted, HostError> {
	match element {
		Element::Text { text, .. } => {
			let node = host.create_text_instance(&text, root, context)?;
			Ok(Mounted {
				key,
				node,
				kind: MountedKind::Text(text),
			})
		}
		Element::Host { type_name, props, children, .. } => {
			let node = host.create_instance(&type_name, &props, root, context)?;
			let child_context = host.get_child_host_context(context, &type_name);
			let mut mounted_children = Vec::new();
			if !host.should_set_text_content(&props) {
				for (index, child) in children.into_iter().enumerate() {
					let child_key = child.key(index);
					let child = mount(host, root, &child_context, child_key, child)?;
					host.append_initial_child(node.tag(), child.node)?;
					mounted_children.push(child);
				}
			}
			if host.finalize_initial_children(node, &type_name, &props, root)? {
				host.commit_mount(node, &type_name, &props)?;
			}
			Ok(Mounted {
				key,
				node,
				kind: MountedKind::Host {
					type_name,
					props,
					children: mounted_children,
				},
			})
		}
	}
}

fn update<H: HostConfig>(host: &mut H, root: ContainerTag, context: &H::HostContext, mounted: Mounted, element: Element) -> Result<Mounted, HostError> {
	let Mounted { key, node, kind } = mounted;
	match (kind, element) {
		(MountedKind::Text(old_text), Element::Text { text, .. }) => {
			if old_text != text {
				host.commit_text_update(node, &old_text, &text)?;
			}
			Ok(Mounted {
				key,
				node,
				kind: MountedKind::Text(text),
			})
		}
		(
			MountedKind::Host {
				type_name,
				props: old_props,
				children: old_children,
			},
			Element::Host { props, children, .. },
		) => {
			if let Some(payload) = host.prepare_update(node, &type_name, &old_props, &props, context) {
				host.commit_update(node, payload, &type_name, &old_props, &props)?;
			}
			let child_context = host.get_child_host_context(context, &type_name);
			let children = if host.should_set_text_content(&props) {
				Vec::new()
			} else {
				reconcile_children(host, Parent::Instance(node.tag()), root, &child_context, old_children, children)?
			};
			Ok(Mounted {
				key,
				node,
				kind: MountedKind::Host { type_name, props, children },
			})
		}
		_ => unreachable!("`same_kind` is checked before updating"),
	}
}
