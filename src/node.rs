use crate::tag::Tag;
use core::fmt::{self, Display, Formatter};

/// Identifies a container. Supplied by the embedding environment, never allocated by a [`TagRegistry`](`crate::tag::TagRegistry`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerTag(pub u64);
impl Display for ContainerTag {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "root#{}", self.0)
	}
}

/// A handle to something a backend created, as passed between the reconciler core and the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostNode {
	/// A typed instance that can have children and props.
	Instance(Tag),
	/// A text leaf whose content the backend keeps.
	Text(Tag),
	/// A leaf known only by its tag. The bridge backend creates text this way.
	Raw(Tag),
}
impl HostNode {
	#[must_use]
	pub fn tag(self) -> Tag {
		match self {
			HostNode::Instance(tag) | HostNode::Text(tag) | HostNode::Raw(tag) => tag,
		}
	}
}
impl Display for HostNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			HostNode::Instance(tag) => write!(f, "instance {}", tag),
			HostNode::Text(tag) => write!(f, "text {}", tag),
			HostNode::Raw(tag) => write!(f, "raw leaf {}", tag),
		}
	}
}

/// Where children are attached: either a container or an [`HostNode::Instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
	Container(ContainerTag),
	Instance(Tag),
}
impl Display for Parent {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Parent::Container(container) => write!(f, "container {}", container),
			Parent::Instance(tag) => write!(f, "instance {}", tag),
		}
	}
}

/// Removes `child` from `children` if present, returning its former index.
pub(crate) fn take_child(children: &mut Vec<HostNode>, child: HostNode) -> Option<usize> {
	let index = children.iter().position(|c| *c == child)?;
	children.remove(index);
	Some(index)
}
