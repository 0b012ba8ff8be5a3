use crate::{
	node::{ContainerTag, HostNode, Parent},
	scheduler::Band,
	tag::Tag,
};
use thiserror::Error;

/// Everything that can abort a commit.
///
/// Apart from [`HostError::Bridge`], each variant is an invariant violation: it points to a bug in the reconciler core
/// driving the adapter (or in the adapter itself) and must not be retried or papered over.
#[derive(Debug, Error)]
pub enum HostError {
	#[error("Scheduling {band} callback twice is excessive. Instead, keep track of whether the callback has already been scheduled.")]
	AlreadyScheduled { band: Band },

	#[error("`{operation}`: {child} is not a child of {parent}")]
	NotAChild { operation: &'static str, parent: Parent, child: HostNode },

	#[error("`{operation}`: {parent} does not support ordered insertion")]
	UnorderedParent { operation: &'static str, parent: Parent },

	#[error("`{operation}`: {node} is not {expected}")]
	WrongKind { operation: &'static str, node: HostNode, expected: &'static str },

	#[error("`{operation}`: unknown container {container}")]
	UnknownContainer { operation: &'static str, container: ContainerTag },

	#[error("`{operation}`: unknown tag {tag}")]
	UnknownTag { operation: &'static str, tag: Tag },

	#[error("`{operation}`: tag {tag} is not live (never allocated or already released)")]
	TagNotLive { operation: &'static str, tag: Tag },

	#[error("`{operation}`: {node} is reachable more than once in the subtree")]
	SharedNode { operation: &'static str, node: HostNode },

	#[error("Bridge failed to apply command batch")]
	Bridge(#[from] BridgeError),

	#[error("Error in host config.")]
	Simulated,
}

/// A [`Bridge`](`crate::bridge::Bridge`) refused or could not deliver a batch of commands.
#[derive(Debug, Error)]
pub enum BridgeError {
	#[error("the receiving end of the command channel is gone")]
	Disconnected,

	#[error("command rejected: {0}")]
	Rejected(String),
}
