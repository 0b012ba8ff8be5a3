#![doc(html_root_url = "https://docs.rs/lignin-host/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A host adapter for tree reconcilers.
//!
//! A reconciler core decides *what* changed between two virtual trees and then, during its commit phase, calls into a
//! [`HostConfig`](`host::HostConfig`) to make it so. This crate provides two such hosts:
//!
//! - [`MemoryHost`](`memory::MemoryHost`) keeps the whole instance tree in memory, so it can be inspected directly.
//! - [`BridgeHost`](`bridge::BridgeHost`) mirrors only child order and emits minimal index-based [`Command`](`bridge::Command`)s
//!   to a backend that is reachable only through an ordered [`Bridge`](`bridge::Bridge`).
//!
//! Both own a [`Scheduler`](`scheduler::Scheduler`) with one slot per priority band, driven from outside through
//! [`Schedule`](`scheduler::Schedule`), and can be combined with any [`Reconciler`](`root::Reconciler`) via [`Roots`](`root::Roots`).

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod bridge;
pub mod error;
pub mod host;
pub mod memory;
pub mod node;
pub mod props;
pub mod root;
pub mod scheduler;
pub mod tag;

pub use error::{BridgeError, HostError};
pub use host::HostConfig;
pub use node::{ContainerTag, HostNode, Parent};
pub use tag::Tag;
