//! Property maps and the sparse patches computed between them.

use std::collections::BTreeMap;
use tracing::trace;

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	List(Vec<PropValue>),
}
impl PropValue {
	/// Whether this value counts as "set" for boolean-ish props like `hidden`.
	#[must_use]
	pub fn is_truthy(&self) -> bool {
		match self {
			PropValue::Null => false,
			PropValue::Bool(b) => *b,
			PropValue::Int(i) => *i != 0,
			PropValue::Float(f) => *f != 0.0 && !f.is_nan(),
			PropValue::Str(s) => !s.is_empty(),
			PropValue::List(_) => true,
		}
	}
}

impl From<bool> for PropValue {
	fn from(value: bool) -> Self {
		PropValue::Bool(value)
	}
}
impl From<i64> for PropValue {
	fn from(value: i64) -> Self {
		PropValue::Int(value)
	}
}
impl From<f64> for PropValue {
	fn from(value: f64) -> Self {
		PropValue::Float(value)
	}
}
impl From<&str> for PropValue {
	fn from(value: &str) -> Self {
		PropValue::Str(value.to_owned())
	}
}
impl From<String> for PropValue {
	fn from(value: String) -> Self {
		PropValue::Str(value)
	}
}
impl<T: Into<PropValue>> From<Vec<T>> for PropValue {
	fn from(values: Vec<T>) -> Self {
		PropValue::List(values.into_iter().map(Into::into).collect())
	}
}

/// Property map of one instance. Ordered, so that patches derived from it are reproducible.
pub type Props = BTreeMap<String, PropValue>;

/// Builds [`Props`] from key-value pairs.
pub fn props<K: Into<String>, V: Into<PropValue>>(entries: impl IntoIterator<Item = (K, V)>) -> Props {
	entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropChange {
	Set(PropValue),
	/// The key was removed.
	Clear,
}

/// Only the keys whose value changed.
pub type PropPatch = BTreeMap<String, PropChange>;

/// Computes the sparse patch from `old` to `new`, or [`None`] if nothing changed.
#[must_use]
pub fn diff_props(old: &Props, new: &Props) -> Option<PropPatch> {
	let mut patch = PropPatch::new();
	for key in old.keys() {
		if !new.contains_key(key) {
			patch.insert(key.clone(), PropChange::Clear);
		}
	}
	for (key, value) in new {
		if old.get(key) != Some(value) {
			patch.insert(key.clone(), PropChange::Set(value.clone()));
		}
	}

	if patch.is_empty() {
		None
	} else {
		trace!(keys = ?patch.keys().collect::<Vec<_>>(), "Props changed.");
		Some(patch)
	}
}

/// Applies `patch` to `props` in place.
pub fn apply_patch(props: &mut Props, patch: &PropPatch) {
	for (key, change) in patch {
		match change {
			PropChange::Set(value) => {
				props.insert(key.clone(), value.clone());
			}
			PropChange::Clear => {
				props.remove(key);
			}
		}
	}
}
