//! Ordered set-operation lists evaluated against named sets.
//!
//! A set param is written as `[["add", "front"], ["sub", "spots"], ...]` and
//! evaluated left to right. The first item is taken as-is whatever its
//! operator says.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::{BuildHasher, Hash};
use std::str::FromStr;

use serde_json::Value;

use cuelist_common::error::{CuelistError, CuelistResult};

/// Set-like values the evaluator can combine.
pub trait SetAlgebra: Clone {
    fn union(&self, other: &Self) -> Self;
    fn intersection(&self, other: &Self) -> Self;
    fn difference(&self, other: &Self) -> Self;
}

impl<T: Ord + Clone> SetAlgebra for BTreeSet<T> {
    fn union(&self, other: &Self) -> Self {
        self | other
    }

    fn intersection(&self, other: &Self) -> Self {
        self & other
    }

    fn difference(&self, other: &Self) -> Self {
        self - other
    }
}

impl<T, S> SetAlgebra for HashSet<T, S>
where
    T: Eq + Hash + Clone,
    S: BuildHasher + Default + Clone,
{
    fn union(&self, other: &Self) -> Self {
        self | other
    }

    fn intersection(&self, other: &Self) -> Self {
        self & other
    }

    fn difference(&self, other: &Self) -> Self {
        self - other
    }
}

/// Set operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOp {
    /// Union.
    Add,
    Intersect,
    /// Difference.
    Sub,
}

impl FromStr for SetOp {
    type Err = CuelistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "intersect" => Ok(Self::Intersect),
            "sub" => Ok(Self::Sub),
            other => Err(CuelistError::unknown_set_operator(other)),
        }
    }
}

impl SetOp {
    pub fn apply<S: SetAlgebra>(self, acc: &S, item: &S) -> S {
        match self {
            Self::Add => acc.union(item),
            Self::Intersect => acc.intersection(item),
            Self::Sub => acc.difference(item),
        }
    }
}

/// Evaluate `[operator, name]` pairs against `mapping`.
///
/// Returns `Ok(None)` for an empty list. Names are checked before operators,
/// so `["xor", "missing"]` reports the missing item.
pub fn evaluate_set<S, O, N>(ops: &[(O, N)], mapping: &BTreeMap<String, S>) -> CuelistResult<Option<S>>
where
    S: SetAlgebra,
    O: AsRef<str>,
    N: AsRef<str>,
{
    let mut result: Option<S> = None;

    for (op, name) in ops {
        let name = name.as_ref();
        let item = mapping
            .get(name)
            .ok_or_else(|| CuelistError::unknown_set_item(name))?;
        let op: SetOp = op.as_ref().parse()?;

        result = Some(match result {
            None => item.clone(),
            Some(acc) => op.apply(&acc, item),
        });
    }

    Ok(result)
}

/// Read an operations list from its JSON form.
pub fn parse_set_ops(value: &Value) -> CuelistResult<Vec<(String, String)>> {
    let entries = value
        .as_array()
        .ok_or_else(|| CuelistError::invalid_params("set operations must be an array"))?;

    entries
        .iter()
        .map(|entry| match entry.as_array().map(Vec::as_slice) {
            Some([Value::String(op), Value::String(name), ..]) => Ok((op.clone(), name.clone())),
            _ => Err(CuelistError::invalid_params(format!(
                "set operation must be [operator, name], got {entry}"
            ))),
        })
        .collect()
}
