//! Generic argument shape and count checking, shared by every action.
//!
//! `ArgSpec`/`ArgValue` exist so the uniform action contract's notion of
//! "Args: ordered list of `{name, type, optional?, mapShape?}`" has a
//! real representation, even though most call sites in this crate build an
//! `Action` directly from strongly-typed fields rather than routing through
//! [`crate::action::build_action`]. `build_action` is the one entry point
//! that exercises it, standing in for a generic "call a zome function by
//! name" host API the way `hdk::call` does.

use crate::error::ArgError;
use ribochain_types::{Entry, Hash};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgType {
    Hash,
    String,
    Entry,
    Int,
    Bool,
    Map,
    AnyToString,
    VarArgs,
}

#[derive(Clone, Debug)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub optional: bool,
}

impl ArgSpec {
    pub const fn required(name: &'static str, ty: ArgType) -> Self {
        Self { name, ty, optional: false }
    }

    pub const fn optional(name: &'static str, ty: ArgType) -> Self {
        Self { name, ty, optional: true }
    }
}

#[derive(Clone, Debug)]
pub enum ArgValue {
    Hash(Hash),
    String(String),
    Entry(Entry),
    Int(i64),
    Bool(bool),
    Map(BTreeMap<String, ArgValue>),
    AnyToString(String),
    VarArgs(Vec<ArgValue>),
}

impl ArgValue {
    fn matches(&self, ty: ArgType) -> bool {
        matches!(
            (self, ty),
            (ArgValue::Hash(_), ArgType::Hash)
                | (ArgValue::String(_), ArgType::String)
                | (ArgValue::Entry(_), ArgType::Entry)
                | (ArgValue::Int(_), ArgType::Int)
                | (ArgValue::Bool(_), ArgType::Bool)
                | (ArgValue::Map(_), ArgType::Map)
                | (ArgValue::AnyToString(_), ArgType::AnyToString)
                | (ArgValue::VarArgs(_), ArgType::VarArgs)
        )
    }
}

/// `checkArgCount(args, n)` passes iff `required(args) <= n <= len(args)`.
pub fn check_arg_count(spec: &[ArgSpec], provided: usize) -> Result<(), ArgError> {
    let required = spec.iter().filter(|a| !a.optional).count();
    let total = spec.len();
    if provided < required || provided > total {
        Err(ArgError::WrongCount {
            required,
            total,
            provided,
        })
    } else {
        Ok(())
    }
}

/// Validate `provided` against `spec`: count first, then shape per
/// position. An unknown/mismatched shape fails naming the offending index.
pub fn check_args(spec: &[ArgSpec], provided: &[ArgValue]) -> Result<(), ArgError> {
    check_arg_count(spec, provided.len())?;
    for (index, (s, v)) in spec.iter().zip(provided.iter()).enumerate() {
        if !v.matches(s.ty) {
            return Err(ArgError::WrongShape {
                index,
                name: s.name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &[ArgSpec] = &[
        ArgSpec::required("hash", ArgType::Hash),
        ArgSpec::optional("mask", ArgType::Int),
    ];

    #[test]
    fn passes_iff_required_le_n_le_len() {
        assert!(check_arg_count(SPEC, 0).is_err());
        assert!(check_arg_count(SPEC, 1).is_ok());
        assert!(check_arg_count(SPEC, 2).is_ok());
        assert!(check_arg_count(SPEC, 3).is_err());
    }

    #[test]
    fn wrong_shape_names_the_offending_index() {
        let args = vec![ArgValue::String("not-a-hash".into())];
        let err = check_args(SPEC, &args).unwrap_err();
        assert_eq!(err, ArgError::WrongShape { index: 0, name: "hash".into() });
    }

    #[test]
    fn build_action_validates_args_before_constructing_commit() {
        use crate::action::{build_action, Action};
        use crate::error::CoreError;
        use ribochain_types::Entry;

        let entry = Entry::App { entry_type: "post".into(), content: b"hello".to_vec() };
        let action = build_action("commit", vec![ArgValue::Entry(entry)]).unwrap();
        assert!(matches!(action, Action::Commit { .. }));

        let err = build_action("commit", vec![]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Argument(ArgError::WrongCount { required: 1, total: 1, provided: 0 })
        ));
    }

    #[test]
    fn build_action_rejects_unknown_names() {
        use crate::action::build_action;
        use crate::error::CoreError;

        let err = build_action("frobnicate", vec![]).unwrap_err();
        assert!(matches!(err, CoreError::UnknownAction(name) if name == "frobnicate"));
    }
}
