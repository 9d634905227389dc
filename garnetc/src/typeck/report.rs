//! Diagnostics for calls that resolve to nothing.
//!
//! The most specific explanation wins, in this order: a foreign struct
//! field, a name that does not exist, an arity no definition accepts, a
//! block that is missing or unexpected, and finally the overload listing
//! with the argument tuples no definition covers.

use crate::types::{DefInfo, TypeId, TypeKind};

use super::call::CallId;
use super::context::InferenceContext;
use super::error::{TypeError, TypeErrorKind};
use super::matcher::MatchSet;
use super::suggestion::format_suggestion;

impl InferenceContext {
    pub(crate) fn matches_not_found(
        &self,
        call: CallId,
        owner: TypeId,
        name: &str,
        matches: Option<&MatchSet>,
    ) -> Box<TypeError> {
        let site = self.call(call);
        let span = site.span;
        let given = site.args.len();
        let has_block = site.block.is_some();

        if let TypeKind::CStruct(info) = self.universe.kind(owner) {
            let field = name.strip_suffix('=').unwrap_or(name);
            let err = match (info.field(field), site.args.first()) {
                (Some(expected), Some(arg)) => TypeError::new(
                    TypeErrorKind::ForeignFieldMismatch {
                        strukt: info.name.clone(),
                        field: field.to_string(),
                        expected: self.universe.display(expected),
                        found: self.display_node(arg.node),
                    },
                    arg.span,
                ),
                _ => TypeError::new(
                    TypeErrorKind::StructFieldNotFound {
                        strukt: info.name.clone(),
                        field: field.to_string(),
                    },
                    span,
                ),
            };
            return Box::new(err);
        }

        let defs: Vec<&DefInfo> = self
            .universe
            .lookup_defs(owner, name)
            .into_iter()
            .map(|id| self.universe.def(id))
            .collect();

        if defs.is_empty() {
            let trace = match site.obj {
                Some(obj) if self.graph.ty(obj).is_some_and(|ty| self.universe.is_union(ty)) => {
                    self.graph.trace(obj, owner, &self.universe)
                }
                _ => Vec::new(),
            };
            let err = if site.obj.is_some() || owner != self.universe.program() {
                let err = TypeError::new(
                    TypeErrorKind::UndefinedMethod {
                        name: name.to_string(),
                        owner: Some(self.universe.display(owner)),
                    },
                    span,
                );
                let similar = self
                    .config
                    .suggestions
                    .then(|| self.universe.lookup_similar_name(owner, name, given, has_block))
                    .flatten();
                match similar {
                    Some(similar) => err.with_help(format_suggestion(&similar)),
                    None => err,
                }
            } else if given > 0 || site.has_parens {
                TypeError::new(
                    TypeErrorKind::UndefinedMethod {
                        name: name.to_string(),
                        owner: None,
                    },
                    span,
                )
            } else {
                TypeError::new(
                    TypeErrorKind::UndefinedVariableOrMethod {
                        name: name.to_string(),
                    },
                    span,
                )
            };
            return Box::new(err.with_trace(trace));
        }

        let full_name = self.full_name(owner, name);
        let fitting: Vec<&&DefInfo> = defs.iter().filter(|info| info.def.accepts_arity(given)).collect();
        if fitting.is_empty() {
            let mut expected: Vec<String> = Vec::new();
            for info in &defs {
                let (min, max) = (info.def.required_params(), info.def.params.len());
                let arity = if min == max {
                    max.to_string()
                } else {
                    format!("{}..{}", min, max)
                };
                if !expected.contains(&arity) {
                    expected.push(arity);
                }
            }
            return Box::new(TypeError::new(
                TypeErrorKind::ArityMismatch {
                    name: full_name,
                    given,
                    expected,
                },
                span,
            ));
        }

        if has_block && fitting.iter().all(|info| info.yields.is_none()) {
            return Box::new(TypeError::new(
                TypeErrorKind::BlockRequiredOrUnexpected {
                    name: full_name,
                    block_given: true,
                },
                span,
            ));
        }
        if !has_block && fitting.iter().all(|info| info.yields.is_some()) {
            return Box::new(TypeError::new(
                TypeErrorKind::BlockRequiredOrUnexpected {
                    name: full_name,
                    block_given: false,
                },
                span,
            ));
        }

        let overloads = defs
            .iter()
            .map(|info| self.describe_overload(owner, &full_name, info))
            .collect();

        let mut arg_names: Vec<Vec<String>> = Vec::new();
        for info in &defs {
            let names = info.def.params.iter().map(|p| p.name.clone()).collect();
            if !arg_names.contains(&names) {
                arg_names.push(names);
            }
        }
        let shared_names = match arg_names.as_slice() {
            [names] => Some(names),
            _ => None,
        };
        let block_marker = if has_block { ", &block" } else { "" };
        let missing = matches
            .and_then(|set| set.cover.as_ref())
            .map(|cover| cover.missing())
            .unwrap_or_default()
            .into_iter()
            .map(|tuple| {
                let args: Vec<String> = tuple
                    .iter()
                    .enumerate()
                    .map(|(i, ty)| match shared_names.and_then(|names| names.get(i)) {
                        Some(arg) => format!("{} : {}", arg, self.universe.display(*ty)),
                        None => self.universe.display(*ty),
                    })
                    .collect();
                format!("{}({}{})", full_name, args.join(", "), block_marker)
            })
            .collect();

        Box::new(TypeError::new(
            TypeErrorKind::NoOverloadMatch {
                name: full_name,
                arg_types: site.args.iter().map(|arg| self.display_node(arg.node)).collect(),
                overloads,
                missing,
            },
            span,
        ))
    }

    /// `Owner#name`, or `name` alone for top-level definitions.
    pub(crate) fn full_name(&self, owner: TypeId, name: &str) -> String {
        if owner == self.universe.program() {
            name.to_string()
        } else {
            format!("{}#{}", self.universe.display(owner), name)
        }
    }

    fn describe_overload(&self, owner: TypeId, full_name: &str, info: &DefInfo) -> String {
        let mut parts: Vec<String> = info
            .def
            .params
            .iter()
            .map(|param| match &param.restriction {
                None => param.name.clone(),
                Some(restriction) => {
                    let bound = restriction
                        .single_name()
                        .and_then(|var| self.universe.type_var_binding(owner, var));
                    let shown = match bound {
                        Some(ty) => self.universe.display(ty),
                        None => self.universe.display_type_expr(restriction),
                    };
                    format!("{} : {}", param.name, shown)
                }
            })
            .collect();
        if info.yields.is_some() {
            parts.push(match &info.def.block_arg {
                Some(block_arg) => block_arg.to_string(),
                None => "&block".to_string(),
            });
        }
        format!("{}({})", full_name, parts.join(", "))
    }
}
