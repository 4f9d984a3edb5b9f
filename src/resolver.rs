//! Single-pass expression type resolution.
//!
//! One [`Scope`] lives for the duration of one handler-body walk. It maps
//! local variable names to their inferred static types and, where the
//! initializer made it derivable, to their origin value expressions.
//! Propagation is best effort and strictly forward; there is no
//! unification and no flow-sensitive narrowing.

use log::trace;
use std::collections::HashMap;

use crate::catalog::TypeCatalog;
use crate::expr::{lower_expr, lower_type, Expr};

/// Variable bindings accumulated while walking one function body.
#[derive(Debug, Default)]
pub struct Scope {
    /// Variable name -> inferred type expression
    variables: HashMap<String, Expr>,
    /// Variable name -> origin value expression, when derivable
    values: HashMap<String, Expr>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable_type(&self, name: &str) -> Option<&Expr> {
        self.variables.get(name)
    }

    pub fn origin_value(&self, name: &str) -> Option<&Expr> {
        self.values.get(name)
    }

    /// Seeds a binding directly, used for handler parameters.
    pub fn bind(&mut self, name: &str, ty: Expr) {
        self.variables.insert(name.to_string(), ty);
    }

    /// Records a `let` statement.
    ///
    /// An explicit annotation wins; otherwise the type is inferred from the
    /// initializer. Already-bound names and the `_` discard are skipped.
    pub fn record_local(&mut self, local: &syn::Local, catalog: &TypeCatalog) {
        let (name, annotation) = match pattern_binding(&local.pat) {
            Some(binding) => binding,
            None => return,
        };
        if name == "_" || self.variables.contains_key(&name) {
            return;
        }

        let init = local.init.as_ref().map(|init| lower_expr(&init.expr));

        let ty = match annotation {
            Some(ty) => Some(ty),
            None => init
                .as_ref()
                .and_then(|value| self.infer_type_from_expr(value, catalog)),
        };

        if let Some(ty) = ty {
            trace!("let {}: {}", name, ty.render());
            self.variables.insert(name.clone(), ty);
        }
        if let Some(value) = init {
            self.values.insert(name, value);
        }
    }

    /// Records a `for` loop binding: the loop variable takes the iterated
    /// collection's element type.
    pub fn record_for_loop(&mut self, for_loop: &syn::ExprForLoop, catalog: &TypeCatalog) {
        let name = match pattern_binding(&for_loop.pat) {
            Some((name, _)) => name,
            None => return,
        };
        if name == "_" || self.variables.contains_key(&name) {
            return;
        }

        let iterated = lower_expr(&for_loop.expr);
        let collection = self
            .resolve_type_from_arg(&iterated, catalog)
            .unwrap_or(iterated);

        let element = match collection {
            Expr::Array(elem) => *elem,
            Expr::Map(_, value) => *value,
            _ => return,
        };
        trace!("for {}: {}", name, element.render());
        self.variables.insert(name, element);
    }

    /// Infers a static type for a value expression.
    ///
    /// Considers, in order: a composite literal's declared type, a call's
    /// resolved return type, a pointer wrapper's pointee, and finally the
    /// expression itself as a value-carrying leaf.
    pub fn infer_type_from_expr(&self, expr: &Expr, catalog: &TypeCatalog) -> Option<Expr> {
        match expr {
            Expr::Composite {
                type_path: Some(path),
                ..
            } => Some(path.as_ref().clone()),
            Expr::Call { .. } => self
                .lookup_call_result(expr, catalog)
                .or_else(|| Some(expr.clone())),
            Expr::Pointer(inner) => self.infer_type_from_expr(inner, catalog),
            Expr::Opaque => None,
            other => Some(other.clone()),
        }
    }

    /// Resolves the type behind a call argument: strips references, chases
    /// variables to their recorded types, and passes type references
    /// through unchanged.
    pub fn resolve_type_from_arg(&self, expr: &Expr, catalog: &TypeCatalog) -> Option<Expr> {
        match expr {
            Expr::Pointer(inner) => self.resolve_type_from_arg(inner, catalog),
            Expr::Ident(name) => self.variables.get(name).cloned(),
            Expr::Call { .. } => self.lookup_call_result(expr, catalog),
            Expr::Composite {
                type_path: Some(path),
                ..
            } => Some(path.as_ref().clone()),
            Expr::Selector(_) => Some(expr.clone()),
            _ => None,
        }
    }

    /// Resolves a call's declared result type via the type catalog.
    ///
    /// `Box::new`, `Some`, and `Ok` are transparent wrappers; method calls
    /// resolve their receiver expression first so `repo.find(..)` reaches
    /// `Repo::find`'s signature.
    pub fn lookup_call_result(&self, call: &Expr, catalog: &TypeCatalog) -> Option<Expr> {
        let (receiver, name, args) = match call {
            Expr::Call {
                receiver,
                name,
                args,
            } => (receiver, name, args),
            _ => return None,
        };

        if receiver.is_none() && (name == "Some" || name == "Ok") {
            let arg = args.first()?;
            return self.infer_type_from_expr(arg, catalog);
        }

        match receiver {
            None => catalog.function(name).and_then(|sig| sig.result.clone()),
            Some(recv) => {
                if recv.terminal_name() == Some("Box") && name == "new" {
                    let arg = args.first()?;
                    return self.infer_type_from_expr(arg, catalog);
                }

                let receiver_name = match recv.as_ref() {
                    // `User::new(..)`: the qualifier is already a type name.
                    Expr::Ident(name) if !self.variables.contains_key(name) => name.clone(),
                    Expr::Selector(segments) => segments.last()?.clone(),
                    // `repo.find(..)`: resolve the receiver variable first.
                    other => self
                        .resolve_type_from_arg(other, catalog)
                        .and_then(|ty| ty.terminal_name().map(str::to_string))?,
                };

                catalog
                    .method(&receiver_name, name)
                    .and_then(|sig| sig.result.clone())
            }
        }
    }
}

/// The bound name and optional type annotation of a `let`/`for` pattern.
fn pattern_binding(pat: &syn::Pat) -> Option<(String, Option<Expr>)> {
    match pat {
        syn::Pat::Ident(pat_ident) => Some((pat_ident.ident.to_string(), None)),
        syn::Pat::Type(pat_type) => {
            let (name, _) = pattern_binding(&pat_type.pat)?;
            Some((name, Some(lower_type(&pat_type.ty))))
        }
        syn::Pat::Wild(_) => Some(("_".to_string(), None)),
        _ => None,
    }
}
