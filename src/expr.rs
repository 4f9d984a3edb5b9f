//! Lowered expression and type representation.
//!
//! Every analysis phase in this crate operates on one exhaustive tagged
//! union, [`Expr`], produced by a single lowering pass from `syn` nodes.
//! Type inference, binding detection, and schema building are all total
//! pattern matches over this union; nothing downstream of this module
//! touches `syn` expressions directly.

use log::trace;

/// A primitive literal value captured from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
}

/// A lowered expression or type reference.
///
/// The same union represents both value expressions (literals, calls,
/// composite literals) and type expressions (named types, pointers, arrays,
/// maps). Resolution deliberately blurs the two: a variable's "type" may be
/// a literal when that is all the single-pass inference could derive, and
/// schema building accepts either form.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A primitive literal (`"hello"`, `42`, `1.5`, `true`).
    Literal(Lit),
    /// A bare identifier: a local variable or an unqualified type name.
    Ident(String),
    /// A qualified path such as `StatusCode::CREATED` or `chrono::DateTime`.
    Selector(Vec<String>),
    /// A pointer-like wrapper: `&T`, `&mut T`, `Box<T>`, `Option<T>`,
    /// `Rc<T>`, `Arc<T>`, or an address-of expression `&x`.
    Pointer(Box<Expr>),
    /// An array-like type or value: `Vec<T>`, `[T]`, `[T; N]`.
    Array(Box<Expr>),
    /// A map type: `HashMap<K, V>` or `BTreeMap<K, V>`.
    Map(Box<Expr>, Box<Expr>),
    /// An opaque "any value" type: `serde_json::Value`, trait objects,
    /// `impl Trait`, or `_`.
    Any,
    /// A composite literal. Struct literals carry `fields`; array and
    /// `vec![..]` literals carry `elements`. `type_path` is the literal's
    /// declared type when one is written at the literal site.
    Composite {
        type_path: Option<Box<Expr>>,
        fields: Vec<(String, Expr)>,
        elements: Vec<Expr>,
    },
    /// A function or method call. For `user.save()` the receiver is the
    /// lowered receiver expression; for `User::new()` it is `Ident("User")`;
    /// for a free call `respond(..)` it is `None`.
    Call {
        receiver: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
    },
    /// Anything the analyzer cannot see through (closures, control flow
    /// used as an expression, unknown macros).
    Opaque,
}

impl Expr {
    /// Renders the expression as a short diagnostic name, also used for
    /// receiver matching against the type catalog (`&User` -> `User.save`).
    pub fn render(&self) -> String {
        match self {
            Expr::Literal(Lit::Str(s)) => format!("\"{}\"", s),
            Expr::Literal(Lit::Int(n)) => n.to_string(),
            Expr::Literal(Lit::Float(n)) => n.to_string(),
            Expr::Literal(Lit::Bool(b)) => b.to_string(),
            Expr::Literal(Lit::Char(c)) => c.to_string(),
            Expr::Ident(name) => name.clone(),
            Expr::Selector(segments) => segments.join("::"),
            Expr::Pointer(inner) => format!("&{}", inner.render()),
            Expr::Array(elem) => format!("Vec<{}>", elem.render()),
            Expr::Map(key, value) => format!("Map<{}, {}>", key.render(), value.render()),
            Expr::Any => "_".to_string(),
            Expr::Composite { type_path, .. } => type_path
                .as_ref()
                .map(|p| p.render())
                .unwrap_or_else(|| "{..}".to_string()),
            Expr::Call { receiver, name, .. } => match receiver {
                Some(recv) => format!("{}.{}", recv.render(), name),
                None => name.clone(),
            },
            Expr::Opaque => "<opaque>".to_string(),
        }
    }

    /// The last path segment for identifier and selector expressions.
    pub fn terminal_name(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name.as_str()),
            Expr::Selector(segments) => segments.last().map(|s| s.as_str()),
            _ => None,
        }
    }
}

/// Lowers a `syn` expression into the analysis union.
pub fn lower_expr(expr: &syn::Expr) -> Expr {
    match expr {
        syn::Expr::Lit(lit) => lower_lit(&lit.lit),
        syn::Expr::Path(path) => lower_path_value(&path.path),
        syn::Expr::Reference(reference) => {
            Expr::Pointer(Box::new(lower_expr(&reference.expr)))
        }
        syn::Expr::Unary(unary) => {
            if matches!(unary.op, syn::UnOp::Deref(_)) {
                Expr::Pointer(Box::new(lower_expr(&unary.expr)))
            } else {
                Expr::Opaque
            }
        }
        syn::Expr::Paren(paren) => lower_expr(&paren.expr),
        syn::Expr::Group(group) => lower_expr(&group.expr),
        syn::Expr::Cast(cast) => lower_type(&cast.ty),
        syn::Expr::Try(expr_try) => lower_expr(&expr_try.expr),
        syn::Expr::Await(expr_await) => lower_expr(&expr_await.base),
        syn::Expr::Struct(lit) => {
            let fields = lit
                .fields
                .iter()
                .filter_map(|field| match &field.member {
                    syn::Member::Named(ident) => {
                        Some((ident.to_string(), lower_expr(&field.expr)))
                    }
                    syn::Member::Unnamed(_) => None,
                })
                .collect();
            Expr::Composite {
                type_path: Some(Box::new(lower_path_value(&lit.path))),
                fields,
                elements: Vec::new(),
            }
        }
        syn::Expr::Array(array) => Expr::Composite {
            type_path: None,
            fields: Vec::new(),
            elements: array.elems.iter().map(lower_expr).collect(),
        },
        syn::Expr::Call(call) => lower_call(call),
        syn::Expr::MethodCall(call) => Expr::Call {
            receiver: Some(Box::new(lower_expr(&call.receiver))),
            name: call.method.to_string(),
            args: call.args.iter().map(lower_expr).collect(),
        },
        syn::Expr::Macro(mac) => lower_macro(&mac.mac),
        _ => Expr::Opaque,
    }
}

fn lower_lit(lit: &syn::Lit) -> Expr {
    match lit {
        syn::Lit::Str(s) => Expr::Literal(Lit::Str(s.value())),
        syn::Lit::Int(n) => match n.base10_parse::<i64>() {
            Ok(value) => Expr::Literal(Lit::Int(value)),
            Err(_) => Expr::Opaque,
        },
        syn::Lit::Float(n) => match n.base10_parse::<f64>() {
            Ok(value) => Expr::Literal(Lit::Float(value)),
            Err(_) => Expr::Opaque,
        },
        syn::Lit::Bool(b) => Expr::Literal(Lit::Bool(b.value)),
        syn::Lit::Char(c) => Expr::Literal(Lit::Char(c.value())),
        _ => Expr::Opaque,
    }
}

fn lower_path_value(path: &syn::Path) -> Expr {
    let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
    match segments.len() {
        0 => Expr::Opaque,
        1 => Expr::Ident(segments.into_iter().next().unwrap()),
        _ => Expr::Selector(segments),
    }
}

fn lower_call(call: &syn::ExprCall) -> Expr {
    let args: Vec<Expr> = call.args.iter().map(lower_expr).collect();

    if let syn::Expr::Path(path) = call.func.as_ref() {
        let segments: Vec<String> = path
            .path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect();
        if let Some((name, qualifier)) = segments.split_last() {
            let receiver = match qualifier.len() {
                0 => None,
                1 => Some(Box::new(Expr::Ident(qualifier[0].clone()))),
                _ => Some(Box::new(Expr::Selector(qualifier.to_vec()))),
            };
            return Expr::Call {
                receiver,
                name: name.clone(),
                args,
            };
        }
    }

    Expr::Opaque
}

fn lower_macro(mac: &syn::Macro) -> Expr {
    let name = mac
        .path
        .segments
        .last()
        .map(|s| s.ident.to_string())
        .unwrap_or_default();

    // vec![..] is the one macro common enough in handler bodies to be worth
    // seeing through; its argument list parses as a plain array literal.
    if name == "vec" {
        let wrapped = format!("[{}]", mac.tokens);
        if let Ok(array) = syn::parse_str::<syn::ExprArray>(&wrapped) {
            return Expr::Composite {
                type_path: None,
                fields: Vec::new(),
                elements: array.elems.iter().map(lower_expr).collect(),
            };
        }
    }

    trace!("Opaque macro in handler body: {}!", name);
    Expr::Opaque
}

/// Lowers a `syn` type into the analysis union.
///
/// `Option`, `Box`, `Rc`, and `Arc` lower to the pointer kind; `Vec`, slices,
/// and arrays to the array kind; `HashMap`/`BTreeMap` to the map kind. Trait
/// objects, `impl Trait`, and `serde_json::Value` lower to [`Expr::Any`].
pub fn lower_type(ty: &syn::Type) -> Expr {
    match ty {
        syn::Type::Path(type_path) => lower_type_path(&type_path.path),
        syn::Type::Reference(reference) => Expr::Pointer(Box::new(lower_type(&reference.elem))),
        syn::Type::Ptr(ptr) => Expr::Pointer(Box::new(lower_type(&ptr.elem))),
        syn::Type::Slice(slice) => Expr::Array(Box::new(lower_type(&slice.elem))),
        syn::Type::Array(array) => Expr::Array(Box::new(lower_type(&array.elem))),
        syn::Type::Paren(paren) => lower_type(&paren.elem),
        syn::Type::Group(group) => lower_type(&group.elem),
        syn::Type::TraitObject(_) | syn::Type::ImplTrait(_) | syn::Type::Infer(_) => Expr::Any,
        _ => Expr::Opaque,
    }
}

fn lower_type_path(path: &syn::Path) -> Expr {
    let last = match path.segments.last() {
        Some(segment) => segment,
        None => return Expr::Opaque,
    };
    let name = last.ident.to_string();

    match name.as_str() {
        "Option" | "Box" | "Rc" | "Arc" | "Cow" => {
            if let Some(inner) = first_type_argument(&last.arguments) {
                return Expr::Pointer(Box::new(lower_type(inner)));
            }
        }
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => {
            if let Some(inner) = first_type_argument(&last.arguments) {
                return Expr::Array(Box::new(lower_type(inner)));
            }
        }
        "HashMap" | "BTreeMap" => {
            let mut args = type_arguments(&last.arguments);
            if args.len() >= 2 {
                let value = args.pop().unwrap();
                let key = args.pop().unwrap();
                return Expr::Map(Box::new(lower_type(key)), Box::new(lower_type(value)));
            }
        }
        _ => {}
    }

    let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();

    // serde_json::Value (and a bare `Value` import) is an arbitrary payload.
    if name == "Value" {
        return Expr::Any;
    }

    if segments.len() == 1 {
        Expr::Ident(name)
    } else {
        Expr::Selector(segments)
    }
}

fn first_type_argument(arguments: &syn::PathArguments) -> Option<&syn::Type> {
    type_arguments(arguments).into_iter().next()
}

fn type_arguments(arguments: &syn::PathArguments) -> Vec<&syn::Type> {
    match arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Strips leading pointer markers from a rendered receiver name so that
/// `&User` and `User` address the same method table entry.
pub fn normalize_receiver(name: &str) -> String {
    let stripped = name.trim_start_matches(['&', '*']).trim_start();
    stripped.strip_prefix("mut ").unwrap_or(stripped).trim().to_string()
}
