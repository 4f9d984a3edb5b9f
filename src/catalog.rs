use log::debug;
use std::collections::HashMap;

use crate::expr::{lower_type, normalize_receiver, Expr};
use crate::parser::ParsedFile;

/// Serialization and validation attributes applied to a struct field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAttrs {
    /// Renamed field name from `#[serde(rename = "...")]`
    pub rename: Option<String>,
    /// Whether to skip this field during serialization
    pub skip: bool,
    /// Whether the field may be omitted when empty
    /// (`skip_serializing_if` or `default`)
    pub omit_empty: bool,
    /// Explicit required marker from `#[validate(required)]` or
    /// `#[garde(required)]`
    pub required: bool,
    /// Whether the field's schema is merged into the parent
    pub flatten: bool,
    /// Example override from `#[schema(example = "...")]`
    pub example: Option<String>,
}

/// One field of a struct declaration.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    /// Field name as declared
    pub name: String,
    /// Lowered field type
    pub ty: Expr,
    /// Doc comment text, if any
    pub doc: Option<String>,
    pub attrs: FieldAttrs,
}

/// A struct declaration found during the catalog scan.
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

/// A function or method signature found during the catalog scan.
#[derive(Debug, Clone)]
pub struct FnSig {
    /// Normalized receiver type name, empty for free functions
    pub receiver: String,
    /// Declared result type, with `Result<T, E>` unwrapped to `T`
    pub result: Option<Expr>,
}

/// Index of type and function declarations across one directory.
///
/// Built with a single linear scan over every parsed file. Methods are
/// registered under both their bare name and `Receiver.name`, so callers
/// holding either a plain name or a resolved receiver can find the same
/// signature.
#[derive(Debug, Default)]
pub struct TypeCatalog {
    structs: HashMap<String, StructDecl>,
    functions: HashMap<String, Vec<FnSig>>,
}

impl TypeCatalog {
    /// Builds the catalog from a directory's parsed files.
    pub fn build(files: &[ParsedFile]) -> Self {
        let mut catalog = Self::default();
        for file in files {
            for item in &file.syntax_tree.items {
                catalog.collect_item(item);
            }
        }
        debug!(
            "Type catalog: {} structs, {} function keys",
            catalog.structs.len(),
            catalog.functions.len()
        );
        catalog
    }

    pub fn struct_decl(&self, name: &str) -> Option<&StructDecl> {
        self.structs.get(name)
    }

    /// Looks up a free function or unqualified method by bare name.
    pub fn function(&self, name: &str) -> Option<&FnSig> {
        self.functions.get(name).and_then(|sigs| sigs.first())
    }

    /// Looks up a method by receiver type name and method name. The
    /// receiver is normalized so `&User` and `User` hit the same entry.
    pub fn method(&self, receiver: &str, name: &str) -> Option<&FnSig> {
        let key = format!("{}.{}", normalize_receiver(receiver), name);
        self.functions.get(&key).and_then(|sigs| sigs.first())
    }

    fn collect_item(&mut self, item: &syn::Item) {
        match item {
            syn::Item::Struct(item_struct) => self.collect_struct(item_struct),
            syn::Item::Fn(item_fn) => {
                self.register_function("", &item_fn.sig);
            }
            syn::Item::Impl(item_impl) => {
                let receiver = match lower_type(&item_impl.self_ty).terminal_name() {
                    Some(name) => name.to_string(),
                    None => return,
                };
                for impl_item in &item_impl.items {
                    if let syn::ImplItem::Fn(method) = impl_item {
                        self.register_function(&receiver, &method.sig);
                    }
                }
            }
            syn::Item::Mod(item_mod) => {
                if let Some((_, items)) = &item_mod.content {
                    for inner in items {
                        self.collect_item(inner);
                    }
                }
            }
            _ => {}
        }
    }

    fn collect_struct(&mut self, item: &syn::ItemStruct) {
        let name = item.ident.to_string();
        debug!("Cataloging struct: {}", name);

        let fields = match &item.fields {
            syn::Fields::Named(named) => named
                .named
                .iter()
                .filter_map(|field| {
                    let field_name = field.ident.as_ref()?.to_string();
                    Some(FieldDecl {
                        name: field_name,
                        ty: lower_type(&field.ty),
                        doc: extract_doc_text(&field.attrs),
                        attrs: parse_field_attributes(&field.attrs),
                    })
                })
                .collect(),
            _ => Vec::new(),
        };

        self.structs.insert(name.clone(), StructDecl { name, fields });
    }

    fn register_function(&mut self, receiver: &str, sig: &syn::Signature) {
        let name = sig.ident.to_string();
        let result = match &sig.output {
            syn::ReturnType::Default => None,
            syn::ReturnType::Type(_, ty) => Some(lower_result_type(ty)),
        };

        let fn_sig = FnSig {
            receiver: receiver.to_string(),
            result,
        };

        if receiver.is_empty() {
            self.functions.entry(name).or_default().push(fn_sig);
        } else {
            let qualified = format!("{}.{}", receiver, name);
            self.functions
                .entry(qualified)
                .or_default()
                .push(fn_sig.clone());
            // Also reachable by bare name when nothing shadows it.
            self.functions.entry(name).or_default().push(fn_sig);
        }
    }
}

/// Lowers a declared return type, unwrapping `Result<T, E>` to `T` since
/// the success payload is what reaches the response.
fn lower_result_type(ty: &syn::Type) -> Expr {
    if let syn::Type::Path(type_path) = ty {
        if let Some(last) = type_path.path.segments.last() {
            if last.ident == "Result" {
                if let syn::PathArguments::AngleBracketed(args) = &last.arguments {
                    if let Some(syn::GenericArgument::Type(ok_ty)) = args.args.first() {
                        return lower_type(ok_ty);
                    }
                }
            }
        }
    }
    lower_type(ty)
}

/// Extracts the text of `///` doc comments, joined and trimmed.
pub fn extract_doc_text(attrs: &[syn::Attribute]) -> Option<String> {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        if let syn::Meta::NameValue(meta) = &attr.meta {
            if let syn::Expr::Lit(expr_lit) = &meta.value {
                if let syn::Lit::Str(text) = &expr_lit.lit {
                    lines.push(text.value().trim().to_string());
                }
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Parses field-level attributes from the three recognized vocabularies:
/// `serde` for serialization shape, `validate`/`garde` for the explicit
/// required marker, and `schema` for an example override.
pub fn parse_field_attributes(attrs: &[syn::Attribute]) -> FieldAttrs {
    let mut field_attrs = FieldAttrs::default();

    for attr in attrs {
        let meta_list = match attr.meta.require_list() {
            Ok(list) => list,
            Err(_) => continue,
        };
        let tokens_str = meta_list.tokens.to_string();

        if attr.path().is_ident("serde") {
            if let Some(value) = extract_string_value(&tokens_str, "rename") {
                debug!("Found serde rename: {}", value);
                field_attrs.rename = Some(value);
            }
            if contains_word(&tokens_str, "skip") {
                field_attrs.skip = true;
            }
            if tokens_str.contains("skip_serializing_if") || contains_word(&tokens_str, "default")
            {
                field_attrs.omit_empty = true;
            }
            if contains_word(&tokens_str, "flatten") {
                field_attrs.flatten = true;
            }
        } else if attr.path().is_ident("validate") || attr.path().is_ident("garde") {
            if tokens_str.contains("required") {
                field_attrs.required = true;
            }
        } else if attr.path().is_ident("schema") {
            if let Some(value) = extract_string_value(&tokens_str, "example") {
                field_attrs.example = Some(value);
            }
        }
    }

    field_attrs
}

/// Extracts `key = "value"` from an attribute token string.
fn extract_string_value(tokens_str: &str, key: &str) -> Option<String> {
    let key_pos = tokens_str.find(key)?;
    let after_key = &tokens_str[key_pos + key.len()..];
    let eq_pos = after_key.find('=')?;
    let after_eq = after_key[eq_pos + 1..].trim_start();
    let rest = after_eq.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Word-boundary match, so `skip` does not fire on `skip_serializing_if`.
fn contains_word(tokens_str: &str, word: &str) -> bool {
    tokens_str.split(|c: char| !c.is_alphanumeric() && c != '_').any(|t| t == word)
}
