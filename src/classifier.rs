use crate::expr::Expr;

/// The two observed handler signature families.
///
/// Context-style frameworks hand every handler a single request-context
/// value; writer/request-style frameworks pass a response sink plus a
/// reference to the request object. A capability descriptor carries exactly
/// one shape; the matching routine below is shared by all of them.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerShape {
    ContextStyle { context_type: String },
    WriterRequestStyle {
        writer_type: String,
        request_type: String,
    },
}

impl HandlerShape {
    /// Whether a function signature fits this shape.
    pub fn matches(&self, sig: &syn::Signature) -> bool {
        let params: Vec<Expr> = sig
            .inputs
            .iter()
            .filter_map(|input| match input {
                syn::FnArg::Typed(pat_type) => Some(crate::expr::lower_type(&pat_type.ty)),
                syn::FnArg::Receiver(_) => None,
            })
            .collect();

        match self {
            HandlerShape::ContextStyle { context_type } => params
                .iter()
                .any(|param| type_name_matches(param, context_type)),
            HandlerShape::WriterRequestStyle {
                writer_type,
                request_type,
            } => {
                let has_writer = params
                    .iter()
                    .any(|param| type_name_matches(param, writer_type));
                // The request object arrives by reference.
                let has_request = params.iter().any(|param| match param {
                    Expr::Pointer(inner) => type_name_matches(inner, request_type),
                    _ => false,
                });
                has_writer && has_request
            }
        }
    }

    /// The name of the parameter carrying the request context, when this is
    /// a context-style shape and the signature matches.
    pub fn context_param_name(&self, sig: &syn::Signature) -> Option<String> {
        let context_type = match self {
            HandlerShape::ContextStyle { context_type } => context_type,
            HandlerShape::WriterRequestStyle { .. } => return None,
        };
        for input in &sig.inputs {
            if let syn::FnArg::Typed(pat_type) = input {
                if type_name_matches(&crate::expr::lower_type(&pat_type.ty), context_type) {
                    if let syn::Pat::Ident(pat_ident) = pat_type.pat.as_ref() {
                        return Some(pat_ident.ident.to_string());
                    }
                }
            }
        }
        None
    }
}

/// Matches a lowered type against a framework type name: directly, behind
/// any number of reference wrappers, or as the final path segment.
fn type_name_matches(param: &Expr, expected: &str) -> bool {
    match param {
        Expr::Pointer(inner) => type_name_matches(inner, expected),
        other => other
            .terminal_name()
            .map(|name| name == expected)
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(code: &str) -> syn::Signature {
        syn::parse_str::<syn::ItemFn>(code).unwrap().sig
    }

    #[test]
    fn test_context_style_matches_direct_and_reference() {
        let shape = HandlerShape::ContextStyle {
            context_type: "Context".to_string(),
        };
        assert!(shape.matches(&signature("fn h(ctx: Context) {}")));
        assert!(shape.matches(&signature("fn h(ctx: &mut Context) {}")));
        assert!(shape.matches(&signature("fn h(ctx: web::Context) {}")));
        assert!(!shape.matches(&signature("fn h(id: u32) {}")));
    }

    #[test]
    fn test_writer_request_style_needs_both() {
        let shape = HandlerShape::WriterRequestStyle {
            writer_type: "ResponseWriter".to_string(),
            request_type: "Request".to_string(),
        };
        assert!(shape.matches(&signature(
            "fn h(w: &mut ResponseWriter, req: &Request) {}"
        )));
        assert!(!shape.matches(&signature("fn h(w: &mut ResponseWriter) {}")));
        // Request by value does not fit the shape.
        assert!(!shape.matches(&signature("fn h(w: ResponseWriter, req: Request) {}")));
    }

    #[test]
    fn test_context_param_name() {
        let shape = HandlerShape::ContextStyle {
            context_type: "Context".to_string(),
        };
        assert_eq!(
            shape.context_param_name(&signature("fn h(c: &mut Context) {}")),
            Some("c".to_string())
        );
        assert_eq!(shape.context_param_name(&signature("fn h(n: u32) {}")), None);
    }
}
