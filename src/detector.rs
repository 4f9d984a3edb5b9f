//! Binding and response detection.
//!
//! One walk over a handler body, in document order: `let` and `for`
//! statements update the scope, and every call expression is checked
//! against the framework's binding and response tables. The first binding
//! match wins; responses are keyed by status code with the last write per
//! status winning.

use log::{debug, trace};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::catalog::TypeCatalog;
use crate::expr::{lower_expr, lower_type, Expr, Lit};
use crate::framework::{BindingRule, ContentTypeRule, FrameworkCaps, CONTENT_TYPE_JSON};
use crate::metadata::{RequestBody, Response};
use crate::resolver::Scope;
use crate::schema::{Schema, SchemaBuilder};
use crate::status::{reason_phrase, status_from_symbol};

/// Everything detection derives from one handler body.
#[derive(Debug, Default)]
pub struct BodyAnalysis {
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
}

/// Walks handler bodies against one framework capability descriptor.
pub struct BodyAnalyzer<'a> {
    caps: &'a FrameworkCaps,
    catalog: &'a TypeCatalog,
}

impl<'a> BodyAnalyzer<'a> {
    pub fn new(caps: &'a FrameworkCaps, catalog: &'a TypeCatalog) -> Self {
        Self { caps, catalog }
    }

    /// Analyzes a handler's body. The signature seeds the scope with the
    /// handler's own parameters.
    pub fn analyze(&self, sig: &syn::Signature, block: &syn::Block) -> BodyAnalysis {
        let mut scope = Scope::new();
        for input in &sig.inputs {
            if let syn::FnArg::Typed(pat_type) = input {
                if let syn::Pat::Ident(pat_ident) = pat_type.pat.as_ref() {
                    scope.bind(&pat_ident.ident.to_string(), lower_type(&pat_type.ty));
                }
            }
        }

        let mut analysis = BodyAnalysis::default();
        self.walk_block(block, &mut scope, &mut analysis);
        analysis
    }

    fn walk_block(&self, block: &syn::Block, scope: &mut Scope, analysis: &mut BodyAnalysis) {
        for stmt in &block.stmts {
            match stmt {
                syn::Stmt::Local(local) => {
                    if let Some(init) = &local.init {
                        self.walk_expr(&init.expr, scope, analysis);
                    }
                    scope.record_local(local, self.catalog);
                }
                syn::Stmt::Expr(expr, _) => self.walk_expr(expr, scope, analysis),
                syn::Stmt::Item(_) | syn::Stmt::Macro(_) => {}
            }
        }
    }

    fn walk_expr(&self, expr: &syn::Expr, scope: &mut Scope, analysis: &mut BodyAnalysis) {
        match expr {
            syn::Expr::MethodCall(call) => {
                self.walk_expr(&call.receiver, scope, analysis);
                for arg in &call.args {
                    self.walk_expr(arg, scope, analysis);
                }
                self.detect_call(&lower_expr(expr), scope, analysis);
            }
            syn::Expr::Call(call) => {
                for arg in &call.args {
                    self.walk_expr(arg, scope, analysis);
                }
                self.detect_call(&lower_expr(expr), scope, analysis);
            }
            syn::Expr::If(expr_if) => {
                self.walk_expr(&expr_if.cond, scope, analysis);
                self.walk_block(&expr_if.then_branch, scope, analysis);
                if let Some((_, else_branch)) = &expr_if.else_branch {
                    self.walk_expr(else_branch, scope, analysis);
                }
            }
            syn::Expr::Match(expr_match) => {
                self.walk_expr(&expr_match.expr, scope, analysis);
                for arm in &expr_match.arms {
                    self.walk_expr(&arm.body, scope, analysis);
                }
            }
            syn::Expr::ForLoop(for_loop) => {
                scope.record_for_loop(for_loop, self.catalog);
                self.walk_block(&for_loop.body, scope, analysis);
            }
            syn::Expr::While(expr_while) => {
                self.walk_expr(&expr_while.cond, scope, analysis);
                self.walk_block(&expr_while.body, scope, analysis);
            }
            syn::Expr::Loop(expr_loop) => self.walk_block(&expr_loop.body, scope, analysis),
            syn::Expr::Block(expr_block) => self.walk_block(&expr_block.block, scope, analysis),
            syn::Expr::Unsafe(expr_unsafe) => {
                self.walk_block(&expr_unsafe.block, scope, analysis)
            }
            syn::Expr::Let(expr_let) => self.walk_expr(&expr_let.expr, scope, analysis),
            syn::Expr::Assign(assign) => {
                self.walk_expr(&assign.left, scope, analysis);
                self.walk_expr(&assign.right, scope, analysis);
            }
            syn::Expr::Binary(binary) => {
                self.walk_expr(&binary.left, scope, analysis);
                self.walk_expr(&binary.right, scope, analysis);
            }
            syn::Expr::Try(expr_try) => self.walk_expr(&expr_try.expr, scope, analysis),
            syn::Expr::Await(expr_await) => self.walk_expr(&expr_await.base, scope, analysis),
            syn::Expr::Paren(paren) => self.walk_expr(&paren.expr, scope, analysis),
            syn::Expr::Group(group) => self.walk_expr(&group.expr, scope, analysis),
            syn::Expr::Reference(reference) => self.walk_expr(&reference.expr, scope, analysis),
            syn::Expr::Return(expr_return) => {
                if let Some(inner) = &expr_return.expr {
                    self.walk_expr(inner, scope, analysis);
                }
            }
            _ => {}
        }
    }

    fn detect_call(&self, call: &Expr, scope: &Scope, analysis: &mut BodyAnalysis) {
        let (name, args) = match call {
            Expr::Call { name, args, .. } => (name.as_str(), args),
            _ => return,
        };

        if analysis.request_body.is_none() {
            if let Some(rule) = self.caps.binding_calls.get(name) {
                if let Some(body) = self.detect_binding(rule, args, scope) {
                    debug!("Request binding via {}", name);
                    analysis.request_body = Some(body);
                }
                return;
            }
        }

        if let Some(rule) = self.caps.response_calls.get(name).cloned() {
            let status = rule
                .status_arg
                .and_then(|idx| args.get(idx))
                .and_then(|arg| self.resolve_status(arg, scope))
                .unwrap_or(200);

            let content_type = match &rule.content_type {
                ContentTypeRule::Fixed(fixed) => fixed.to_string(),
                ContentTypeRule::FromArg(idx) => match args.get(*idx) {
                    Some(Expr::Literal(Lit::Str(value))) => value.clone(),
                    _ => CONTENT_TYPE_JSON.to_string(),
                },
            };

            let (schema, example) = match rule.body_arg.and_then(|idx| args.get(idx)) {
                Some(payload) => self.build_payload(payload, scope),
                None => (None, None),
            };

            trace!("Response {} via {}", status, name);
            analysis.responses.insert(
                status.to_string(),
                Response {
                    description: reason_phrase(status),
                    schema,
                    example,
                    content_type,
                },
            );
        }
    }

    fn detect_binding(
        &self,
        rule: &BindingRule,
        args: &[Expr],
        scope: &Scope,
    ) -> Option<RequestBody> {
        let target = args.first()?;
        let bound_type = scope.resolve_type_from_arg(target, self.catalog)?;

        let builder = SchemaBuilder::new(self.catalog, scope);
        let (schema, example) = builder.build(&bound_type)?;

        let content_type = match rule {
            BindingRule::Fixed(fixed) => fixed.to_string(),
            BindingRule::Auto => CONTENT_TYPE_JSON.to_string(),
        };

        Some(RequestBody {
            content_type,
            schema,
            example,
            required: true,
        })
    }

    /// Resolves a status argument: an integer literal directly, a
    /// `StatusCode` style symbol via the fixed table, an identifier via the
    /// current bindings, and anything else to 200.
    fn resolve_status(&self, arg: &Expr, scope: &Scope) -> Option<u16> {
        match arg {
            Expr::Literal(Lit::Int(value)) => u16::try_from(*value).ok(),
            Expr::Selector(segments) => segments
                .last()
                .and_then(|name| status_from_symbol(name))
                .or(Some(200)),
            Expr::Ident(name) => match scope.origin_value(name) {
                Some(origin) => self.resolve_status(&origin.clone(), scope),
                None => Some(200),
            },
            _ => Some(200),
        }
    }

    /// Builds schema and example for a response payload, descending into
    /// `serde_json` serialization wrappers first.
    fn build_payload(&self, payload: &Expr, scope: &Scope) -> (Option<Schema>, Option<Value>) {
        let unwrapped = unwrap_payload(payload);
        let builder = SchemaBuilder::new(self.catalog, scope);
        match builder.build(unwrapped) {
            Some((schema, example)) => (Some(schema), Some(example)),
            None => (None, None),
        }
    }
}

/// Strips references and descends through `serde_json::to_string` family
/// wrappers to the serialized value.
fn unwrap_payload(payload: &Expr) -> &Expr {
    match payload {
        Expr::Pointer(inner) => unwrap_payload(inner),
        Expr::Call {
            receiver: Some(receiver),
            name,
            args,
        } if receiver.terminal_name() == Some("serde_json")
            && matches!(
                name.as_str(),
                "to_string" | "to_string_pretty" | "to_vec" | "to_value"
            ) =>
        {
            match args.first() {
                Some(inner) => unwrap_payload(inner),
                None => payload,
            }
        }
        _ => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    fn catalog_from_code(code: &str) -> TypeCatalog {
        let parsed = ParsedFile {
            path: PathBuf::from("test.rs"),
            syntax_tree: syn::parse_file(code).unwrap(),
        };
        TypeCatalog::build(std::slice::from_ref(&parsed))
    }

    fn analyze(catalog: &TypeCatalog, caps: &FrameworkCaps, handler: &str) -> BodyAnalysis {
        let item_fn = syn::parse_str::<syn::ItemFn>(handler).unwrap();
        BodyAnalyzer::new(caps, catalog).analyze(&item_fn.sig, &item_fn.block)
    }

    #[test]
    fn test_binding_detection_round_trip() {
        let catalog = catalog_from_code(
            r#"
            pub struct CreateUser {
                pub name: String,
                pub age: u32,
                pub admin: bool,
            }
            "#,
        );
        let caps = FrameworkCaps::context_style("Context");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn create(ctx: &mut Context) {
                let mut req: CreateUser = Default::default();
                ctx.bind_json(&mut req);
            }
            "#,
        );

        let body = analysis.request_body.unwrap();
        assert_eq!(body.content_type, "application/json");
        assert!(body.required);
        let properties = body.schema.properties.unwrap();
        assert_eq!(properties.len(), 3);
        assert_eq!(properties["name"].schema_type, "string");
        assert_eq!(properties["age"].schema_type, "integer");
        assert_eq!(properties["admin"].schema_type, "boolean");
        assert_eq!(
            body.example,
            json!({ "name": "string", "age": 0, "admin": false })
        );
    }

    #[test]
    fn test_binding_inside_if_let_scrutinee() {
        let catalog = catalog_from_code("pub struct CreateUser { pub name: String }");
        let caps = FrameworkCaps::context_style("Context");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn h(ctx: &mut Context) {
                let mut req: CreateUser = Default::default();
                if let Err(e) = ctx.bind_json(&mut req) {
                    ctx.string(400, "invalid payload");
                    return;
                }
                ctx.json(200, req);
            }
            "#,
        );

        let body = analysis.request_body.expect("bind in if-let scrutinee detected");
        let properties = body.schema.properties.unwrap();
        assert!(properties.contains_key("name"));
        assert!(analysis.responses.contains_key("400"));
        assert!(analysis.responses.contains_key("200"));
    }

    #[test]
    fn test_binding_inside_binary_and_assign_positions() {
        let catalog = catalog_from_code("pub struct CreateUser { pub name: String }");
        let caps = FrameworkCaps::context_style("Context");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn h(ctx: &mut Context) {
                let mut req: CreateUser = Default::default();
                let mut sent = false;
                if ctx.bind(&mut req).is_err() || req.name.is_empty() {
                    sent = ctx.string(400, "bad request").is_ok();
                    return;
                }
                ctx.json(200, req);
            }
            "#,
        );

        assert!(analysis.request_body.is_some());
        assert!(analysis.responses.contains_key("400"));
    }

    #[test]
    fn test_first_binding_wins() {
        let catalog = catalog_from_code(
            r#"
            pub struct First { pub a: u32 }
            pub struct Second { pub b: u32 }
            "#,
        );
        let caps = FrameworkCaps::context_style("Context");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn h(ctx: &mut Context) {
                let mut one: First = Default::default();
                let mut two: Second = Default::default();
                ctx.bind(&mut one);
                ctx.bind(&mut two);
            }
            "#,
        );

        let properties = analysis.request_body.unwrap().schema.properties.unwrap();
        assert!(properties.contains_key("a"));
    }

    #[test]
    fn test_status_symbol_and_literal_example() {
        let catalog = catalog_from_code("pub struct User { pub id: u32 }");
        let caps = FrameworkCaps::context_style("Context");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn h(ctx: &mut Context) {
                ctx.json(StatusCode::CREATED, User { id: 123 });
            }
            "#,
        );

        let response = &analysis.responses["201"];
        assert_eq!(response.description, "Created");
        assert_eq!(response.content_type, "application/json");
        assert_eq!(response.example.as_ref().unwrap()["id"], json!(123));
    }

    #[test]
    fn test_default_status_and_unknown_symbol() {
        let catalog = TypeCatalog::default();
        let caps = FrameworkCaps::context_style("Context");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn h(ctx: &mut Context) {
                ctx.string(StatusCode::NOT_A_REAL_CODE, "hello");
            }
            "#,
        );

        let response = &analysis.responses["200"];
        assert_eq!(response.content_type, "text/plain");
        assert_eq!(response.example, Some(json!("hello")));
    }

    #[test]
    fn test_last_response_wins_per_status() {
        let catalog = TypeCatalog::default();
        let caps = FrameworkCaps::context_style("Context");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn h(ctx: &mut Context) {
                ctx.string(200, "first");
                ctx.json(404, "missing");
                ctx.string(200, "second");
            }
            "#,
        );

        assert_eq!(analysis.responses.len(), 2);
        assert_eq!(analysis.responses["200"].example, Some(json!("second")));
        assert_eq!(analysis.responses["404"].description, "Not Found");
    }

    #[test]
    fn test_no_content_and_from_arg_content_type() {
        let catalog = TypeCatalog::default();
        let caps = FrameworkCaps::context_style("Context");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn h(ctx: &mut Context) {
                if true {
                    ctx.no_content(204);
                } else {
                    ctx.blob(200, "image/png", bytes);
                }
            }
            "#,
        );

        let no_content = &analysis.responses["204"];
        assert!(no_content.schema.is_none());
        assert!(no_content.example.is_none());
        assert_eq!(analysis.responses["200"].content_type, "image/png");
    }

    #[test]
    fn test_serialization_wrapper_descent() {
        let catalog = catalog_from_code("pub struct User { pub id: u32 }");
        let caps = FrameworkCaps::writer_request_style("ResponseWriter", "Request");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn h(w: &mut ResponseWriter, req: &Request) {
                let user = User { id: 7 };
                w.write(serde_json::to_vec(&user));
            }
            "#,
        );

        let response = &analysis.responses["200"];
        assert_eq!(response.example.as_ref().unwrap()["id"], json!(7));
    }

    #[test]
    fn test_response_inside_match_arm() {
        let catalog = TypeCatalog::default();
        let caps = FrameworkCaps::context_style("Context");

        let analysis = analyze(
            &catalog,
            &caps,
            r#"
            fn h(ctx: &mut Context) {
                match load() {
                    Ok(v) => ctx.json(200, v),
                    Err(_) => ctx.string(500, "boom"),
                }
            }
            "#,
        );

        assert!(analysis.responses.contains_key("200"));
        assert_eq!(analysis.responses["500"].description, "Internal Server Error");
    }
}
