//! Framework capability descriptors.
//!
//! A `FrameworkCaps` value is pure data: one handler shape plus two call
//! tables, one for request-binding calls and one for response-emitting
//! calls. The detection machinery never special-cases a framework; teaching
//! it a new one means supplying a new descriptor.

use std::collections::HashMap;

use crate::classifier::HandlerShape;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// How a binding call determines the request body's content type.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingRule {
    /// Content type inferred from context, defaulting to JSON.
    Auto,
    /// The call always binds one content type.
    Fixed(&'static str),
}

/// How a response call determines its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentTypeRule {
    Fixed(&'static str),
    /// Resolved from a string-literal argument at this position.
    FromArg(usize),
}

/// Shape of one response-emitting call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRule {
    pub content_type: ContentTypeRule,
    /// Argument position carrying the status code, if any.
    pub status_arg: Option<usize>,
    /// Argument position carrying the payload. `None` marks a bodyless
    /// response such as a no-content or redirect call.
    pub body_arg: Option<usize>,
}

/// Everything the engine needs to know about one framework.
#[derive(Debug, Clone)]
pub struct FrameworkCaps {
    pub shape: HandlerShape,
    /// Binding call name -> rule. The bound value is the call's first
    /// argument.
    pub binding_calls: HashMap<&'static str, BindingRule>,
    pub response_calls: HashMap<&'static str, ResponseRule>,
}

impl FrameworkCaps {
    /// Profile for frameworks whose handlers take a single request-context
    /// parameter and respond through methods on it.
    pub fn context_style(context_type: &str) -> Self {
        let mut binding_calls = HashMap::new();
        binding_calls.insert("bind", BindingRule::Auto);
        binding_calls.insert("bind_json", BindingRule::Fixed(CONTENT_TYPE_JSON));
        binding_calls.insert("bind_xml", BindingRule::Fixed(CONTENT_TYPE_XML));
        binding_calls.insert("bind_form", BindingRule::Fixed(CONTENT_TYPE_FORM));
        binding_calls.insert("bind_query", BindingRule::Fixed(CONTENT_TYPE_FORM));

        let mut response_calls = HashMap::new();
        response_calls.insert(
            "json",
            ResponseRule {
                content_type: ContentTypeRule::Fixed(CONTENT_TYPE_JSON),
                status_arg: Some(0),
                body_arg: Some(1),
            },
        );
        response_calls.insert(
            "string",
            ResponseRule {
                content_type: ContentTypeRule::Fixed(CONTENT_TYPE_TEXT),
                status_arg: Some(0),
                body_arg: Some(1),
            },
        );
        response_calls.insert(
            "xml",
            ResponseRule {
                content_type: ContentTypeRule::Fixed(CONTENT_TYPE_XML),
                status_arg: Some(0),
                body_arg: Some(1),
            },
        );
        response_calls.insert(
            "html",
            ResponseRule {
                content_type: ContentTypeRule::Fixed(CONTENT_TYPE_HTML),
                status_arg: Some(0),
                body_arg: Some(1),
            },
        );
        // blob(status, content_type, bytes)
        response_calls.insert(
            "blob",
            ResponseRule {
                content_type: ContentTypeRule::FromArg(1),
                status_arg: Some(0),
                body_arg: Some(2),
            },
        );
        response_calls.insert(
            "no_content",
            ResponseRule {
                content_type: ContentTypeRule::Fixed(CONTENT_TYPE_JSON),
                status_arg: Some(0),
                body_arg: None,
            },
        );
        response_calls.insert(
            "redirect",
            ResponseRule {
                content_type: ContentTypeRule::Fixed(CONTENT_TYPE_TEXT),
                status_arg: Some(0),
                body_arg: None,
            },
        );

        Self {
            shape: HandlerShape::ContextStyle {
                context_type: context_type.to_string(),
            },
            binding_calls,
            response_calls,
        }
    }

    /// Profile for frameworks whose handlers receive a response sink and a
    /// request reference. Bodies usually pass through a serialization
    /// wrapper before hitting `write`.
    pub fn writer_request_style(writer_type: &str, request_type: &str) -> Self {
        let mut binding_calls = HashMap::new();
        binding_calls.insert("decode", BindingRule::Auto);
        binding_calls.insert("decode_json", BindingRule::Fixed(CONTENT_TYPE_JSON));

        let mut response_calls = HashMap::new();
        response_calls.insert(
            "write",
            ResponseRule {
                content_type: ContentTypeRule::Fixed(CONTENT_TYPE_JSON),
                status_arg: None,
                body_arg: Some(0),
            },
        );
        // error(message, status)
        response_calls.insert(
            "error",
            ResponseRule {
                content_type: ContentTypeRule::Fixed(CONTENT_TYPE_TEXT),
                status_arg: Some(1),
                body_arg: Some(0),
            },
        );

        Self {
            shape: HandlerShape::WriterRequestStyle {
                writer_type: writer_type.to_string(),
                request_type: request_type.to_string(),
            },
            binding_calls,
            response_calls,
        }
    }
}
