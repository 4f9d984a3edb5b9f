//! routedoc - API documentation metadata derived from handler source code.
//!
//! This library analyzes the source of request-handling functions and
//! derives, without manual annotation, what payload each handler expects
//! and what it sends back. Types are turned into JSON-schema shaped
//! descriptors plus representative example values.
//!
//! # Architecture
//!
//! The analysis is a one-way pipeline over a single lowered expression
//! union ([`expr::Expr`]):
//!
//! 1. [`parser`] - Parses the `.rs` files of one directory into syntax trees
//! 2. [`catalog`] - Indexes struct declarations and function signatures
//! 3. [`classifier`] - Matches function signatures against handler shapes
//! 4. [`doc_comment`] - Extracts summaries and `@param` annotations
//! 5. [`resolver`] - Infers local variable types in one body walk
//! 6. [`detector`] - Finds binding and response calls via capability tables
//! 7. [`schema`] - Builds schemas and examples, cycle-guarded
//! 8. [`store`] - Caches completed per-directory analyses
//!
//! Framework differences live entirely in [`framework::FrameworkCaps`]
//! data; nothing in the pipeline special-cases a framework.
//!
//! # Example Usage
//!
//! ```no_run
//! use routedoc::framework::FrameworkCaps;
//! use routedoc::store::HandlerMetadataStore;
//! use std::path::Path;
//!
//! let store = HandlerMetadataStore::new(FrameworkCaps::context_style("Context"));
//! let metadata = store.lookup("create_user", Path::new("./src/api"));
//!
//! if let Some(body) = &metadata.request_body {
//!     println!("{} request body: {:?}", body.content_type, body.schema);
//! }
//! for (status, response) in &metadata.responses {
//!     println!("{} -> {}", status, response.description);
//! }
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete
//! reporting front end.

pub mod catalog;
pub mod classifier;
pub mod cli;
pub mod detector;
pub mod doc_comment;
pub mod expr;
pub mod framework;
pub mod metadata;
pub mod parser;
pub mod paths;
pub mod resolver;
pub mod scanner;
pub mod schema;
pub mod status;
pub mod store;
