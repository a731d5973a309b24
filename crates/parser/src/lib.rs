//! # Codelore Parser
//!
//! Syntax-tree structural parser for Python source modules.
//!
//! ## Architecture
//!
//! ```text
//! Source bytes
//!     │
//!     ├──> UTF-8 check ──────────────┐
//!     │                              │
//!     ├──> Tree-sitter parse → AST   │
//!     │    └─> ERROR / MISSING node ─┴──> ParseFailure
//!     │
//!     ├──> Declaration walk
//!     │    ├─> module symbol (imports, docstring)
//!     │    ├─> classes (bases, fields) and methods
//!     │    └─> functions (parameters, decorators, body facts)
//!     │
//!     └──> Route matcher registry
//!          ├─> decorators: method_decorator, route_decorator
//!          ├─> call statements: url_rule_call
//!          └─> router prefixes → Endpoint[]
//! ```
//!
//! Each file is parsed in isolation, so one [`StructuralParser`] per worker can
//! run in parallel. Cross-file model hints are resolved afterwards with
//! [`link_endpoint_models`].
//!
//! ## Example
//!
//! ```rust
//! use codelore_parser::{FileOutcome, StructuralParser};
//!
//! let mut parser = StructuralParser::new().unwrap();
//! let code = "@app.get(\"/items/{id}\")\ndef read_item(id: int):\n    return {}\n";
//! if let FileOutcome::Parsed(model) = parser.parse("app.py", code) {
//!     assert_eq!(model.endpoints[0].path_pattern, "/items/{id}");
//! }
//! ```

mod analyzer;
mod error;
mod facts;
mod hints;
mod language;
mod link;
mod routes;
mod syntax;

pub use analyzer::{FileModel, FileOutcome, StructuralParser};
pub use error::{ParserError, Result};
pub use hints::model_name;
pub use language::{supports_ast, tree_sitter_language};
pub use link::link_endpoint_models;
pub use routes::{
    ArgValue, CallShape, DecoratorShape, MatchedRoutes, MatcherRegistry, MethodDecoratorMatcher,
    RouteDecoratorMatcher, RouteMatch, RouteMatcher, RoutePath, UrlRuleCallMatcher,
};
