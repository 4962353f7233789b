//! Filter expression parsing
//!
//! A filter expression selects the properties written for an object and,
//! through nested expressions, for the objects it contains.
//!
//! # Syntax
//!
//! ```text
//! id,issueSummary                 Only these properties
//! assignee[firstName]             Nested expression for assignee
//! assignee{firstName}             Same, with braces
//! assignee[]                      assignee, written without properties
//! actions.user.firstName          Dot-path, shorthand for actions[user[firstName]]
//! (reporter,assignee)[lastName]   One nested expression for several fields
//! -issueDetails                   Everything in the base view except issueDetails
//! -actions.user.firstName         Exclude one nested property
//! issue*  issueSummar?            Wildcards: * any run, ? one character
//! ~iss[a-z]e.*~i  /iss.*/         Regex, matched against the whole name
//! *                               Any property at this level
//! **                              Everything, at every depth
//! full                            Every property of the named view
//! ```
//!
//! When several fields match one property the most specific wins, ranked
//! exact > regex > wildcard > `*` > `**`. Between wildcards, more literal
//! characters win. Equally specific matches pool their nested expressions.

mod arena;
pub mod error;
pub mod name;
pub mod node;
mod normalize;
pub mod parser;

pub use error::FilterParseError;
pub use name::{ANY_DEEP, ANY_SHALLOW, NameMatcher, Specificity};
pub use node::FilterNode;
pub use parser::{FilterParser, parse_filter};
