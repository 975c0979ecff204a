//! JavaScript and TypeScript syntax trees for monotree.
//!
//! Both the relocation engine and the config codemods read sources through
//! this crate:
//! - `SourceParser`: tree-sitter parser bound to the TypeScript or TSX
//!   grammar, rejecting sources with syntax errors
//! - `SpecifierScanner`: module specifiers (imports, re-exports, `require`
//!   and mock calls) with the byte range of their text

pub mod parser;
pub mod specifiers;

pub use parser::{SourceLanguage, SourceParser};
pub use specifiers::{
    as_relative_specifier, find_specifiers, is_relative, Specifier, SpecifierScanner,
};
