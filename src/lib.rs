//! This crate allows to read `.bib` files in pure, safe rust.
//!
//! `.bib` files are popular in reference management since many resources
//! allow to export metadata in a BibTeχ or BibLaTeχ file. One entry
//! in such a file can look like this:
//!
//! ```tex
//! @book{DBLP:books/aw/Knuth73a,
//!     author    = {Donald E. Knuth},
//!     title     = {The Art of Computer Programming, Volume {I:} Fundamental Algorithms,
//!                  2nd Edition},
//!     publisher = {Addison-Wesley},
//!     year      = {1973},
//! }
//! ```
//!
//! In this example, we call `book` a `kind` or `type` and
//! `DBLP:books/aw/Knuth73a` a citation `key`. Then we have a sequence of
//! fields with a `name` (like `year`) and a value (like `1973`). On top
//! of that, `.bib` files know `@string` entries defining macros that are
//! interpolated into later values with the `#` operator, plus `@comment`
//! and `@preamble` entries. The formal grammar is not well-specified,
//! but the [biblatex package documentation](https://ctan.ebinger.cc/tex-archive/macros/latex/contrib/biblatex/doc/biblatex.pdf)
//! and [Tame the BeaST](https://ftp.rrze.uni-erlangen.de/ctan/info/bibtex/tamethebeast/ttb_en.pdf)
//! provide some insights.
//!
//! The API is built around the idea of iterating over the bib file's
//! entries:
//!
//! ```rust
//! use bibread::Parser;
//! use std::str::FromStr;
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut p = Parser::from_str(r#"@book{tolkien1937, author = {J. R. R. Tolkien}}"#)?;
//!     for result in p.iter() {
//!         let entry = result?;
//!         println!("type = {}", entry.kind);
//!         println!("key = {:?}", entry.key);
//!         for field in &entry.fields {
//!             println!("\t{}\t= {}", field.name, field.value);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Entries come back post-processed: macros expanded, `#`-concatenation
//! performed, whitespace tidied. [`Options`] selects which of these
//! transformations run. Diagnostics never abort the whole file; they go
//! to a [`WarningSink`] and damaged entries are skipped up to the next
//! `@`.
//!
//! Since `author` fields pack several names with their own
//! inner structure, the [`split_list`], [`split_name`] and
//! [`format_name`] family takes values apart along BibTeX's name
//! conventions:
//!
//! ```rust
//! use bibread::{split_name, format_name, CollectSink, NameFormat, NamePart};
//! let mut sink = CollectSink::new();
//! let name = split_name("van der Graaf, Horace Q.", "demo.bib", 1, 1, &mut sink);
//! assert_eq!(name.part(NamePart::Last), vec!["Graaf"]);
//! assert_eq!(format_name(&name, &NameFormat::abbreviated_first()),
//!            "H. Q. van der Graaf");
//! ```

mod errors;
mod format;
mod lexer;
mod macros;
mod names;
mod parser;
mod postprocess;
mod types;

pub use crate::errors::{CollectSink, LogSink, ParseError, Severity, WarningSink};
pub use crate::format::{format_name, NameFormat, PartFormat};
pub use crate::macros::MacroTable;
pub use crate::names::{split_list, split_name, Name, NamePart, StringList};
pub use crate::parser::{Entries, Parser, Session};
pub use crate::postprocess::{post_process_value, Options};
pub use crate::types::{Entry, Field, Metatype, SimpleValue, Value};

use std::cell::RefCell;

/// Parse a whole `.bib` source with a fresh session and the standard
/// options, failing on the first damaged entry.
pub fn parse(input: &str) -> Result<Vec<Entry>, ParseError> {
    let mut parser = Parser::from_string(input.to_string());
    parser.iter().collect()
}

thread_local! {
    static DEFAULT_SESSION: RefCell<Session> = RefCell::new(Session::new());
}

/// Run `f` against this thread's implicit session.
///
/// Embedders ported from the days of one global macro table get the old
/// behavior through this facade: macros defined here stick around for
/// later calls on the same thread. New code should own a [`Session`].
pub fn with_default_session<R>(f: impl FnOnce(&mut Session) -> R) -> R {
    DEFAULT_SESSION.with(|session| f(&mut session.borrow_mut()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convenience() {
        let entries = parse("@book{k, title = {T}} @misc{m, note = \"n\"}").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, "book");
        assert_eq!(entries[1].kind, "misc");
    }

    #[test]
    fn test_default_session_keeps_macros_across_calls() {
        with_default_session(|session| {
            session.add_macro_text("tmp.lib.test", "kept", 1);
        });
        let text = with_default_session(|session| session.macro_text("tmp.lib.test", 2));
        assert_eq!(text.as_deref(), Some("kept"));
        with_default_session(|session| session.delete_macro("tmp.lib.test"));
    }
}
