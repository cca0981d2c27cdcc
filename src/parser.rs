use std::convert::Infallible;
use std::str;

use crate::errors::{CountingSink, LogSink, ParseError, Severity, WarningSink};
use crate::lexer::{Context, LexingIterator, Token, TokenInfo};
use crate::macros::MacroTable;
use crate::postprocess::{self, Options};
use crate::types::{Entry, Field, Metatype, SimpleValue, Value};

/// One parsing session: the macro table, the warning sink, and the
/// filename tag diagnostics are attributed to. The table accumulates
/// `@string` definitions across every file parsed with the same
/// session; dropping the session drops the table.
pub struct Session {
    pub(crate) macros: MacroTable,
    pub(crate) sink: CountingSink,
    filename: String,
}

impl Session {
    /// A session whose diagnostics go to the `log` crate.
    pub fn new() -> Session {
        Session::with_sink(LogSink)
    }

    /// A session reporting through the given sink.
    pub fn with_sink(sink: impl WarningSink + 'static) -> Session {
        Session {
            macros: MacroTable::new(),
            sink: CountingSink {
                inner: Box::new(sink),
                count: 0,
            },
            filename: String::new(),
        }
    }

    /// Tag subsequent diagnostics with this filename.
    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = filename.into();
    }

    /// Diagnostics at warning severity or worse seen so far. Embedders
    /// use this to decide whether a batch should count as failed.
    pub fn warning_count(&self) -> usize {
        self.sink.count
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub(crate) fn report(&mut self, severity: Severity, line: usize, message: &str) {
        let Session {
            sink, filename, ..
        } = self;
        sink.report(severity, filename, line, message);
    }

    /// Define a macro directly, as if an `@string` entry had been read.
    pub fn add_macro_text(&mut self, name: &str, text: &str, line: usize) {
        let Session {
            macros,
            sink,
            filename,
        } = self;
        macros.add(name, text, filename, line, sink);
    }

    pub fn delete_macro(&mut self, name: &str) {
        self.macros.delete(name);
    }

    pub fn delete_all_macros(&mut self) {
        self.macros.delete_all();
    }

    /// Expansion text of a macro. Asking for an undefined macro is an
    /// API usage slip; it returns `None` and reports a notice.
    pub fn macro_text(&mut self, name: &str, line: usize) -> Option<String> {
        if let Some(text) = self.macros.lookup(name) {
            return Some(text.to_string());
        }
        self.report(
            Severity::Notice,
            line,
            &format!("macro \"{name}\" is not defined"),
        );
        None
    }

    /// Length in bytes of a macro's expansion; 0 if undefined.
    pub fn macro_length(&self, name: &str) -> usize {
        self.macros.length(name)
    }

    /// Apply post-processing to a standalone value with this session's
    /// macro table and sink.
    pub fn post_process_value(&mut self, value: &mut Value, options: Options, line: usize) {
        let Session {
            macros,
            sink,
            filename,
        } = self;
        postprocess::post_process_value(value, options, macros, sink, filename, line);
    }

    /// Parse the first entry of `input`.
    pub fn parse_entry(&mut self, input: &str, options: Options) -> Result<Entry, ParseError> {
        let mut entries = Entries {
            lexer: LexingIterator::new(input),
            session: self,
            options,
            peeked: None,
            finished: false,
        };
        entries.next().unwrap_or_else(|| {
            Err(ParseError {
                message: "no entry found".to_string(),
                line: 1,
                partial: None,
            })
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Parser for a `.bib` source allowing iteration over [`Entry`] values.
///
/// ```rust
/// use bibread::Parser;
/// use std::str::FromStr;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut p = Parser::from_str(r#"@book{tolkien1937, author = {J. R. R. Tolkien}}"#)?;
/// for result in p.iter() {
///     let entry = result?;
///     println!("type = {}", entry.kind);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Parser {
    src: String,
    session: Session,
    options: Options,
}

impl Parser {
    /// Use a string as source for the parsing process, with a fresh
    /// session and the standard options.
    pub fn from_string(data: String) -> Parser {
        Parser {
            src: data,
            session: Session::new(),
            options: Options::standard(),
        }
    }

    /// Use a string as source, parsing into an existing session (its
    /// macro table carries over from earlier files).
    pub fn with_session(data: String, session: Session) -> Parser {
        Parser {
            src: data,
            session,
            options: Options::standard(),
        }
    }

    /// Replace the post-processing options applied to each entry.
    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Hand the session back, e.g. to keep its macro table for the
    /// next file.
    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn iter(&mut self) -> Entries<'_> {
        Entries {
            lexer: LexingIterator::new(&self.src),
            session: &mut self.session,
            options: self.options,
            peeked: None,
            finished: false,
        }
    }
}

impl str::FromStr for Parser {
    type Err = Infallible;

    /// Use a string as source for the parsing process.
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(Parser::from_string(data.to_string()))
    }
}

/// A stateful iterator yielding one post-processed [`Entry`] after
/// another. Syntax damage costs at most the entry it occurred in: the
/// iterator reports it, resynchronizes at the next `@`, and carries on.
pub struct Entries<'p> {
    lexer: LexingIterator<'p>,
    session: &'p mut Session,
    options: Options,
    peeked: Option<(Token, TokenInfo)>,
    finished: bool,
}

impl<'p> Entries<'p> {
    fn take(&mut self) -> (Token, TokenInfo) {
        self.peeked
            .take()
            .unwrap_or_else(|| self.lexer.next_token())
    }

    fn put_back(&mut self, token: (Token, TokenInfo)) {
        debug_assert!(self.peeked.is_none());
        self.peeked = Some(token);
    }

    /// Build one entry; the `@` has been consumed at `at_info`.
    fn entry(&mut self, at_info: TokenInfo) -> Result<Entry, ParseError> {
        let start_line = at_info.lineno;
        let mut entry = Entry::new();

        match self.entry_body(&mut entry, start_line) {
            Ok(()) => {
                let Session {
                    macros,
                    sink,
                    filename,
                } = &mut *self.session;
                postprocess::post_process_entry(
                    &mut entry, self.options, macros, sink, filename, start_line,
                );
                self.lexer.set_context(Context::TopLevel);
                Ok(entry)
            }
            Err(message) => self.fail(entry, start_line, message),
        }
    }

    /// Reported error plus entry-level recovery. The partial entry is
    /// flagged and travels inside the error, never as a valid result.
    fn fail(
        &mut self,
        mut entry: Entry,
        line: usize,
        message: String,
    ) -> Result<Entry, ParseError> {
        entry.error = true;
        self.session.report(Severity::SyntaxError, line, &message);
        if matches!(self.peeked, Some((Token::At, _))) {
            // already at an entry boundary, nothing to discard
            self.lexer.set_context(Context::TopLevel);
        } else {
            self.peeked = None;
            self.lexer.skip_to_entry();
        }
        Err(ParseError {
            message,
            line,
            partial: Some(entry),
        })
    }

    fn entry_body(&mut self, entry: &mut Entry, start_line: usize) -> Result<(), String> {
        let (token, _) = self.take();
        match token {
            Token::Identifier(kind) => {
                entry.kind = kind.to_ascii_lowercase();
                entry.metatype = Metatype::of(&entry.kind);
            }
            other => return Err(format!("expected entry type after '@', found {other}")),
        }

        let (token, _) = self.take();
        let close = match token {
            Token::LBrace => Token::RBrace,
            Token::LParen => Token::RParen,
            other => return Err(format!("expected '{{' or '(' to open entry, found {other}")),
        };

        match entry.metatype {
            Metatype::Comment => {
                let open = if close == Token::RBrace {
                    Token::LBrace
                } else {
                    Token::LParen
                };
                // the body read consumes the closing delimiter too
                let (body, _) = self.lexer.comment_body(open);
                match body {
                    Token::Braced(text) => entry.fields.push(Field {
                        name: String::new(),
                        value: Value::text(text),
                    }),
                    Token::Error(message) => return Err(message),
                    _ => unreachable!("comment_body yields Braced or Error"),
                }
                Ok(())
            }
            Metatype::Preamble => {
                self.lexer.set_context(Context::InValue);
                let value = self.value()?;
                entry.fields.push(Field {
                    name: String::new(),
                    value,
                });
                self.expect_close(&close)
            }
            Metatype::MacroDef => {
                self.field_list(entry, &close)?;
                // a macro entry canonically carries a single assignment;
                // extras are installed anyway
                if entry.fields.len() > 1 {
                    self.session.report(
                        Severity::Warning,
                        start_line,
                        &format!(
                            "@{} entry defines {} macros in one body",
                            entry.kind,
                            entry.fields.len()
                        ),
                    );
                }
                Ok(())
            }
            Metatype::Regular => {
                let (token, _) = self.take();
                entry.key = Some(match token {
                    Token::Identifier(key) | Token::Number(key) => key,
                    Token::LBrace => match self.lexer.braced_key() {
                        (Token::Braced(key), _) => key,
                        (Token::Error(message), _) => return Err(message),
                        _ => unreachable!("braced_key yields Braced or Error"),
                    },
                    other => return Err(format!("expected citation key, found {other}")),
                });

                let (token, info) = self.take();
                if token == close {
                    self.session.report(
                        Severity::Warning,
                        start_line,
                        &format!(
                            "entry \"{}\" has no fields",
                            entry.key.as_deref().unwrap_or("")
                        ),
                    );
                    return Ok(());
                }
                if token != Token::Comma {
                    self.maybe_put_back_at(token, info);
                    return Err("expected ',' after citation key".to_string());
                }
                self.field_list(entry, &close)
            }
        }
    }

    /// `field (',' field)* [',']` up to the closing delimiter.
    fn field_list(&mut self, entry: &mut Entry, close: &Token) -> Result<(), String> {
        loop {
            let (token, info) = self.take();
            if token == *close {
                // covers the empty body and the trailing comma
                return Ok(());
            }
            let name = match token {
                Token::Identifier(name) | Token::Number(name) => name.to_ascii_lowercase(),
                other => {
                    self.maybe_put_back_at(other.clone(), info);
                    return Err(format!("expected field name, found {other}"));
                }
            };

            let (token, eq_info) = self.take();
            if token != Token::Equals {
                self.maybe_put_back_at(token.clone(), eq_info);
                return Err(format!(
                    "expected '=' after field name \"{name}\", found {token}"
                ));
            }

            let value = self.value()?;
            if entry.field(&name).is_some() {
                self.session.report(
                    Severity::Warning,
                    info.lineno,
                    &format!(
                        "duplicate field \"{name}\" in entry \"{}\"",
                        entry.key.as_deref().unwrap_or(&entry.kind)
                    ),
                );
            }
            entry.fields.push(Field { name, value });

            let (token, info) = self.take();
            if token == *close {
                return Ok(());
            }
            if token != Token::Comma {
                self.maybe_put_back_at(token.clone(), info);
                return Err(format!(
                    "expected ',' or closing delimiter after field, found {token}"
                ));
            }
        }
    }

    /// `simple-value ('#' simple-value)*`; the lexer is already at
    /// value scope.
    fn value(&mut self) -> Result<Value, String> {
        let mut parts = Vec::new();
        loop {
            let (token, info) = self.take();
            let part = match token {
                Token::Quoted(text) | Token::Braced(text) => SimpleValue::Str(text),
                Token::Number(digits) => SimpleValue::Number(digits),
                Token::MacroRef(name) => SimpleValue::Macro(name),
                Token::Error(message) => return Err(message),
                other => {
                    self.maybe_put_back_at(other.clone(), info);
                    return Err(format!("expected a value, found {other}"));
                }
            };
            parts.push(part);

            let lookahead = self.take();
            if lookahead.0 != Token::Hash {
                self.put_back(lookahead);
                return Ok(Value(parts));
            }
        }
    }

    fn expect_close(&mut self, close: &Token) -> Result<(), String> {
        let (token, info) = self.take();
        if token == *close {
            Ok(())
        } else {
            self.maybe_put_back_at(token.clone(), info);
            Err(format!("expected {close} to end entry, found {token}"))
        }
    }

    /// If the unexpected token was an `@`, the input is already at the
    /// next entry boundary; keep it so recovery does not skip an entry.
    fn maybe_put_back_at(&mut self, token: Token, info: TokenInfo) {
        if token == Token::At {
            self.put_back((Token::At, info));
        }
    }
}

impl<'p> Iterator for Entries<'p> {
    type Item = Result<Entry, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            let (token, info) = self.take();
            match token {
                Token::Eof => {
                    self.finished = true;
                    return None;
                }
                Token::At => return Some(self.entry(info)),
                // stray tokens between entries are junk; the lexer
                // already warned where it mattered
                _ => {}
            }
        }
    }
}
