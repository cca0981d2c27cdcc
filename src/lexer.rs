use std::fmt;

/// A token is one semantic unit read from the bib file. Remember that a
/// bib file entry looks as follows:
///
/// ```tex
/// @Book{works:4,
///   author     = {Shakespeare, William},
///   title      = "Sonnets",
/// }
/// ```
///
/// In this case the lexer emits: (At, Identifier("Book"), LBrace,
/// Identifier("works:4"), Comma, Identifier("author"), Equals,
/// Braced("Shakespeare, William"), Comma, Identifier("title"), Equals,
/// Quoted("Sonnets"), Comma, RBrace, Eof). Be aware that Token is just
/// the data contract between lexer and parser and not meant to be
/// externally visible. String tokens carry their text with the
/// delimiters stripped; the variant records which delimiter enclosed
/// them, which matters for brace-depth accounting.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    At,
    Identifier(String),
    Number(String),
    Quoted(String),
    Braced(String),
    MacroRef(String),
    Hash,
    Equals,
    Comma,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Eof,
    /// Synthetic token for lexical damage; the lexer has already moved
    /// past the offending construct.
    Error(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At => write!(f, "'@'"),
            Self::Identifier(s) => write!(f, "'{s}'"),
            Self::Number(s) => write!(f, "'{s}'"),
            Self::Quoted(_) | Self::Braced(_) => write!(f, "string"),
            Self::MacroRef(s) => write!(f, "'{s}'"),
            Self::Hash => write!(f, "'#'"),
            Self::Equals => write!(f, "'='"),
            Self::Comma => write!(f, "','"),
            Self::LBrace => write!(f, "'{{'"),
            Self::RBrace => write!(f, "'}}'"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::Eof => write!(f, "end of file"),
            Self::Error(msg) => write!(f, "{msg}"),
        }
    }
}

/// Source position attached to every token for diagnostics and the
/// warning sink. Both coordinates are 1-based.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TokenInfo {
    pub(crate) lineno: usize,
    pub(crate) colno: usize,
}

/// Where in the file structure the lexer currently is. The same bytes
/// lex differently by context: `{` opens an entry body at entry scope
/// but a string literal at value scope, and an identifier at value
/// scope is a macro reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Context {
    /// Between entries. Everything except `@` is junk and skipped.
    TopLevel,
    /// Inside an entry head or body, outside any field value.
    InEntry,
    /// Right of `=` or `#`, where a simple value must follow.
    InValue,
}

pub(crate) struct LexingIterator<'s> {
    src: &'s str,
    pos: usize,
    lineno: usize,
    colno: usize,
    pub(crate) context: Context,
    /// Brace depth at value scope. Entry-body braces are not counted.
    depth: usize,
    eof: bool,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_ident_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'+' | b'-' | b'.' | b'/' | b'\'')
}

impl<'s> LexingIterator<'s> {
    pub(crate) fn new(src: &'s str) -> LexingIterator<'s> {
        LexingIterator {
            src,
            pos: 0,
            lineno: 1,
            colno: 1,
            context: Context::TopLevel,
            depth: 0,
            eof: false,
        }
    }

    /// The parser overrides the context where the lexer cannot predict
    /// it, e.g. before a preamble body or a braced citation key.
    pub(crate) fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    fn info(&self) -> TokenInfo {
        TokenInfo {
            lineno: self.lineno,
            colno: self.colno,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.src.as_bytes().get(self.pos).copied()?;
        self.pos += 1;
        if b == b'\n' {
            self.lineno += 1;
            self.colno = 1;
        } else {
            self.colno += 1;
        }
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.advance();
        }
    }

    /// Read identifier-continuation bytes starting at the current
    /// position. Returns the spanned slice.
    fn read_word(&mut self) -> &'s str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_ident_cont(b)) {
            self.advance();
        }
        &self.src[start..self.pos]
    }

    /// Balanced `{…}` contents; the opening brace is already consumed.
    /// Verbatim, inner braces preserved.
    fn finish_braced(&mut self) -> Token {
        let start = self.pos;
        self.depth = 1;
        while let Some(b) = self.peek() {
            match b {
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let text = self.src[start..self.pos].to_string();
                        self.advance();
                        return Token::Braced(text);
                    }
                }
                _ => {}
            }
            self.advance();
        }
        self.depth = 0;
        Token::Error("unterminated braced string".to_string())
    }

    /// `"…"` contents; the opening quote is already consumed. A `"` at
    /// brace depth > 0 is literal, only a depth-0 quote terminates.
    fn finish_quoted(&mut self) -> Token {
        let start = self.pos;
        self.depth = 0;
        while let Some(b) = self.peek() {
            match b {
                b'{' => self.depth += 1,
                b'}' => self.depth = self.depth.saturating_sub(1),
                b'"' if self.depth == 0 => {
                    let text = self.src[start..self.pos].to_string();
                    self.advance();
                    return Token::Quoted(text);
                }
                _ => {}
            }
            self.advance();
        }
        Token::Error("unterminated quoted string".to_string())
    }

    /// Raw body of a `@comment` entry. For a `{`-delimited body, braces
    /// must balance; for a `(`-delimited one, the body runs to the
    /// first `)` at brace depth 0.
    pub(crate) fn comment_body(&mut self, open: Token) -> (Token, TokenInfo) {
        let info = self.info();
        let token = if open == Token::LParen {
            let start = self.pos;
            self.depth = 0;
            loop {
                match self.peek() {
                    None => break Token::Error("unterminated comment body".to_string()),
                    Some(b'{') => self.depth += 1,
                    Some(b'}') => self.depth = self.depth.saturating_sub(1),
                    Some(b')') if self.depth == 0 => {
                        let text = self.src[start..self.pos].to_string();
                        self.advance();
                        break Token::Braced(text);
                    }
                    Some(_) => {}
                }
                self.advance();
            }
        } else {
            self.finish_braced()
        };
        self.context = Context::InEntry;
        (token, info)
    }

    /// Braced citation keys arrive after the parser has already taken
    /// the `{` as a token; this resumes reading at depth 1.
    pub(crate) fn braced_key(&mut self) -> (Token, TokenInfo) {
        let info = self.info();
        (self.finish_braced(), info)
    }

    /// Entry-level recovery: discard input until the next `@` at brace
    /// depth 0, leaving the `@` for the next call. Resets the context.
    pub(crate) fn skip_to_entry(&mut self) {
        self.depth = 0;
        while let Some(b) = self.peek() {
            match b {
                b'{' => self.depth += 1,
                b'}' => self.depth = self.depth.saturating_sub(1),
                b'@' if self.depth == 0 => break,
                _ => {}
            }
            self.advance();
        }
        self.context = Context::TopLevel;
    }

    /// Produce the next token. Never fails: lexical damage becomes a
    /// `Token::Error` and the lexer moves past it; after the end of
    /// input, `Eof` is returned indefinitely.
    pub(crate) fn next_token(&mut self) -> (Token, TokenInfo) {
        if self.context == Context::TopLevel {
            // everything up to '@' is junk (stray prose between entries
            // is legal in bib files)
            while matches!(self.peek(), Some(b) if b != b'@') {
                self.advance();
            }
        } else {
            self.skip_whitespace();
        }

        let info = self.info();
        let b = match self.peek() {
            Some(b) => b,
            None => {
                self.eof = true;
                return (Token::Eof, info);
            }
        };

        if self.context == Context::InValue {
            let token = match b {
                b'{' => {
                    self.advance();
                    self.finish_braced()
                }
                b'"' => {
                    self.advance();
                    self.finish_quoted()
                }
                b'#' => {
                    self.advance();
                    return (Token::Hash, info);
                }
                b'}' => {
                    self.advance();
                    Token::RBrace
                }
                b')' => {
                    self.advance();
                    Token::RParen
                }
                b',' => {
                    self.advance();
                    Token::Comma
                }
                b'@' => {
                    self.advance();
                    Token::At
                }
                _ if b.is_ascii_digit() => {
                    let word = self.read_word();
                    if word.bytes().all(|c| c.is_ascii_digit()) {
                        Token::Number(word.to_string())
                    } else {
                        Token::Error(format!("malformed number '{word}'"))
                    }
                }
                _ if is_ident_start(b) => Token::MacroRef(self.read_word().to_string()),
                _ => {
                    self.advance();
                    Token::Error(format!(
                        "unexpected character '{}' where a value must start",
                        b as char
                    ))
                }
            };
            self.context = Context::InEntry;
            return (token, info);
        }

        // TopLevel and InEntry
        let token = match b {
            b'@' => {
                self.advance();
                self.context = Context::InEntry;
                Token::At
            }
            b'{' => {
                self.advance();
                Token::LBrace
            }
            b'}' => {
                self.advance();
                Token::RBrace
            }
            b'(' => {
                self.advance();
                Token::LParen
            }
            b')' => {
                self.advance();
                Token::RParen
            }
            b',' => {
                self.advance();
                Token::Comma
            }
            b'=' => {
                self.advance();
                self.context = Context::InValue;
                Token::Equals
            }
            b'#' => {
                self.advance();
                self.context = Context::InValue;
                Token::Hash
            }
            b'"' => {
                self.advance();
                self.finish_quoted()
            }
            _ if b.is_ascii_digit() => {
                // keys like "2001a" start with a digit; pure digit runs
                // stay numbers
                let word = self.read_word();
                if word.bytes().all(|c| c.is_ascii_digit()) {
                    Token::Number(word.to_string())
                } else {
                    Token::Identifier(word.to_string())
                }
            }
            _ if is_ident_start(b) => Token::Identifier(self.read_word().to_string()),
            _ => {
                self.advance();
                Token::Error(format!("unexpected character '{}'", b as char))
            }
        };
        (token, info)
    }
}

impl<'s> Iterator for LexingIterator<'s> {
    type Item = (Token, TokenInfo);

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof {
            return None;
        }
        Some(self.next_token())
    }
}
