use std::fmt;

/// What an entry *is*, derived from its case-folded type word.
/// `@comment`, `@preamble` and `@string` are structural; everything
/// else (`@book`, `@article`, …) is a regular bibliographic entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metatype {
    Comment,
    Preamble,
    MacroDef,
    Regular,
}

impl Metatype {
    /// Classify a case-folded entry type word.
    pub fn of(kind: &str) -> Metatype {
        match kind {
            "comment" => Metatype::Comment,
            "preamble" => Metatype::Preamble,
            "string" => Metatype::MacroDef,
            _ => Metatype::Regular,
        }
    }
}

/// One building block of a field value. Values are written in `.bib`
/// files as `#`-joined sequences of these, e.g.
/// `"J" # and # "B"` is two string literals around a macro reference.
#[derive(Clone, Debug, PartialEq)]
pub enum SimpleValue {
    /// Quoted or braced string literal, delimiters stripped.
    Str(String),
    /// Bare number like `1973`; kept as written.
    Number(String),
    /// Reference to a `@string` macro, resolved at post-processing time.
    Macro(String),
}

impl SimpleValue {
    /// The literal text, if this is no longer a macro reference.
    pub fn text(&self) -> Option<&str> {
        match self {
            SimpleValue::Str(s) | SimpleValue::Number(s) => Some(s),
            SimpleValue::Macro(_) => None,
        }
    }
}

/// A field value: a nonempty `#`-joined sequence of simple values.
/// After post-processing with expansion, the sequence is a single
/// string literal.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Value(pub Vec<SimpleValue>);

impl Value {
    /// Convenience constructor for an already-flat string value.
    pub fn text(s: impl Into<String>) -> Value {
        Value(vec![SimpleValue::Str(s.into())])
    }

    /// The single flattened string, if post-processing reduced this
    /// value to one literal.
    pub fn as_flat(&self) -> Option<&str> {
        match self.0.as_slice() {
            [only] => only.text(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Re-serializes the value in source syntax. Handy in diagnostics;
    /// fully expanded values print as their bare text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(flat) = self.as_flat() {
            return write!(f, "{flat}");
        }
        for (i, sv) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " # ")?;
            }
            match sv {
                SimpleValue::Str(s) => write!(f, "{{{s}}}")?,
                SimpleValue::Number(n) => write!(f, "{n}")?,
                SimpleValue::Macro(m) => write!(f, "{m}")?,
            }
        }
        Ok(())
    }
}

/// A named field inside an entry, e.g. `author = {Donald E. Knuth}`.
/// Names are stored case-folded; `.bib` files use them case-freely.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

/// One entry of a `.bib` file.
///
/// Fields keep their file order, and duplicates are preserved (the
/// parser warns about them but it is not this type's business to drop
/// data). Comment and preamble entries carry their body as a single
/// anonymous field, reachable through [`Entry::body_value`].
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// Entry type as written, case-folded, e.g. "article".
    pub kind: String,
    /// Structural classification of `kind`.
    pub metatype: Metatype,
    /// Citation key, e.g. "DBLP:books/lib/Knuth97". Only regular
    /// entries have one.
    pub key: Option<String>,
    /// Fields in file order.
    pub fields: Vec<Field>,
    /// Set when the entry was cut short by a syntax error. An entry
    /// with this flag is only ever handed out as part of an error.
    pub error: bool,
}

impl Entry {
    /// Generate a new, empty instance of Entry. Can also be called
    /// through the `Default` implementation.
    pub fn new() -> Entry {
        Entry {
            kind: String::new(),
            metatype: Metatype::Regular,
            key: None,
            fields: Vec::new(),
            error: false,
        }
    }

    /// The value of the first field with this (case-insensitively
    /// compared) name, or `None`. Only meaningful for regular and
    /// macro-def entries.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| &f.value)
    }

    /// Body of a comment or preamble entry, `None` for the other
    /// metatypes.
    pub fn body_value(&self) -> Option<&Value> {
        match self.metatype {
            Metatype::Comment | Metatype::Preamble => {
                self.fields.first().map(|f| &f.value)
            }
            _ => None,
        }
    }
}

impl Default for Entry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metatype_classification() {
        assert_eq!(Metatype::of("comment"), Metatype::Comment);
        assert_eq!(Metatype::of("preamble"), Metatype::Preamble);
        assert_eq!(Metatype::of("string"), Metatype::MacroDef);
        assert_eq!(Metatype::of("article"), Metatype::Regular);
        assert_eq!(Metatype::of("book"), Metatype::Regular);
    }

    #[test]
    fn test_value_display() {
        let v = Value(vec![
            SimpleValue::Str("J".to_string()),
            SimpleValue::Macro("and".to_string()),
            SimpleValue::Number("7".to_string()),
        ]);
        assert_eq!(v.to_string(), "{J} # and # 7");
        assert_eq!(Value::text("J and B").to_string(), "J and B");
    }

    #[test]
    fn test_field_lookup_is_case_insensitive() {
        let mut e = Entry::new();
        e.fields.push(Field {
            name: "author".to_string(),
            value: Value::text("Knuth"),
        });
        assert_eq!(e.field("AUTHOR").and_then(Value::as_flat), Some("Knuth"));
        assert_eq!(e.field("title"), None);
    }
}
