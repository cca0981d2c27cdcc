use bitflags::bitflags;

use crate::errors::{Severity, WarningSink};
use crate::macros::MacroTable;
use crate::types::{Entry, Metatype, SimpleValue, Value};

bitflags! {
    /// Selects which transformations post-processing applies and in
    /// which context a value is being processed.
    ///
    /// `EXPAND`, `PASTE` and `COLLAPSE` are the transformations;
    /// `MACRO` and `FIELD` tag the context (macro definition vs.
    /// regular field); `NOSTORE_MACROS` keeps processed macro
    /// definitions out of the table. Nonsensical combinations (say,
    /// `COLLAPSE` without `EXPAND` on a value with macros) are accepted
    /// and give what they give.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Options: u32 {
        /// Replace macro references by their table text and perform the
        /// `#` concatenation; the value ends up a single string literal.
        const EXPAND = 1 << 0;
        /// Concatenate adjacent string literals.
        const PASTE = 1 << 1;
        /// Collapse whitespace runs inside strings to one space and
        /// trim the ends.
        const COLLAPSE = 1 << 2;
        /// The value belongs to a macro definition.
        const MACRO = 1 << 3;
        /// The value belongs to a regular entry field.
        const FIELD = 1 << 4;
        /// Expand macro definitions but do not install them in the
        /// table. Expansion warnings are still emitted.
        const NOSTORE_MACROS = 1 << 5;
    }
}

impl Options {
    /// What almost every caller wants for regular entries: fully
    /// expanded, concatenated, whitespace-tidied field values.
    pub fn standard() -> Options {
        Options::EXPAND | Options::PASTE | Options::COLLAPSE | Options::FIELD
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::standard()
    }
}

/// Collapse whitespace runs to a single space and trim the ends.
/// Multiple whitespace sequences common in hand-wrapped `.bib` values,
/// e.g. “a message.  \nBest  regards”, become “a message. Best regards”.
fn collapse_whitespace(src: &str) -> String {
    let mut result = String::new();
    let mut was_whitespace = true; // swallows leading whitespace
    for chr in src.chars() {
        if chr.is_whitespace() {
            if !was_whitespace {
                result.push(' ');
            }
            was_whitespace = true;
        } else {
            result.push(chr);
            was_whitespace = false;
        }
    }
    while result.ends_with(' ') {
        result.pop();
    }
    result
}

/// Apply the transformations selected by `options` to one value, in
/// place. Macro lookups go through `macros`; undefined references warn
/// and expand to the empty string. Expansion is idempotent: a value
/// already reduced to one string literal passes through unchanged.
pub fn post_process_value(
    value: &mut Value,
    options: Options,
    macros: &MacroTable,
    sink: &mut dyn WarningSink,
    filename: &str,
    line: usize,
) {
    if options.contains(Options::EXPAND) {
        for sv in &mut value.0 {
            if let SimpleValue::Macro(name) = sv {
                let text = match macros.lookup(name) {
                    Some(text) => text.to_string(),
                    None => {
                        sink.report(
                            Severity::Warning,
                            filename,
                            line,
                            &format!("undefined macro \"{name}\""),
                        );
                        String::new()
                    }
                };
                *sv = SimpleValue::Str(text);
            }
        }
    }

    if options.intersects(Options::EXPAND | Options::PASTE) {
        let parts = std::mem::take(&mut value.0);
        for sv in parts {
            match sv {
                // numbers paste as their text
                SimpleValue::Str(text) | SimpleValue::Number(text) => {
                    if let Some(SimpleValue::Str(acc)) = value.0.last_mut() {
                        acc.push_str(&text);
                    } else {
                        value.0.push(SimpleValue::Str(text));
                    }
                }
                keep => value.0.push(keep),
            }
        }
    }

    if options.contains(Options::COLLAPSE) {
        for sv in &mut value.0 {
            if let SimpleValue::Str(s) = sv {
                *s = collapse_whitespace(s);
            }
        }
    }
}

/// Post-process every value of one entry.
///
/// Macro definitions always get `EXPAND | PASTE` (never `COLLAPSE`, so
/// stored text keeps its surrounding spaces) and are installed in the
/// table unless `NOSTORE_MACROS` says otherwise. Regular entries and
/// preambles get the caller's options; comment bodies stay verbatim.
pub(crate) fn post_process_entry(
    entry: &mut Entry,
    options: Options,
    macros: &mut MacroTable,
    sink: &mut dyn WarningSink,
    filename: &str,
    line: usize,
) {
    match entry.metatype {
        Metatype::Comment => {}
        Metatype::MacroDef => {
            let forced = Options::EXPAND | Options::PASTE | Options::MACRO;
            for field in &mut entry.fields {
                post_process_value(&mut field.value, forced, macros, sink, filename, line);
                if !options.contains(Options::NOSTORE_MACROS) {
                    macros.add_from_value(
                        &field.name,
                        &field.value,
                        forced,
                        filename,
                        line,
                        sink,
                    );
                }
            }
        }
        Metatype::Preamble | Metatype::Regular => {
            let field_options = (options
                & (Options::EXPAND | Options::PASTE | Options::COLLAPSE))
                | Options::FIELD;
            for field in &mut entry.fields {
                post_process_value(
                    &mut field.value,
                    field_options,
                    macros,
                    sink,
                    filename,
                    line,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollectSink;

    fn value(parts: &[SimpleValue]) -> Value {
        Value(parts.to_vec())
    }

    #[test]
    fn test_expand_and_paste_flattens() {
        let mut sink = CollectSink::new();
        let mut macros = MacroTable::new();
        macros.add("and", " and ", "t", 1, &mut sink);
        let mut v = value(&[
            SimpleValue::Str("J".to_string()),
            SimpleValue::Macro("and".to_string()),
            SimpleValue::Str("B".to_string()),
        ]);
        post_process_value(
            &mut v,
            Options::EXPAND | Options::PASTE,
            &macros,
            &mut sink,
            "t",
            1,
        );
        assert_eq!(v.as_flat(), Some("J and B"));
    }

    #[test]
    fn test_undefined_macro_becomes_empty_and_warns() {
        let mut sink = CollectSink::new();
        let macros = MacroTable::new();
        let mut v = value(&[
            SimpleValue::Str("x".to_string()),
            SimpleValue::Macro("nope".to_string()),
        ]);
        post_process_value(
            &mut v,
            Options::EXPAND | Options::PASTE,
            &macros,
            &mut sink,
            "t",
            3,
        );
        assert_eq!(v.as_flat(), Some("x"));
        let problems: Vec<_> = sink.problems().collect();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("nope"));
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let mut sink = CollectSink::new();
        let mut macros = MacroTable::new();
        macros.add("m", "text", "t", 1, &mut sink);
        let mut v = value(&[
            SimpleValue::Macro("m".to_string()),
            SimpleValue::Number("42".to_string()),
        ]);
        let opts = Options::EXPAND | Options::PASTE;
        post_process_value(&mut v, opts, &macros, &mut sink, "t", 1);
        let once = v.clone();
        post_process_value(&mut v, opts, &macros, &mut sink, "t", 1);
        assert_eq!(v, once);
        assert_eq!(v.as_flat(), Some("text42"));
    }

    #[test]
    fn test_collapse_trims_and_squeezes() {
        let mut sink = CollectSink::new();
        let macros = MacroTable::new();
        let mut v = value(&[SimpleValue::Str(
            "  a message.  \n   Best  regards ".to_string(),
        )]);
        post_process_value(&mut v, Options::COLLAPSE, &macros, &mut sink, "t", 1);
        assert_eq!(v.as_flat(), Some("a message. Best regards"));
    }

    #[test]
    fn test_paste_without_expand_keeps_macros() {
        let mut sink = CollectSink::new();
        let macros = MacroTable::new();
        let mut v = value(&[
            SimpleValue::Str("a".to_string()),
            SimpleValue::Str("b".to_string()),
            SimpleValue::Macro("m".to_string()),
            SimpleValue::Str("c".to_string()),
        ]);
        post_process_value(&mut v, Options::PASTE, &macros, &mut sink, "t", 1);
        assert_eq!(
            v.0,
            vec![
                SimpleValue::Str("ab".to_string()),
                SimpleValue::Macro("m".to_string()),
                SimpleValue::Str("c".to_string()),
            ]
        );
    }
}
