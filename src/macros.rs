use std::collections::HashMap;

use crate::errors::{Severity, WarningSink};
use crate::postprocess::{self, Options};
use crate::types::Value;

/// Registry of `@string` macro definitions.
///
/// Names are compared case-insensitively (ASCII fold); stored text is
/// always already expanded, so a lookup never triggers further
/// expansion. One table lives per [`Session`](crate::Session) and is
/// mutated as macro-def entries are post-processed.
///
/// Stored text keeps its whitespace untouched. A macro expanding to
/// `" and "` must hold on to its surrounding spaces so interpolation
/// into a later value produces the intended joined form; collapsing
/// happens when the *outer* value is post-processed.
#[derive(Debug, Default, Clone)]
pub struct MacroTable(HashMap<String, String>);

impl MacroTable {
    pub fn new() -> MacroTable {
        MacroTable::default()
    }

    /// Define `name` as `text`. Redefinition overwrites and warns.
    pub fn add(
        &mut self,
        name: &str,
        text: impl Into<String>,
        filename: &str,
        line: usize,
        sink: &mut dyn WarningSink,
    ) {
        let folded = name.to_ascii_lowercase();
        if self.0.insert(folded, text.into()).is_some() {
            sink.report(
                Severity::Warning,
                filename,
                line,
                &format!("macro \"{name}\" redefined"),
            );
        }
    }

    /// Define `name` from a parsed value.
    ///
    /// The value must already be post-processed with sub-macros expanded
    /// and concatenated and whitespace *not* collapsed. A caller that
    /// cannot guarantee this passes empty `options` and the table runs
    /// the required processing itself before storing.
    pub fn add_from_value(
        &mut self,
        name: &str,
        value: &Value,
        options: Options,
        filename: &str,
        line: usize,
        sink: &mut dyn WarningSink,
    ) {
        let text = if options.is_empty() {
            let mut processed = value.clone();
            postprocess::post_process_value(
                &mut processed,
                Options::EXPAND | Options::PASTE | Options::MACRO,
                self,
                sink,
                filename,
                line,
            );
            flatten(&processed)
        } else {
            flatten(value)
        };
        self.add(name, text, filename, line, sink);
    }

    /// Expansion text of `name`, or `None` if it was never defined.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Length in bytes of the expansion of `name`; 0 if undefined.
    pub fn length(&self, name: &str) -> usize {
        self.lookup(name).map_or(0, str::len)
    }

    pub fn delete(&mut self, name: &str) {
        self.0.remove(&name.to_ascii_lowercase());
    }

    pub fn delete_all(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Join whatever literal text the value holds. Unexpanded macro
/// references have no text and contribute nothing.
fn flatten(value: &Value) -> String {
    let mut out = String::new();
    for sv in &value.0 {
        if let Some(text) = sv.text() {
            out.push_str(text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollectSink;
    use crate::types::SimpleValue;

    #[test]
    fn test_names_fold_case() {
        let mut sink = CollectSink::new();
        let mut table = MacroTable::new();
        table.add("JAN", "January", "t", 1, &mut sink);
        assert_eq!(table.lookup("jan"), Some("January"));
        assert_eq!(table.lookup("Jan"), Some("January"));
        assert_eq!(table.length("jan"), 7);
        assert!(sink.problems().next().is_none());
    }

    #[test]
    fn test_redefinition_warns_and_overwrites() {
        let mut sink = CollectSink::new();
        let mut table = MacroTable::new();
        table.add("jan", "January", "t", 1, &mut sink);
        table.add("jan", "Januar", "t", 2, &mut sink);
        assert_eq!(table.lookup("jan"), Some("Januar"));
        assert_eq!(sink.problems().count(), 1);
    }

    #[test]
    fn test_missing_macro_sentinels() {
        let table = MacroTable::new();
        assert_eq!(table.lookup("nope"), None);
        assert_eq!(table.length("nope"), 0);
    }

    #[test]
    fn test_add_from_unprocessed_value() {
        let mut sink = CollectSink::new();
        let mut table = MacroTable::new();
        table.add("and", " and ", "t", 1, &mut sink);
        // "J" # and # "B", straight off the parser
        let value = Value(vec![
            SimpleValue::Str("J".to_string()),
            SimpleValue::Macro("and".to_string()),
            SimpleValue::Str("B".to_string()),
        ]);
        table.add_from_value("names", &value, Options::empty(), "t", 2, &mut sink);
        assert_eq!(table.lookup("names"), Some("J and B"));
    }

    #[test]
    fn test_delete_and_delete_all() {
        let mut sink = CollectSink::new();
        let mut table = MacroTable::new();
        table.add("a", "1", "t", 1, &mut sink);
        table.add("b", "2", "t", 1, &mut sink);
        table.delete("A");
        assert_eq!(table.lookup("a"), None);
        assert_eq!(table.len(), 1);
        table.delete_all();
        assert!(table.is_empty());
    }
}
