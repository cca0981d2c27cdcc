use std::ops::Range;

use crate::errors::{Severity, WarningSink};

/// An ordered sequence of substrings cut out of one backing buffer.
///
/// The list owns a copy of the input; each item is a byte range into
/// it. `None` items are null substrings, produced where two delimiters
/// sat next to each other. Everything is freed as a unit when the list
/// is dropped.
#[derive(Debug)]
pub struct StringList {
    buf: String,
    items: Vec<Option<Range<usize>>>,
}

impl StringList {
    fn new(buf: String) -> StringList {
        StringList {
            buf,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The `i`-th substring; `None` for a null substring or an index
    /// past the end.
    pub fn get(&self, i: usize) -> Option<&str> {
        self.items.get(i)?.as_ref().map(|r| &self.buf[r.clone()])
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.items
            .iter()
            .map(|item| item.as_ref().map(|r| &self.buf[r.clone()]))
    }
}

fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace()
}

/// Trim a byte range of surrounding ASCII whitespace.
fn trim_range(buf: &[u8], mut range: Range<usize>) -> Range<usize> {
    while range.start < range.end && is_space(buf[range.start]) {
        range.start += 1;
    }
    while range.end > range.start && is_space(buf[range.end - 1]) {
        range.end -= 1;
    }
    range
}

/// Partition `src` into substrings separated by `delim`.
///
/// A delimiter only counts when the literal bytes of `delim` appear at
/// brace depth 0, surrounded by whitespace or a string boundary, with
/// ASCII-case-insensitive comparison. Delimiters at the very start or
/// end of the string are absorbed into the adjacent substring. Two
/// adjacent delimiters yield a null substring and a warning tagged
/// with `description`.
///
/// ```rust
/// use bibread::{split_list, CollectSink};
/// let mut sink = CollectSink::new();
/// let list = split_list(
///     "Candy and Apples AnD {Green Eggs and Ham}",
///     "and", "authors.bib", 1, "name", &mut sink,
/// );
/// assert_eq!(list.get(0), Some("Candy"));
/// assert_eq!(list.get(1), Some("Apples"));
/// assert_eq!(list.get(2), Some("{Green Eggs and Ham}"));
/// ```
pub fn split_list(
    src: &str,
    delim: &str,
    filename: &str,
    line: usize,
    description: &str,
    sink: &mut dyn WarningSink,
) -> StringList {
    let bytes = src.as_bytes();
    let dlen = delim.len();
    let mut matches: Vec<Range<usize>> = Vec::new();

    if dlen > 0 {
        let mut depth = 0usize;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ if depth == 0
                    && i + dlen <= bytes.len()
                    && bytes[i..i + dlen].eq_ignore_ascii_case(delim.as_bytes())
                    && (i == 0 || is_space(bytes[i - 1]))
                    && (i + dlen == bytes.len() || is_space(bytes[i + dlen])) =>
                {
                    matches.push(i..i + dlen);
                    i += dlen;
                    continue;
                }
                _ => {}
            }
            i += 1;
        }
    }

    // a delimiter with nothing before or after it belongs to the
    // neighboring substring, not to the separator structure
    if let Some(first) = matches.first() {
        if trim_range(bytes, 0..first.start).is_empty() {
            matches.remove(0);
        }
    }
    if let Some(last) = matches.last() {
        if trim_range(bytes, last.end..bytes.len()).is_empty() {
            matches.pop();
        }
    }

    let mut list = StringList::new(src.to_string());
    let mut start = 0;
    for (k, m) in matches.iter().enumerate() {
        let piece = trim_range(bytes, start..m.start);
        if piece.is_empty() && k > 0 {
            sink.report(
                Severity::Warning,
                filename,
                line,
                &format!("empty {description} between two \"{delim}\" delimiters"),
            );
            list.items.push(None);
        } else {
            list.items.push(Some(piece));
        }
        start = m.end;
    }
    let tail = trim_range(bytes, start..bytes.len());
    if tail.is_empty() && !matches.is_empty() {
        sink.report(
            Severity::Warning,
            filename,
            line,
            &format!("empty {description} between two \"{delim}\" delimiters"),
        );
        list.items.push(None);
    } else if !tail.is_empty() || !src.trim().is_empty() {
        list.items.push(Some(tail));
    }
    list
}

/// One of the four parts a BibTeX name splits into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NamePart {
    First,
    Von,
    Last,
    Jr,
}

impl NamePart {
    pub const ALL: [NamePart; 4] = [NamePart::First, NamePart::Von, NamePart::Last, NamePart::Jr];

    pub(crate) fn index(self) -> usize {
        match self {
            NamePart::First => 0,
            NamePart::Von => 1,
            NamePart::Last => 2,
            NamePart::Jr => 3,
        }
    }
}

/// One personal name, tokenized and split into first/von/last/jr.
///
/// The token list owns the bytes; the four parts are index sequences
/// into it, pairwise disjoint.
#[derive(Debug)]
pub struct Name {
    tokens: StringList,
    parts: [Vec<usize>; 4],
}

impl Name {
    /// See [`split_name`].
    pub fn split(
        src: &str,
        filename: &str,
        line: usize,
        name_num: usize,
        sink: &mut dyn WarningSink,
    ) -> Name {
        split_name(src, filename, line, name_num, sink)
    }

    pub fn tokens(&self) -> &StringList {
        &self.tokens
    }

    /// The tokens of one part, in order.
    pub fn part(&self, part: NamePart) -> Vec<&str> {
        self.parts[part.index()]
            .iter()
            .filter_map(|&i| self.tokens.get(i))
            .collect()
    }

    pub fn part_len(&self, part: NamePart) -> usize {
        self.parts[part.index()].len()
    }
}

/// Cut a single name into whitespace/comma-separated tokens at brace
/// depth 0. Returns the token list and, for each structural comma, the
/// number of tokens that preceded it.
fn tokenize_name(src: &str) -> (StringList, Vec<usize>) {
    let bytes = src.as_bytes();
    let mut list = StringList::new(src.to_string());
    let mut commas = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        let boundary = depth == 0 && (is_space(b) || b == b',');
        if boundary {
            if let Some(s) = start.take() {
                list.items.push(Some(s..i));
            }
            if b == b',' {
                commas.push(list.items.len());
            }
            continue;
        }
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        list.items.push(Some(s..bytes.len()));
    }
    (list, commas)
}

/// Whether a name token counts as lowercase (a von token).
///
/// The decision belongs to the first alphabetic character at brace
/// level 0, where a plain braced group is skipped over, but a BibTeX
/// special character (`{` immediately followed by `\`) is entered: the
/// first alphabetic character after the control-sequence name decides.
/// A token with no such character counts as uppercase.
fn token_is_lowercase(token: &str) -> bool {
    let bytes = token.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if i + 1 < bytes.len() && bytes[i + 1] == b'\\' => {
                // special character: skip the control sequence name,
                // then look for a letter inside the group
                let mut j = i + 2;
                if j < bytes.len() && bytes[j].is_ascii_alphabetic() {
                    while j < bytes.len() && bytes[j].is_ascii_alphabetic() {
                        j += 1;
                    }
                } else if j < bytes.len() {
                    j += 1;
                }
                let mut level = 1usize;
                while j < bytes.len() && level > 0 {
                    match bytes[j] {
                        b'{' => level += 1,
                        b'}' => level -= 1,
                        c if c.is_ascii_alphabetic() => return c.is_ascii_lowercase(),
                        _ => {}
                    }
                    j += 1;
                }
                return false;
            }
            b'{' => {
                // plain group, invisible to classification
                let mut level = 1usize;
                i += 1;
                while i < bytes.len() && level > 0 {
                    match bytes[i] {
                        b'{' => level += 1,
                        b'}' => level -= 1,
                        _ => {}
                    }
                    i += 1;
                }
            }
            c if c.is_ascii_alphabetic() => return c.is_ascii_lowercase(),
            _ => i += 1,
        }
    }
    false
}

/// Split one name into first/von/last/jr parts following BibTeX
/// conventions. Total: any input, including empty or whitespace-only
/// strings and unbalanced braces, yields a name without panicking.
///
/// `name_num` tags warnings when the caller is iterating a name list.
pub fn split_name(
    src: &str,
    filename: &str,
    line: usize,
    name_num: usize,
    sink: &mut dyn WarningSink,
) -> Name {
    let (tokens, mut commas) = tokenize_name(src);
    let n = tokens.len();

    if commas.len() > 2 {
        sink.report(
            Severity::Warning,
            filename,
            line,
            &format!("name {name_num}: too many commas, treating the extras as part of the first name"),
        );
        commas.truncate(2);
    }

    let lowercase: Vec<bool> = (0..n)
        .map(|i| tokens.get(i).map_or(false, token_is_lowercase))
        .collect();

    let mut parts: [Vec<usize>; 4] = Default::default();
    let mut assign = |part: NamePart, range: Range<usize>| {
        parts[part.index()] = range.collect();
    };

    match commas.as_slice() {
        [] => {
            let run_start = lowercase.iter().position(|&lc| lc);
            match run_start {
                None => {
                    if n > 0 {
                        assign(NamePart::First, 0..n - 1);
                        assign(NamePart::Last, n - 1..n);
                    }
                }
                Some(i) => {
                    let mut j = i;
                    while j < n && lowercase[j] {
                        j += 1;
                    }
                    if j == n {
                        // a name cannot end in its von part
                        sink.report(
                            Severity::Warning,
                            filename,
                            line,
                            &format!(
                                "name {name_num}: no capitalized token after \
                                 the lowercase run, taking \"{}\" as the last name",
                                tokens.get(n - 1).unwrap_or("")
                            ),
                        );
                        assign(NamePart::First, 0..i);
                        assign(NamePart::Von, i..n - 1);
                        assign(NamePart::Last, n - 1..n);
                    } else {
                        assign(NamePart::First, 0..i);
                        assign(NamePart::Von, i..j);
                        assign(NamePart::Last, j..n);
                    }
                }
            }
        }
        [c1] | [c1, _] => {
            let c1 = *c1;
            // the lowercase scan never crosses the comma
            let mut j = 0;
            while j < c1 && lowercase[j] {
                j += 1;
            }
            if j == c1 && c1 > 0 {
                sink.report(
                    Severity::Warning,
                    filename,
                    line,
                    &format!(
                        "name {name_num}: nothing capitalized before the comma, \
                         taking \"{}\" as the last name",
                        tokens.get(c1 - 1).unwrap_or("")
                    ),
                );
                j = c1 - 1;
            }
            assign(NamePart::Von, 0..j);
            assign(NamePart::Last, j..c1);
            if let [_, c2] = commas.as_slice() {
                assign(NamePart::Jr, c1..*c2);
                assign(NamePart::First, *c2..n);
            } else {
                assign(NamePart::First, c1..n);
            }
        }
        _ => unreachable!("commas truncated to at most two"),
    }

    let name = Name { tokens, parts };
    if !parts_cover_tokens(&name, n) {
        sink.report(
            Severity::InternalError,
            filename,
            line,
            &format!("name {name_num}: part assignment does not cover the token list"),
        );
    }
    name
}

/// The four part sequences must be pairwise disjoint and, concatenated
/// in token order, equal `0..n`.
fn parts_cover_tokens(name: &Name, n: usize) -> bool {
    let mut seen: Vec<usize> = name.parts.iter().flatten().copied().collect();
    seen.sort_unstable();
    seen.len() == n && seen.iter().copied().eq(0..n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollectSink;

    fn split(src: &str, sink: &mut CollectSink) -> Name {
        split_name(src, "test.bib", 1, 1, sink)
    }

    fn part<'a>(name: &'a Name, p: NamePart) -> Vec<&'a str> {
        name.part(p)
    }

    #[test]
    fn test_split_list_respects_braces_and_case() {
        let mut sink = CollectSink::new();
        let list = split_list(
            "Candy and Apples AnD {Green Eggs and Ham}",
            "and",
            "t",
            1,
            "name",
            &mut sink,
        );
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0), Some("Candy"));
        assert_eq!(list.get(1), Some("Apples"));
        assert_eq!(list.get(2), Some("{Green Eggs and Ham}"));
        assert!(sink.problems().next().is_none());
    }

    #[test]
    fn test_split_list_needs_whitespace_around_delim() {
        let mut sink = CollectSink::new();
        let list = split_list("Sand and Sandy", "and", "t", 1, "name", &mut sink);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0), Some("Sand"));
        assert_eq!(list.get(1), Some("Sandy"));
    }

    #[test]
    fn test_split_list_absorbs_edge_delimiters() {
        let mut sink = CollectSink::new();
        let list = split_list("and X and", "and", "t", 1, "name", &mut sink);
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(0), Some("and X and"));
    }

    #[test]
    fn test_split_list_adjacent_delimiters_warn() {
        let mut sink = CollectSink::new();
        let list = split_list("a and and b", "and", "t", 3, "name", &mut sink);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0), Some("a"));
        assert_eq!(list.get(1), None);
        assert_eq!(list.get(2), Some("b"));
        assert_eq!(sink.problems().count(), 1);
    }

    #[test]
    fn test_split_list_join_roundtrip() {
        let mut sink = CollectSink::new();
        let src = "Candy  and Apples and {Green Eggs and Ham}";
        let list = split_list(src, "and", "t", 1, "name", &mut sink);
        let joined = list
            .iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" and ");
        let collapsed: Vec<&str> = src.split_whitespace().collect();
        assert_eq!(joined, collapsed.join(" "));
    }

    #[test]
    fn test_tokenize_handles_whitespace_only() {
        let mut sink = CollectSink::new();
        let name = split("   ", &mut sink);
        assert_eq!(name.tokens().len(), 0);
        for p in NamePart::ALL {
            assert_eq!(name.part_len(p), 0);
        }
    }

    #[test]
    fn test_simple_first_last() {
        let mut sink = CollectSink::new();
        let name = split("Donald E. Knuth", &mut sink);
        assert_eq!(part(&name, NamePart::First), vec!["Donald", "E."]);
        assert_eq!(part(&name, NamePart::Last), vec!["Knuth"]);
        assert_eq!(name.part_len(NamePart::Von), 0);
        assert_eq!(name.part_len(NamePart::Jr), 0);
    }

    #[test]
    fn test_von_run_without_comma() {
        let mut sink = CollectSink::new();
        let name = split("Per von der Last", &mut sink);
        assert_eq!(part(&name, NamePart::First), vec!["Per"]);
        assert_eq!(part(&name, NamePart::Von), vec!["von", "der"]);
        assert_eq!(part(&name, NamePart::Last), vec!["Last"]);
    }

    #[test]
    fn test_one_comma_form() {
        let mut sink = CollectSink::new();
        let name = split("van der Graaf, Horace Q.", &mut sink);
        assert_eq!(part(&name, NamePart::First), vec!["Horace", "Q."]);
        assert_eq!(part(&name, NamePart::Von), vec!["van", "der"]);
        assert_eq!(part(&name, NamePart::Last), vec!["Graaf"]);
        assert_eq!(name.part_len(NamePart::Jr), 0);
    }

    #[test]
    fn test_two_comma_form_with_lowercase_jr() {
        let mut sink = CollectSink::new();
        let name = split("von der foo, jr, Joe", &mut sink);
        assert_eq!(part(&name, NamePart::First), vec!["Joe"]);
        assert_eq!(part(&name, NamePart::Von), vec!["von", "der"]);
        assert_eq!(part(&name, NamePart::Last), vec!["foo"]);
        assert_eq!(part(&name, NamePart::Jr), vec!["jr"]);
        // the all-lowercase pre-comma group costs one promotion warning
        assert_eq!(sink.problems().count(), 1);
    }

    #[test]
    fn test_trailing_lowercase_promotes_last() {
        let mut sink = CollectSink::new();
        let name = split("Jean de la", &mut sink);
        assert_eq!(part(&name, NamePart::First), vec!["Jean"]);
        assert_eq!(part(&name, NamePart::Von), vec!["de"]);
        assert_eq!(part(&name, NamePart::Last), vec!["la"]);
        assert_eq!(sink.problems().count(), 1);
    }

    #[test]
    fn test_too_many_commas_warn_and_fold_into_first() {
        let mut sink = CollectSink::new();
        let name = split("Last, jr, First, extra", &mut sink);
        assert_eq!(part(&name, NamePart::Last), vec!["Last"]);
        assert_eq!(part(&name, NamePart::Jr), vec!["jr"]);
        assert_eq!(part(&name, NamePart::First), vec!["First", "extra"]);
        assert_eq!(sink.problems().count(), 1);
    }

    #[test]
    fn test_special_character_classification() {
        assert!(token_is_lowercase("{\\foo x}y"));
        assert!(!token_is_lowercase("{\\foo X}y"));
        assert!(!token_is_lowercase("{\\foo}"));
        assert!(token_is_lowercase("von"));
        assert!(!token_is_lowercase("Van"));
        // plain groups are invisible, digits do not decide
        assert!(token_is_lowercase("{Von}der"));
        assert!(!token_is_lowercase("123"));
        assert!(!token_is_lowercase("{abc}"));
    }

    #[test]
    fn test_unbalanced_braces_make_one_token() {
        let mut sink = CollectSink::new();
        let name = split("{Unclosed and unbowed", &mut sink);
        assert_eq!(name.tokens().len(), 1);
        assert_eq!(
            part(&name, NamePart::Last),
            vec!["{Unclosed and unbowed"]
        );
    }

    #[test]
    fn test_parts_cover_tokens() {
        let mut sink = CollectSink::new();
        for src in [
            "Donald E. Knuth",
            "van der Graaf, Horace Q.",
            "von der foo, jr, Joe",
            "single",
            "A B C d e F",
        ] {
            let name = split(src, &mut sink);
            let mut indices: Vec<usize> = NamePart::ALL
                .iter()
                .flat_map(|&p| name.parts[p.index()].clone())
                .collect();
            indices.sort_unstable();
            let expect: Vec<usize> = (0..name.tokens().len()).collect();
            assert_eq!(indices, expect, "parts must cover the tokens of {src:?}");
        }
        assert!(sink
            .reports
            .iter()
            .all(|(sev, ..)| *sev < Severity::InternalError));
    }
}
