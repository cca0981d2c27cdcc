use crate::names::{Name, NamePart};

/// How one name part is rendered: whether it appears at all, whether
/// its tokens are abbreviated to their first letter, and the text
/// wrapped around the part, around each token, and between tokens.
#[derive(Clone, Debug)]
pub struct PartFormat {
    pub included: bool,
    pub abbreviated: bool,
    pub pre_part: String,
    pub post_part: String,
    pub pre_token: String,
    pub post_token: String,
    pub join_tokens: String,
}

impl Default for PartFormat {
    fn default() -> Self {
        PartFormat {
            included: true,
            abbreviated: false,
            pre_part: String::new(),
            post_part: " ".to_string(),
            pre_token: String::new(),
            post_token: String::new(),
            join_tokens: " ".to_string(),
        }
    }
}

/// A template for rendering split names back into strings.
///
/// The default format writes all four parts in first-von-last-jr
/// order, tokens joined by spaces, nothing abbreviated:
///
/// ```rust
/// use bibread::{split_name, format_name, CollectSink, NameFormat};
/// let mut sink = CollectSink::new();
/// let name = split_name("van der Graaf, Horace Q.", "t", 1, 1, &mut sink);
/// let fmt = NameFormat::new();
/// assert_eq!(format_name(&name, &fmt), "Horace Q. van der Graaf");
/// ```
#[derive(Clone, Debug)]
pub struct NameFormat {
    parts: [PartFormat; 4],
    order: [NamePart; 4],
    /// Leave out the post-token text after a token that is already a
    /// single letter (`Harry S Truman` rather than `Harry S. Truman`).
    /// Off by default; the historical behavior always appends.
    pub suppress_single_letter_post: bool,
}

impl NameFormat {
    pub fn new() -> NameFormat {
        NameFormat {
            parts: Default::default(),
            order: [NamePart::First, NamePart::Von, NamePart::Last, NamePart::Jr],
            suppress_single_letter_post: false,
        }
    }

    /// The familiar "J. R. R. Tolkien" shape: first-name tokens
    /// abbreviated with a trailing period.
    pub fn abbreviated_first() -> NameFormat {
        let mut fmt = NameFormat::new();
        let first = fmt.part_mut(NamePart::First);
        first.abbreviated = true;
        first.post_token = ".".to_string();
        fmt
    }

    pub fn part(&self, part: NamePart) -> &PartFormat {
        &self.parts[part.index()]
    }

    pub fn part_mut(&mut self, part: NamePart) -> &mut PartFormat {
        &mut self.parts[part.index()]
    }

    /// Render the parts in a different order, e.g. last-first.
    pub fn set_order(&mut self, order: [NamePart; 4]) {
        self.order = order;
    }
}

impl Default for NameFormat {
    fn default() -> Self {
        NameFormat::new()
    }
}

/// True for a bare single letter like the `S` in `Harry S Truman`.
fn is_single_letter(token: &str) -> bool {
    token.len() == 1 && token.as_bytes()[0].is_ascii_alphabetic()
}

/// The abbreviation prefix of one token component: everything up to
/// and including the first letter that decides the abbreviation, plus
/// the number of closing braces the caller must append to keep the
/// output balanced. Control-sequence names inside a BibTeX special
/// character do not count as that letter.
fn abbrev_prefix(component: &str) -> (String, usize) {
    let bytes = component.as_bytes();
    let mut i = 0;
    let mut cut = bytes.len();
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 1;
            if i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
            } else if i < bytes.len() {
                i += 1;
            }
            continue;
        }
        if bytes[i].is_ascii_alphabetic() {
            cut = i + 1;
            break;
        }
        i += 1;
    }
    let prefix = &component[..cut];
    let mut open = 0isize;
    for &b in prefix.as_bytes() {
        match b {
            b'{' => open += 1,
            b'}' => open -= 1,
            _ => {}
        }
    }
    (prefix.to_string(), open.max(0) as usize)
}

/// Split a token at brace-level-0 hyphens; `Jean-Paul` abbreviates
/// component by component.
fn hyphen_components(token: &str) -> Vec<&str> {
    let bytes = token.as_bytes();
    let mut depth = 0usize;
    let mut components = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'-' if depth == 0 => {
                components.push(&token[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    components.push(&token[start..]);
    components
}

fn render_token(token: &str, pf: &PartFormat, format: &NameFormat) -> String {
    let mut out = pf.pre_token.clone();
    if pf.abbreviated {
        let components = hyphen_components(token);
        for (i, component) in components.iter().enumerate() {
            if i > 0 {
                out.push_str(&pf.post_token);
                out.push('-');
            }
            let (prefix, closing) = abbrev_prefix(component);
            out.push_str(&prefix);
            for _ in 0..closing {
                out.push('}');
            }
        }
    } else {
        out.push_str(token);
        // a token with unclosed braces must not leak the imbalance
        // into the rendered name
        let mut open = 0isize;
        for b in token.bytes() {
            match b {
                b'{' => open += 1,
                b'}' => open -= 1,
                _ => {}
            }
        }
        for _ in 0..open.max(0) {
            out.push('}');
        }
    }
    if !(format.suppress_single_letter_post && is_single_letter(token)) {
        out.push_str(&pf.post_token);
    }
    out
}

/// Render a split name through a format.
///
/// Each included nonempty part contributes its pre-part text, its
/// tokens joined by the join text, and, when a later nonempty part
/// follows, its post-part text, so default formats end cleanly.
pub fn format_name(name: &Name, format: &NameFormat) -> String {
    let mut pieces: Vec<(String, &PartFormat)> = Vec::new();
    for &part in &format.order {
        let pf = format.part(part);
        if !pf.included {
            continue;
        }
        let tokens = name.part(part);
        if tokens.is_empty() {
            continue;
        }
        let body = tokens
            .iter()
            .map(|t| render_token(t, pf, format))
            .collect::<Vec<_>>()
            .join(&pf.join_tokens);
        pieces.push((body, pf));
    }

    let mut out = String::new();
    let count = pieces.len();
    for (i, (body, pf)) in pieces.into_iter().enumerate() {
        out.push_str(&pf.pre_part);
        out.push_str(&body);
        if i + 1 < count {
            out.push_str(&pf.post_part);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollectSink;
    use crate::names::split_name;

    fn split(src: &str) -> Name {
        let mut sink = CollectSink::new();
        split_name(src, "t", 1, 1, &mut sink)
    }

    fn balanced(s: &str) -> bool {
        let mut depth = 0isize;
        for b in s.bytes() {
            match b {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
        }
        depth == 0
    }

    #[test]
    fn test_default_format_restores_reading_order() {
        let name = split("van der Graaf, Horace Q.");
        assert_eq!(
            format_name(&name, &NameFormat::new()),
            "Horace Q. van der Graaf"
        );
    }

    #[test]
    fn test_jr_comes_last() {
        let name = split("Ford, Jr., Henry");
        assert_eq!(format_name(&name, &NameFormat::new()), "Henry Ford Jr.");
    }

    #[test]
    fn test_abbreviated_first() {
        let name = split("Donald E. Knuth");
        assert_eq!(
            format_name(&name, &NameFormat::abbreviated_first()),
            "D. E. Knuth"
        );
    }

    #[test]
    fn test_hyphenated_token_abbreviates_per_component() {
        let name = split("Jean-Paul Sartre");
        assert_eq!(
            format_name(&name, &NameFormat::abbreviated_first()),
            "J.-P. Sartre"
        );
    }

    #[test]
    fn test_single_letter_punctuation_knob() {
        let name = split("Harry S Truman");
        let mut fmt = NameFormat::abbreviated_first();
        assert_eq!(format_name(&name, &fmt), "H. S. Truman");
        fmt.suppress_single_letter_post = true;
        assert_eq!(format_name(&name, &fmt), "H. S Truman");
    }

    #[test]
    fn test_abbreviation_keeps_braces_balanced() {
        for src in ["{Bar}bara {de la Soul} Jones", "{\\'E}mile Zola", "{Unclosed Name"] {
            let name = split(src);
            let fmt = NameFormat::abbreviated_first();
            let out = format_name(&name, &fmt);
            assert!(balanced(&out), "unbalanced output {out:?} for {src:?}");
        }
    }

    #[test]
    fn test_special_char_abbreviation() {
        let name = split("{\\'E}mile Zola");
        assert_eq!(
            format_name(&name, &NameFormat::abbreviated_first()),
            "{\\'E}. Zola"
        );
    }

    #[test]
    fn test_excluded_part_is_dropped() {
        let name = split("van der Graaf, Horace Q.");
        let mut fmt = NameFormat::new();
        fmt.part_mut(NamePart::First).included = false;
        assert_eq!(format_name(&name, &fmt), "van der Graaf");
    }

    #[test]
    fn test_last_first_order() {
        let name = split("Donald E. Knuth");
        let mut fmt = NameFormat::new();
        fmt.set_order([NamePart::Von, NamePart::Last, NamePart::Jr, NamePart::First]);
        fmt.part_mut(NamePart::Last).post_part = ", ".to_string();
        assert_eq!(format_name(&name, &fmt), "Knuth, Donald E.");
    }
}
