//! Tag Scanner for the Rain Compiler
//!
//! Recognizes a small fixed vocabulary of tags in loosely structured markup.
//! This is not an HTML parser: it walks the text once per match with four
//! explicit states and never builds a tree.
//!
//! Matching policy:
//! - `<` may be followed by whitespace before the tag name, and the name must
//!   end at whitespace, `/` or `>` (`<card` never matches `<cards`).
//! - Quoted attribute values may contain `>`.
//! - `<name ... />` is self-closing and has no inner content.
//! - Otherwise the occurrence extends to the FIRST following `</name>`
//!   (non-greedy). A nested tag of the same name therefore closes early.
//! - An opening tag with no closing tag matches on its own, without content.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InOpeningTag,
    InContent,
    InClosingTag,
}

/// One occurrence of a tag, expressed as byte ranges into the scanned source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    /// The whole occurrence, from `<` to the end of the closing tag
    /// (or of the opening tag when there is no closing tag).
    pub span: Range<usize>,
    /// Raw attribute text between the tag name and `>`, without the
    /// self-closing slash.
    pub attributes: Range<usize>,
    /// Text between the opening and closing tag.
    pub inner: Option<Range<usize>>,
    pub self_closing: bool,
}

impl TagMatch {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.clone()]
    }

    pub fn attribute_text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.attributes.clone()]
    }

    pub fn inner_text<'s>(&self, source: &'s str) -> &'s str {
        match &self.inner {
            Some(range) => &source[range.clone()],
            None => "",
        }
    }
}

/// Iterates over the non-overlapping occurrences of one tag name.
pub struct TagScanner<'a> {
    source: &'a str,
    name: &'a str,
    ignore_case: bool,
    pos: usize,
}

impl<'a> TagScanner<'a> {
    /// Case-sensitive scanner for `name`.
    pub fn new(source: &'a str, name: &'a str) -> Self {
        Self {
            source,
            name,
            ignore_case: false,
            pos: 0,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    fn scan_from(&self, from: usize) -> Option<TagMatch> {
        let bytes = self.source.as_bytes();
        let mut state = State::Outside;
        let mut i = from;

        let mut start = 0;
        let mut attrs_start = 0;
        let mut open_end = 0;
        let mut close_start = 0;
        let mut quote: Option<u8> = None;
        let mut after_eq = false;

        loop {
            match state {
                State::Outside => {
                    let lt = i + self.source[i..].find('<')?;
                    match self.match_name(lt + 1) {
                        Some(after_name) => {
                            start = lt;
                            attrs_start = after_name;
                            i = after_name;
                            quote = None;
                            after_eq = false;
                            state = State::InOpeningTag;
                        }
                        None => i = lt + 1,
                    }
                }
                State::InOpeningTag => {
                    // Unterminated opening tag: nothing to match.
                    let b = *bytes.get(i)?;
                    match quote {
                        Some(q) => {
                            if b == q {
                                quote = None;
                            }
                        }
                        None => match b {
                            b'"' | b'\'' if after_eq => quote = Some(b),
                            b'=' => after_eq = true,
                            b'>' => {
                                open_end = i + 1;
                                let self_closing = i > attrs_start && bytes[i - 1] == b'/';
                                if self_closing {
                                    return Some(TagMatch {
                                        span: start..open_end,
                                        attributes: attrs_start..i - 1,
                                        inner: None,
                                        self_closing: true,
                                    });
                                }
                                state = State::InContent;
                                i = open_end;
                                continue;
                            }
                            b if b.is_ascii_whitespace() => {}
                            _ => after_eq = false,
                        },
                    }
                    i += 1;
                }
                State::InContent => match self.source[i..].find('<') {
                    Some(rel) => {
                        close_start = i + rel;
                        state = State::InClosingTag;
                    }
                    None => {
                        return Some(TagMatch {
                            span: start..open_end,
                            attributes: attrs_start..open_end - 1,
                            inner: None,
                            self_closing: false,
                        });
                    }
                },
                State::InClosingTag => match self.match_close(close_start) {
                    Some(end) => {
                        return Some(TagMatch {
                            span: start..end,
                            attributes: attrs_start..open_end - 1,
                            inner: Some(open_end..close_start),
                            self_closing: false,
                        });
                    }
                    None => {
                        i = close_start + 1;
                        state = State::InContent;
                    }
                },
            }
        }
    }

    /// Matches `\s*name` followed by a name boundary at `at`, returning the
    /// index right after the name.
    fn match_name(&self, at: usize) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let at = skip_whitespace(bytes, at);
        let end = at + self.name.len();
        let candidate = bytes.get(at..end)?;
        let same = if self.ignore_case {
            candidate.eq_ignore_ascii_case(self.name.as_bytes())
        } else {
            candidate == self.name.as_bytes()
        };
        if !same {
            return None;
        }
        match bytes.get(end) {
            Some(b) if b.is_ascii_whitespace() || *b == b'/' || *b == b'>' => Some(end),
            _ => None,
        }
    }

    /// Matches `<\s*/\s*name\s*>` at `at`, returning the index after `>`.
    fn match_close(&self, at: usize) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let mut i = skip_whitespace(bytes, at + 1);
        if bytes.get(i) != Some(&b'/') {
            return None;
        }
        i = skip_whitespace(bytes, i + 1);
        let end = i + self.name.len();
        let candidate = bytes.get(i..end)?;
        let same = if self.ignore_case {
            candidate.eq_ignore_ascii_case(self.name.as_bytes())
        } else {
            candidate == self.name.as_bytes()
        };
        if !same {
            return None;
        }
        let i = skip_whitespace(bytes, end);
        (bytes.get(i) == Some(&b'>')).then_some(i + 1)
    }
}

impl Iterator for TagScanner<'_> {
    type Item = TagMatch;

    fn next(&mut self) -> Option<TagMatch> {
        if self.name.is_empty() || self.pos >= self.source.len() {
            return None;
        }
        let found = self.scan_from(self.pos)?;
        self.pos = found.span.end.max(found.span.start + 1);
        Some(found)
    }
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    i
}

/// First occurrence of `name`, case-sensitive.
pub fn find_tag(source: &str, name: &str) -> Option<TagMatch> {
    TagScanner::new(source, name).next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_close() {
        let src = "before <card title=\"a\">body</card> after";
        let m = find_tag(src, "card").unwrap();
        assert_eq!(m.text(src), "<card title=\"a\">body</card>");
        assert_eq!(m.attribute_text(src), " title=\"a\"");
        assert_eq!(m.inner_text(src), "body");
        assert!(!m.self_closing);
    }

    #[test]
    fn test_self_closing() {
        let src = "<card title='x' />rest";
        let m = find_tag(src, "card").unwrap();
        assert_eq!(m.text(src), "<card title='x' />");
        assert_eq!(m.attribute_text(src).trim(), "title='x'");
        assert!(m.self_closing);
        assert_eq!(m.inner, None);
    }

    #[test]
    fn test_name_boundary() {
        let src = "<cards></cards><card></card>";
        let all: Vec<_> = TagScanner::new(src, "card").collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text(src), "<card></card>");
    }

    #[test]
    fn test_quoted_greater_than() {
        let src = r#"<card label="a > b">x</card>"#;
        let m = find_tag(src, "card").unwrap();
        assert_eq!(m.attribute_text(src), r#" label="a > b""#);
        assert_eq!(m.inner_text(src), "x");
    }

    #[test]
    fn test_apostrophe_in_bare_text_does_not_open_quote() {
        let src = "<card don't>x</card>";
        let m = find_tag(src, "card").unwrap();
        assert_eq!(m.inner_text(src), "x");
    }

    #[test]
    fn test_nested_same_name_closes_at_first() {
        let src = "<box><box>inner</box>outer</box>";
        let m = find_tag(src, "box").unwrap();
        assert_eq!(m.inner_text(src), "<box>inner");
    }

    #[test]
    fn test_missing_close_matches_opening_only() {
        let src = "<card a=\"1\"> no close";
        let m = find_tag(src, "card").unwrap();
        assert_eq!(m.text(src), "<card a=\"1\">");
        assert_eq!(m.inner, None);
    }

    #[test]
    fn test_case_insensitive_and_spaced_close() {
        let src = "<STYLE scoped>.a{}< / style >";
        assert!(find_tag(src, "style").is_none());
        let m = TagScanner::new(src, "style").case_insensitive().next().unwrap();
        assert_eq!(m.inner_text(src), ".a{}");
        assert_eq!(m.span.end, src.len());
    }

    #[test]
    fn test_multiple_occurrences_in_order() {
        let src = "<i>1</i><b/><i>2</i><i/>";
        let inner: Vec<_> = TagScanner::new(src, "i")
            .map(|m| m.inner_text(src).to_string())
            .collect();
        assert_eq!(inner, vec!["1", "2", ""]);
    }

    #[test]
    fn test_unterminated_opening_tag() {
        assert!(find_tag("<card title=\"x", "card").is_none());
    }
}
