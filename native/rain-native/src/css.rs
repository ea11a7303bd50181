//! Minimal CSS stylesheet model.
//!
//! Parses just enough structure to rewrite selectors: rule blocks, grouping
//! at-rules (`@media`, `@supports`, ...) whose nested rules are declaration
//! blocks too, and everything else (`@import`, `@font-face`, `@keyframes`)
//! kept verbatim. Comments are dropped. Declarations are not validated.
//!
//! Parsing is built from `nom` combinators over the comment-free source.

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_until};
use nom::character::complete::{anychar, char, multispace0};
use nom::combinator::{map, not, opt, peek, recognize, rest};
use nom::error::Error as NomError;
use nom::multi::{many0, many1, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use crate::error::{RainError, Result};

/// At-rules whose body holds further rule blocks.
const GROUPING_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "document",
    "-moz-document",
    "layer",
    "container",
    "scope",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    text: String,
}

impl Selector {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationBlock {
    selectors: Vec<Selector>,
    declarations: String,
}

impl DeclarationBlock {
    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn selectors_mut(&mut self) -> &mut [Selector] {
        &mut self.selectors
    }

    pub fn declarations(&self) -> &str {
        &self.declarations
    }

    fn render(&self) -> String {
        let selectors: Vec<&str> = self.selectors.iter().map(Selector::text).collect();
        format!("{} {{{}}}", selectors.join(","), self.declarations)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Rule(DeclarationBlock),
    Group { prelude: String, items: Vec<Item> },
    Verbatim(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    items: Vec<Item>,
}

impl Stylesheet {
    pub fn parse(text: &str) -> Result<Self> {
        let source = strip_comments(text);
        let (remaining, items) =
            sheet_items(&source).map_err(|e| RainError::Css(e.to_string()))?;

        let remaining = remaining.trim();
        if !remaining.is_empty() {
            let excerpt: String = remaining.chars().take(32).collect();
            return Err(RainError::Css(format!("unexpected input at '{}'", excerpt)));
        }
        Ok(Self { items })
    }

    /// All rule blocks in document order, including those nested in
    /// grouping at-rules.
    pub fn declaration_blocks(&self) -> Vec<&DeclarationBlock> {
        fn collect<'s>(items: &'s [Item], out: &mut Vec<&'s DeclarationBlock>) {
            for item in items {
                match item {
                    Item::Rule(block) => out.push(block),
                    Item::Group { items, .. } => collect(items, out),
                    Item::Verbatim(_) => {}
                }
            }
        }
        let mut blocks = Vec::new();
        collect(&self.items, &mut blocks);
        blocks
    }

    pub fn declaration_blocks_mut(&mut self) -> Vec<&mut DeclarationBlock> {
        fn collect<'s>(items: &'s mut [Item], out: &mut Vec<&'s mut DeclarationBlock>) {
            for item in items.iter_mut() {
                match item {
                    Item::Rule(block) => out.push(block),
                    Item::Group { items, .. } => collect(items, out),
                    Item::Verbatim(_) => {}
                }
            }
        }
        let mut blocks = Vec::new();
        collect(&mut self.items, &mut blocks);
        blocks
    }

    pub fn render(&self) -> String {
        render_items(&self.items)
    }
}

fn render_items(items: &[Item]) -> String {
    items
        .iter()
        .map(|item| match item {
            Item::Rule(block) => block.render(),
            Item::Group { prelude, items } => format!("{} {{{}}}", prelude, render_items(items)),
            Item::Verbatim(text) => text.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSERS
// ═══════════════════════════════════════════════════════════════════════════════

fn comment(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(tuple((tag("/*"), take_until("*/"), tag("*/")))),
        // An unterminated comment runs to the end of the sheet.
        recognize(pair(tag("/*"), rest)),
    ))(input)
}

fn escape(input: &str) -> IResult<&str, &str> {
    recognize(pair(char('\\'), anychar))(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(delimited(char('"'), many0(alt((is_not("\\\""), escape))), char('"'))),
        recognize(delimited(char('\''), many0(alt((is_not("\\'"), escape))), char('\''))),
    ))(input)
}

fn parenthesized(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('('),
        many0(alt((quoted, parenthesized, is_not("()\"'")))),
        char(')'),
    ))(input)
}

fn bracketed(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('['),
        many0(alt((quoted, is_not("]\"'")))),
        char(']'),
    ))(input)
}

/// Text up to the next top-level `{`, `;` or `}`.
fn prelude(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((quoted, parenthesized, is_not("{};\"'()")))))(input)
}

/// Contents of a block with balanced braces. Braces inside strings do not count.
fn balanced(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((
        quoted,
        recognize(delimited(char('{'), balanced, char('}'))),
        is_not("{}\"'"),
    ))))(input)
}

fn block(input: &str) -> IResult<&str, &str> {
    delimited(char('{'), balanced, char('}'))(input)
}

fn rule(input: &str) -> IResult<&str, Item> {
    let (input, _) = not(char('@'))(input)?;
    let (input, (selectors, body)) = pair(prelude, block)(input)?;
    Ok((
        input,
        Item::Rule(DeclarationBlock {
            selectors: selector_list(selectors),
            declarations: body.trim().to_string(),
        }),
    ))
}

fn at_rule(input: &str) -> IResult<&str, Item> {
    let (input, head) = recognize(pair(char('@'), opt(prelude)))(input)?;
    let head = head.trim().to_string();

    if let Ok((input, _)) = char::<&str, NomError<&str>>(';')(input) {
        return Ok((input, Item::Verbatim(format!("{};", head))));
    }
    if is_grouping(&head) {
        let (input, items) =
            delimited(char('{'), group_items, preceded(multispace0, char('}')))(input)?;
        return Ok((input, Item::Group { prelude: head, items }));
    }

    let (input, body) = block(input)?;
    Ok((input, Item::Verbatim(format!("{} {{{}}}", head, body.trim()))))
}

fn statement(input: &str) -> IResult<&str, Item> {
    map(terminated(prelude, char(';')), |text: &str| {
        Item::Verbatim(format!("{};", text.trim()))
    })(input)
}

/// Loose text right before a group's closing brace.
fn trailing(input: &str) -> IResult<&str, Item> {
    map(terminated(prelude, peek(char('}'))), |text: &str| {
        Item::Verbatim(text.trim().to_string())
    })(input)
}

fn sheet_items(input: &str) -> IResult<&str, Vec<Item>> {
    many0(preceded(multispace0, alt((at_rule, rule, statement))))(input)
}

fn group_items(input: &str) -> IResult<&str, Vec<Item>> {
    many0(preceded(multispace0, alt((at_rule, rule, statement, trailing))))(input)
}

fn is_grouping(head: &str) -> bool {
    let name: String = head
        .trim_start_matches('@')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    GROUPING_AT_RULES.contains(&name.to_ascii_lowercase().as_str())
}

fn selector(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((
        quoted,
        parenthesized,
        bracketed,
        is_not(",\"'()[]"),
    ))))(input)
}

/// Split a selector list on top-level commas (not inside `()`, `[]` or strings).
fn selector_list(text: &str) -> Vec<Selector> {
    let parts = match separated_list1(char(','), selector)(text) {
        Ok(("", parts)) => parts,
        _ => vec![text],
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Selector::new)
        .collect()
}

fn strip_comments(text: &str) -> String {
    let piece = alt((
        map(comment, |_| " "),
        quoted,
        is_not("\"'/"),
        recognize(anychar),
    ));
    match many0(piece)(text) {
        Ok((_, pieces)) => pieces.concat(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors(sheet: &Stylesheet) -> Vec<Vec<String>> {
        sheet
            .declaration_blocks()
            .iter()
            .map(|b| b.selectors().iter().map(|s| s.text().to_string()).collect())
            .collect()
    }

    #[test]
    fn test_parse_rules() {
        let sheet = Stylesheet::parse(".a, .b > p { color: red; }\n#c{margin:0}").unwrap();
        assert_eq!(
            selectors(&sheet),
            vec![vec![".a".to_string(), ".b > p".to_string()], vec!["#c".to_string()]]
        );
        assert_eq!(sheet.declaration_blocks()[0].declarations(), "color: red;");
        assert_eq!(sheet.render(), ".a,.b > p {color: red;}\n#c {margin:0}");
    }

    #[test]
    fn test_grouping_at_rules_are_descended() {
        let css = "@import url('x.css');\n@media (max-width: 10px) { .a { top: 0 } }";
        let sheet = Stylesheet::parse(css).unwrap();
        assert_eq!(selectors(&sheet), vec![vec![".a".to_string()]]);
        assert_eq!(
            sheet.render(),
            "@import url('x.css');\n@media (max-width: 10px) {.a {top: 0}}"
        );
    }

    #[test]
    fn test_keyframes_and_font_face_are_verbatim() {
        let css = "@keyframes spin { from { a: 1 } to { a: 2 } } @font-face { font-family: x; }";
        let sheet = Stylesheet::parse(css).unwrap();
        assert!(sheet.declaration_blocks().is_empty());
        assert_eq!(
            sheet.render(),
            "@keyframes spin {from { a: 1 } to { a: 2 }}\n@font-face {font-family: x;}"
        );
    }

    #[test]
    fn test_selector_commas_inside_functions_and_strings() {
        let sheet = Stylesheet::parse(r#":is(.a, .b) span, [data-x="1,2"] { x: y }"#).unwrap();
        assert_eq!(
            selectors(&sheet),
            vec![vec![":is(.a, .b) span".to_string(), r#"[data-x="1,2"]"#.to_string()]]
        );
    }

    #[test]
    fn test_comments_and_braces_in_strings() {
        let sheet =
            Stylesheet::parse("/* head */ .a::after { content: \"}\"; } /* tail").unwrap();
        assert_eq!(sheet.declaration_blocks().len(), 1);
        assert_eq!(sheet.declaration_blocks()[0].declarations(), "content: \"}\";");
    }

    #[test]
    fn test_escaped_quotes_do_not_hide_comments() {
        let sheet = Stylesheet::parse(r#".a { content: "\""; } /* note { */ .b { top: 0 }"#).unwrap();
        assert_eq!(selectors(&sheet), vec![vec![".a".to_string()], vec![".b".to_string()]]);
        assert_eq!(sheet.declaration_blocks()[0].declarations(), r#"content: "\"";"#);
    }

    #[test]
    fn test_statements_and_loose_group_text() {
        let sheet = Stylesheet::parse("@layer base, theme;\n@supports (x: y) { .a { b: c } d: e }").unwrap();
        assert_eq!(
            sheet.render(),
            "@layer base, theme;\n@supports (x: y) {.a {b: c}\nd: e}"
        );
    }

    #[test]
    fn test_set_selector_text() {
        let mut sheet = Stylesheet::parse(".a { x: y }").unwrap();
        for block in sheet.declaration_blocks_mut() {
            for selector in block.selectors_mut() {
                let scoped = format!(".s {}", selector.text());
                selector.set_text(scoped);
            }
        }
        assert_eq!(sheet.render(), ".s .a {x: y}");
    }

    #[test]
    fn test_unbalanced_input_is_an_error() {
        assert!(Stylesheet::parse(".a { color: red;").is_err());
        assert!(Stylesheet::parse(".a { } }").is_err());
        assert!(Stylesheet::parse("@media screen { .a { }").is_err());
    }

    #[test]
    fn test_empty_stylesheet() {
        let sheet = Stylesheet::parse("  ").unwrap();
        assert_eq!(sheet.render(), "");
    }
}
