//! HTML to plain text conversion for email bodies.
//!
//! A single forward scan: tags become word breaks, `<script>` and
//! `<style>` contents are dropped, a handful of entities are decoded and
//! whitespace runs collapse to one space. Malformed markup never fails;
//! an unterminated tag or entity is kept as literal text.

/// Longest entity name we look at before giving up on a `&`.
const MAX_ENTITY_LEN: usize = 10;

/// Elements whose contents are not text.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

enum Entity {
    Char(char),
    Space,
}

/// Convert an HTML fragment to whitespace-normalized plain text.
///
/// # Examples
///
/// ```
/// use docwatch::html::html_to_text;
///
/// assert_eq!(html_to_text("<p>Hello &amp; <b>World</b></p>"), "Hello & World");
/// ```
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut i = 0;

    while let Some(c) = html[i..].chars().next() {
        let rest = &html[i..];
        match c {
            '<' => {
                let Some(end) = rest.find('>') else {
                    out.push('<');
                    i += 1;
                    continue;
                };
                let tag = &rest[..=end];
                i += end + 1;
                if let Some(element) = raw_text_element(tag) {
                    i += skip_raw_text(&html[i..], element);
                }
                push_space(&mut out);
            }
            '&' => match decode_entity(rest) {
                Some((entity, len)) => {
                    match entity {
                        Entity::Char(decoded) => out.push(decoded),
                        Entity::Space => push_space(&mut out),
                    }
                    i += len;
                }
                None => {
                    out.push('&');
                    i += 1;
                }
            },
            c if c.is_whitespace() => {
                push_space(&mut out);
                i += c.len_utf8();
            }
            c => {
                out.push(c);
                i += c.len_utf8();
            }
        }
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}

fn push_space(out: &mut String) {
    if !out.is_empty() && !out.ends_with(' ') {
        out.push(' ');
    }
}

/// If `tag` opens a script or style element, return its name.
fn raw_text_element(tag: &str) -> Option<&'static str> {
    if tag.ends_with("/>") {
        return None;
    }
    let lower = tag.to_ascii_lowercase();
    RAW_TEXT_ELEMENTS.iter().copied().find(|name| {
        lower
            .strip_prefix('<')
            .and_then(|t| t.strip_prefix(name))
            .and_then(|t| t.chars().next())
            .is_some_and(|next| next == '>' || next.is_whitespace())
    })
}

/// Byte length of the raw text up to and including `</element ...>`, or
/// of the whole input when the element is never closed.
fn skip_raw_text(rest: &str, element: &str) -> usize {
    let close = format!("</{element}");
    // ASCII lowercasing keeps byte offsets intact.
    let Some(start) = rest.to_ascii_lowercase().find(&close) else {
        return rest.len();
    };
    match rest[start..].find('>') {
        Some(gt) => start + gt + 1,
        None => rest.len(),
    }
}

/// Decode the entity at the start of `rest` (which begins with `&`).
///
/// Returns the decoded entity and the number of bytes consumed, or
/// `None` when `rest` does not start with a terminated entity.
fn decode_entity(rest: &str) -> Option<(Entity, usize)> {
    let body = &rest[1..];
    let semi = body
        .char_indices()
        .take(MAX_ENTITY_LEN + 1)
        .find(|&(_, c)| c == ';')
        .map(|(idx, _)| idx)?;
    let name = &body[..semi];
    if name.is_empty()
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '#')
    {
        return None;
    }

    let entity = match name {
        "amp" => Entity::Char('&'),
        "lt" => Entity::Char('<'),
        "gt" => Entity::Char('>'),
        "quot" => Entity::Char('"'),
        _ => Entity::Space,
    };
    Some((entity, semi + 2))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn strips_tags_and_decodes_entities() {
        let text = html_to_text("<p>Hello &amp; <b>World</b></p>");
        assert_eq!(text, "Hello & World");
        assert!(!text.contains('<'));
        assert!(!text.contains('>'));
    }

    #[test]
    fn decodes_known_entities() {
        assert_eq!(
            html_to_text("a &lt;b&gt; &quot;c&quot;&nbsp;d"),
            "a <b> \"c\" d"
        );
    }

    #[test]
    fn unknown_entity_becomes_space() {
        assert_eq!(html_to_text("caf&eacute;s"), "caf s");
        assert_eq!(html_to_text("x&#169;y"), "x y");
    }

    #[test]
    fn unterminated_entity_is_literal() {
        assert_eq!(html_to_text("AT&T rocks"), "AT&T rocks");
        assert_eq!(html_to_text("trailing &amp"), "trailing &amp");
    }

    #[test]
    fn unterminated_tag_is_literal() {
        assert_eq!(html_to_text("1 <2 and more"), "1 <2 and more");
    }

    #[test]
    fn drops_script_and_style_blocks() {
        let html = "<style>p { color: red }</style><p>Body</p>\
                    <SCRIPT type=\"x\">alert('hi')</SCRIPT> end";
        assert_eq!(html_to_text(html), "Body end");
    }

    #[test]
    fn unclosed_script_swallows_rest() {
        assert_eq!(html_to_text("keep <script>var x = 1;"), "keep");
    }

    #[test]
    fn scripted_prefix_is_not_script() {
        assert_eq!(html_to_text("<scripted>text</scripted>"), "text");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(
            html_to_text("  one\n\n\ttwo   <br/>  three  "),
            "one two three"
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(html_to_text(""), "");
        assert_eq!(html_to_text("<div></div>"), "");
    }

    proptest! {
        #[test]
        fn never_leaves_double_spaces(html in "\\PC{0,300}") {
            let text = html_to_text(&html);
            prop_assert!(!text.contains("  "));
            prop_assert!(!text.starts_with(' '));
            prop_assert!(!text.ends_with(' '));
        }

        #[test]
        fn plain_words_survive(words in proptest::collection::vec("[a-z]{1,8}", 0..20)) {
            let joined = words.join(" ");
            prop_assert_eq!(html_to_text(&format!("<p>{joined}</p>")), joined);
        }
    }
}
