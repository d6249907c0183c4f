//! Rendering policy for AI response text.
//!
//! Responses are untrusted. The only markup honoured is `<strong>`; any other tag is
//! dropped and its inner text kept. Output is typed spans, never raw markup.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub strong: bool,
}

pub type Paragraph = Vec<Span>;

/// Strips list and heading markers the provider is told never to emit.
pub fn clean_response(text: &str) -> String {
    text.chars()
        .filter(|ch| *ch != '*' && *ch != '#')
        .map(|ch| if ch == '-' { ' ' } else { ch })
        .collect()
}

/// Splits on blank lines and resolves `<strong>` into styled spans.
pub fn render_markup(text: &str) -> Vec<Paragraph> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(render_paragraph)
        .filter(|spans| spans.iter().any(|s| !s.text.trim().is_empty()))
        .collect()
}

/// Tag-free text for speech synthesis.
pub fn plain_text(text: &str) -> String {
    let mut out = String::new();
    for token in tokenize(text) {
        if let Token::Text(chunk) = token {
            out.push_str(&decode_entities(chunk));
        }
    }
    out
}

fn render_paragraph(text: &str) -> Paragraph {
    let mut spans: Paragraph = Vec::new();
    let mut depth = 0usize;
    for token in tokenize(text) {
        match token {
            Token::Text(chunk) => {
                let chunk = decode_entities(chunk);
                if chunk.is_empty() {
                    continue;
                }
                let strong = depth > 0;
                match spans.last_mut() {
                    Some(last) if last.strong == strong => last.text.push_str(&chunk),
                    _ => spans.push(Span {
                        text: chunk,
                        strong,
                    }),
                }
            }
            Token::Tag { name, closing } => {
                if !name.eq_ignore_ascii_case("strong") {
                    continue;
                }
                if closing {
                    depth = depth.saturating_sub(1);
                } else {
                    depth += 1;
                }
            }
        }
    }

    if let Some(first) = spans.first_mut() {
        let trimmed = first.text.trim_start().to_string();
        first.text = trimmed;
    }
    if let Some(last) = spans.last_mut() {
        let trimmed = last.text.trim_end().to_string();
        last.text = trimmed;
    }
    spans.retain(|s| !s.text.is_empty());
    spans
}

enum Token<'a> {
    Text(&'a str),
    Tag { name: &'a str, closing: bool },
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        if start > 0 {
            tokens.push(Token::Text(&rest[..start]));
        }
        let inner = rest[start + 1..start + len].trim();
        let (closing, body) = match inner.strip_prefix('/') {
            Some(body) => (true, body.trim_start()),
            None => (false, inner),
        };
        let name = body
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        tokens.push(Token::Tag { name, closing });
        rest = &rest[start + len + 1..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, strong: bool) -> Span {
        Span {
            text: text.to_string(),
            strong,
        }
    }

    #[test]
    fn clean_response_strips_markers() {
        assert_eq!(clean_response("## Titre\n- point *clé*"), " Titre\n  point clé");
    }

    #[test]
    fn strong_is_the_only_styled_tag() {
        let paragraphs = render_markup("Un <strong>risque</strong> <em>majeur</em>.");
        assert_eq!(
            paragraphs,
            vec![vec![span("Un ", false), span("risque", true), span(" majeur.", false)]]
        );
    }

    #[test]
    fn script_tags_render_as_plain_text() {
        let paragraphs = render_markup("<script>alert(1)</script>fin");
        assert_eq!(paragraphs, vec![vec![span("alert(1)fin", false)]]);
    }

    #[test]
    fn blank_lines_split_paragraphs() {
        let paragraphs = render_markup("Premier.\n\n\n\nSecond <STRONG>point</STRONG>");
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[1], vec![span("Second ", false), span("point", true)]);
    }

    #[test]
    fn unclosed_bracket_is_kept_as_text() {
        let paragraphs = render_markup("a < b");
        assert_eq!(paragraphs, vec![vec![span("a < b", false)]]);
    }

    #[test]
    fn plain_text_drops_tags_and_decodes_entities() {
        assert_eq!(
            plain_text("<strong>Budget</strong> &amp; risques &lt;élevés&gt;"),
            "Budget & risques <élevés>"
        );
    }
}
