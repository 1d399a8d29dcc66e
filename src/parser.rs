use crate::errors::AsmError;

/// One parsed physical line: optional label, mnemonic, raw operand text.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub label: Option<String>,
    pub mnemonic: String,
    pub operands: String,
}

// The tokenizer is hand-written because the operand grammar is not
// context-free at the character level: a `;` or `,` inside a single-quoted
// string is literal text, and `''` inside a string is an escaped quote.

/// Parse a physical line into its label/mnemonic/operand triple.
///
/// Returns `Ok(None)` for blank and comment-only lines. Anything that is not
/// blank and does not fit the triple shape is a syntax error.
pub fn parse_line(file: &str, line_number: usize, text: &str) -> Result<Option<SourceLine>, AsmError> {
    let stripped = strip_comment(text);
    let stripped = stripped.trim_end();
    if stripped.trim().is_empty() {
        return Ok(None);
    }

    let mut rest = stripped;
    let mut label = None;

    // A label is anchored at column 1 and runs to the first whitespace.
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        let end = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..end];
        if !is_valid_label(name) {
            return Err(AsmError::Lexical {
                file: file.to_string(),
                line: line_number,
                reason: format!("Invalid label \"{}\"", name),
            });
        }
        label = Some(name.to_string());
        rest = &rest[end..];
    }

    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    let mnemonic = &rest[..end];
    if mnemonic.is_empty() || !mnemonic.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(AsmError::Lexical {
            file: file.to_string(),
            line: line_number,
            reason: "Syntax error".to_string(),
        });
    }
    let operands = rest[end..].trim_start().to_string();

    Ok(Some(SourceLine {
        label,
        mnemonic: mnemonic.to_string(),
        operands,
    }))
}

/// Cut the line at the first `;` that sits outside a single-quoted string.
pub fn strip_comment(text: &str) -> &str {
    let mut in_quote = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            ';' if !in_quote => return &text[..i],
            _ => {}
        }
    }
    text
}

/// Split an operand string at top-level commas, trimming each token.
/// Commas inside quoted strings do not separate; `''` stays intact.
pub fn split_operands(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for c in text.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ',' if !in_quote => {
                tokens.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    tokens.push(current.trim().to_string());
    tokens
}

/// Labels are 1-8 characters, starting with an uppercase letter.
pub fn is_valid_label(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    name.len() <= 8 && chars.all(|c| c.is_ascii_alphanumeric())
}

/// Operands that look like identifiers get scope-qualified; register names
/// and anything else (numbers, `#hhhh`, literals) do not.
pub fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric())
}

/// `GR0`..`GR7` to its register number.
pub fn parse_register(token: &str) -> Option<u16> {
    let digit = token.strip_prefix("GR")?;
    if digit.len() != 1 {
        return None;
    }
    let n = digit.chars().next()?.to_digit(8)?;
    Some(n as u16)
}

/// Decode a quoted string operand: surrounding quotes removed, `''` folded
/// to a single `'`. Returns `None` when the quoting is malformed.
pub fn decode_quoted(token: &str) -> Option<String> {
    let inner = token.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            // Only the two-quote escape is allowed inside.
            if chars.next() != Some('\'') {
                return None;
            }
            out.push('\'');
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Option<SourceLine>, AsmError> {
        parse_line("test.cas", 1, text)
    }

    #[test]
    fn label_mnemonic_operands() {
        let line = parse("LOOP LD GR1,A").unwrap().unwrap();
        assert_eq!(line.label.as_deref(), Some("LOOP"));
        assert_eq!(line.mnemonic, "LD");
        assert_eq!(line.operands, "GR1,A");
    }

    #[test]
    fn no_label() {
        let line = parse("      RET").unwrap().unwrap();
        assert_eq!(line.label, None);
        assert_eq!(line.mnemonic, "RET");
        assert_eq!(line.operands, "");
    }

    #[test]
    fn blank_and_comment_lines() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("; a comment").unwrap(), None);
        assert_eq!(parse("   ; indented comment").unwrap(), None);
    }

    #[test]
    fn trailing_comment() {
        let line = parse(" LAD GR1,10 ; ten").unwrap().unwrap();
        assert_eq!(line.operands, "GR1,10");
    }

    #[test]
    fn semicolon_inside_string_is_text() {
        let line = parse(" DC 'a;b' ; real comment").unwrap().unwrap();
        assert_eq!(line.operands, "'a;b'");
    }

    #[test]
    fn invalid_label_rejected() {
        let err = parse("loop RET").unwrap_err();
        assert_eq!(
            err,
            AsmError::Lexical {
                file: "test.cas".to_string(),
                line: 1,
                reason: "Invalid label \"loop\"".to_string(),
            }
        );
        assert!(parse("TOOLONG123 RET").is_err());
    }

    #[test]
    fn lowercase_mnemonic_is_syntax_error() {
        assert!(parse("  ld GR1,A").is_err());
    }

    #[test]
    fn split_top_level_commas() {
        assert_eq!(split_operands("GR1,A,GR2"), vec!["GR1", "A", "GR2"]);
        assert_eq!(split_operands(" GR1 , A "), vec!["GR1", "A"]);
        assert_eq!(split_operands(""), Vec::<String>::new());
    }

    #[test]
    fn split_keeps_quoted_commas() {
        assert_eq!(split_operands("'h'',i'"), vec!["'h'',i'"]);
        assert_eq!(split_operands("'a,b',3"), vec!["'a,b'", "3"]);
    }

    #[test]
    fn register_names() {
        assert_eq!(parse_register("GR0"), Some(0));
        assert_eq!(parse_register("GR7"), Some(7));
        assert_eq!(parse_register("GR8"), None);
        assert_eq!(parse_register("GR10"), None);
        assert_eq!(parse_register("G1"), None);
    }

    #[test]
    fn quoted_decoding() {
        assert_eq!(decode_quoted("'abc'").as_deref(), Some("abc"));
        assert_eq!(decode_quoted("'ab''c'").as_deref(), Some("ab'c"));
        assert_eq!(decode_quoted("''").as_deref(), Some(""));
        assert_eq!(decode_quoted("'unterminated"), None);
        assert_eq!(decode_quoted("plain"), None);
    }
}
