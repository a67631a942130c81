//! Escaping of untrusted text embedded in Telegram MarkdownV2.

/// Escape every character with special meaning in Telegram MarkdownV2.
///
/// Telegram requires escaping `_*[]()~`>#+-=|{}.!` and the backslash itself.
pub fn escape_markdown_v2(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for c in s.chars() {
        if matches!(
            c,
            '\\' | '_'
                | '*'
                | '['
                | ']'
                | '('
                | ')'
                | '~'
                | '`'
                | '>'
                | '#'
                | '+'
                | '-'
                | '='
                | '|'
                | '{'
                | '}'
                | '.'
                | '!'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_untouched() {
        assert_eq!(escape_markdown_v2("Alice 123"), "Alice 123");
        assert_eq!(escape_markdown_v2("Иван 李"), "Иван 李");
    }

    #[test]
    fn escapes_every_special_char() {
        let specials = "\\_*[]()~`>#+-=|{}.!";
        let escaped = escape_markdown_v2(specials);
        let expected: String = specials.chars().flat_map(|c| ['\\', c]).collect();
        assert_eq!(escaped, expected);
    }

    #[test]
    fn negative_id_and_injection_attempt() {
        assert_eq!(escape_markdown_v2("-100123"), "\\-100123");
        assert_eq!(
            escape_markdown_v2("*bold* [x](http://e.vil)"),
            "\\*bold\\* \\[x\\]\\(http://e\\.vil\\)"
        );
    }
}
