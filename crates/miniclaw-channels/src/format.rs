//! Markdown to Telegram-HTML conversion and message splitting.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Telegram rejects messages above 4096 characters; 4000 leaves headroom for
/// the tags added by [`markdown_to_html`].
pub const MAX_MESSAGE_CHARS: usize = 4000;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\w*\n?(.*?)```").expect("valid regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+)$").expect("valid regex"));
static BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>\s*(.*)$").expect("valid regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static BOLD_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__(.+?)__").expect("valid regex"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^a-zA-Z0-9])_([^_]+)_(?:[^a-zA-Z0-9]|$)").expect("valid regex")
});
static STRIKE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~(.+?)~~").expect("valid regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-*]\s+").expect("valid regex"));

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Convert the Markdown subset models usually emit into Telegram HTML.
///
/// Code spans are lifted out first so nothing inside them is reformatted.
pub fn markdown_to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut code_blocks: Vec<String> = Vec::new();
    let text = CODE_BLOCK.replace_all(text, |caps: &Captures| {
        code_blocks.push(caps[1].to_string());
        format!("\x00CB{}\x00", code_blocks.len() - 1)
    });

    let mut inline_codes: Vec<String> = Vec::new();
    let text = INLINE_CODE.replace_all(&text, |caps: &Captures| {
        inline_codes.push(caps[1].to_string());
        format!("\x00IC{}\x00", inline_codes.len() - 1)
    });

    let text = HEADER.replace_all(&text, "$1");
    let text = BLOCKQUOTE.replace_all(&text, "$1");
    let text = html_escape(&text);

    let text = LINK.replace_all(&text, r#"<a href="$2">$1</a>"#);
    let text = BOLD.replace_all(&text, "<b>$1</b>");
    let text = BOLD_UNDERSCORE.replace_all(&text, "<b>$1</b>");
    let text = ITALIC.replace_all(&text, |caps: &Captures| {
        let inner = &caps[1];
        caps[0].replacen(&format!("_{inner}_"), &format!("<i>{inner}</i>"), 1)
    });
    let text = STRIKE.replace_all(&text, "<s>$1</s>");
    let mut text = BULLET.replace_all(&text, "• ").into_owned();

    for (i, code) in inline_codes.iter().enumerate() {
        text = text.replace(
            &format!("\x00IC{i}\x00"),
            &format!("<code>{}</code>", html_escape(code)),
        );
    }
    for (i, code) in code_blocks.iter().enumerate() {
        text = text.replace(
            &format!("\x00CB{i}\x00"),
            &format!("<pre><code>{}</code></pre>", html_escape(code)),
        );
    }
    text
}

/// Split `content` into chunks of at most `max_chars` characters, cutting at
/// the last newline, else the last space, else hard at the limit.
pub fn split_message(content: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = content;
    loop {
        let limit = match rest.char_indices().nth(max_chars) {
            None => {
                chunks.push(rest.to_string());
                return chunks;
            }
            Some((byte_idx, _)) => byte_idx,
        };
        let window = &rest[..limit];
        let cut = match window.rfind('\n').or_else(|| window.rfind(' ')) {
            Some(0) | None => limit,
            Some(pos) => pos,
        };
        chunks.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start_matches([' ', '\n']);
        if rest.is_empty() {
            return chunks;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_italic_strike() {
        assert_eq!(markdown_to_html("**hi**"), "<b>hi</b>");
        assert_eq!(markdown_to_html("__hi__"), "<b>hi</b>");
        assert_eq!(markdown_to_html("say _this_ now"), "say <i>this</i> now");
        assert_eq!(markdown_to_html("~~gone~~"), "<s>gone</s>");
    }

    #[test]
    fn test_snake_case_is_not_italic() {
        assert_eq!(markdown_to_html("my_var_name"), "my_var_name");
    }

    #[test]
    fn test_escapes_html_outside_code() {
        assert_eq!(markdown_to_html("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn test_code_is_protected() {
        assert_eq!(
            markdown_to_html("run `a**b**<c>`"),
            "run <code>a**b**&lt;c&gt;</code>"
        );
        assert_eq!(
            markdown_to_html("```rust\nfn main() {}\n```"),
            "<pre><code>fn main() {}\n</code></pre>"
        );
    }

    #[test]
    fn test_headers_quotes_links_bullets() {
        assert_eq!(markdown_to_html("## Title"), "Title");
        assert_eq!(markdown_to_html("> quoted"), "quoted");
        assert_eq!(
            markdown_to_html("[site](https://x.io)"),
            r#"<a href="https://x.io">site</a>"#
        );
        assert_eq!(markdown_to_html("- one\n* two"), "• one\n• two");
    }

    #[test]
    fn test_split_short_message_is_single_chunk() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
        assert_eq!(split_message("", 10), vec![""]);
    }

    #[test]
    fn test_split_prefers_newline_then_space() {
        let chunks = split_message("aaaa\nbbbb cccc", 10);
        assert_eq!(chunks, vec!["aaaa", "bbbb cccc"]);
        let chunks = split_message("aaaa bbbb cccc", 10);
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn test_split_hard_cut_without_breaks() {
        let chunks = split_message(&"x".repeat(25), 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_split_counts_characters_not_bytes() {
        let text = "é".repeat(15);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[1].chars().count(), 5);
    }
}
