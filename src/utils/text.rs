//! HTML message helpers for Telegram output.

/// Telegram message size limit.
pub const MESSAGE_LIMIT: usize = 4096;

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Clickable mention that works without a username.
pub fn user_link(user_id: i64, nickname: &str) -> String {
    format!(
        "<a href=\"tg://user?id={user_id}\">{}</a>",
        escape_html(nickname)
    )
}

/// Splits a multi-line message into chunks under the Telegram limit,
/// breaking only at line boundaries.
pub fn chunk_text_by_lines(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        // +1 for the newline that joins the lines back together.
        if !current.is_empty() && current.len() + line.len() + 1 > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
