pub trait StripCodeBlock {
    fn strip_code_block(&self) -> &str;
}

impl StripCodeBlock for str {
    fn strip_code_block(&self) -> &str {
        let trimmed = self.trim();
        if trimmed.starts_with("```")
            && let Some(pos) = trimmed.find('\n')
        {
            let inner = &trimmed[pos + 1..];
            if let Some(inner) = inner.strip_suffix("```") {
                return inner.trim();
            }
        }
        trimmed
    }
}

/// Parses model output as JSON, tolerating a surrounding markdown fence.
pub fn parse_json_content(content: &str) -> serde_json::Result<serde_json::Value> {
    serde_json::from_str(content.strip_code_block())
}

/// "backup_database" -> "Backup Database"
pub fn humanize_identifier(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cuts `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        let raw = "```json\n{\"steps\": []}\n```";
        assert_eq!(raw.strip_code_block(), "{\"steps\": []}");
        assert!(parse_json_content(raw).is_ok());
    }

    #[test]
    fn humanizes_snake_case() {
        assert_eq!(humanize_identifier("backup_database"), "Backup Database");
        assert_eq!(humanize_identifier("load_context"), "Load Context");
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_chars("tạo bài post", 5), "tạo b");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
