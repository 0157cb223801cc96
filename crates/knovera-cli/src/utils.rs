//! Shared utilities

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

pub fn format_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Read a JSON embedding file: either a bare array of numbers or an object
/// with an `embedding` field (array or encoded string).
pub fn parse_embedding(content: &str) -> Option<Vec<f64>> {
    #[derive(serde::Deserialize)]
    struct Wrapped {
        embedding: knovera_ai::Embedding,
    }

    if let Ok(values) = serde_json::from_str::<Vec<f64>>(content) {
        return Some(values);
    }
    serde_json::from_str::<Wrapped>(content)
        .ok()
        .and_then(|w| w.embedding.to_vector())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_500), "1.5k");
        assert_eq!(format_number(2_000_000), "2.0M");
    }

    #[test]
    fn test_parse_embedding_forms() {
        assert_eq!(parse_embedding("[1, -2.5]"), Some(vec![1.0, -2.5]));
        assert_eq!(
            parse_embedding(r#"{"embedding": [0.5]}"#),
            Some(vec![0.5])
        );
        assert_eq!(
            parse_embedding(r#"{"embedding": "[3, 4]"}"#),
            Some(vec![3.0, 4.0])
        );
        assert_eq!(parse_embedding("nope"), None);
    }
}
