//! Plain-text rendering for the terminal

use knovera_ai::{
    Conversation, ConversationStats, HealthStatus, Message, Role,
    vector::{Bar, Polarity, VectorComparison, bars},
};
use knovera_chat::EmbeddingView;

use crate::utils::{format_number, truncate_chars};

/// Cells on each side of the zero axis
pub const HALF_WIDTH: usize = 12;

/// Dimensions drawn before the rest is summarized
pub const MAX_DIMENSIONS: usize = 24;

/// One bar as `negative|positive`, both halves `HALF_WIDTH` cells wide
pub fn bar_cells(bar: &Bar) -> String {
    let filled = (bar.intensity * HALF_WIDTH as f64).round() as usize;
    let filled = filled.min(HALF_WIDTH);
    match bar.polarity {
        Polarity::Negative => format!(
            "{}{}|{}",
            " ".repeat(HALF_WIDTH - filled),
            "█".repeat(filled),
            " ".repeat(HALF_WIDTH)
        ),
        Polarity::Positive => format!(
            "{}|{}{}",
            " ".repeat(HALF_WIDTH),
            "█".repeat(filled),
            " ".repeat(HALF_WIDTH - filled)
        ),
    }
}

/// Bars for one vector, one dimension per line
pub fn render_vector(values: &[f64], scale: f64) -> String {
    let mut out = String::new();
    for (i, bar) in bars(values, scale).iter().take(MAX_DIMENSIONS).enumerate() {
        out.push_str(&format!("{:>4} {} {:>9.4}\n", i, bar_cells(bar), bar.value));
    }
    if values.len() > MAX_DIMENSIONS {
        out.push_str(&format!(
            "     ... {} more dimensions\n",
            values.len() - MAX_DIMENSIONS
        ));
    }
    out
}

/// Two vectors drawn side by side under the comparison's shared scale
pub fn render_pair(a: &[f64], b: &[f64], comparison: &VectorComparison) -> String {
    let bars_a = bars(a, comparison.scale);
    let bars_b = bars(b, comparison.scale);
    let blank = " ".repeat(HALF_WIDTH * 2 + 1);
    let rows = bars_a.len().max(bars_b.len());

    let mut out = render_metrics(comparison);
    out.push('\n');
    for i in 0..rows.min(MAX_DIMENSIONS) {
        let left = bars_a.get(i).map(bar_cells).unwrap_or_else(|| blank.clone());
        let right = bars_b.get(i).map(bar_cells).unwrap_or_else(|| blank.clone());
        out.push_str(&format!("{:>4} {}   {}\n", i, left, right));
    }
    if rows > MAX_DIMENSIONS {
        out.push_str(&format!("     ... {} more dimensions\n", rows - MAX_DIMENSIONS));
    }
    out
}

/// Numeric summary of a comparison
pub fn render_metrics(comparison: &VectorComparison) -> String {
    format!(
        "Dimensions:  {} / {}\nMagnitude:   {:.4} / {:.4}\nDot product: {:.4}\nCosine:      {:.4}\n",
        comparison.dimensions_a,
        comparison.dimensions_b,
        comparison.magnitude_a,
        comparison.magnitude_b,
        comparison.dot_product,
        comparison.cosine_similarity,
    )
}

/// An embedding of the transcript, next to its predecessor when there is one
pub fn render_view(view: &EmbeddingView) -> String {
    match (&view.previous, &view.comparison) {
        (Some((prev_index, prev)), Some(comparison)) => format!(
            "Message {} vs message {}\n{}",
            view.index,
            prev_index,
            render_pair(&view.values, prev, comparison)
        ),
        _ => format!(
            "Message {} ({} dimensions, nothing earlier to compare)\n{}",
            view.index,
            view.values.len(),
            render_vector(&view.values, view.scale)
        ),
    }
}

/// One line per conversation
pub fn render_conversations(conversations: &[Conversation]) -> String {
    if conversations.is_empty() {
        return "No conversations.".to_string();
    }
    conversations
        .iter()
        .map(|c| {
            format!(
                "{}  {}  {}",
                c.id,
                c.last_active_at.format("%Y-%m-%d %H:%M"),
                truncate_chars(c.title.as_deref().unwrap_or("(untitled)"), 60)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Title line shown above a transcript
pub fn render_conversation_header(conversation: &Conversation) -> String {
    format!(
        "{} ({}, last active {})",
        conversation.title.as_deref().unwrap_or("(untitled)"),
        conversation.id,
        conversation.last_active_at.format("%Y-%m-%d %H:%M")
    )
}

/// A transcript, one block per message
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for (i, message) in messages.iter().enumerate() {
        let role = match message.role {
            Role::User => "you",
            Role::Assistant => "ai",
        };
        let marker = if message.embedding_vector().is_some() {
            " [v]"
        } else {
            ""
        };
        out.push_str(&format!("[{}] {}{}: {}\n", i, role, marker, message.content));
    }
    out
}

pub fn render_stats(stats: &ConversationStats) -> String {
    format!(
        "Messages: {}\nTokens:   {}\nDuration: {:.1}s",
        stats.message_count,
        format_number(stats.total_tokens),
        stats.duration
    )
}

pub fn render_health(health: &HealthStatus) -> String {
    format!("{} ({} / {})", health.status, health.provider, health.model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_cells() {
        let full = Bar {
            value: 2.0,
            intensity: 1.0,
            polarity: Polarity::Positive,
        };
        let cells = bar_cells(&full);
        assert_eq!(cells.chars().count(), HALF_WIDTH * 2 + 1);
        assert!(cells.ends_with(&"█".repeat(HALF_WIDTH)));

        let half_negative = Bar {
            value: -1.0,
            intensity: 0.5,
            polarity: Polarity::Negative,
        };
        let cells = bar_cells(&half_negative);
        let (left, right) = cells.split_once('|').unwrap();
        assert_eq!(left.chars().filter(|c| *c == '█').count(), HALF_WIDTH / 2);
        assert!(right.trim().is_empty());
    }

    #[test]
    fn test_render_vector_truncates() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let out = render_vector(&values, 1.0 / 29.0);
        assert_eq!(out.lines().count(), MAX_DIMENSIONS + 1);
        assert!(out.ends_with("... 6 more dimensions\n"));
    }

    #[test]
    fn test_render_pair_uneven_lengths() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0];
        let comparison = VectorComparison::compute(&a, &b);
        let out = render_pair(&a, &b, &comparison);
        assert!(out.contains("Dimensions:  3 / 1"));
        assert!(out.contains("Dot product: 1.0000"));
    }

    #[test]
    fn test_render_conversations_empty() {
        assert_eq!(render_conversations(&[]), "No conversations.");
    }

    #[test]
    fn test_render_conversation_header() {
        let conversation: Conversation = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "lastActiveAt": "2025-03-01T09:30:00Z"
        }))
        .unwrap();
        assert_eq!(
            render_conversation_header(&conversation),
            "(untitled) (c1, last active 2025-03-01 09:30)"
        );
    }
}
