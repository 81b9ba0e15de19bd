//! Body decompiler
//!
//! Splits the raw multi-line text of a source folder into title, body,
//! tags, mentions and geo. The split is idempotent: decompiling text whose
//! fields were already extracted is a no-op, and values a user edited by
//! hand are never overwritten by a re-parse.

use serde::{Deserialize, Serialize};

/// The text fields extracted from (or compiled back into) a raw body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostText {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub mentions: Vec<String>,
    pub geo: Option<String>,
}

enum TailLine {
    Blank,
    Tags(Vec<String>),
    Mentions(Vec<String>),
    Geo(String),
    Body,
}

fn classify_tail(line: &str) -> TailLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return TailLine::Blank;
    }
    if let Some(value) = trimmed.strip_prefix("%geo ") {
        return TailLine::Geo(value.trim().to_string());
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.iter().all(|t| t.starts_with('#') && t.len() > 1) {
        return TailLine::Tags(tokens.iter().map(|t| t[1..].to_string()).collect());
    }
    if tokens.iter().all(|t| t.starts_with('@') && t.len() > 1) {
        return TailLine::Mentions(tokens.iter().map(|t| t[1..].to_string()).collect());
    }
    TailLine::Body
}

/// Decompile raw text into post fields, merging with the existing fields.
///
/// `explicit_title` marks that the title came from its own file; the first
/// body line then never becomes the title (it is only swallowed when it
/// repeats the known title). For every trailing class (tags, mentions,
/// geo), an existing differing value wins over the parsed one.
pub fn decompile(raw: &str, existing: &PostText, explicit_title: bool) -> PostText {
    let lines: Vec<&str> = raw.lines().collect();

    // Title: first non-empty line.
    let mut start = 0;
    while start < lines.len() && lines[start].trim().is_empty() {
        start += 1;
    }

    let mut title = existing.title.clone();
    if start < lines.len() {
        let first = lines[start].trim();
        if existing.title.is_empty() && !explicit_title {
            title = first.to_string();
            start += 1;
        } else if first == existing.title {
            // Re-parse of already-decompiled text.
            start += 1;
        }
    }

    // Tail: consume blank / tag / mention / geo lines bottom-up, assigning
    // each class at most once. Stop at the first body line.
    let mut end = lines.len();
    let mut tags: Option<Vec<String>> = None;
    let mut mentions: Option<Vec<String>> = None;
    let mut geo: Option<String> = None;

    while end > start {
        match classify_tail(lines[end - 1]) {
            TailLine::Blank => {}
            TailLine::Tags(t) => {
                if tags.is_none() {
                    tags = Some(t);
                }
            }
            TailLine::Mentions(m) => {
                if mentions.is_none() {
                    mentions = Some(m);
                }
            }
            TailLine::Geo(g) => {
                if geo.is_none() {
                    geo = Some(g);
                }
            }
            TailLine::Body => break,
        }
        end -= 1;
    }

    let body = lines[start..end].join("\n").trim().to_string();

    // Manual edits win: an already-set differing value is kept.
    let tags = match tags {
        Some(parsed) if existing.tags.is_empty() || existing.tags == parsed => parsed,
        _ => existing.tags.clone(),
    };
    let mentions = match mentions {
        Some(parsed) if existing.mentions.is_empty() || existing.mentions == parsed => parsed,
        _ => existing.mentions.clone(),
    };
    let geo = match (geo, &existing.geo) {
        (Some(parsed), None) => Some(parsed),
        (Some(parsed), Some(current)) if *current == parsed => Some(parsed),
        (_, current) => current.clone(),
    };

    PostText {
        title,
        body,
        tags,
        mentions,
        geo,
    }
}

/// Compile post fields back into one raw text block.
///
/// The output is the canonical form `decompile` reproduces exactly.
pub fn compile(text: &PostText) -> String {
    let mut out = String::new();
    if !text.title.is_empty() {
        out.push_str(&text.title);
        out.push('\n');
    }
    if !text.body.is_empty() {
        out.push('\n');
        out.push_str(&text.body);
        out.push('\n');
    }
    if !text.tags.is_empty() || !text.mentions.is_empty() || text.geo.is_some() {
        out.push('\n');
    }
    if !text.tags.is_empty() {
        let line: Vec<String> = text.tags.iter().map(|t| format!("#{}", t)).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    if !text.mentions.is_empty() {
        let line: Vec<String> = text.mentions.iter().map(|m| format!("@{}", m)).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    if let Some(geo) = &text.geo {
        out.push_str(&format!("%geo {}\n", geo));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> PostText {
        PostText::default()
    }

    #[test]
    fn test_decompile_title_and_body() {
        let parsed = decompile("Sunset run\n\nGolden hour at the pier.\n", &empty(), false);
        assert_eq!(parsed.title, "Sunset run");
        assert_eq!(parsed.body, "Golden hour at the pier.");
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_decompile_full_tail() {
        let raw = "Sunset run\n\nGolden hour at the pier.\n\n#sunset #running\n@alice @bob\n%geo 52.37,4.89\n";
        let parsed = decompile(raw, &empty(), false);
        assert_eq!(parsed.title, "Sunset run");
        assert_eq!(parsed.body, "Golden hour at the pier.");
        assert_eq!(parsed.tags, vec!["sunset", "running"]);
        assert_eq!(parsed.mentions, vec!["alice", "bob"]);
        assert_eq!(parsed.geo.as_deref(), Some("52.37,4.89"));
    }

    #[test]
    fn test_decompile_stops_at_first_body_line_from_tail() {
        let raw = "Title\n\nfirst paragraph\n#inline heading stays\nlast paragraph\n#real #tags\n";
        let parsed = decompile(raw, &empty(), false);
        assert_eq!(parsed.tags, vec!["real", "tags"]);
        assert!(parsed.body.contains("last paragraph"));
        assert!(parsed.body.contains("#inline heading stays"));
    }

    #[test]
    fn test_decompile_is_idempotent() {
        let raw = "Title\n\nBody line one.\nBody line two.\n\n#one #two\n%geo somewhere\n";
        let first = decompile(raw, &empty(), false);
        let second = decompile(raw, &first, false);
        assert_eq!(first, second);
    }

    #[test]
    fn test_decompile_keeps_manually_set_title() {
        let mut existing = empty();
        existing.title = "Hand picked".to_string();
        let parsed = decompile("Original first line\n\nBody.\n", &existing, false);
        assert_eq!(parsed.title, "Hand picked");
        // The unconsumed first line stays in the body.
        assert!(parsed.body.starts_with("Original first line"));
    }

    #[test]
    fn test_decompile_explicit_title_file_wins() {
        let mut existing = empty();
        existing.title = "From title.txt".to_string();
        let parsed = decompile("Just body text.\n", &existing, true);
        assert_eq!(parsed.title, "From title.txt");
        assert_eq!(parsed.body, "Just body text.");
    }

    #[test]
    fn test_decompile_keeps_manually_edited_tags() {
        let mut existing = empty();
        existing.tags = vec!["curated".to_string()];
        let parsed = decompile("Title\n\nBody.\n\n#parsed\n", &existing, false);
        assert_eq!(parsed.tags, vec!["curated"]);
    }

    #[test]
    fn test_decompile_keeps_manually_edited_geo() {
        let mut existing = empty();
        existing.geo = Some("0,0".to_string());
        let parsed = decompile("Title\n\nBody.\n\n%geo 1,1\n", &existing, false);
        assert_eq!(parsed.geo.as_deref(), Some("0,0"));
    }

    #[test]
    fn test_decompile_assigns_each_class_once() {
        // Bottom-most tag line wins; the earlier one is still consumed.
        let raw = "Title\n\nBody.\n\n#upper\n#lower\n";
        let parsed = decompile(raw, &empty(), false);
        assert_eq!(parsed.tags, vec!["lower"]);
        assert!(!parsed.body.contains("#upper"));
    }

    #[test]
    fn test_decompile_mixed_tokens_are_body() {
        let raw = "Title\n\nBody.\n\n#tag not-a-tag\n";
        let parsed = decompile(raw, &empty(), false);
        assert!(parsed.tags.is_empty());
        assert!(parsed.body.ends_with("#tag not-a-tag"));
    }

    #[test]
    fn test_decompile_empty_input() {
        let parsed = decompile("", &empty(), false);
        assert!(parsed.title.is_empty());
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn test_compile_decompile_round_trip() {
        let original = PostText {
            title: "Harbour lights".to_string(),
            body: "Two ferries crossing.\nWind from the west.".to_string(),
            tags: vec!["harbour".to_string(), "night".to_string()],
            mentions: vec!["carol".to_string()],
            geo: Some("53.55,9.99".to_string()),
        };
        let raw = compile(&original);
        let parsed = decompile(&raw, &empty(), false);
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_compile_skips_empty_fields() {
        let text = PostText {
            title: "Only title".to_string(),
            ..Default::default()
        };
        assert_eq!(compile(&text), "Only title\n");
    }
}
