use sha2::{Digest, Sha256};

const MAX_KEY_LEN: usize = 48;

/// Deterministic state file name: `{prefix}.ron`, or
/// `{prefix}-{sanitized_key}--{short_hash(key)}.ron`.
///
/// The hash keeps keys that sanitize to the same text apart.
pub fn state_file_name(prefix: &str, key: Option<&str>) -> String {
    match key {
        None => format!("{prefix}.ron"),
        Some(key) => {
            let sanitized = sanitize_key(key);
            let hash = short_hash(key);
            format!("{prefix}-{sanitized}--{hash}.ron")
        }
    }
}

fn sanitize_key(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', '.'][..]);

    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    if compacted.is_empty() {
        return "key".to_string();
    }
    compacted.chars().take(MAX_KEY_LEN).collect()
}

fn is_forbidden(c: char) -> bool {
    c.is_whitespace()
        || matches!(c,
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
        )
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
