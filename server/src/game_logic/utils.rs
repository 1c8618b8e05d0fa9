use rand::Rng;
use std::collections::HashMap;

use super::rules::{MAX_CHAT_CHARS, MAX_NAME_CHARS, ROOM_CODE_MAX, ROOM_CODE_MIN};

/// Draws six digit codes until one is not in use.
///
/// Returns `None` only when every code is taken.
pub fn generate_unique_room_code<R: Rng + ?Sized, V>(
    rng: &mut R,
    existing: &HashMap<String, V>,
) -> Option<String> {
    let code_space = (ROOM_CODE_MAX - ROOM_CODE_MIN + 1) as usize;
    if existing.len() >= code_space {
        return None;
    }
    loop {
        let code = rng.gen_range(ROOM_CODE_MIN..=ROOM_CODE_MAX).to_string();
        if !existing.contains_key(&code) {
            return Some(code);
        }
    }
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

/// Trims and truncates to `max_chars` characters (not bytes).
pub fn clamp_text(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect::<String>().trim_end().to_string()
}

pub fn sanitize_name(name: &str) -> Option<String> {
    let cleaned = clamp_text(name, MAX_NAME_CHARS);
    (!cleaned.is_empty()).then_some(cleaned)
}

pub fn sanitize_chat(text: &str) -> Option<String> {
    let cleaned = clamp_text(text, MAX_CHAT_CHARS);
    (!cleaned.is_empty()).then_some(cleaned)
}
