//! Plain-text blade table.
//!
//! ```text
//! filter # |1|2|3|
//!  OUT     |X| |S|
//!  IN      | |X| |
//! ```

use crate::blade::BladeState;

/// Center `s` in `width` columns the way Python's `str.center` does.
fn center(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if width <= len {
        return s.to_string();
    }
    let pad = width - len;
    let left = pad / 2 + (pad & width & 1);
    let right = pad - left;
    format!("{}{s}{}", " ".repeat(left), " ".repeat(right))
}

/// Render blade state codes as three table lines.
///
/// Codes that are not a known `BladeState` render as `?`.
pub fn render_ascii(codes: &[i64], start_index: usize) -> Vec<String> {
    let mut filter_line = vec!["filter # ".to_string()];
    let mut out_line = vec![" OUT     ".to_string()];
    let mut in_line = vec![" IN      ".to_string()];

    for (idx, code) in codes.iter().enumerate() {
        let index_str = (start_index + idx).to_string();
        let width = index_str.len();
        let state = BladeState::from_code(*code).unwrap_or(BladeState::Unknown);
        out_line.push(center(state.out_row(), width));
        in_line.push(center(state.in_row(), width));
        filter_line.push(index_str);
    }

    [filter_line, out_line, in_line]
        .into_iter()
        .map(|mut cells| {
            cells.push(String::new());
            cells.join("|")
        })
        .collect()
}

/// Convenience wrapper over already-decoded states.
pub fn render_states(states: &[BladeState], start_index: usize) -> Vec<String> {
    let codes: Vec<i64> = states.iter().map(|s| s.code()).collect();
    render_ascii(&codes, start_index)
}
