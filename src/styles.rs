//! Color literal handling shared by operation decoding and xlsx IO.

/// Accepts `#rgb`, `#rrggbb` (leading `#` optional) and returns lowercase `#rrggbb`.
pub fn normalize_color_hex(raw: &str) -> Option<String> {
    let hex = raw.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
        6 => hex.to_string(),
        _ => return None,
    };
    Some(format!("#{}", expanded.to_ascii_lowercase()))
}

/// `#rrggbb` to the opaque `FFRRGGBB` form xlsx stores.
pub fn hex_to_argb(color: &str) -> Option<String> {
    let normalized = normalize_color_hex(color)?;
    Some(format!("FF{}", normalized[1..].to_ascii_uppercase()))
}

/// `AARRGGBB` (or bare `RRGGBB`) from xlsx back to `#rrggbb`; alpha is dropped.
pub fn argb_to_hex(argb: &str) -> Option<String> {
    let argb = argb.trim();
    if !argb.is_ascii() {
        return None;
    }
    match argb.len() {
        8 => normalize_color_hex(&argb[2..]),
        6 => normalize_color_hex(argb),
        _ => None,
    }
}
