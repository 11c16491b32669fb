//! Named colors shared by the interpreter and the fixture drivers.

use once_cell::sync::Lazy;

pub type Rgb = [u8; 3];

/// Ordered longest-name-first so "warm white" wins over "white".
static NAMED_COLORS: Lazy<Vec<(&'static str, Rgb)>> = Lazy::new(|| {
    let mut colors = vec![
        ("red", [255, 0, 0]),
        ("green", [0, 255, 0]),
        ("blue", [0, 0, 255]),
        ("white", [255, 255, 255]),
        ("warm white", [255, 180, 100]),
        ("cool white", [200, 220, 255]),
        ("amber", [255, 126, 0]),
        ("orange", [255, 100, 0]),
        ("yellow", [255, 200, 0]),
        ("purple", [128, 0, 255]),
        ("violet", [143, 0, 255]),
        ("pink", [255, 60, 150]),
        ("magenta", [255, 0, 255]),
        ("cyan", [0, 255, 255]),
        ("teal", [0, 180, 160]),
        ("uv", [90, 0, 255]),
    ];
    colors.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    colors
});

/// Palette cycled by multi-color chases and generated plans.
pub const CHASE_PALETTE: [&str; 6] = ["red", "blue", "green", "purple", "amber", "cyan"];

pub fn lookup(name: &str) -> Option<Rgb> {
    let name = name.trim().to_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, rgb)| *rgb)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    NAMED_COLORS.iter().map(|(n, _)| *n)
}

/// First color name mentioned in `text` as a whole word (or phrase).
pub fn find_in_text(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .collect();
    let joined = format!(" {} ", words.join(" "));
    NAMED_COLORS
        .iter()
        .map(|(n, _)| *n)
        .filter_map(|name| joined.find(&format!(" {} ", name)).map(|pos| (pos, name)))
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.len().cmp(&a.1.len())))
        .map(|(_, name)| name)
}

/// Parse `#rrggbb` hex notation.
pub fn parse_hex(hex: &str) -> Option<Rgb> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_color_word() {
        assert_eq!(find_in_text("flash red then blue"), Some("red"));
        assert_eq!(find_in_text("a warm white wash"), Some("warm white"));
        assert_eq!(find_in_text("bluegrass fade"), None);
        assert_eq!(find_in_text("parcan_l only"), None);
    }

    #[test]
    fn hex_and_names_agree() {
        assert_eq!(parse_hex("#FF0000"), lookup("red"));
        assert_eq!(lookup("nope"), None);
        assert!(names().any(|n| n == "amber"));
    }
}
