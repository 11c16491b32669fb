//! Fixture resolution: the union of every rule that fires, de-duplicated in
//! roster order.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::fixtures::FixtureLibrary;
use crate::models::fixtures::FixtureType;

static TYPE_KEYWORDS: Lazy<Vec<(Regex, FixtureType)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b(?:moving\s*heads?|movers?|spots?|spotlights?|heads)\b").expect("valid regex"),
            FixtureType::MovingHead,
        ),
        (
            Regex::new(r"\b(?:par\s*cans?|pars|rgb(?:\s+lights?)?|washes|wash lights?)\b").expect("valid regex"),
            FixtureType::Rgb,
        ),
        (
            Regex::new(r"\b(?:dimmers?|generic)\b").expect("valid regex"),
            FixtureType::Generic,
        ),
    ]
});

static EVERYTHING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(everything|all|every)\b(?:\s+(?:the\s+)?(\w+))?").expect("valid regex")
});
static LEFT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bleft\b").expect("valid regex"));
static RIGHT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bright\b").expect("valid regex"));
static BOTH_SIDES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:left and right|right and left|both sides|mirrored|mirror)\b").expect("valid regex")
});

/// Words after "all"/"every" that narrow the selection instead of meaning
/// "every fixture".
fn narrows_selection(word: &str) -> bool {
    let is_type = TYPE_KEYWORDS.iter().any(|(re, _)| re.is_match(word));
    is_type
        || word.starts_with("beat")
        || word.starts_with("bar")
        || word.starts_with("second")
        || word == "other"
        || word == "left"
        || word == "right"
        || word.parse::<f32>().is_ok()
}

fn mentions_everything(text: &str) -> bool {
    EVERYTHING.captures_iter(text).any(|caps| {
        if &caps[1] == "everything" {
            return true;
        }
        match caps.get(2) {
            None => caps[1] == *"all",
            Some(next) => {
                let next = next.as_str();
                // "all parcans" narrows by type, "every 2 beats" is a cadence
                !narrows_selection(next) && (caps[1] == *"all" || next.starts_with("light") || next.starts_with("fixture"))
            }
        }
    })
}

fn is_left(id: &str, name: &str) -> bool {
    let id = id.to_lowercase();
    id.ends_with("_l") || id.ends_with("_pl") || id.contains("left") || name.to_lowercase().contains("left")
}

fn is_right(id: &str, name: &str) -> bool {
    let id = id.to_lowercase();
    id.ends_with("_r") || id.ends_with("_pr") || id.contains("right") || name.to_lowercase().contains("right")
}

/// Whole-token match where `_` and `-` count as part of a token, so
/// "parcan_l" does not match inside "parcan_lr".
fn mentions_token(text: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    text.match_indices(token).any(|(pos, _)| {
        let before = text[..pos].chars().next_back();
        let after = text[pos + token.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFixtures {
    pub ids: Vec<String>,
    /// Names of the rules that contributed, for logging and confidence.
    pub matched_by: Vec<&'static str>,
}

impl ResolvedFixtures {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub fn resolve_fixtures(text: &str, library: &FixtureLibrary) -> ResolvedFixtures {
    let mut selected: BTreeSet<String> = BTreeSet::new();
    let mut matched_by = Vec::new();

    if mentions_everything(text) {
        selected.extend(library.ids());
        matched_by.push("all");
    }

    for (re, kind) in TYPE_KEYWORDS.iter() {
        if re.is_match(text) {
            let ids = library.by_type(*kind);
            if !ids.is_empty() {
                selected.extend(ids);
                matched_by.push(kind.as_str());
            }
        }
    }

    let both = BOTH_SIDES.is_match(text);
    let left = both || LEFT.is_match(text);
    let right = both || RIGHT.is_match(text);
    if left || right {
        for fixture in library.iter() {
            let config = fixture.config();
            if (left && is_left(&config.id, &config.name)) || (right && is_right(&config.id, &config.name)) {
                selected.insert(config.id.clone());
            }
        }
        matched_by.push("side");
    }

    for fixture in library.iter() {
        let config = fixture.config();
        let id = config.id.to_lowercase();
        let name = config.name.trim().to_lowercase();
        if mentions_token(text, &id) || (name.len() >= 3 && mentions_token(text, &name)) {
            selected.insert(config.id.clone());
            if !matched_by.contains(&"name") {
                matched_by.push("name");
            }
        }
    }

    // Keep roster order rather than alphabetical
    let ids = library
        .ids()
        .into_iter()
        .filter(|id| selected.contains(id))
        .collect();
    ResolvedFixtures { ids, matched_by }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::FixtureConfig;
    use serde_json::json;

    fn library() -> FixtureLibrary {
        let configs: Vec<FixtureConfig> = serde_json::from_value(json!([
            {"id": "parcan_l", "name": "Par Left", "type": "rgb"},
            {"id": "parcan_r", "name": "Par Right", "type": "rgb"},
            {"id": "parcan_pl", "type": "rgb"},
            {"id": "head_1", "name": "Spot One", "type": "moving_head"},
            {"id": "hazer", "type": "generic"}
        ]))
        .expect("configs");
        FixtureLibrary::from_configs(configs)
    }

    fn ids(text: &str) -> Vec<String> {
        resolve_fixtures(text, &library()).ids
    }

    #[test]
    fn literal_id_does_not_trigger_type_or_side() {
        assert_eq!(ids("flash red on parcan_l at 10s"), vec!["parcan_l"]);
    }

    #[test]
    fn type_keywords_and_all() {
        assert_eq!(ids("strobe the moving heads"), vec!["head_1"]);
        assert_eq!(ids("blue on all parcans"), vec!["parcan_l", "parcan_r", "parcan_pl"]);
        assert_eq!(ids("blackout everything").len(), 5);
        assert_eq!(ids("flash all at the drop").len(), 5);
        assert!(ids("strobe every 2 beats").is_empty());
    }

    #[test]
    fn sides_union() {
        assert_eq!(ids("pulse the left side"), vec!["parcan_l", "parcan_pl"]);
        assert_eq!(ids("mirrored chase"), vec!["parcan_l", "parcan_r", "parcan_pl"]);
    }

    #[test]
    fn names_match_whole_tokens() {
        assert_eq!(ids("fade spot one to blue"), vec!["head_1"]);
        assert!(ids("fade hazers").is_empty());
    }
}
