//! Column suggestions for the mapping step.

use strsim::levenshtein;

use dynamik_common::{LogField, LogMapping, DISCOVER_ENABLEMENT};

/// Best header for `field` by edit distance. Among the closest headers: the
/// only one, else the first substring match, else the first.
pub fn best_match<'a>(field: &str, headers: &'a [String]) -> Option<&'a str> {
    let min = headers.iter().map(|h| levenshtein(h, field)).min()?;
    let closest: Vec<&str> = headers
        .iter()
        .filter(|h| levenshtein(h, field) == min)
        .map(String::as_str)
        .collect();

    if closest.len() == 1 {
        return closest.first().copied();
    }
    closest
        .iter()
        .find(|h| h.contains(field) || field.contains(**h))
        .or_else(|| closest.first())
        .copied()
}

/// Fill every unset field of `current` with a suggestion. Values already
/// chosen are kept.
///
/// Enablement is only suggested on an exact header match; otherwise it
/// defaults to discovering enablement from the log.
pub fn suggest(headers: &[String], current: &LogMapping) -> LogMapping {
    let mut mapping = current.clone();
    for field in LogField::ALL {
        if mapping.get(field).is_some() {
            continue;
        }
        let suggestion = match field {
            LogField::Enablement => headers
                .iter()
                .find(|h| h.as_str() == field.name())
                .cloned()
                .unwrap_or_else(|| DISCOVER_ENABLEMENT.to_string()),
            _ => match best_match(field.name(), headers) {
                Some(header) => header.to_string(),
                None => continue,
            },
        };
        mapping.set(field, Some(suggestion));
    }
    mapping
}
