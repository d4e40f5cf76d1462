//! Important-fact extraction from model output

/// Collect the lines of `response` that carry `marker`, with every
/// occurrence of the marker removed and surrounding whitespace trimmed.
/// Lines left empty by that are dropped.
pub fn extract_important_info(response: &str, marker: &str) -> Vec<String> {
    if marker.is_empty() {
        return Vec::new();
    }

    response
        .lines()
        .filter(|line| line.contains(marker))
        .map(|line| line.replace(marker, "").trim().to_string())
        .filter(|fact| !fact.is_empty())
        .collect()
}
