//! "Did you mean?" suggestions for misspelled method names.
//!
//! Candidates come from the definitions visible on the receiver that could
//! accept the call (same arity, same block presence), ranked by Levenshtein
//! distance.

/// Maximum edit distance to consider a name as a valid suggestion.
const MAX_EDIT_DISTANCE: usize = 3;

/// Names shorter than this produce too many false positives.
const MIN_NAME_LENGTH_FOR_SUGGESTIONS: usize = 2;

/// At most this many names are returned.
const MAX_SUGGESTIONS: usize = 3;

/// Minimum number of single-character insertions, deletions or substitutions
/// turning `a` into `b`.
///
/// ```ignore
/// assert_eq!(levenshtein_distance("coco", "cocoa"), 1);
/// assert_eq!(levenshtein_distance("lenght", "length"), 2);
/// ```
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }
    if a == b {
        return 0;
    }

    // Two rows are enough.
    let mut prev_row: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr_row: Vec<usize> = vec![0; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_chars.len()]
}

/// Names from `valid_names` close to `misspelled`, best match first.
///
/// Exact matches are never suggested. Ties are broken alphabetically so the
/// result does not depend on iteration order.
pub fn suggest_similar<'a, I>(misspelled: &str, valid_names: I) -> Vec<String>
where
    I: Iterator<Item = &'a str>,
{
    if misspelled.chars().count() < MIN_NAME_LENGTH_FOR_SUGGESTIONS {
        return Vec::new();
    }

    let mut candidates: Vec<(&str, usize)> = valid_names
        .filter_map(|name| {
            let distance = levenshtein_distance(misspelled, name);
            (distance > 0 && distance <= threshold(misspelled, name)).then_some((name, distance))
        })
        .collect();

    candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    candidates.dedup_by(|a, b| a.0 == b.0);

    candidates
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Allowed distance, growing with the length of the names compared.
fn threshold(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len.abs_diff(b_len) > 2 {
        return 1;
    }
    match a_len.max(b_len) {
        0..=4 => 1,
        5..=7 => 2,
        _ => MAX_EDIT_DISTANCE,
    }
}

/// Help line for the best suggestion, in the style of resolution errors.
pub fn format_suggestion(suggestion: &str) -> String {
    format!("did you mean '{}'?", suggestion)
}
