//! "Did you mean" suggestions for misspelled severities and check methods.

/// Closest known spelling to `input`, compared case-insensitively.
///
/// Nothing is suggested when more than half of the longer string would have
/// to change.
pub(crate) fn suggest<'a>(input: &str, known: &[&'a str]) -> Option<&'a str> {
    let input = input.trim().to_lowercase();
    let (candidate, distance) = known
        .iter()
        .map(|&k| (k, edit_distance(&input, &k.to_lowercase())))
        .min_by_key(|&(_, d)| d)?;

    let longest = input.chars().count().max(candidate.chars().count());
    (distance <= longest / 2).then_some(candidate)
}

/// Levenshtein distance over chars, single-row.
pub(crate) fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CheckMethod;

    #[test]
    fn distances() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("阈值", "阈值"), 0);
    }

    #[test]
    fn close_spellings_are_suggested() {
        assert_eq!(suggest("treshold", CheckMethod::NAMES), Some("threshold"));
        assert_eq!(suggest("Timewindow", CheckMethod::NAMES), Some("time_window"));
        assert_eq!(suggest("hihg", &["high", "medium", "low"]), Some("high"));
    }

    #[test]
    fn distant_spellings_are_not() {
        assert_eq!(suggest("zzzzzzzzzzzzz", CheckMethod::NAMES), None);
        assert_eq!(suggest("anything", &[]), None);
    }
}
