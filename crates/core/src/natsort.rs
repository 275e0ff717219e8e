//! Natural-order string comparison
//!
//! Orders version strings the way humans expect: runs of digits are compared
//! by magnitude instead of lexically, so `"2"` sorts before `"10"`. Leading
//! zeros do not affect magnitude, which keeps zero-padded and unpadded
//! versions of the same number equal.

use std::cmp::Ordering;

/// Compare two strings in natural order.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0usize, 0usize);

    loop {
        match (a.get(i), b.get(j)) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&x), Some(&y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let (a_start, a_end) = digit_run(a, i);
                    let (b_start, b_end) = digit_run(b, j);

                    // a longer significant run is a bigger number
                    let ord = (a_end - a_start)
                        .cmp(&(b_end - b_start))
                        .then_with(|| a[a_start..a_end].cmp(&b[b_start..b_end]));
                    if ord != Ordering::Equal {
                        return ord;
                    }

                    i = a_end;
                    j = b_end;
                } else {
                    if x != y {
                        return x.cmp(&y);
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
    }
}

/// Sort a list of strings in natural order.
pub fn sort(items: &mut [String]) {
    items.sort_by(|a, b| compare(a, b));
}

/// Locate the significant part of the digit run starting at `pos`: leading
/// zeros are skipped unless the run is all zeros, in which case the run
/// collapses to a single zero.
fn digit_run(s: &[u8], pos: usize) -> (usize, usize) {
    let mut start = pos;
    while start < s.len() && s[start] == b'0' {
        start += 1;
    }

    let mut end = start;
    while end < s.len() && s[end].is_ascii_digit() {
        end += 1;
    }

    if start == end && start > pos {
        // all zeros
        start -= 1;
    }

    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_compare_by_magnitude() {
        assert_eq!(compare("2", "10"), Ordering::Less);
        assert_eq!(compare("10", "2"), Ordering::Greater);
        assert_eq!(compare("v2", "v10"), Ordering::Less);
        assert_eq!(compare("00009", "00010"), Ordering::Less);
    }

    #[test]
    fn leading_zeros_do_not_change_magnitude() {
        assert_eq!(compare("00002", "2"), Ordering::Equal);
        assert_eq!(compare("000", "0"), Ordering::Equal);
        assert_eq!(compare("007", "8"), Ordering::Less);
    }

    #[test]
    fn equal_strings_compare_equal() {
        assert_eq!(compare("", ""), Ordering::Equal);
        assert_eq!(compare("00010_create_users", "00010_create_users"), Ordering::Equal);
    }

    #[test]
    fn mixed_text_falls_back_to_bytes() {
        assert_eq!(compare("abc", "abd"), Ordering::Less);
        assert_eq!(compare("a1", "a"), Ordering::Greater);
        assert_eq!(compare("1a", "1b"), Ordering::Less);
    }

    #[test]
    fn relation_is_consistent() {
        let a = "2";
        let b = "10";
        let c = "100";
        assert_eq!(compare(a, b), Ordering::Less);
        assert_eq!(compare(b, c), Ordering::Less);
        assert_eq!(compare(a, c), Ordering::Less);
        assert_eq!(compare(b, a), Ordering::Greater);
    }

    #[test]
    fn sorts_versions_naturally() {
        let mut versions = vec![
            "10".to_string(),
            "2".to_string(),
            "1".to_string(),
            "21".to_string(),
            "3".to_string(),
        ];
        sort(&mut versions);
        assert_eq!(versions, vec!["1", "2", "3", "10", "21"]);
    }
}
