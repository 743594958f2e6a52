//! Path queries over raw session text.
//!
//! A path is a run of `Key:` segments, each optionally followed by a `{value}`
//! filter that selects the list element whose key holds exactly that value:
//!
//! ```text
//! DriverInfo:Drivers:CarIdx:{5}UserName:
//! ```
//!
//! The scan is a single forward pass. Nesting depth is the count of leading spaces
//! and list dashes on a line; once a segment matched at some depth, a line
//! shallower than that depth ends the search.

/// Byte range `(start, len)` of the value addressed by `path`, or `None` when the
/// path does not exist.
///
/// The range excludes leading spaces after the key's colon and trailing
/// whitespace. Quotes are part of the value.
pub fn query(text: &str, path: &str) -> Option<(usize, usize)> {
    let mut remaining = path;
    let mut matched_depth = 0usize;
    let mut line_start = 0usize;

    for line in text.split(['\n', '\r']) {
        let offset = line_start;
        line_start += line.len() + 1;

        let depth = line.bytes().take_while(|b| matches!(b, b' ' | b'-')).count();
        let body = &line[depth..];
        if body.trim().is_empty() {
            continue;
        }
        if depth < matched_depth {
            return None;
        }

        let Some(line) = Line::split(body) else {
            continue;
        };
        let Some(rest) = remaining.strip_prefix(line.key) else {
            continue;
        };

        let rest = match rest.strip_prefix('{') {
            Some(filter) => {
                let close = filter.find('}')?;
                if line.value != &filter[..close] {
                    continue;
                }
                &filter[close + 1..]
            }
            None => rest,
        };

        remaining = rest;
        matched_depth = depth;
        if remaining.is_empty() {
            return Some((offset + depth + line.value_offset, line.value.len()));
        }
    }
    None
}

/// The value addressed by `path` as a slice of `text`.
pub fn query_str<'a>(text: &'a str, path: &str) -> Option<&'a str> {
    query(text, path).map(|(start, len)| &text[start..start + len])
}

/// A line with its indentation removed, split into key and value.
struct Line<'a> {
    /// Key including its trailing colon
    key: &'a str,
    value: &'a str,
    /// Offset of `value` within the line body
    value_offset: usize,
}

impl<'a> Line<'a> {
    fn split(body: &'a str) -> Option<Self> {
        let colon = body.find(':')?;
        let key = &body[..=colon];
        let after = &body[colon + 1..];
        let value = after.trim_start_matches(' ');
        let value_offset = colon + 1 + (after.len() - value.len());
        Some(Self { key, value: value.trim_end(), value_offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SESSION_YAML;

    const LIST: &str = "A:\n B:\n - C: 1\n   D: first\n - C: 2\n   D: second\n - C: 3\n   D: third\n";

    #[test]
    fn filter_selects_list_element() {
        assert_eq!(query_str(LIST, "A:B:C:{2}D:"), Some("second"));
        assert_eq!(query_str(LIST, "A:B:C:{3}D:"), Some("third"));
    }

    #[test]
    fn filter_on_list_key_returns_sibling() {
        let text = "A:\n - B: 1\n   C: first\n - B: 2\n   C: second\n";
        assert_eq!(query_str(text, "A:B:{2}C:"), Some("second"));
        assert_eq!(query_str(text, "A:B:{3}C:"), None);
    }

    #[test]
    fn filter_can_be_the_last_segment() {
        assert_eq!(query_str(LIST, "A:B:C:{2}"), Some("2"));
    }

    #[test]
    fn non_matching_filter_is_none() {
        assert_eq!(query(LIST, "A:B:C:{9}D:"), None);
    }

    #[test]
    fn missing_path_is_none() {
        assert_eq!(query(LIST, "A:X:"), None);
        assert_eq!(query(LIST, "Z:"), None);
        assert_eq!(query("", "A:"), None);
    }

    #[test]
    fn range_points_into_text() {
        let (start, len) = query(LIST, "A:B:C:{1}D:").unwrap();
        assert_eq!(&LIST[start..start + len], "first");
    }

    #[test]
    fn structure_closing_ends_search() {
        let text = "Outer:\n Inner:\n  Leaf: 1\nOther:\n Leaf: 2\n";
        assert_eq!(query_str(text, "Outer:Inner:Leaf:"), Some("1"));
        // Inner matched at depth 1; Other at depth 0 closes it
        assert_eq!(query_str(text, "Outer:Inner:Missing:"), None);
    }

    #[test]
    fn trailing_whitespace_and_crlf_are_trimmed() {
        let text = "Weekend:\r\n Track: road atlanta  \r\n Length: 4.08 km\r\n";
        assert_eq!(query_str(text, "Weekend:Track:"), Some("road atlanta"));
        assert_eq!(query_str(text, "Weekend:Length:"), Some("4.08 km"));
    }

    #[test]
    fn negative_values_and_empty_values() {
        let text = "Car:\n Offset: -12.5\n Empty:\n";
        assert_eq!(query_str(text, "Car:Offset:"), Some("-12.5"));
        assert_eq!(query_str(text, "Car:Empty:"), Some(""));
    }

    #[test]
    fn value_may_contain_colons() {
        let text = "Info:\n Stamp: 12:34:56\n";
        assert_eq!(query_str(text, "Info:Stamp:"), Some("12:34:56"));
    }

    #[test]
    fn malformed_filter_is_none() {
        assert_eq!(query(LIST, "A:B:C:{2D:"), None);
    }

    #[test]
    fn session_fixture_lookups() {
        assert_eq!(query_str(SESSION_YAML, "WeekendInfo:TrackName:"), Some("roadatlanta full"));
        assert_eq!(query_str(SESSION_YAML, "DriverInfo:Drivers:CarIdx:{1}UserName:"), Some("Jordan O'Neil"));
        assert_eq!(query_str(SESSION_YAML, "DriverInfo:Drivers:CarIdx:{1}CarNumber:"), Some("\"7\""));
        assert_eq!(
            query_str(SESSION_YAML, "SessionInfo:Sessions:SessionNum:{1}SessionType:"),
            Some("Race")
        );
        assert_eq!(query(SESSION_YAML, "DriverInfo:Drivers:CarIdx:{5}UserName:"), None);
    }
}
