//! Structure-preserving editor for sysconfig-style files
//!
//! The persisted configuration is a line-oriented `KEY="value"` format where
//! a key with a `_<number>` suffix forms an element of an indexed array
//! (`SEQ_0`, `SEQ_1`, ...). The editor keeps every line it does not
//! understand - comments, blank lines, malformed entries - byte for byte,
//! so a load/edit/serialize cycle only touches the lines it was asked to
//! touch.
//!
//! All operations are built on one classification pass: [`classify`] turns a
//! line into an entry record, [`SysconfigEditor::entries`] walks them lazily
//! for queries, and [`SysconfigEditor::scan`] drives mutations through a
//! decision callback. Deletions are deferred and applied back to front after
//! the pass so line indices never shift under the scan.

use regex::Regex;
use std::sync::LazyLock;

/// Matches `BASE_<digits>="value"`. The base is greedy over `[A-Za-z0-9_]`,
/// so `INTERFACE_0_SERVICES` does not match (the trailing `S` breaks the
/// digit suffix) while `INTERFACE_0` yields base `INTERFACE`, index 0.
static ARRAY_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^([A-Za-z0-9_]+)_([0-9]+)="?([^"]*)"?$"#).unwrap());

/// Matches a plain `KEY="value"` line. Quotes are optional and may be
/// unbalanced; a double quote inside the value makes the line inert.
static SCALAR_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^([A-Za-z0-9_]+)="?([^"]*)"?$"#).unwrap());

/// A parsed key/value line. `index` is `None` for scalar entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub key: &'a str,
    pub index: Option<usize>,
    pub value: &'a str,
}

/// Classifies a single line. Returns `None` for comments, blank lines and
/// anything else the format does not recognize - those lines are inert.
fn classify(line: &str) -> Option<Entry<'_>> {
    let line = line.trim();
    if let Some(caps) = ARRAY_ENTRY.captures(line) {
        let index = caps.get(2)?.as_str().parse().ok()?;
        return Some(Entry {
            key: caps.get(1)?.as_str(),
            index: Some(index),
            value: caps.get(3)?.as_str(),
        });
    }
    let caps = SCALAR_ENTRY.captures(line)?;
    Some(Entry {
        key: caps.get(1)?.as_str(),
        index: None,
        value: caps.get(2)?.as_str(),
    })
}

/// Decision returned by a [`SysconfigEditor::scan`] callback for each
/// matching line.
pub enum ScanAction {
    /// Stop scanning.
    Stop,
    /// Keep going.
    Continue,
    /// Delete this line and stop scanning.
    DeleteStop,
    /// Delete this line and keep going.
    DeleteContinue,
    /// Replace the value of this line (re-quoted canonically) and stop.
    Set(String),
}

/// Line-oriented key/value and indexed-array editor.
///
/// Untouched lines round-trip verbatim; edits normalize quoting to
/// `KEY="value"`.
#[derive(Debug, Clone)]
pub struct SysconfigEditor {
    lines: Vec<String>,
}

impl SysconfigEditor {
    /// Parses a configuration text into its line sequence.
    pub fn new(text: &str) -> Self {
        let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        // A trailing newline produces one empty tail element, not a line.
        while lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        Self { lines }
    }

    /// Lazily yields every recognized entry in document order.
    pub fn entries(&self) -> impl Iterator<Item = Entry<'_>> {
        self.lines.iter().filter_map(|line| classify(line))
    }

    /// Returns every distinct key name, in encounter order.
    ///
    /// An array contributes its base name once, and only when element 0 (or
    /// a scalar of the same name) is present. Arrays known solely from a
    /// non-zero index stay invisible here, matching the on-disk format's
    /// historical reader.
    pub fn keys(&self) -> Vec<String> {
        let mut ret: Vec<String> = Vec::new();
        for entry in self.entries() {
            if matches!(entry.index, None | Some(0)) && !ret.iter().any(|k| k == entry.key) {
                ret.push(entry.key.to_owned());
            }
        }
        ret
    }

    /// Returns the value of a scalar key, or an empty string if the key is
    /// absent or only exists as an array.
    pub fn get(&self, key: &str) -> String {
        self.entries()
            .find(|e| e.key == key && e.index.is_none())
            .map(|e| e.value.to_owned())
            .unwrap_or_default()
    }

    /// Updates the first scalar line for `key` in place, or appends a new
    /// `key="value"` line when none exists. Returns whether an existing
    /// line was found.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let mut found = false;
        self.scan(
            |k| k == key,
            |_, idx, _| {
                if idx.is_none() {
                    found = true;
                    ScanAction::Set(value.to_owned())
                } else {
                    ScanAction::Continue
                }
            },
        );
        if !found {
            self.lines.push(format!("{key}=\"{value}\""));
        }
        found
    }

    /// Deletes every scalar line for `key`. Returns whether any was found.
    pub fn remove(&mut self, key: &str) -> bool {
        let mut found = false;
        self.scan(
            |k| k == key,
            |_, idx, _| {
                if idx.is_none() {
                    found = true;
                    ScanAction::DeleteContinue
                } else {
                    ScanAction::Continue
                }
            },
        );
        found
    }

    /// Returns the length of the array `key`, defined as one past the
    /// highest index present. Gaps count toward the length; a missing array
    /// has length 0.
    pub fn array_len(&self, key: &str) -> usize {
        self.entries()
            .filter(|e| e.key == key)
            .filter_map(|e| e.index)
            .max()
            .map_or(0, |m| m + 1)
    }

    /// Returns the array value at `index`, or an empty string when that
    /// exact index is absent.
    pub fn array_get(&self, key: &str, index: usize) -> String {
        self.entries()
            .find(|e| e.key == key && e.index == Some(index))
            .map(|e| e.value.to_owned())
            .unwrap_or_default()
    }

    /// Updates the array element at `index` in place, or appends a new
    /// indexed line when it is absent (gaps are allowed). Returns whether
    /// the index was found.
    pub fn array_set(&mut self, key: &str, index: usize, value: &str) -> bool {
        let mut found = false;
        self.scan(
            |k| k == key,
            |_, idx, _| {
                if idx == Some(index) {
                    found = true;
                    ScanAction::Set(value.to_owned())
                } else {
                    ScanAction::Continue
                }
            },
        );
        if !found {
            self.lines.push(format!("{key}_{index}=\"{value}\""));
        }
        found
    }

    /// Shrinks or enlarges the array to exactly `new_len` elements.
    ///
    /// Elements with index >= `new_len` are deleted. Empty-valued lines are
    /// appended above the highest surviving index so that
    /// `array_len(key) == new_len` afterwards; gaps below a surviving index
    /// are left alone and keep reading back as empty strings. `new_len == 0`
    /// erases the array entirely.
    pub fn array_resize(&mut self, key: &str, new_len: usize) {
        let mut max_kept: Option<usize> = None;
        self.scan(
            |k| k == key,
            |_, idx, _| match idx {
                Some(i) if i >= new_len => ScanAction::DeleteContinue,
                Some(i) => {
                    if max_kept.is_none_or(|m| i > m) {
                        max_kept = Some(i);
                    }
                    ScanAction::Continue
                }
                None => ScanAction::Continue,
            },
        );
        let first_new = max_kept.map_or(0, |m| m + 1);
        for idx in first_new..new_len {
            self.lines.push(format!("{key}_{idx}=\"\""));
        }
    }

    /// Serializes all lines back to text, newline-terminated.
    pub fn to_text(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Walks all lines in order. For each recognized entry whose base key
    /// satisfies `key_match`, invokes `decide` with `(base_key, index,
    /// value)` where `index` is `None` for scalars, and acts on the returned
    /// [`ScanAction`].
    ///
    /// Lines matching neither pattern are never offered to the callback.
    /// Pending deletions are applied after the walk, from the end backwards.
    /// `Set` rewrites the line canonically with double quotes.
    pub fn scan<P, F>(&mut self, key_match: P, mut decide: F)
    where
        P: Fn(&str) -> bool,
        F: FnMut(&str, Option<usize>, &str) -> ScanAction,
    {
        let mut to_delete: Vec<usize> = Vec::new();
        for line_no in 0..self.lines.len() {
            let Some(entry) = classify(&self.lines[line_no]) else {
                continue;
            };
            if !key_match(entry.key) {
                continue;
            }
            let (key, idx, val) = (entry.key.to_owned(), entry.index, entry.value.to_owned());
            match decide(&key, idx, &val) {
                ScanAction::Stop => break,
                ScanAction::Continue => {}
                ScanAction::DeleteStop => {
                    to_delete.push(line_no);
                    break;
                }
                ScanAction::DeleteContinue => to_delete.push(line_no),
                ScanAction::Set(new_val) => {
                    self.lines[line_no] = match idx {
                        Some(i) => format!("{key}_{i}=\"{new_val}\""),
                        None => format!("{key}=\"{new_val}\""),
                    };
                    break;
                }
            }
        }
        for line_no in to_delete.into_iter().rev() {
            self.lines.remove(line_no);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
# this is a comment

ABC123=\"foo123\"
DEF456=\"bar456\"

SEQ_0=\"a\"
SEQ_2=\"c\"

ARY_0=\"a\"
ARY_1=\"b\"
ARY_2=\"c\"
ARY_3=\"d\"
ARY_4=\"e\"
ARY_5=\"f\"
ARY_6=\"g\"

ghi=789

# yadi yadi yada
";

    #[test]
    fn test_keys_count_arrays_once() {
        let conf = SysconfigEditor::new(SAMPLE);
        assert_eq!(conf.keys(), vec!["ABC123", "DEF456", "SEQ", "ARY", "ghi"]);
    }

    #[test]
    fn test_get_scalar_values() {
        let conf = SysconfigEditor::new(SAMPLE);
        assert_eq!(conf.get("ABC123"), "foo123");
        assert_eq!(conf.get("DEF456"), "bar456");
        // Unquoted values work too
        assert_eq!(conf.get("ghi"), "789");
        // Array keys and unknown keys read as empty
        assert_eq!(conf.get("ARY"), "");
        assert_eq!(conf.get("ARY_"), "");
        assert_eq!(conf.get("nope"), "");
    }

    #[test]
    fn test_set_updates_in_place_or_appends() {
        let mut conf = SysconfigEditor::new(SAMPLE);
        assert!(conf.set("ABC123", "foo"));
        assert!(conf.set("DEF456", "bar"));
        assert!(!conf.set("newkey", "baz"));

        assert_eq!(conf.get("ABC123"), "foo");
        assert_eq!(conf.get("DEF456"), "bar");
        assert_eq!(conf.get("newkey"), "baz");

        // In-place update must not grow the document
        let lines_before = conf.to_text().lines().count();
        conf.set("ABC123", "foo2");
        assert_eq!(conf.to_text().lines().count(), lines_before);
    }

    #[test]
    fn test_array_len_and_get() {
        let conf = SysconfigEditor::new(SAMPLE);
        assert_eq!(conf.array_len("does_not_exist"), 0);
        // Length is max index + 1, gaps included
        assert_eq!(conf.array_len("SEQ"), 3);
        assert_eq!(conf.array_get("SEQ", 0), "a");
        assert_eq!(conf.array_get("SEQ", 1), "");
        assert_eq!(conf.array_get("SEQ", 2), "c");
        assert_eq!(conf.array_len("ARY"), 7);
        assert_eq!(conf.array_get("ARY", 6), "g");
    }

    #[test]
    fn test_array_set() {
        let mut conf = SysconfigEditor::new(SAMPLE);
        assert!(conf.array_set("ARY", 6, "gggg"));
        // Setting past the end appends the exact index, creating a gap
        assert!(!conf.array_set("ARY", 9, "test"));
        assert_eq!(conf.array_get("ARY", 6), "gggg");
        assert_eq!(conf.array_get("ARY", 9), "test");
        assert_eq!(conf.array_get("ARY", 7), "");
        assert_eq!(conf.array_len("ARY"), 10);
    }

    #[test]
    fn test_array_resize_noop_keeps_gaps() {
        let mut conf = SysconfigEditor::new(SAMPLE);
        conf.array_resize("SEQ", 3);
        assert_eq!(conf.array_len("SEQ"), 3);
        assert_eq!(conf.array_get("SEQ", 0), "a");
        assert_eq!(conf.array_get("SEQ", 1), "");
        assert_eq!(conf.array_get("SEQ", 2), "c");
    }

    #[test]
    fn test_array_resize_enlarge() {
        let mut conf = SysconfigEditor::new(SAMPLE);
        conf.array_resize("SEQ", 5);
        assert_eq!(conf.array_len("SEQ"), 5);
        assert_eq!(conf.array_get("SEQ", 0), "a");
        assert_eq!(conf.array_get("SEQ", 2), "c");
        assert_eq!(conf.array_get("SEQ", 3), "");
        assert_eq!(conf.array_get("SEQ", 4), "");
    }

    #[test]
    fn test_array_resize_shrink() {
        let mut conf = SysconfigEditor::new(SAMPLE);
        conf.array_resize("SEQ", 2);
        assert_eq!(conf.array_len("SEQ"), 2);
        assert_eq!(conf.array_get("SEQ", 0), "a");
        assert_eq!(conf.array_get("SEQ", 1), "");
        assert_eq!(conf.array_get("SEQ", 2), "");
    }

    #[test]
    fn test_array_resize_erase_and_create() {
        let mut conf = SysconfigEditor::new(SAMPLE);
        conf.array_resize("SEQ", 0);
        assert_eq!(conf.array_len("SEQ"), 0);
        assert_eq!(conf.array_get("SEQ", 0), "");

        conf.array_resize("new_array", 3);
        assert_eq!(conf.array_len("new_array"), 3);
        assert_eq!(conf.array_get("new_array", 0), "");
        assert_eq!(conf.array_get("new_array", 2), "");
    }

    #[test]
    fn test_to_text_preserves_untouched_lines() {
        let mut conf = SysconfigEditor::new(SAMPLE);
        conf.set("ABC123", "foo");
        conf.set("DEF456", "bar");
        conf.set("newkey", "baz");
        conf.array_set("ARY", 6, "gggg");
        conf.array_set("ARY", 9, "test");
        conf.array_resize("SEQ", 0);

        assert_eq!(
            conf.to_text(),
            "
# this is a comment

ABC123=\"foo\"
DEF456=\"bar\"


ARY_0=\"a\"
ARY_1=\"b\"
ARY_2=\"c\"
ARY_3=\"d\"
ARY_4=\"e\"
ARY_5=\"f\"
ARY_6=\"gggg\"

ghi=789

# yadi yadi yada
newkey=\"baz\"
ARY_9=\"test\"
"
        );
    }

    #[test]
    fn test_round_trip_verbatim() {
        let conf = SysconfigEditor::new(SAMPLE);
        assert_eq!(conf.to_text(), SAMPLE);
    }

    #[test]
    fn test_malformed_lines_are_inert() {
        let text = "FOO=\"has \"quotes\" inside\"\nBAR=\"ok\"\nnot a config line\n";
        let mut conf = SysconfigEditor::new(text);
        assert_eq!(conf.get("FOO"), "");
        assert_eq!(conf.get("BAR"), "ok");
        conf.set("BAR", "new");
        assert_eq!(
            conf.to_text(),
            "FOO=\"has \"quotes\" inside\"\nBAR=\"new\"\nnot a config line\n"
        );
    }

    #[test]
    fn test_quote_normalization_on_write() {
        let mut conf = SysconfigEditor::new("plain=value\n");
        assert!(conf.set("plain", "value2"));
        assert_eq!(conf.to_text(), "plain=\"value2\"\n");
    }

    #[test]
    fn test_interface_services_is_scalar_not_array() {
        let conf = SysconfigEditor::new("INTERFACE_0=\"eth0\"\nINTERFACE_0_SERVICES=\"ssh\"\n");
        assert_eq!(conf.array_len("INTERFACE"), 1);
        assert_eq!(conf.get("INTERFACE_0_SERVICES"), "ssh");
        assert_eq!(conf.array_len("INTERFACE_0_SERVICES"), 0);
    }

    #[test]
    fn test_remove_scalar() {
        let mut conf = SysconfigEditor::new("A=\"1\"\nB=\"2\"\nC=\"3\"\n");
        assert!(conf.remove("B"));
        assert!(!conf.remove("B"));
        assert_eq!(conf.to_text(), "A=\"1\"\nC=\"3\"\n");
    }

    #[test]
    fn test_multi_digit_indices() {
        let conf = SysconfigEditor::new("K_10=\"x\"\nK_2=\"y\"\n");
        assert_eq!(conf.array_len("K"), 11);
        assert_eq!(conf.array_get("K", 10), "x");
        assert_eq!(conf.array_get("K", 2), "y");
    }

    #[test]
    fn test_scan_delete_does_not_shift_pending_lines() {
        let mut conf = SysconfigEditor::new("D_0=\"a\"\nkeep=\"x\"\nD_1=\"b\"\nD_2=\"c\"\n");
        let mut seen = Vec::new();
        conf.scan(
            |k| k == "D",
            |_, idx, val| {
                seen.push((idx, val.to_owned()));
                ScanAction::DeleteContinue
            },
        );
        // Every element was visited exactly once despite the deletions
        assert_eq!(
            seen,
            vec![
                (Some(0), "a".to_owned()),
                (Some(1), "b".to_owned()),
                (Some(2), "c".to_owned()),
            ]
        );
        assert_eq!(conf.to_text(), "keep=\"x\"\n");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_resize_is_idempotent(
            indices in proptest::collection::btree_set(0usize..20, 0..8),
            new_len in 0usize..12
        ) {
            let text: String = indices
                .iter()
                .map(|i| format!("K_{i}=\"v{i}\"\n"))
                .collect();
            let mut conf = SysconfigEditor::new(&text);
            conf.array_resize("K", new_len);
            let once = conf.to_text();
            conf.array_resize("K", new_len);
            prop_assert_eq!(conf.to_text(), once);
        }

        #[test]
        fn test_resize_postcondition(
            indices in proptest::collection::btree_set(0usize..20, 0..8),
            new_len in 0usize..12
        ) {
            let text: String = indices
                .iter()
                .map(|i| format!("K_{i}=\"v{i}\"\n"))
                .collect();
            let mut conf = SysconfigEditor::new(&text);
            conf.array_resize("K", new_len);
            prop_assert_eq!(conf.array_len("K"), new_len);
            // Surviving elements keep their value
            for i in indices.into_iter().filter(|&i| i < new_len) {
                prop_assert_eq!(conf.array_get("K", i), format!("v{i}"));
            }
        }

        #[test]
        // Keys here avoid the `_<digits>` suffix so they stay scalar
        fn test_set_then_get(key in "[A-Za-z][A-Za-z0-9]{0,11}", value in "[^\"\r\n]{0,24}") {
            let mut conf = SysconfigEditor::new("# header\n");
            conf.set(&key, &value);
            prop_assert_eq!(conf.get(&key), value);
        }
    }
}
