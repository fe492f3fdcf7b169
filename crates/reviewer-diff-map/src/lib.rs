//! Maps a target new-line number to the 1-based review-comment position
//! index the forge expects, by walking a unified diff patch.
//!
//! # Example
//!
//! ```
//! use reviewer_diff_map::map_position;
//!
//! let patch = "@@ -1,2 +1,3 @@\n context\n+added\n context\n";
//! assert_eq!(map_position(patch, 2), Some(2));
//! ```

/// Walk `patch` line-by-line and return the 1-based position of
/// `target_new_line`, or `None` if that line is not covered by any hunk.
///
/// Hunk headers and `\ No newline at end of file` markers do not advance
/// the position counter; every other line does. `current_new_line` resets
/// to the hunk's declared new-range start on each header.
pub fn map_position(patch: &str, target_new_line: u32) -> Option<u32> {
    let mut position: u32 = 0;
    let mut current_new_line: u32 = 0;
    let mut in_hunk = false;

    for line in patch.lines() {
        if line.starts_with("@@") {
            current_new_line = parse_new_range_start(line)?;
            in_hunk = true;
            continue;
        }
        if !in_hunk {
            continue;
        }
        if line.starts_with("\\ No newline at end of file") {
            continue;
        }

        position += 1;

        if line.starts_with('+') {
            if current_new_line == target_new_line {
                return Some(position);
            }
            current_new_line += 1;
        } else if line.starts_with('-') {
            // Removed line: present in the old file only, no new-line match.
        } else {
            if current_new_line == target_new_line {
                return Some(position);
            }
            current_new_line += 1;
        }
    }
    None
}

/// Parse the new-range start (`ns` in `@@ -os,ol +ns,nl @@`) from a hunk
/// header line.
fn parse_new_range_start(header: &str) -> Option<u32> {
    let plus_idx = header.find('+')?;
    let rest = &header[plus_idx + 1..];
    let end = rest.find([',', ' ']).unwrap_or(rest.len());
    rest[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_added_line_in_single_hunk() {
        let patch = "@@ -1,2 +1,3 @@\n context\n+added\n context\n";
        assert_eq!(map_position(patch, 2), Some(2));
    }

    #[test]
    fn maps_context_line() {
        let patch = "@@ -1,2 +1,3 @@\n context\n+added\n context\n";
        assert_eq!(map_position(patch, 1), Some(1));
        assert_eq!(map_position(patch, 3), Some(3));
    }

    #[test]
    fn removed_lines_do_not_advance_new_line_counter() {
        let patch = "@@ -1,3 +1,2 @@\n context\n-removed\n context\n";
        // new-line 1 is the first context line, new-line 2 is the second context line.
        assert_eq!(map_position(patch, 2), Some(3));
    }

    #[test]
    fn line_not_in_any_hunk_is_absent() {
        let patch = "@@ -1,2 +1,3 @@\n context\n+added\n context\n";
        assert_eq!(map_position(patch, 999), None);
    }

    #[test]
    fn multiple_hunks_each_reset_new_line_tracking() {
        let patch = "@@ -1,1 +1,1 @@\n context1\n@@ -10,1 +10,2 @@\n context10\n+added11\n";
        assert_eq!(map_position(patch, 1), Some(1));
        assert_eq!(map_position(patch, 10), Some(2));
        assert_eq!(map_position(patch, 11), Some(3));
    }

    #[test]
    fn first_matching_hunk_wins_on_tie() {
        // Pathological patch where the same new_line value recurs across
        // hunks; the first occurrence's position must win.
        let patch = "@@ -1,1 +1,1 @@\n context\n@@ -1,1 +1,1 @@\n context\n";
        assert_eq!(map_position(patch, 1), Some(1));
    }

    #[test]
    fn no_newline_marker_does_not_advance_position() {
        let patch = "@@ -1,1 +1,2 @@\n context\n+added\n\\ No newline at end of file\n";
        assert_eq!(map_position(patch, 2), Some(2));
    }

    #[test]
    fn empty_patch_has_no_mappable_lines() {
        assert_eq!(map_position("", 1), None);
    }

    #[test]
    fn lines_before_first_hunk_header_are_ignored() {
        let patch = "diff --git a/f b/f\nindex 111..222 100644\n--- a/f\n+++ b/f\n@@ -1,1 +1,1 @@\n+added\n";
        assert_eq!(map_position(patch, 1), Some(1));
    }
}
