//! Applies a reviewer-suggested unified-diff patch to a file's contents.
//!
//! Findings' `suggested_patch` strings are produced by an LLM against a
//! snapshot of the file that may have since drifted by a line or two (the
//! PR branch moved, or the model's line numbers were slightly off), so
//! matching is tolerant: each hunk's context/removed block is first tried
//! at its declared offset, then searched for within a small window around
//! it, before giving up. This mirrors how a human applying a stale patch
//! by hand would nudge it into place rather than reject it outright.
//!
//! Not invoked anywhere in the core dispatch path — this crate exists for
//! downstream consumers (e.g. an auto-fix bot) that want to apply the
//! patches a review proposes.

/// How many lines on either side of a hunk's declared offset to search
/// when the exact-offset match fails.
pub const FUZZ_WINDOW: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PatchApplyError {
    #[error("hunk header is malformed: {0}")]
    MalformedHeader(String),
    #[error("hunk at declared line {declared} could not be matched within {window} lines")]
    UnmatchedHunk { declared: usize, window: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug, Clone)]
struct Hunk {
    old_start: usize,
    lines: Vec<HunkLine>,
}

/// Apply `patch` (a unified diff of one file) to `original`, returning the
/// patched contents. Hunks are applied in order; each hunk's position is
/// adjusted for the net line-count delta of hunks already applied.
pub fn apply_patch(original: &str, patch: &str) -> Result<String, PatchApplyError> {
    let hunks = parse_hunks(patch)?;
    let mut lines: Vec<String> = original.lines().map(str::to_string).collect();
    let mut offset: isize = 0;

    for hunk in &hunks {
        let search_block: Vec<&str> = hunk
            .lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(s) | HunkLine::Remove(s) => Some(s.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect();
        let replacement_block: Vec<&str> = hunk
            .lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(s) | HunkLine::Add(s) => Some(s.as_str()),
                HunkLine::Remove(_) => None,
            })
            .collect();

        let declared_index = (hunk.old_start.saturating_sub(1) as isize + offset).max(0) as usize;
        let match_index = locate_block(&lines, &search_block, declared_index)
            .ok_or(PatchApplyError::UnmatchedHunk { declared: hunk.old_start, window: FUZZ_WINDOW })?;

        lines.splice(match_index..match_index + search_block.len(), replacement_block.iter().map(|s| s.to_string()));
        offset += replacement_block.len() as isize - search_block.len() as isize;
    }

    Ok(lines.join("\n"))
}

/// Find `block`'s starting index in `lines`, trying `declared_index`
/// first and then expanding outward by one line at a time up to
/// [`FUZZ_WINDOW`] in either direction.
fn locate_block(lines: &[String], block: &[&str], declared_index: usize) -> Option<usize> {
    if matches_at(lines, block, declared_index) {
        return Some(declared_index);
    }
    for delta in 1..=FUZZ_WINDOW {
        if declared_index >= delta && matches_at(lines, block, declared_index - delta) {
            return Some(declared_index - delta);
        }
        if matches_at(lines, block, declared_index + delta) {
            return Some(declared_index + delta);
        }
    }
    None
}

fn matches_at(lines: &[String], block: &[&str], index: usize) -> bool {
    if block.is_empty() {
        return true;
    }
    if index + block.len() > lines.len() {
        return false;
    }
    lines[index..index + block.len()].iter().zip(block.iter()).all(|(a, b)| a == b)
}

/// Parse the hunks of a unified diff, ignoring any `---`/`+++`/`diff --git`
/// header lines that precede the first `@@` marker.
fn parse_hunks(patch: &str) -> Result<Vec<Hunk>, PatchApplyError> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in patch.lines() {
        if let Some(rest) = line.strip_prefix("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            let old_start = parse_old_range_start(rest)
                .ok_or_else(|| PatchApplyError::MalformedHeader(line.to_string()))?;
            current = Some(Hunk { old_start, lines: Vec::new() });
            continue;
        }
        if line.starts_with("\\ No newline at end of file") {
            continue;
        }
        let Some(hunk) = current.as_mut() else {
            continue;
        };
        if let Some(text) = line.strip_prefix('+') {
            hunk.lines.push(HunkLine::Add(text.to_string()));
        } else if let Some(text) = line.strip_prefix('-') {
            hunk.lines.push(HunkLine::Remove(text.to_string()));
        } else {
            let text = line.strip_prefix(' ').unwrap_or(line);
            hunk.lines.push(HunkLine::Context(text.to_string()));
        }
    }
    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }
    Ok(hunks)
}

/// Parse the old-range start (`os` in ` -os,ol +ns,nl @@`).
fn parse_old_range_start(after_at: &str) -> Option<usize> {
    let dash_idx = after_at.find('-')?;
    let rest = &after_at[dash_idx + 1..];
    let end = rest.find([',', ' ']).unwrap_or(rest.len());
    rest[..end].parse().ok()
}
