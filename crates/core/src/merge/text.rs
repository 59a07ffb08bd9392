//! Line-oriented three-way merge of file contents.
//!
//! `diffy` computes the base→ours and base→theirs line diffs; their hunks are
//! flattened into edits addressed by base line numbers and then walked in
//! order. Edits from one side are applied as-is, identical edits from both
//! sides are taken once, and overlapping edits that disagree become a conflict
//! region delimited by the standard markers.

use diffy::Line;
use tracing::debug;

/// Opens a conflict region; followed by the "ours" label.
pub const CONFLICT_OURS_MARKER: &str = "<<<<<<<";
/// Separates "ours" from "theirs" inside a conflict region.
pub const CONFLICT_SPLIT_MARKER: &str = "=======";
/// Closes a conflict region; followed by the "theirs" label.
pub const CONFLICT_THEIRS_MARKER: &str = ">>>>>>>";

/// The result of merging one path's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Merged text. Contains conflict regions when `has_conflict` is set.
    pub content: String,
    /// Whether any conflict region was produced.
    pub has_conflict: bool,
    /// Number of conflict regions in `content`.
    pub conflicts: usize,
}

impl MergeResult {
    fn clean(content: &str) -> Self {
        Self {
            content: content.to_owned(),
            has_conflict: false,
            conflicts: 0,
        }
    }
}

/// Replacement of base lines `start..end` by `lines`.
#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    lines: Vec<String>,
}

impl Edit {
    fn is_insertion(&self) -> bool {
        self.start == self.end
    }
}

/// Merge `ours` and `theirs`, both derived from `base`.
pub fn merge_text(
    ours: &str,
    base: &str,
    theirs: &str,
    ours_label: &str,
    theirs_label: &str,
) -> MergeResult {
    if ours == theirs {
        debug!("ours == theirs, identical changes");
        return MergeResult::clean(ours);
    }
    if ours == base {
        debug!("ours == base, theirs wins cleanly");
        return MergeResult::clean(theirs);
    }
    if theirs == base {
        debug!("theirs == base, ours wins cleanly");
        return MergeResult::clean(ours);
    }

    let base_lines: Vec<&str> = base.split_inclusive('\n').collect();
    let ours_edits = edits(base, ours);
    let theirs_edits = edits(base, theirs);

    let mut out = String::with_capacity(base.len().max(ours.len()).max(theirs.len()));
    let mut conflicts = 0;
    let mut pos = 0;
    let (mut i, mut j) = (0, 0);

    while i < ours_edits.len() || j < theirs_edits.len() {
        let (first_ours, first_theirs) = (i, j);

        // Seed the region with whichever pending edit comes first in the base.
        let seed_ours = match (ours_edits.get(i), theirs_edits.get(j)) {
            (Some(o), Some(t)) => (o.start, o.end) <= (t.start, t.end),
            (Some(_), None) => true,
            (None, _) => false,
        };
        let seed = if seed_ours {
            i += 1;
            &ours_edits[i - 1]
        } else {
            j += 1;
            &theirs_edits[j - 1]
        };
        let (mut start, mut end) = (seed.start, seed.end);

        // Grow the region until neither side has an edit touching it.
        loop {
            if let Some(edit) = ours_edits.get(i).filter(|e| overlaps(start, end, e)) {
                start = start.min(edit.start);
                end = end.max(edit.end);
                i += 1;
            } else if let Some(edit) = theirs_edits.get(j).filter(|e| overlaps(start, end, e)) {
                start = start.min(edit.start);
                end = end.max(edit.end);
                j += 1;
            } else {
                break;
            }
        }

        out.extend(base_lines[pos..start].iter().copied());

        let ours_region = &ours_edits[first_ours..i];
        let theirs_region = &theirs_edits[first_theirs..j];
        match (ours_region.is_empty(), theirs_region.is_empty()) {
            (false, true) => out.push_str(&apply(&base_lines, start, end, ours_region)),
            (true, false) => out.push_str(&apply(&base_lines, start, end, theirs_region)),
            _ => {
                let ours_text = apply(&base_lines, start, end, ours_region);
                let theirs_text = apply(&base_lines, start, end, theirs_region);
                if ours_text == theirs_text {
                    out.push_str(&ours_text);
                } else {
                    conflicts += 1;
                    push_conflict(&mut out, &ours_text, &theirs_text, ours_label, theirs_label);
                }
            }
        }

        pos = end;
    }

    out.extend(base_lines[pos..].iter().copied());

    debug!(conflicts, "three-way text merge finished");
    MergeResult {
        content: out,
        has_conflict: conflicts > 0,
        conflicts,
    }
}

/// Flatten the hunks of a base→side patch into edits on base line numbers.
fn edits(base: &str, side: &str) -> Vec<Edit> {
    let patch = diffy::create_patch(base, side);
    let mut edits = Vec::new();

    for hunk in patch.hunks() {
        let range = hunk.old_range();
        // Hunk ranges are 1-based, except an empty range which names the
        // line after which the insertion happens.
        let mut pos = if range.len() == 0 {
            range.start()
        } else {
            range.start() - 1
        };
        let mut current: Option<Edit> = None;

        for line in hunk.lines() {
            match line {
                Line::Context(_) => {
                    if let Some(edit) = current.take() {
                        edits.push(edit);
                    }
                    pos += 1;
                }
                Line::Delete(_) => {
                    let edit = current.get_or_insert_with(|| Edit {
                        start: pos,
                        end: pos,
                        lines: Vec::new(),
                    });
                    pos += 1;
                    edit.end = pos;
                }
                Line::Insert(text) => {
                    current
                        .get_or_insert_with(|| Edit {
                            start: pos,
                            end: pos,
                            lines: Vec::new(),
                        })
                        .lines
                        .push((*text).to_owned());
                }
            }
        }

        if let Some(edit) = current.take() {
            edits.push(edit);
        }
    }

    edits
}

/// Whether `edit` touches the base region `start..end`.
///
/// Two insertions collide only at the same point; an insertion collides with
/// a replacement only strictly inside it; replacements collide when their
/// line ranges intersect. Adjacent edits do not collide.
fn overlaps(start: usize, end: usize, edit: &Edit) -> bool {
    match (start == end, edit.is_insertion()) {
        (true, true) => start == edit.start,
        (true, false) => edit.start < start && start < edit.end,
        (false, true) => start < edit.start && edit.start < end,
        (false, false) => edit.start < end && start < edit.end,
    }
}

/// Rebuild one side's text for base lines `start..end` from its edits.
fn apply(base: &[&str], start: usize, end: usize, edits: &[Edit]) -> String {
    let mut out = String::new();
    let mut pos = start;
    for edit in edits {
        out.extend(base[pos..edit.start].iter().copied());
        out.extend(edit.lines.iter().map(String::as_str));
        pos = edit.end;
    }
    out.extend(base[pos..end].iter().copied());
    out
}

fn push_conflict(out: &mut String, ours: &str, theirs: &str, ours_label: &str, theirs_label: &str) {
    ensure_newline(out);
    out.push_str(CONFLICT_OURS_MARKER);
    out.push(' ');
    out.push_str(ours_label);
    out.push('\n');
    out.push_str(ours);
    ensure_newline(out);
    out.push_str(CONFLICT_SPLIT_MARKER);
    out.push('\n');
    out.push_str(theirs);
    ensure_newline(out);
    out.push_str(CONFLICT_THEIRS_MARKER);
    out.push(' ');
    out.push_str(theirs_label);
    out.push('\n');
}

fn ensure_newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}
