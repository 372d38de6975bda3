//! Property tests: structural invariants, insert/delete round trips, and
//! anchor validity and placement under random edits.

use proptest::prelude::*;
use quire_document::{AnchorId, AnchorPolicy, AnchorType, DeletePolicy, Document, InsertPolicy};

const CURSOR: AnchorType = AnchorType::new("properties", "cursor");

#[derive(Debug, Clone)]
enum Edit {
    Insert { offset: usize, text: String },
    Delete { offset: usize, count: usize },
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (any::<usize>(), "[a-c\\n]{0,6}").prop_map(|(offset, text)| Edit::Insert { offset, text }),
        (any::<usize>(), 1usize..8).prop_map(|(offset, count)| Edit::Delete { offset, count }),
    ]
}

/// Convert a character offset into (line number, column).
fn locate(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut column = 0;
    for ch in text.chars().take(offset) {
        if ch == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    (line, column)
}

fn check_structure(doc: &Document) {
    let lines: Vec<_> = doc.lines().collect();
    assert_eq!(lines.len(), doc.line_count());
    assert!(!lines.is_empty());
    for line in &lines[..lines.len() - 1] {
        assert!(line.text().ends_with('\n'));
    }
    for line in &lines {
        assert!(line.text().matches('\n').count() <= 1);
    }
}

fn check_anchors(doc: &Document, anchors: &[AnchorId]) {
    for id in anchors {
        let anchor = doc.anchor(*id).expect("clamped anchors survive");
        let line = doc.line(anchor.line()).expect("anchor line is attached");
        let found = doc.line_finder().find_line(anchor.line()).unwrap();
        if let Some(number) = anchor.line_number() {
            assert_eq!(number, found.number(), "cached line number of {anchor}");
        }
        let max = quire_document::line_utils::last_cursor_column(line.text());
        assert!(anchor.column().unwrap_or(0) <= max, "{anchor} past end of {:?}", line.text());
    }
}

/// An anchor as a character offset into the string model. `None` once a
/// deletion has removed it.
#[derive(Debug, Clone, Copy)]
struct ModelAnchor {
    offset: Option<usize>,
    policy: AnchorPolicy,
}

impl ModelAnchor {
    /// Track `edit`, given the model text as it was before the edit.
    fn follow(&mut self, before: &str, edit: &Edit) {
        let Some(offset) = self.offset else {
            return;
        };
        let len = before.chars().count();
        match edit {
            Edit::Insert { offset: at, text } => {
                let at = at % (len + 1);
                let moves = offset > at || (offset == at && self.policy.insert == InsertPolicy::Later);
                if moves {
                    self.offset = Some(offset + text.chars().count());
                }
            }
            Edit::Delete { offset: at, count } => {
                if len == 0 {
                    return;
                }
                let start = at % len;
                let end = start + (*count).min(len - start);
                // The end of a fully deleted last line counts as deleted.
                let last_line_start = before.rfind('\n').map_or(0, |b| before[..b].chars().count() + 1);
                let swallows_end = end == len && start <= last_line_start && last_line_start < len;
                if (start..end).contains(&offset) || (offset == end && swallows_end) {
                    self.offset = match self.policy.delete {
                        DeletePolicy::Clamp => Some(start),
                        DeletePolicy::Remove => None,
                    };
                } else if offset >= end {
                    self.offset = Some(offset - (end - start));
                }
            }
        }
    }
}

fn apply(doc: &mut Document, model: &mut String, edit: &Edit) {
    let len = model.chars().count();
    match edit {
        Edit::Insert { offset, text } => {
            let offset = offset % (len + 1);
            let (line, column) = locate(model, offset);
            doc.insert_text_at(line, column, text).unwrap();
            let byte = model.char_indices().nth(offset).map_or(model.len(), |(b, _)| b);
            model.insert_str(byte, text);
        }
        Edit::Delete { offset, count } => {
            if len == 0 {
                return;
            }
            let offset = offset % len;
            let count = (*count).min(len - offset);
            let (line, column) = locate(model, offset);
            doc.delete_text_at(line, column, count).unwrap();
            let start = model.char_indices().nth(offset).map_or(model.len(), |(b, _)| b);
            let end = model
                .char_indices()
                .nth(offset + count)
                .map_or(model.len(), |(b, _)| b);
            model.replace_range(start..end, "");
        }
    }
}

proptest! {
    #[test]
    fn prop_anchors_follow_string_model(
        initial in "[a-c\\n]{0,20}",
        anchor_offsets in prop::collection::vec(any::<usize>(), 1..8),
        edits in prop::collection::vec(edit_strategy(), 1..30),
    ) {
        let policies = [
            AnchorPolicy::MARKER,
            AnchorPolicy::CURSOR,
            AnchorPolicy::SELECTION_BASE,
            AnchorPolicy::RANGE_END,
            AnchorPolicy::new(InsertPolicy::Later, DeletePolicy::Remove),
        ];
        let mut doc = Document::from_text(&initial);
        let mut model = initial.clone();
        let len = model.chars().count();
        let mut anchors = Vec::new();
        for (i, offset) in anchor_offsets.iter().enumerate() {
            let offset = offset % (len + 1);
            let (number, column) = locate(&model, offset);
            let line = doc.line_info(number).unwrap().line();
            let policy = policies[i % policies.len()];
            let cached = (i % 2 == 0).then_some(number);
            let id = doc.create_anchor(CURSOR, line, cached, Some(column), policy).unwrap();
            anchors.push((id, ModelAnchor { offset: Some(offset), policy }));
        }

        for edit in &edits {
            let before = model.clone();
            apply(&mut doc, &mut model, edit);
            for (id, expected) in anchors.iter_mut() {
                expected.follow(&before, edit);
                match expected.offset {
                    Some(offset) => {
                        let position = doc.anchor_position(*id).unwrap();
                        prop_assert_eq!(
                            (position.line_number(), position.column()),
                            locate(&model, offset),
                            "{:?} after {:?} on {:?}", expected, edit, before
                        );
                    }
                    None => prop_assert!(doc.anchor(*id).is_none(), "{:?} should be removed", id),
                }
            }
        }
    }

    #[test]
    fn prop_random_edits_match_string_model(
        initial in "[a-c\\n]{0,20}",
        edits in prop::collection::vec(edit_strategy(), 1..40),
    ) {
        let mut doc = Document::from_text(&initial);
        let mut model = initial.clone();
        for edit in &edits {
            apply(&mut doc, &mut model, edit);
            prop_assert_eq!(doc.text(), model.clone());
            check_structure(&doc);
            prop_assert_eq!(doc.line_count(), model.split('\n').count());
        }
    }

    #[test]
    fn prop_clamped_anchors_stay_valid(
        initial in "[a-c\\n]{1,20}",
        anchor_offsets in prop::collection::vec(any::<usize>(), 1..6),
        edits in prop::collection::vec(edit_strategy(), 1..30),
    ) {
        let mut doc = Document::from_text(&initial);
        let mut model = initial.clone();
        let len = model.chars().count();
        let mut anchors = Vec::new();
        for (i, offset) in anchor_offsets.iter().enumerate() {
            let (number, column) = locate(&model, offset % (len + 1));
            let line = doc.line_info(number).unwrap().line();
            let policy = if i % 2 == 0 { AnchorPolicy::CURSOR } else { AnchorPolicy::SELECTION_BASE };
            let cached = (i % 3 != 0).then_some(number);
            anchors.push(doc.create_anchor(CURSOR, line, cached, Some(column), policy).unwrap());
        }

        for edit in &edits {
            apply(&mut doc, &mut model, edit);
            check_anchors(&doc, &anchors);
        }
    }

    #[test]
    fn prop_insert_then_delete_round_trips(
        initial in "[a-c\\n]{0,20}",
        offset in any::<usize>(),
        text in "[a-c\\n]{1,10}",
    ) {
        let mut doc = Document::from_text(&initial);
        let offset = offset % (initial.chars().count() + 1);
        let (line, column) = locate(&initial, offset);

        let change = doc.insert_text_at(line, column, &text).unwrap();
        prop_assert_eq!(change.len(), text.chars().count());
        doc.delete_text_at(line, column, text.chars().count()).unwrap();

        prop_assert_eq!(doc.text(), initial.clone());
        prop_assert_eq!(doc.line_count(), initial.split('\n').count());
        check_structure(&doc);
    }
}
