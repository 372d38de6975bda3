//! Anchor ownership and the adjustment hooks run during mutations.
//!
//! Anchors are indexed two ways: per line, sorted by column with line anchors
//! first, and globally by cached line number. The mutator calls the
//! `handle_*` hooks while a mutation is active; shifted and removed anchors
//! are collected and reported once the mutation ends.

use crate::anchor::{Anchor, AnchorId, AnchorPolicy, AnchorType, DeletePolicy, InsertPolicy};
use crate::error::{DocumentError, Result};
use crate::line::{LineId, LineStore};
use crate::line_finder::LineFinder;
use crate::position::Position;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Anchors moved or detached by one mutation.
#[derive(Debug, Default)]
pub(crate) struct MutationLog {
    pub shifted: Vec<AnchorId>,
    pub removed: Vec<AnchorId>,
}

/// Owns every anchor of a document.
#[derive(Debug, Default)]
pub struct AnchorManager {
    anchors: HashMap<AnchorId, Anchor>,
    by_line: HashMap<LineId, Vec<AnchorId>>,
    by_line_number: Vec<AnchorId>,
    next_id: u64,
    mutation: Option<MutationLog>,
}

fn line_key(anchors: &HashMap<AnchorId, Anchor>, id: AnchorId) -> (Option<usize>, AnchorId) {
    (anchors.get(&id).and_then(|a| a.column), id)
}

fn number_key(anchors: &HashMap<AnchorId, Anchor>, id: AnchorId) -> (usize, AnchorId) {
    (
        anchors.get(&id).and_then(|a| a.line_number).unwrap_or(0),
        id,
    )
}

impl AnchorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn anchor(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.get(&id)
    }

    pub fn contains(&self, id: AnchorId) -> bool {
        self.anchors.contains_key(&id)
    }

    /// Anchors on a line, line anchors first, then by column.
    pub fn anchors_on_line(&self, line: LineId) -> impl Iterator<Item = &Anchor> + '_ {
        self.by_line
            .get(&line)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.anchors.get(id))
    }

    pub fn anchors_by_type_on_line(
        &self,
        line: LineId,
        anchor_type: AnchorType,
    ) -> impl Iterator<Item = &Anchor> + '_ {
        self.anchors_on_line(line)
            .filter(move |a| a.anchor_type == anchor_type)
    }

    /// Every anchor of the given type, in no particular order.
    pub fn anchors_by_type(&self, anchor_type: AnchorType) -> impl Iterator<Item = &Anchor> + '_ {
        self.anchors
            .values()
            .filter(move |a| a.anchor_type == anchor_type)
    }

    /// Any anchor on `line` that caches its line number.
    pub fn find_anchor_with_line_number(&self, line: LineId) -> Option<&Anchor> {
        self.anchors_on_line(line).find(|a| a.line_number.is_some())
    }

    /// The anchor whose cached line number is closest to `line_number`.
    pub fn find_closest_anchor_with_line_number(&self, line_number: usize) -> Option<&Anchor> {
        if self.by_line_number.is_empty() {
            return None;
        }
        let anchors = &self.anchors;
        let index = self
            .by_line_number
            .partition_point(|id| number_key(anchors, *id).0 < line_number);

        let after = self.by_line_number.get(index).and_then(|id| anchors.get(id));
        let before = index
            .checked_sub(1)
            .and_then(|i| self.by_line_number.get(i))
            .and_then(|id| anchors.get(id));

        match (before, after) {
            (Some(before), Some(after)) => {
                let distance = |a: &Anchor| a.line_number.unwrap_or(0).abs_diff(line_number);
                if distance(before) <= distance(after) {
                    Some(before)
                } else {
                    Some(after)
                }
            }
            (before, after) => before.or(after),
        }
    }

    /// Resolve an anchor to a position, using its cached line number when it
    /// has one and the line finder otherwise.
    pub fn position(&self, lines: &LineStore, id: AnchorId) -> Result<Position> {
        let anchor = self.anchors.get(&id).ok_or(DocumentError::StaleAnchor(id))?;
        let line_info = match anchor.line_number {
            Some(number) => crate::position::LineInfo::new(anchor.line, number),
            None => LineFinder::new(lines, self).find_line(anchor.line)?,
        };
        Ok(Position::new(line_info, anchor.column.unwrap_or(0)))
    }

    /// The anchor after `id` in document order, optionally of a given type.
    pub fn next_anchor(
        &self,
        lines: &LineStore,
        id: AnchorId,
        anchor_type: Option<AnchorType>,
    ) -> Option<&Anchor> {
        self.adjacent_anchor(lines, id, anchor_type, true)
    }

    /// The anchor before `id` in document order, optionally of a given type.
    pub fn previous_anchor(
        &self,
        lines: &LineStore,
        id: AnchorId,
        anchor_type: Option<AnchorType>,
    ) -> Option<&Anchor> {
        self.adjacent_anchor(lines, id, anchor_type, false)
    }

    fn adjacent_anchor(
        &self,
        lines: &LineStore,
        id: AnchorId,
        anchor_type: Option<AnchorType>,
        forward: bool,
    ) -> Option<&Anchor> {
        let anchor = self.anchors.get(&id)?;
        let matches = |a: &&Anchor| anchor_type.map_or(true, |t| a.anchor_type == t);

        let list = self.by_line.get(&anchor.line)?;
        let index = list.iter().position(|other| *other == id)?;
        let same_line: Vec<&AnchorId> = if forward {
            list[index + 1..].iter().collect()
        } else {
            list[..index].iter().rev().collect()
        };
        if let Some(found) = same_line
            .into_iter()
            .filter_map(|other| self.anchors.get(other))
            .find(matches)
        {
            return Some(found);
        }

        let step = |line: LineId| {
            if forward {
                lines.next(line)
            } else {
                lines.prev(line)
            }
        };
        let mut line = step(anchor.line);
        while let Some(current) = line {
            if let Some(list) = self.by_line.get(&current) {
                let mut candidates: Box<dyn Iterator<Item = &AnchorId>> = if forward {
                    Box::new(list.iter())
                } else {
                    Box::new(list.iter().rev())
                };
                if let Some(found) = candidates
                    .find_map(|other| self.anchors.get(other).filter(|a| matches(a)))
                {
                    return Some(found);
                }
            }
            line = step(current);
        }
        None
    }

    pub(crate) fn create_anchor(
        &mut self,
        anchor_type: AnchorType,
        line: LineId,
        line_number: Option<usize>,
        column: Option<usize>,
        policy: AnchorPolicy,
        value: Option<Arc<dyn Any + Send + Sync>>,
    ) -> AnchorId {
        let id = AnchorId(self.next_id);
        self.next_id += 1;
        self.anchors.insert(
            id,
            Anchor {
                id,
                anchor_type,
                line,
                line_number,
                column,
                policy,
                value,
            },
        );
        self.link(id);
        id
    }

    pub(crate) fn anchor_mut(&mut self, id: AnchorId) -> Option<&mut Anchor> {
        self.anchors.get_mut(&id)
    }

    pub(crate) fn remove_anchor(&mut self, id: AnchorId) -> Option<Anchor> {
        if !self.anchors.contains_key(&id) {
            return None;
        }
        self.unlink(id);
        let removed = self.anchors.remove(&id);
        if let Some(log) = self.mutation.as_mut() {
            log.removed.push(id);
        }
        removed
    }

    /// Move an anchor. Fields the anchor ignores (line number, column) stay
    /// ignored.
    pub(crate) fn move_anchor(
        &mut self,
        id: AnchorId,
        line: LineId,
        line_number: usize,
        column: usize,
    ) -> Result<()> {
        if !self.anchors.contains_key(&id) {
            return Err(DocumentError::StaleAnchor(id));
        }
        self.relocate(id, line, line_number, column);
        Ok(())
    }

    /// Remove every anchor.
    pub(crate) fn clear(&mut self) {
        self.anchors.clear();
        self.by_line.clear();
        self.by_line_number.clear();
    }

    pub(crate) fn begin_mutation(&mut self) {
        debug_assert!(self.mutation.is_none(), "mutation already active");
        self.mutation = Some(MutationLog::default());
    }

    pub(crate) fn end_mutation(&mut self) -> MutationLog {
        let MutationLog { shifted, removed } = self.mutation.take().unwrap_or_default();
        let removed_set: HashSet<AnchorId> = removed.iter().copied().collect();
        let mut seen = HashSet::new();
        let shifted = shifted
            .into_iter()
            .filter(|id| !removed_set.contains(id) && seen.insert(*id))
            .collect();
        MutationLog { shifted, removed }
    }

    fn is_mutating(&self) -> bool {
        self.mutation.is_some()
    }

    fn record_shifted(&mut self, ids: &[AnchorId]) {
        if let Some(log) = self.mutation.as_mut() {
            log.shifted.extend_from_slice(ids);
        }
    }

    fn link(&mut self, id: AnchorId) {
        let Some(anchor) = self.anchors.get(&id) else {
            return;
        };
        let line = anchor.line;
        let has_number = anchor.line_number.is_some();
        let anchors = &self.anchors;

        let list = self.by_line.entry(line).or_default();
        let key = line_key(anchors, id);
        let index = list.partition_point(|other| line_key(anchors, *other) < key);
        list.insert(index, id);

        if has_number {
            let key = number_key(anchors, id);
            let index = self
                .by_line_number
                .partition_point(|other| number_key(anchors, *other) < key);
            self.by_line_number.insert(index, id);
        }
    }

    fn unlink(&mut self, id: AnchorId) {
        let Some(line) = self.anchors.get(&id).map(|a| a.line) else {
            return;
        };
        if let Some(list) = self.by_line.get_mut(&line) {
            list.retain(|other| *other != id);
            if list.is_empty() {
                self.by_line.remove(&line);
            }
        }
        if let Some(index) = self.by_line_number.iter().position(|other| *other == id) {
            self.by_line_number.remove(index);
        }
    }

    fn relocate(&mut self, id: AnchorId, line: LineId, line_number: usize, column: usize) {
        self.unlink(id);
        if let Some(anchor) = self.anchors.get_mut(&id) {
            anchor.line = line;
            if anchor.line_number.is_some() {
                anchor.line_number = Some(line_number);
            }
            if anchor.column.is_some() {
                anchor.column = Some(column);
            }
        }
        self.link(id);
    }

    /// Add `delta` to the cached number of every anchor at or past `from`.
    fn shift_line_numbers(&mut self, from: usize, delta: isize) {
        let anchors = &self.anchors;
        let start = self
            .by_line_number
            .partition_point(|id| number_key(anchors, *id).0 < from);
        let targets: Vec<AnchorId> = self.by_line_number[start..].to_vec();
        for id in &targets {
            if let Some(anchor) = self.anchors.get_mut(id) {
                anchor.line_number = anchor.line_number.map(|n| n.saturating_add_signed(delta));
            }
        }
        self.record_shifted(&targets);
    }

    /// Text without newlines was inserted at `column` on `line`.
    pub(crate) fn handle_single_line_insertion(&mut self, line: LineId, column: usize, length: usize) {
        debug_assert!(self.is_mutating(), "anchor hook outside a mutation");
        if length == 0 {
            return;
        }
        let targets: Vec<AnchorId> = self
            .anchors_on_line(line)
            .filter(|a| moves_on_insert(a, column))
            .map(|a| a.id)
            .collect();
        if targets.is_empty() {
            return;
        }

        for id in &targets {
            if let Some(anchor) = self.anchors.get_mut(id) {
                anchor.column = anchor.column.map(|c| c + length);
            }
        }
        let anchors = &self.anchors;
        if let Some(list) = self.by_line.get_mut(&line) {
            list.sort_by_key(|id| line_key(anchors, *id));
        }
        self.record_shifted(&targets);
    }

    /// Text containing newlines was inserted at `column` of `line`, splitting
    /// it so that its tail now lives on `new_last_line`.
    pub(crate) fn handle_multiline_insertion(
        &mut self,
        line: LineId,
        line_number: usize,
        column: usize,
        new_last_line: LineId,
        new_last_line_number: usize,
        column_in_new_last_line: usize,
    ) {
        debug_assert!(self.is_mutating(), "anchor hook outside a mutation");
        let delta = (new_last_line_number - line_number) as isize;
        self.shift_line_numbers(line_number + 1, delta);

        let targets: Vec<(AnchorId, usize)> = self
            .anchors_on_line(line)
            .filter_map(|a| match a.column {
                None if a.policy.insert == InsertPolicy::Later => Some((a.id, 0)),
                Some(c) if moves_on_insert(a, column) => {
                    Some((a.id, c - column + column_in_new_last_line))
                }
                _ => None,
            })
            .collect();

        for (id, new_column) in &targets {
            self.relocate(*id, new_last_line, new_last_line_number, *new_column);
        }
        let ids: Vec<AnchorId> = targets.into_iter().map(|(id, _)| id).collect();
        self.record_shifted(&ids);
    }

    /// Classify the anchors that `delete_count` characters at `column` of
    /// `line` cover, before the text changes.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn handle_predeletion_for_line(
        &self,
        line: LineId,
        column: usize,
        delete_count: usize,
        line_len: usize,
        remove_list: &mut Vec<AnchorId>,
        shift_list: &mut Vec<AnchorId>,
        is_first_line: bool,
    ) {
        debug_assert!(self.is_mutating(), "anchor hook outside a mutation");
        if delete_count == 0 {
            return;
        }
        let entire_line = delete_count == line_len;
        let last_column = if entire_line {
            usize::MAX
        } else {
            column + delete_count - 1
        };

        for anchor in self.anchors_on_line(line) {
            let covered = match anchor.column {
                None => entire_line && !is_first_line,
                Some(c) => c >= column && c <= last_column,
            };
            if covered {
                match anchor.policy.delete {
                    DeletePolicy::Remove => remove_list.push(anchor.id),
                    DeletePolicy::Clamp => shift_list.push(anchor.id),
                }
            }
        }
    }

    /// Queue the anchors on the untouched tail of `last_line` for relocation
    /// onto `first_line`.
    pub(crate) fn handle_deletion_last_line_leftover(
        &self,
        leftover_list: &mut Vec<AnchorId>,
        first_line: LineId,
        last_line: LineId,
        first_untouched_column: usize,
    ) {
        debug_assert!(self.is_mutating(), "anchor hook outside a mutation");
        for anchor in self.anchors_on_line(last_line) {
            let leftover = match anchor.column {
                None => first_line != last_line,
                Some(c) => c >= first_untouched_column,
            };
            if leftover {
                leftover_list.push(anchor.id);
            }
        }
    }

    /// Apply the classification gathered during a deletion.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn handle_deletion_finished(
        &mut self,
        remove_list: &[AnchorId],
        shift_list: &[AnchorId],
        leftover_list: &[AnchorId],
        first_line: LineId,
        first_line_number: usize,
        first_column: usize,
        deleted_line_count: usize,
        first_untouched_column: usize,
    ) {
        debug_assert!(self.is_mutating(), "anchor hook outside a mutation");
        for id in remove_list {
            self.remove_anchor(*id);
        }

        for id in shift_list {
            self.relocate(*id, first_line, first_line_number, first_column);
        }
        self.record_shifted(shift_list);

        for id in leftover_list {
            let column = self
                .anchors
                .get(id)
                .and_then(|a| a.column)
                .map_or(0, |c| c - first_untouched_column + first_column);
            self.relocate(*id, first_line, first_line_number, column);
        }
        self.record_shifted(leftover_list);

        if deleted_line_count > 0 {
            self.shift_line_numbers(
                first_line_number + deleted_line_count + 1,
                -(deleted_line_count as isize),
            );
        }
    }
}

fn moves_on_insert(anchor: &Anchor, column: usize) -> bool {
    match anchor.column {
        Some(c) => c > column || (c == column && anchor.policy.insert == InsertPolicy::Later),
        None => false,
    }
}
