// Row addressing: which characteristic every row belongs to
use crate::model::{MAX_MARKER, MAX_TIMEFRAME, Plan, Row, TIMEFRAME};
use std::ops::Range;

/// How a row relates to the characteristic it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLink {
    /// Column-title row ("Группировка").
    Header,
    /// Row carrying its own `grouping` label.
    Named,
    /// Unlabelled row continuing the named row at `parent`.
    Continuation { parent: usize },
    /// Unlabelled row with no plan values or nothing to continue.
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRow {
    pub link: RowLink,
    /// Characteristic name; `None` for header and detached rows.
    pub characteristic: Option<String>,
}

impl IndexedRow {
    pub fn is_continuation(&self) -> bool {
        matches!(self.link, RowLink::Continuation { .. })
    }
}

/// Parent links and characteristic names for every row of a table, built in
/// one pass when the table is loaded or edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowIndex {
    entries: Vec<IndexedRow>,
}

impl RowIndex {
    pub fn build(rows: &[Row]) -> Self {
        let mut entries = Vec::with_capacity(rows.len());
        // position and label of the most recent named row
        let mut parent: Option<(usize, String)> = None;

        for (pos, row) in rows.iter().enumerate() {
            let grouping = row.grouping();

            let entry = if row.is_header() {
                IndexedRow {
                    link: RowLink::Header,
                    characteristic: None,
                }
            } else if !grouping.is_empty() {
                parent = Some((pos, grouping.clone()));
                IndexedRow {
                    link: RowLink::Named,
                    characteristic: Some(grouping),
                }
            } else {
                match &parent {
                    Some((parent_pos, parent_name)) if row.has_plan_values() => IndexedRow {
                        link: RowLink::Continuation { parent: *parent_pos },
                        characteristic: Some(continuation_name(parent_name, row)),
                    },
                    _ => IndexedRow {
                        link: RowLink::Detached,
                        characteristic: None,
                    },
                }
            };
            entries.push(entry);
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&IndexedRow> {
        self.entries.get(pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &IndexedRow)> {
        self.entries.iter().enumerate()
    }

    /// Rows that travel with the row at `pos`: a named row together with its
    /// continuations and the detached rows after it, any other row alone.
    pub fn block(&self, pos: usize) -> Range<usize> {
        let mut end = pos + 1;
        if self.get(pos).is_some_and(|e| e.link == RowLink::Named) {
            while let Some(entry) = self.get(end) {
                match entry.link {
                    RowLink::Continuation { parent } if parent == pos => end += 1,
                    RowLink::Detached => end += 1,
                    _ => break,
                }
            }
        }
        pos..end
    }

    /// Position of the first row describing `characteristic`.
    pub fn position(&self, characteristic: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.characteristic.as_deref() == Some(characteristic))
    }
}

/// A continuation of "Сроки" whose cells mention "Макс" is the maximum
/// timeframe; any other continuation repeats its parent's name.
fn continuation_name(parent_name: &str, row: &Row) -> String {
    if parent_name == TIMEFRAME
        && Plan::ALL
            .iter()
            .any(|p| row.plan_value(*p).contains(MAX_MARKER))
    {
        MAX_TIMEFRAME.to_string()
    } else {
        parent_name.to_string()
    }
}

/// Finds the row describing `characteristic`; first match in document order.
pub fn find_row<'a>(rows: &'a [Row], characteristic: &str) -> Option<&'a Row> {
    RowIndex::build(rows)
        .position(characteristic)
        .and_then(|pos| rows.get(pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeframe_rows() -> Vec<Row> {
        vec![
            Row::from_pairs([("grouping", "Сроки"), ("standard", "x")]),
            Row::from_pairs([("grouping", ""), ("standard", "Макс 5")]),
        ]
    }

    #[test]
    fn max_timeframe_is_inferred_from_content() {
        let rows = timeframe_rows();
        assert!(std::ptr::eq(find_row(&rows, "Максимум сроков").unwrap(), &rows[1]));
        assert!(std::ptr::eq(find_row(&rows, "Сроки").unwrap(), &rows[0]));
    }

    #[test]
    fn continuation_inherits_parent_name() {
        let rows = vec![
            Row::from_pairs([("grouping", "Группировка"), ("standard", "Стандарт")]),
            Row::from_pairs([("grouping", "Отчеты"), ("standard", "1")]),
            Row::from_pairs([("grouping", "  "), ("expert", "2")]),
            Row::from_pairs([("grouping", ""), ("objection", "no plan values")]),
        ];
        let index = RowIndex::build(&rows);
        assert_eq!(index.get(0).unwrap().link, RowLink::Header);
        assert_eq!(index.get(1).unwrap().link, RowLink::Named);
        assert_eq!(index.get(2).unwrap().link, RowLink::Continuation { parent: 1 });
        assert_eq!(index.get(2).unwrap().characteristic.as_deref(), Some("Отчеты"));
        assert_eq!(index.get(3).unwrap().link, RowLink::Detached);
        assert_eq!(index.position("Отчеты"), Some(1));
    }

    #[test]
    fn plain_timeframe_continuation_is_not_the_maximum() {
        let rows = vec![
            Row::from_pairs([("grouping", "Сроки"), ("standard", "10 дней")]),
            Row::from_pairs([("grouping", ""), ("standard", "от 3 дней")]),
        ];
        assert!(find_row(&rows, "Максимум сроков").is_none());
        let index = RowIndex::build(&rows);
        assert_eq!(index.get(1).unwrap().characteristic.as_deref(), Some("Сроки"));
    }

    #[test]
    fn orphan_rows_and_unknown_names_miss() {
        let rows = vec![
            Row::from_pairs([("grouping", "Группировка")]),
            Row::from_pairs([("grouping", ""), ("standard", "+")]),
        ];
        assert!(find_row(&rows, "Группировка").is_none());
        assert!(find_row(&rows, "").is_none());
        assert!(find_row(&rows, "Стоимость").is_none());
        assert!(find_row(&[], "Стоимость").is_none());
    }

    #[test]
    fn max_marker_outside_timeframe_keeps_parent_name() {
        let rows = vec![
            Row::from_pairs([("grouping", "Стоимость")]),
            Row::from_pairs([("grouping", ""), ("standard", "Макс 5")]),
        ];
        assert!(find_row(&rows, "Максимум сроков").is_none());
        let index = RowIndex::build(&rows);
        assert_eq!(index.get(1).unwrap().link, RowLink::Continuation { parent: 0 });
        assert_eq!(index.get(1).unwrap().characteristic.as_deref(), Some("Стоимость"));
    }

    #[test]
    fn blocks_span_named_row_and_its_continuations() {
        let rows = vec![
            Row::from_pairs([("grouping", "Группировка")]),
            Row::from_pairs([("grouping", "Сроки"), ("standard", "10 дней")]),
            Row::from_pairs([("grouping", ""), ("standard", "Макс 30 дней")]),
            Row::from_pairs([("grouping", ""), ("objection", "note")]),
            Row::from_pairs([("grouping", "Отчеты"), ("standard", "+")]),
        ];
        let index = RowIndex::build(&rows);
        assert_eq!(index.block(0), 0..1);
        assert_eq!(index.block(1), 1..4);
        assert_eq!(index.block(2), 2..3);
        assert_eq!(index.block(4), 4..5);
    }

    #[test]
    fn first_match_wins() {
        let rows = vec![
            Row::from_pairs([("grouping", "Стоимость"), ("standard", "1")]),
            Row::from_pairs([("grouping", "Стоимость"), ("standard", "2")]),
        ];
        assert_eq!(find_row(&rows, "Стоимость").unwrap().plan_value(Plan::Standard), "1");
    }
}
