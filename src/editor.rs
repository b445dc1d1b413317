// In-memory edits of section tables
use crate::model::{fields, DashboardError, Document, PainKind, Plan, Row, Table};
use crate::normalizer::{consolidate_pains, consolidate_row};
use crate::resolver::RowLink;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// A single field change requested by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Value { plan: Plan, value: String },
    Description(String),
    Questions(String),
    PersonalPain(String),
    CorporatePain(String),
}

impl FieldUpdate {
    /// Builds an update from the wire names used by the dashboard.
    pub fn parse(
        field_type: &str,
        plan_name: Option<&str>,
        value: String,
    ) -> Result<Self, DashboardError> {
        match field_type {
            "value" => {
                let name = plan_name.filter(|p| !p.trim().is_empty()).ok_or_else(|| {
                    DashboardError::InvalidRequest("plan name is required for a value".into())
                })?;
                let plan = Plan::parse(name).ok_or_else(|| {
                    DashboardError::InvalidRequest(format!("unknown plan '{}'", name))
                })?;
                Ok(FieldUpdate::Value { plan, value })
            }
            "description" | "advantages" => Ok(FieldUpdate::Description(value)),
            "questions" => Ok(FieldUpdate::Questions(value)),
            "personal_pain" => Ok(FieldUpdate::PersonalPain(value)),
            "corporate_pain" => Ok(FieldUpdate::CorporatePain(value)),
            other => Err(DashboardError::InvalidRequest(format!(
                "unknown field type '{}'",
                other
            ))),
        }
    }
}

/// Applies an update to a row. Pain edits are consolidated and clear the
/// legacy columns of their own kind only.
pub fn apply_field_update(row: &mut Row, update: FieldUpdate) {
    match update {
        FieldUpdate::Value { plan, value } => row.set(plan.key(), value),
        FieldUpdate::Description(value) => row.set(fields::ADVANTAGES, value),
        FieldUpdate::Questions(value) => row.set(fields::QUESTIONS, value),
        FieldUpdate::PersonalPain(value) => set_pains(row, PainKind::Personal, &value),
        FieldUpdate::CorporatePain(value) => set_pains(row, PainKind::Corporate, &value),
    }
}

fn set_pains(row: &mut Row, kind: PainKind, raw: &str) {
    row.set(kind.field(), consolidate_pains([raw]));
    for column in kind.legacy_columns() {
        row.set(column, "");
    }
}

/// Resolves `characteristic` in the table and applies the update to its row.
pub fn update_characteristic(
    table: &mut Table,
    characteristic: &str,
    update: FieldUpdate,
) -> Result<(), DashboardError> {
    let pos = table
        .index()
        .position(characteristic)
        .ok_or_else(|| DashboardError::CharacteristicNotFound(characteristic.to_string()))?;
    table.edit_rows(|rows| apply_field_update(&mut rows[pos], update));
    Ok(())
}

/// Values of a characteristic added from the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCharacteristic {
    pub name: String,
    #[serde(default = "dash")]
    pub standard: String,
    #[serde(default = "dash")]
    pub expert: String,
    #[serde(default = "dash")]
    pub optimal: String,
    #[serde(default = "dash")]
    pub express: String,
    #[serde(default = "dash")]
    pub ultra: String,
    #[serde(default)]
    pub advantages: String,
    #[serde(default)]
    pub questions: String,
    #[serde(default)]
    pub personal_pain: String,
    #[serde(default)]
    pub corporate_pain: String,
}

fn dash() -> String {
    "-".to_string()
}

impl NewCharacteristic {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            standard: dash(),
            expert: dash(),
            optimal: dash(),
            express: dash(),
            ultra: dash(),
            advantages: String::new(),
            questions: String::new(),
            personal_pain: String::new(),
            corporate_pain: String::new(),
        }
    }

    fn into_row(self) -> Row {
        Row::from_pairs([
            (fields::GROUPING, self.name.as_str()),
            (fields::OBJECTION, ""),
            (fields::PERSONAL_PAIN, self.personal_pain.as_str()),
            (fields::CORPORATE_PAIN, self.corporate_pain.as_str()),
            (Plan::Standard.key(), self.standard.as_str()),
            (Plan::Expert.key(), self.expert.as_str()),
            (Plan::Optimal.key(), self.optimal.as_str()),
            (Plan::Express.key(), self.express.as_str()),
            (Plan::Ultra.key(), self.ultra.as_str()),
            (fields::ADVANTAGES, self.advantages.as_str()),
            (fields::QUESTIONS, self.questions.as_str()),
        ])
    }
}

pub fn add_characteristic(table: &mut Table, characteristic: NewCharacteristic) {
    let row = characteristic.into_row();
    table.edit_rows(|rows| rows.push(row));
}

/// Renames the first row labelled `old`.
pub fn rename_characteristic(
    table: &mut Table,
    old: &str,
    new: &str,
) -> Result<(), DashboardError> {
    let pos = table
        .rows()
        .iter()
        .position(|row| row.grouping() == old)
        .ok_or_else(|| DashboardError::CharacteristicNotFound(old.to_string()))?;
    table.edit_rows(|rows| rows[pos].set(fields::GROUPING, new));
    Ok(())
}

/// Removes the row the index resolves for `characteristic`. A named row goes
/// together with its continuation rows so they never attach to the previous
/// characteristic; a continuation (e.g. "Максимум сроков") goes alone.
pub fn delete_characteristic(
    table: &mut Table,
    characteristic: &str,
) -> Result<Vec<Row>, DashboardError> {
    let index = table.index();
    let pos = index
        .position(characteristic)
        .ok_or_else(|| DashboardError::CharacteristicNotFound(characteristic.to_string()))?;
    let span = index.block(pos);
    Ok(table.edit_rows(|rows| rows.drain(span).collect()))
}

/// Puts named rows in the requested order after the header row, each moved
/// with its continuation rows. Blocks not mentioned keep their relative
/// order at the end; no row is dropped.
pub fn reorder_characteristics(table: &mut Table, order: &[String]) {
    let index = table.index();
    if index.is_empty() {
        return;
    }

    let lead = if index.get(0).is_some_and(|e| e.link == RowLink::Header) {
        0..1
    } else {
        0..0
    };
    let mut blocks: Vec<(Option<String>, Range<usize>)> = Vec::new();
    let mut pos = lead.end;
    while pos < index.len() {
        let span = index.block(pos);
        let name = index
            .get(pos)
            .filter(|e| e.link == RowLink::Named)
            .map(|_| table.rows()[pos].grouping());
        pos = span.end;
        blocks.push((name, span));
    }

    let mut sequence = vec![lead];
    let mut taken = vec![false; blocks.len()];
    for wanted in order {
        let wanted = wanted.trim();
        let found = blocks
            .iter()
            .enumerate()
            .position(|(i, (name, _))| !taken[i] && name.as_deref() == Some(wanted));
        if let Some(i) = found {
            taken[i] = true;
            sequence.push(blocks[i].1.clone());
        }
    }
    for (i, (_, span)) in blocks.into_iter().enumerate() {
        if !taken[i] {
            sequence.push(span);
        }
    }

    table.edit_rows(|rows| {
        let mut slots: Vec<Option<Row>> = rows.drain(..).map(Some).collect();
        for span in sequence {
            rows.extend(span.filter_map(|i| slots[i].take()));
        }
        debug_assert!(slots.iter().all(Option::is_none));
    });
}

/// A row listed in the section editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacteristicSummary {
    pub index: usize,
    pub name: String,
    pub personal_pain: String,
    pub corporate_pain: String,
}

/// Every row after the header, numbered from 1.
pub fn list_characteristics(table: &Table) -> Vec<CharacteristicSummary> {
    table
        .rows()
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, row)| CharacteristicSummary {
            index,
            name: row.text(fields::GROUPING).into_owned(),
            personal_pain: row.text(fields::PERSONAL_PAIN).into_owned(),
            corporate_pain: row.text(fields::CORPORATE_PAIN).into_owned(),
        })
        .collect()
}

/// Table for a new section: only the column-title row.
pub fn new_section_table(name: &str) -> Table {
    let header = Row::from_pairs([
        (fields::GROUPING, "Группировка"),
        (fields::OBJECTION, "Возражения"),
        (fields::PERSONAL_PAIN, "Боли личные"),
        (fields::CORPORATE_PAIN, "Боли корп"),
        (Plan::Standard.key(), Plan::Standard.title()),
        (Plan::Expert.key(), Plan::Expert.title()),
        (Plan::Optimal.key(), Plan::Optimal.title()),
        (Plan::Express.key(), Plan::Express.title()),
        (Plan::Ultra.key(), Plan::Ultra.title()),
        (fields::ADVANTAGES, "Преимущества"),
        (fields::QUESTIONS, "Вопросы"),
    ]);
    Table::on_sheet(name, "Лист1", vec![header])
}

/// Folds legacy pain columns into the canonical fields for every data row.
/// Returns how many rows changed.
pub fn consolidate_table(table: &mut Table) -> usize {
    table.edit_rows(|rows| {
        let mut changed = 0;
        for row in rows.iter_mut().filter(|row| !row.is_header()) {
            let personal = consolidate_row(row, PainKind::Personal);
            let corporate = consolidate_row(row, PainKind::Corporate);
            if personal || corporate {
                changed += 1;
            }
        }
        changed
    })
}

pub fn consolidate_document(document: &mut Document) -> usize {
    let mut changed = 0;
    for table in document.tables_mut() {
        let count = consolidate_table(table);
        debug!("Consolidated table '{}': {} rows changed", table.name(), count);
        changed += count;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(
            "srochnost",
            vec![
                Row::from_pairs([("grouping", "Группировка"), ("personal_pain", "Боли личные")]),
                Row::from_pairs([("grouping", "Сроки"), ("standard", "10 дней")]),
                Row::from_pairs([("grouping", ""), ("standard", "Макс 30 дней")]),
                Row::from_pairs([
                    ("grouping", "Отчеты"),
                    ("personal_pain", "Легкость"),
                    ("column11", "Безоп"),
                    ("column12", "x"),
                    ("column14", "Эконом"),
                    ("column16", "Сроки"),
                ]),
            ],
        )
    }

    #[test]
    fn parse_maps_wire_names() {
        assert_eq!(
            FieldUpdate::parse("value", Some("Эксперт"), "+".into()).unwrap(),
            FieldUpdate::Value { plan: Plan::Expert, value: "+".into() }
        );
        assert_eq!(
            FieldUpdate::parse("advantages", None, "d".into()).unwrap(),
            FieldUpdate::Description("d".into())
        );
        assert!(FieldUpdate::parse("value", None, "+".into()).is_err());
        assert!(FieldUpdate::parse("value", Some("Premium"), "+".into()).is_err());
        assert!(FieldUpdate::parse("price", None, "1".into()).is_err());
    }

    #[test]
    fn value_update_targets_synthetic_row() {
        let mut t = table();
        let update = FieldUpdate::Value { plan: Plan::Ultra, value: "Макс 14 дней".into() };
        update_characteristic(&mut t, "Максимум сроков", update).unwrap();
        assert_eq!(t.rows()[2].plan_value(Plan::Ultra), "Макс 14 дней");
        assert_eq!(t.rows()[1].plan_value(Plan::Ultra), "");
    }

    #[test]
    fn pain_update_blanks_only_its_legacy_columns() {
        let mut t = table();
        update_characteristic(
            &mut t,
            "Отчеты",
            FieldUpdate::PersonalPain("Эконом, экономия, Безопастность".into()),
        )
        .unwrap();
        let row = &t.rows()[3];
        assert_eq!(row.text("personal_pain"), "Экономия, Безопасность");
        assert_eq!(row.text("column11"), "");
        assert_eq!(row.text("column12"), "");
        assert_eq!(row.text("column14"), "Эконом");
        assert_eq!(row.text("column16"), "Сроки");

        update_characteristic(&mut t, "Отчеты", FieldUpdate::CorporatePain("Лекость".into())).unwrap();
        let row = &t.rows()[3];
        assert_eq!(row.text("corporate_pain"), "Легкость");
        assert_eq!(row.text("column14"), "");
        assert_eq!(row.text("column16"), "");
    }

    #[test]
    fn missing_characteristic_is_reported() {
        let mut t = table();
        let err = update_characteristic(&mut t, "Нет такой", FieldUpdate::Questions("?".into()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn add_rename_and_delete() {
        let mut t = table();
        add_characteristic(&mut t, NewCharacteristic::named("Гарантия"));
        assert_eq!(t.index().position("Гарантия"), Some(4));
        assert_eq!(t.rows()[4].plan_value(Plan::Express), "-");

        rename_characteristic(&mut t, "Гарантия", "Гарантия качества").unwrap();
        assert_eq!(t.index().position("Гарантия"), None);
        assert_eq!(t.index().position("Гарантия качества"), Some(4));

        let removed = delete_characteristic(&mut t, "Максимум сроков").unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].plan_value(Plan::Standard), "Макс 30 дней");
        assert_eq!(t.rows().len(), 4);
        assert!(delete_characteristic(&mut t, "Максимум сроков").is_err());
    }

    #[test]
    fn reorder_keeps_header_and_every_row() {
        let mut t = table();
        reorder_characteristics(&mut t, &["Отчеты".to_string(), "Сроки".to_string(), "Нет".to_string()]);
        let labels: Vec<_> = t.rows().iter().map(|r| r.grouping()).collect();
        assert_eq!(labels, ["Группировка", "Отчеты", "Сроки", ""]);
        assert_eq!(t.rows().len(), 4);
        assert_eq!(t.index().position("Максимум сроков"), Some(3));
    }

    fn names(t: &Table) -> Vec<String> {
        t.index()
            .iter()
            .filter_map(|(_, e)| e.characteristic.clone())
            .collect()
    }

    #[test]
    fn reorder_moves_continuations_with_their_row() {
        let mut t = Table::new(
            "srochnost",
            vec![
                Row::from_pairs([("grouping", "Группировка")]),
                Row::from_pairs([("grouping", "Сроки"), ("standard", "10 дней")]),
                Row::from_pairs([("grouping", ""), ("standard", "Макс 30 дней")]),
                Row::from_pairs([("grouping", "Отчеты"), ("standard", "+")]),
                Row::from_pairs([("grouping", "Гарантия"), ("standard", "-")]),
            ],
        );
        reorder_characteristics(&mut t, &["Сроки".to_string(), "Отчеты".to_string()]);
        assert_eq!(names(&t), ["Сроки", "Максимум сроков", "Отчеты", "Гарантия"]);

        reorder_characteristics(&mut t, &[" Гарантия ".to_string(), "Отчеты".to_string()]);
        assert_eq!(names(&t), ["Гарантия", "Отчеты", "Сроки", "Максимум сроков"]);
        assert_eq!(t.rows()[4].plan_value(Plan::Standard), "Макс 30 дней");
    }

    #[test]
    fn deleting_named_row_takes_its_continuations() {
        let mut t = Table::new(
            "srochnost",
            vec![
                Row::from_pairs([("grouping", "Группировка")]),
                Row::from_pairs([("grouping", "Отчеты"), ("standard", "+")]),
                Row::from_pairs([("grouping", "Сроки"), ("standard", "10 дней")]),
                Row::from_pairs([("grouping", ""), ("standard", "от 3 дней")]),
            ],
        );
        let removed = delete_characteristic(&mut t, "Сроки").unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(names(&t), ["Отчеты"]);
        assert_eq!(t.rows().len(), 2);
    }

    #[test]
    fn listing_skips_header() {
        let list = list_characteristics(&table());
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].index, 1);
        assert_eq!(list[0].name, "Сроки");
        assert_eq!(list[2].personal_pain, "Легкость");
    }

    #[test]
    fn consolidation_moves_legacy_columns() {
        let mut doc = Document::Single(table());
        assert_eq!(consolidate_document(&mut doc), 1);
        let rows = doc.tables()[0].rows();
        assert_eq!(rows[0].text("personal_pain"), "Боли личные");
        assert_eq!(rows[3].text("personal_pain"), "Легкость, Безопасность");
        assert_eq!(rows[3].text("corporate_pain"), "Экономия, Скорость");
        for column in ["column11", "column12", "column14", "column15", "column16"] {
            assert_eq!(rows[3].text(column), "");
        }
        assert_eq!(consolidate_document(&mut doc), 0);
    }

    #[test]
    fn new_section_has_only_the_header() {
        let t = new_section_table("Логистика");
        assert_eq!(t.name(), "Логистика");
        assert_eq!(t.rows().len(), 1);
        assert!(t.rows()[0].is_header());
        assert!(list_characteristics(&t).is_empty());
    }
}
