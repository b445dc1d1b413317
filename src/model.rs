// Core structs: Row, Table, Document, plan and pain vocabularies, errors
use crate::resolver::RowIndex;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

/// Column names used by the spreadsheet export.
pub mod fields {
    pub const GROUPING: &str = "grouping";
    pub const OBJECTION: &str = "objection";
    pub const ADVANTAGES: &str = "advantages";
    pub const CHARACTERISTICS: &str = "characteristics";
    pub const QUESTIONS: &str = "questions";
    pub const PERSONAL_PAIN: &str = "personal_pain";
    pub const CORPORATE_PAIN: &str = "corporate_pain";
}

/// Labels of the rows that only repeat column titles.
pub const HEADER_LABELS: [&str; 2] = ["Группировка", "Характеристики 2"];
/// Characteristics rendered as section headers in the dashboard.
pub const SECTION_HEADERS: [&str; 2] = ["Стоимость", "Сроки"];
pub const TIMEFRAME: &str = "Сроки";
/// Synthetic characteristic: the continuation of "Сроки" holding the maximum.
pub const MAX_TIMEFRAME: &str = "Максимум сроков";
pub const MAX_MARKER: &str = "Макс";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plan {
    Standard,
    Expert,
    Optimal,
    Express,
    Ultra,
}

impl Plan {
    pub const ALL: [Plan; 5] = [
        Plan::Standard,
        Plan::Expert,
        Plan::Optimal,
        Plan::Express,
        Plan::Ultra,
    ];

    /// Column name inside a row.
    pub fn key(self) -> &'static str {
        match self {
            Plan::Standard => "standard",
            Plan::Expert => "expert",
            Plan::Optimal => "optimal",
            Plan::Express => "express",
            Plan::Ultra => "ultra",
        }
    }

    /// Name shown to managers.
    pub fn title(self) -> &'static str {
        match self {
            Plan::Standard => "Стандарт",
            Plan::Expert => "Эксперт",
            Plan::Optimal => "Оптима",
            Plan::Express => "Экспресс",
            Plan::Ultra => "Ультра",
        }
    }

    pub fn default_price(self) -> &'static str {
        match self {
            Plan::Standard => "220000",
            Plan::Expert => "400000",
            Plan::Optimal => "600000",
            Plan::Express => "900000",
            Plan::Ultra => "1350000",
        }
    }

    /// Accepts either the column name or the display title.
    pub fn parse(name: &str) -> Option<Plan> {
        let name = name.trim();
        Plan::ALL
            .into_iter()
            .find(|p| p.key().eq_ignore_ascii_case(name) || p.title() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PainCategory {
    Ease,
    Security,
    Savings,
    Speed,
}

impl PainCategory {
    pub const ALL: [PainCategory; 4] = [
        PainCategory::Ease,
        PainCategory::Security,
        PainCategory::Savings,
        PainCategory::Speed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PainCategory::Ease => "Легкость",
            PainCategory::Security => "Безопасность",
            PainCategory::Savings => "Экономия",
            PainCategory::Speed => "Скорость",
        }
    }

    /// Exact match against the canonical spelling.
    pub fn from_canonical(tag: &str) -> Option<PainCategory> {
        PainCategory::ALL.into_iter().find(|c| c.as_str() == tag)
    }
}

impl std::fmt::Display for PainCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PainKind {
    Personal,
    Corporate,
}

impl PainKind {
    /// Canonical column holding the consolidated tags.
    pub fn field(self) -> &'static str {
        match self {
            PainKind::Personal => fields::PERSONAL_PAIN,
            PainKind::Corporate => fields::CORPORATE_PAIN,
        }
    }

    /// Legacy spreadsheet columns that used to hold extra tags of this kind.
    pub fn legacy_columns(self) -> &'static [&'static str] {
        match self {
            PainKind::Personal => &["column11", "column12"],
            PainKind::Corporate => &["column14", "column15", "column16"],
        }
    }

    pub fn parse(name: &str) -> Option<PainKind> {
        match name.trim() {
            "personal" => Some(PainKind::Personal),
            "corporate" => Some(PainKind::Corporate),
            _ => None,
        }
    }
}

/// One spreadsheet row. Kept as an open JSON object so unknown columns
/// survive a rewrite; every read defaults to an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut row = Row::new();
        for (field, value) in pairs {
            row.set(field, value);
        }
        row
    }

    /// Text of a field; missing keys and nulls read as "", numbers and
    /// booleans as their JSON text.
    pub fn text(&self, field: &str) -> Cow<'_, str> {
        match self.0.get(field) {
            Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
            Some(Value::Number(n)) => Cow::Owned(n.to_string()),
            Some(Value::Bool(b)) => Cow::Owned(b.to_string()),
            _ => Cow::Borrowed(""),
        }
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.0.insert(field.to_string(), Value::String(value.into()));
    }

    /// Characteristic label with surrounding whitespace removed.
    pub fn grouping(&self) -> String {
        self.text(fields::GROUPING).trim().to_string()
    }

    pub fn plan_value(&self, plan: Plan) -> Cow<'_, str> {
        self.text(plan.key())
    }

    pub fn has_plan_values(&self) -> bool {
        Plan::ALL.iter().any(|p| !self.plan_value(*p).is_empty())
    }

    pub fn is_header(&self) -> bool {
        HEADER_LABELS.contains(&self.grouping().as_str())
    }
}

const ROWS: &str = "rows";
const TABLES: &str = "tables";

/// Pulls `key` out of `fields` as a typed value, leaving a placeholder in
/// its slot so the original key order survives a rewrite.
fn take_typed<T>(fields: &mut Map<String, Value>, key: &str) -> Result<T, serde_json::Error>
where
    T: DeserializeOwned + Default,
{
    match fields.get_mut(key) {
        Some(slot) if !slot.is_null() => serde_json::from_value(slot.take()),
        Some(_) => Ok(T::default()),
        None => {
            fields.insert(key.to_string(), Value::Null);
            Ok(T::default())
        }
    }
}

/// Writes `fields` in order, emitting `typed` in place of `key`.
fn serialize_fields<S, T>(
    serializer: S,
    fields: &Map<String, Value>,
    key: &str,
    typed: &T,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (name, value) in fields {
        if name == key {
            map.serialize_entry(name, typed)?;
        } else {
            map.serialize_entry(name, value)?;
        }
    }
    map.end()
}

/// A named sheet of rows. Table-level keys are kept as read, in file order;
/// the row index is rebuilt on load and after every structural edit.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Table {
    fields: Map<String, Value>,
    rows: Vec<Row>,
    index: RowIndex,
}

impl TryFrom<Map<String, Value>> for Table {
    type Error = serde_json::Error;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let rows: Vec<Row> = take_typed(&mut fields, ROWS)?;
        let index = RowIndex::build(&rows);
        Ok(Self { fields, rows, index })
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_fields(serializer, &self.fields, ROWS, &self.rows)
    }
}

impl Table {
    pub fn new(name: &str, rows: Vec<Row>) -> Self {
        Self::with_fields([("table_name", name)], rows)
    }

    /// Table written as `table_name`, `sheet_name`, `rows`.
    pub fn on_sheet(name: &str, sheet: &str, rows: Vec<Row>) -> Self {
        Self::with_fields([("table_name", name), ("sheet_name", sheet)], rows)
    }

    fn with_fields<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>, rows: Vec<Row>) -> Self {
        let mut fields = Map::new();
        for (key, value) in pairs {
            fields.insert(key.to_string(), Value::String(value.to_string()));
        }
        fields.insert(ROWS.to_string(), Value::Null);
        let index = RowIndex::build(&rows);
        Self { fields, rows, index }
    }

    pub fn name(&self) -> &str {
        self.fields
            .get("table_name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn set_name(&mut self, name: &str) {
        self.fields
            .insert("table_name".to_string(), Value::String(name.to_string()));
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    /// Mutates the rows and rebuilds the index afterwards.
    pub fn edit_rows<R>(&mut self, edit: impl FnOnce(&mut Vec<Row>) -> R) -> R {
        let result = edit(&mut self.rows);
        self.index = RowIndex::build(&self.rows);
        result
    }
}

/// A data file: one table, or a bundle of tables under `tables`.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub enum Document {
    Bundle {
        fields: Map<String, Value>,
        tables: Vec<Table>,
    },
    Single(Table),
}

impl TryFrom<Map<String, Value>> for Document {
    type Error = serde_json::Error;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        if fields.contains_key(TABLES) {
            let tables = take_typed(&mut fields, TABLES)?;
            Ok(Document::Bundle { fields, tables })
        } else {
            Ok(Document::Single(Table::try_from(fields)?))
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Document::Bundle { fields, tables } => serialize_fields(serializer, fields, TABLES, tables),
            Document::Single(table) => table.serialize(serializer),
        }
    }
}

impl Document {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn tables(&self) -> &[Table] {
        match self {
            Document::Bundle { tables, .. } => tables,
            Document::Single(table) => std::slice::from_ref(table),
        }
    }

    pub fn tables_mut(&mut self) -> &mut [Table] {
        match self {
            Document::Bundle { tables, .. } => tables,
            Document::Single(table) => std::slice::from_mut(table),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables().iter().find(|t| t.name() == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables_mut().iter_mut().find(|t| t.name() == name)
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, Document::Bundle { .. })
    }

    /// Drops a table from a bundle. Returns false when no table had that name
    /// or the document is a single table.
    pub fn remove_table(&mut self, name: &str) -> bool {
        match self {
            Document::Bundle { tables, .. } => {
                let before = tables.len();
                tables.retain(|t| t.name() != name);
                tables.len() != before
            }
            Document::Single(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid document name: {0}")]
    InvalidName(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user is blocked")]
    Inactive,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("user '{0}' not found")]
    UserNotFound(String),
    #[error("user '{0}' already exists")]
    UserExists(String),
    #[error("e-mail '{0}' is already in use")]
    EmailTaken(String),
    #[error("an administrator cannot block themselves")]
    SelfBlock,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("section '{0}' not found")]
    SectionNotFound(String),
    #[error("characteristic '{0}' not found")]
    CharacteristicNotFound(String),
    #[error("section '{0}' already exists")]
    SectionExists(String),
    #[error("file '{0}' already exists")]
    FileExists(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DashboardError {
    /// True for misses the caller should report as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DashboardError::SectionNotFound(_) | DashboardError::CharacteristicNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_reads_default_to_empty() {
        let row: Row = serde_json::from_str(r#"{"grouping": null, "standard": 220000}"#).unwrap();
        assert_eq!(row.text("missing"), "");
        assert_eq!(row.grouping(), "");
        assert_eq!(row.plan_value(Plan::Standard), "220000");
        assert!(row.has_plan_values());
    }

    #[test]
    fn plan_parse_accepts_key_and_title() {
        assert_eq!(Plan::parse("optimal"), Some(Plan::Optimal));
        assert_eq!(Plan::parse("Ультра"), Some(Plan::Ultra));
        assert_eq!(Plan::parse("Premium"), None);
    }

    #[test]
    fn document_shapes_are_detected() {
        let single = Document::from_json(r#"{"table_name": "gisp", "rows": []}"#).unwrap();
        assert!(!single.is_bundle());
        assert_eq!(single.tables()[0].name(), "gisp");

        let bundle = Document::from_json(
            r#"{"tables": [{"table_name": "Бухгалтерия", "rows": []}, {"table_name": "Прозрачная отчетность", "rows": []}]}"#,
        )
        .unwrap();
        assert!(bundle.is_bundle());
        assert_eq!(bundle.tables().len(), 2);
        assert!(bundle.table("Прозрачная отчетность").is_some());
    }

    #[test]
    fn rewrite_keeps_unknown_keys_and_order() {
        let text = r#"{"table_name":"tpp","sheet_name":"Лист1","rows":[{"grouping":"Гарантия","column6":"x","standard":"+"}],"source":"xlsx"}"#;
        let doc = Document::from_json(text).unwrap();
        let back: Value = serde_json::from_str(&doc.to_json_pretty().unwrap()).unwrap();
        let original: Value = serde_json::from_str(text).unwrap();
        assert_eq!(back, original);
        let keys: Vec<_> = back["rows"][0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["grouping", "column6", "standard"]);
    }

    fn top_keys(text: &str) -> Vec<String> {
        let value: Value = serde_json::from_str(text).unwrap();
        value.as_object().unwrap().keys().cloned().collect()
    }

    #[test]
    fn rewrite_keeps_table_and_bundle_key_order() {
        let text = r#"{"sheet_name":"Лист1","rows":[{"grouping":"Акты"}],"source":"xlsx","table_name":"tpp"}"#;
        let mut doc = Document::from_json(text).unwrap();
        doc.tables_mut()[0].set_name("ТПП");
        let out = doc.to_json_pretty().unwrap();
        assert_eq!(top_keys(&out), ["sheet_name", "rows", "source", "table_name"]);
        assert_eq!(Document::from_json(&out).unwrap().tables()[0].name(), "ТПП");

        let text = r#"{"version":2,"tables":[{"rows":[],"table_name":"Бухгалтерия"}],"exported":"2024-05-01"}"#;
        let doc = Document::from_json(text).unwrap();
        let out = doc.to_json_pretty().unwrap();
        assert_eq!(top_keys(&out), ["version", "tables", "exported"]);
        let back: Value = serde_json::from_str(&out).unwrap();
        let table_keys: Vec<_> = back["tables"][0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(table_keys, ["rows", "table_name"]);
    }

    #[test]
    fn new_tables_write_name_sheet_then_rows() {
        let table = Table::on_sheet("Логистика", "Лист1", vec![Row::from_pairs([("grouping", "Группировка")])]);
        let out = Document::Single(table).to_json_pretty().unwrap();
        assert_eq!(top_keys(&out), ["table_name", "sheet_name", "rows"]);
    }
}
