// Per-plan dashboard view built from section tables
use crate::config::AppConfig;
use crate::model::{
    fields, Document, DashboardError, PainCategory, PainKind, Plan, Row, SECTION_HEADERS, Table,
};
use crate::normalizer::{expand_abbreviations, normalize_category, row_pains};
use serde::Serialize;
use std::collections::HashMap;

/// Section used when a table carries no name.
const FALLBACK_SECTION: &str = "Прочее";

/// Display titles for the internal table names found in the data files.
const SECTION_TITLES: [(&str, &str); 16] = [
    ("gibkost", "Гибкость команды"),
    ("srochnost", "Срочность"),
    ("безопасность", "Безопасность"),
    ("целевой сервис", "Целевой сервис"),
    ("Бухгалтерия", "Бухгалтерия"),
    ("Прозрачная отчетность", "Прозрачная отчетность"),
    ("Конструкторское бюро", "Конструкторское бюро"),
    ("gisp", "ГИСП"),
    ("izmeneniya", "Изменения"),
    ("tpp", "ТПП"),
    ("podryadchiki", "Подрядчики"),
    ("Подрядчики", "Подрядчики"),
    ("kommunikacii", "Коммуникации"),
    ("Коммуникации", "Коммуникации"),
    ("podderjka", "Поддержка"),
    ("Поддержка", "Поддержка"),
];

/// One characteristic of one plan, in the shape the dashboard front end reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacteristicEntry {
    #[serde(rename = "раздел")]
    pub section: String,
    #[serde(rename = "характеристика")]
    pub characteristic: String,
    #[serde(rename = "описание")]
    pub description: String,
    #[serde(rename = "значение")]
    pub value: String,
    #[serde(rename = "возражения")]
    pub objection: String,
    #[serde(rename = "сравнение")]
    pub comparison: String,
    #[serde(rename = "сомнения")]
    pub doubts: String,
    #[serde(rename = "личные_боли")]
    pub personal_pain: String,
    #[serde(rename = "корпоративные_боли")]
    pub corporate_pain: String,
    #[serde(rename = "вопросы")]
    pub questions: String,
    pub is_section_header: bool,
    pub raw_value: String,
}

impl CharacteristicEntry {
    pub fn pains(&self, kind: PainKind) -> &str {
        match kind {
            PainKind::Personal => &self.personal_pain,
            PainKind::Corporate => &self.corporate_pain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanView {
    #[serde(skip)]
    pub plan: Plan,
    #[serde(rename = "название")]
    pub name: String,
    #[serde(rename = "цена")]
    pub price: String,
    #[serde(rename = "характеристики")]
    pub characteristics: Vec<CharacteristicEntry>,
}

/// Section titles and plan prices used while rendering.
#[derive(Debug, Clone)]
pub struct ViewSettings {
    titles: HashMap<String, String>,
    prices: HashMap<String, String>,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            titles: SECTION_TITLES
                .iter()
                .map(|(raw, title)| (raw.to_string(), title.to_string()))
                .collect(),
            prices: HashMap::new(),
        }
    }
}

impl ViewSettings {
    /// Built-in titles with the configured overrides on top.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut settings = Self::default();
        settings.titles.extend(config.section_titles.clone());
        settings.prices = config.plan_prices.clone();
        settings
    }

    pub fn section_title(&self, raw: &str) -> String {
        if raw.is_empty() {
            return FALLBACK_SECTION.to_string();
        }
        self.titles
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }

    pub fn price(&self, plan: Plan) -> String {
        self.prices
            .get(plan.key())
            .cloned()
            .unwrap_or_else(|| plan.default_price().to_string())
    }
}

/// Cell text shown for a plan: blanks and spreadsheet formulas become "-".
fn cell_value(row: &Row, plan: Plan) -> String {
    let value = row.plan_value(plan);
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('=') {
        "-".to_string()
    } else {
        value.into_owned()
    }
}

/// Renders one table into per-plan characteristic lists.
pub fn build_table_view(table: &Table, settings: &ViewSettings) -> Vec<PlanView> {
    let section = settings.section_title(table.name());
    let mut per_plan: Vec<Vec<CharacteristicEntry>> = vec![Vec::new(); Plan::ALL.len()];

    for (pos, indexed) in table.index().iter() {
        let (Some(name), Some(row)) = (indexed.characteristic.as_deref(), table.rows().get(pos))
        else {
            continue;
        };

        let personal_pain = row_pains(row, PainKind::Personal);
        let corporate_pain = row_pains(row, PainKind::Corporate);
        let advantages = row.text(fields::ADVANTAGES);
        let description = if advantages.is_empty() {
            row.text(fields::CHARACTERISTICS).into_owned()
        } else {
            advantages.into_owned()
        };
        let questions = row.text(fields::QUESTIONS).into_owned();
        let objection = row.text(fields::OBJECTION).into_owned();
        let is_section_header = !indexed.is_continuation() && SECTION_HEADERS.contains(&name);

        for (slot, plan) in Plan::ALL.into_iter().enumerate() {
            let raw_value = cell_value(row, plan);
            per_plan[slot].push(CharacteristicEntry {
                section: section.clone(),
                characteristic: name.to_string(),
                description: description.clone(),
                value: expand_abbreviations(&raw_value),
                objection: objection.clone(),
                comparison: String::new(),
                doubts: questions.clone(),
                personal_pain: personal_pain.clone(),
                corporate_pain: corporate_pain.clone(),
                questions: questions.clone(),
                is_section_header,
                raw_value,
            });
        }
    }

    collect_plans(per_plan, settings)
}

/// Renders every table of a document.
pub fn build_plan_view(document: &Document, settings: &ViewSettings) -> Vec<PlanView> {
    merge_plan_views(
        document
            .tables()
            .iter()
            .map(|table| build_table_view(table, settings)),
        settings,
    )
}

/// Concatenates several views plan by plan, keeping the fixed plan order.
pub fn merge_plan_views<I>(views: I, settings: &ViewSettings) -> Vec<PlanView>
where
    I: IntoIterator<Item = Vec<PlanView>>,
{
    let mut per_plan: Vec<Vec<CharacteristicEntry>> = vec![Vec::new(); Plan::ALL.len()];
    for view in views {
        for plan_view in view {
            if let Some(slot) = Plan::ALL.iter().position(|p| *p == plan_view.plan) {
                per_plan[slot].extend(plan_view.characteristics);
            }
        }
    }
    collect_plans(per_plan, settings)
}

fn collect_plans(per_plan: Vec<Vec<CharacteristicEntry>>, settings: &ViewSettings) -> Vec<PlanView> {
    Plan::ALL
        .into_iter()
        .zip(per_plan)
        .filter(|(_, characteristics)| !characteristics.is_empty())
        .map(|(plan, characteristics)| PlanView {
            plan,
            name: plan.title().to_string(),
            price: settings.price(plan),
            characteristics,
        })
        .collect()
}

/// Selection of characteristics by pain kind and categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanFilter {
    pub pain_kind: Option<PainKind>,
    /// `Some` once the caller asked for categories, even if none were recognized.
    pub categories: Option<Vec<PainCategory>>,
}

impl PlanFilter {
    pub fn parse(pain_type: Option<&str>, categories: Option<&str>) -> Result<Self, DashboardError> {
        let pain_kind = match pain_type.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(PainKind::parse(raw).ok_or_else(|| {
                DashboardError::InvalidRequest(format!("unknown pain type '{}'", raw))
            })?),
            None => None,
        };
        let categories = categories
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.split(',').filter_map(normalize_category).collect());
        Ok(Self {
            pain_kind,
            categories,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.pain_kind.is_none() && self.categories.is_none()
    }

    pub fn matches(&self, entry: &CharacteristicEntry) -> bool {
        match (self.pain_kind, &self.categories) {
            (None, None) => true,
            (Some(kind), wanted) => {
                let field = entry.pains(kind);
                if field.trim().is_empty() {
                    return false;
                }
                match wanted {
                    Some(wanted) => intersects(&tags(field), wanted),
                    None => true,
                }
            }
            (None, Some(wanted)) => {
                let mut all = tags(&entry.personal_pain);
                all.extend(tags(&entry.corporate_pain));
                intersects(&all, wanted)
            }
        }
    }
}

fn tags(field: &str) -> Vec<PainCategory> {
    field.split(',').filter_map(normalize_category).collect()
}

fn intersects(have: &[PainCategory], wanted: &[PainCategory]) -> bool {
    have.iter().any(|c| wanted.contains(c))
}

/// Keeps only matching characteristics; plans left empty are dropped.
pub fn filter_plans(plans: Vec<PlanView>, filter: &PlanFilter) -> Vec<PlanView> {
    if filter.is_empty() {
        return plans;
    }
    plans
        .into_iter()
        .filter_map(|mut plan| {
            plan.characteristics.retain(|entry| filter.matches(entry));
            (!plan.characteristics.is_empty()).then_some(plan)
        })
        .collect()
}
