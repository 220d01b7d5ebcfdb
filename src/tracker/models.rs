use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::TrackerError;

/// Number of hour slots on an inspection shift.
pub const HOURS_PER_SHIFT: i64 = 12;

/// Upper bound for any piece or defect count recorded for one hour.
pub const MAX_PIECES: i64 = 1_000_000;

// ── Lenient numbers ───────────────────────────────────────────────────

/// Coerce a JSON form value into a finite number.
///
/// Client forms post numeric fields as strings, empty strings or `null`.
/// Anything that is not a finite number counts as zero.
pub fn to_number_or_zero(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return 0.0;
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        }
        Value::Bool(true) => 1.0,
        _ => 0.0,
    }
}

/// `deserialize_with` adapters for form values.
pub mod lenient {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::to_number_or_zero;

    /// Text field that may arrive as a number or boolean. `null` is empty.
    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(other) => Err(D::Error::custom(format!(
                "expected text, found {}",
                if other.is_array() { "an array" } else { "an object" }
            ))),
        }
    }

    /// Absent or `null` stays `None`; anything else is coerced.
    pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().map(to_number_or_zero))
    }

    /// Whole-piece counts. Fractions are truncated.
    pub fn count<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().map_or(0.0, to_number_or_zero).trunc() as i64)
    }

    pub fn opt_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .map(|v| to_number_or_zero(v).trunc() as i64))
    }
}

// ── Hour labels ───────────────────────────────────────────────────────

/// English ordinal for `n`: 1st, 2nd, 3rd, 4th, 11th, 21st, 112th.
pub fn ordinal(n: i64) -> String {
    let suffix = match (n % 100, n % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Display label of an hour slot, e.g. `"3rd Hour"`.
pub fn hour_label(hour: i64) -> String {
    format!("{} Hour", ordinal(hour))
}

/// Parse an hour label such as `"3rd Hour"`, `"3rd"` or `"3"`.
pub fn parse_hour_label(label: &str) -> Option<i64> {
    let trimmed = label.trim();
    let head = trimmed
        .strip_suffix("Hour")
        .or_else(|| trimmed.strip_suffix("hour"))
        .unwrap_or(trimmed)
        .trim();
    let digits_end = head
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(head.len(), |(i, _)| i);
    let (digits, suffix) = head.split_at(digits_end);
    if !matches!(suffix.to_ascii_lowercase().as_str(), "" | "st" | "nd" | "rd" | "th") {
        return None;
    }
    digits.parse::<i64>().ok().filter(|h| *h >= 1)
}

/// Hour slot from a JSON value: a label string or a whole positive number.
pub fn parse_hour(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|h| h.is_finite() && *h >= 1.0 && h.fract() == 0.0)
            .map(|h| h as i64),
        Value::String(s) => parse_hour_label(s),
        _ => None,
    }
}

// ── Dates ─────────────────────────────────────────────────────────────

/// Today's date in the server's local timezone.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Parse a `YYYY-MM-DD` date, tolerating a trailing time part.
/// Blank or missing input means today.
pub fn parse_date(raw: Option<&str>) -> Result<NaiveDate, TrackerError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(today()),
        Some(s) => {
            let day = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|_| TrackerError::InvalidDate(s.to_string()))
        }
    }
}

// ── Shared snapshots ──────────────────────────────────────────────────

/// Quality user snapshot stored on inspection records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    pub user_name: String,
}

/// Production user snapshot (no secrets).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductionUser {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, alias = "Production_user_name")]
    pub production_user_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "user_name")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Line metadata shared by registrations and inspection top inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineInfo {
    #[serde(default, deserialize_with = "lenient::text")]
    pub building: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub floor: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub line: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub buyer: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub style: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub item: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub color: String,
}

impl LineInfo {
    pub fn trimmed(self) -> Self {
        Self {
            building: self.building.trim().to_string(),
            floor: self.floor.trim().to_string(),
            line: self.line.trim().to_string(),
            buyer: self.buyer.trim().to_string(),
            style: self.style.trim().to_string(),
            item: self.item.trim().to_string(),
            color: self.color.trim().to_string(),
        }
    }
}

// ── Entities ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Register {
    pub id: i64,
    #[serde(flatten)]
    pub line_info: LineInfo,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionTop {
    pub id: i64,
    pub user: UserRef,
    pub report_date: NaiveDate,
    #[serde(flatten)]
    pub line_info: LineInfo,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectedDefect {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::count")]
    pub quantity: i64,
}

/// Quantities recorded for one inspection hour.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InspectionCounts {
    pub selected_defects: Vec<SelectedDefect>,
    pub total_defects: i64,
    pub defective_pcs: i64,
    pub inspected_qty: i64,
    pub passed_qty: i64,
    pub after_repair: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyInspection {
    pub id: i64,
    pub user: UserRef,
    pub report_date: NaiveDate,
    pub hour: i64,
    pub hour_label: String,
    #[serde(flatten)]
    pub counts: InspectionCounts,
    pub created_at: String,
    pub updated_at: String,
}

/// Production figures a supervisor enters once per day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeaderFigures {
    pub operator_to: f64,
    pub manpower_present: f64,
    pub manpower_absent: f64,
    pub working_hour: f64,
    pub plan_quantity: f64,
    /// Percent, e.g. `90` for 90%.
    pub plan_efficiency: f64,
    pub today_target: f64,
    pub achieve: f64,
    pub smv: f64,
}

/// Header figures as posted by the form. `None` leaves a field unchanged on
/// update and counts as zero on create.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigureInputs {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub operator_to: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub manpower_present: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub manpower_absent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub working_hour: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub plan_quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub plan_efficiency: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub today_target: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub achieve: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub smv: Option<f64>,
}

impl FigureInputs {
    fn named(&self) -> [(&'static str, Option<f64>); 9] {
        [
            ("operatorTo", self.operator_to),
            ("manpowerPresent", self.manpower_present),
            ("manpowerAbsent", self.manpower_absent),
            ("workingHour", self.working_hour),
            ("planQuantity", self.plan_quantity),
            ("planEfficiency", self.plan_efficiency),
            ("todayTarget", self.today_target),
            ("achieve", self.achieve),
            ("smv", self.smv),
        ]
    }

    /// One message per negative field.
    pub fn validate(&self) -> Vec<String> {
        self.named()
            .iter()
            .filter(|(_, v)| v.is_some_and(|v| v < 0.0))
            .map(|(name, _)| format!("{} must be a non-negative number", name))
            .collect()
    }

    pub fn apply_to(&self, figures: &mut HeaderFigures) {
        let slots: [(&mut f64, Option<f64>); 9] = [
            (&mut figures.operator_to, self.operator_to),
            (&mut figures.manpower_present, self.manpower_present),
            (&mut figures.manpower_absent, self.manpower_absent),
            (&mut figures.working_hour, self.working_hour),
            (&mut figures.plan_quantity, self.plan_quantity),
            (&mut figures.plan_efficiency, self.plan_efficiency),
            (&mut figures.today_target, self.today_target),
            (&mut figures.achieve, self.achieve),
            (&mut figures.smv, self.smv),
        ];
        for (slot, value) in slots {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }

    pub fn to_figures(&self) -> HeaderFigures {
        let mut figures = HeaderFigures::default();
        self.apply_to(&mut figures);
        figures
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionHeader {
    pub id: i64,
    pub header_date: NaiveDate,
    pub production_user: ProductionUser,
    pub quality_user: Option<QualityUser>,
    #[serde(flatten)]
    pub figures: HeaderFigures,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyProduction {
    pub id: i64,
    pub header_id: i64,
    pub hour: i64,
    pub achieved_qty: f64,
    pub base_target_per_hour: f64,
    pub dynamic_target: f64,
    pub variance_qty: f64,
    pub hourly_efficiency: f64,
    pub achieve_efficiency: f64,
    pub total_efficiency: f64,
    pub production_user: ProductionUser,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaLink {
    pub id: i64,
    pub user: UserRef,
    pub image_src: String,
    pub video_src: String,
    pub created_at: String,
    pub updated_at: String,
}
