use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Absent,
    Late,
    #[default]
    Present,
}

impl AttendanceStatus {
    /// Unrecognised values fall back to `Present`, which never counts.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "absent" => Self::Absent,
            "late" => Self::Late,
            _ => Self::Present,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Late => "late",
            Self::Present => "present",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: AttendanceStatus,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_validated: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_justified: bool,
    #[serde(default, deserialize_with = "lenient_hours")]
    pub absence_hours: f64,
}

impl AttendanceEvent {
    pub fn absence(hours: f64) -> Self {
        Self {
            status: AttendanceStatus::Absent,
            absence_hours: hours,
            ..Self::default()
        }
    }

    pub fn late() -> Self {
        Self {
            status: AttendanceStatus::Late,
            ..Self::default()
        }
    }

    pub fn present() -> Self {
        Self::default()
    }

    pub fn validated(mut self) -> Self {
        self.is_validated = true;
        self
    }

    pub fn justified(mut self) -> Self {
        self.is_justified = true;
        self
    }
}

/// Parses an hour count the way the entry forms do: anything that is not a
/// finite, non-negative number becomes `0`.
pub fn coerce_hours(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

fn lenient_status<'de, D>(deserializer: D) -> Result<AttendanceStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => AttendanceStatus::parse(&s),
        _ => AttendanceStatus::Present,
    })
}

fn lenient_hours<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => coerce_hours(&s),
        _ => 0.0,
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::String(s)) => parse_flag(&s),
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

/// Accepts the spellings found in spreadsheet imports; everything else is `false`.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y" | "oui"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisciplinaryStatus {
    pub text: &'static str,
    pub color: &'static str,
    /// 0 for `NORMAL`, rising by one per tier.
    #[serde(skip)]
    pub severity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub total_absence_hours: f64,
    pub disciplinary_status: DisciplinaryStatus,
    pub disciplinary_note: f64,
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub trainee_id: Uuid,
    pub trainee_name: String,
    pub trainee_email: String,
    pub group_name: String,
    pub event: AttendanceEvent,
    pub occurred_on: NaiveDate,
    pub note: String,
    pub source_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraineeSummary {
    pub trainee_id: Uuid,
    pub trainee_name: String,
    pub trainee_email: String,
    pub group_name: String,
    pub late_count: usize,
    pub event_count: usize,
    #[serde(flatten)]
    pub result: AggregateResult,
    pub points_note: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub group_name: String,
    pub trainee_count: usize,
    pub total_absence_hours: f64,
    pub flagged_count: usize,
    pub average_note: f64,
}
