use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    AggregateResult, AttendanceEvent, AttendanceStatus, DisciplinaryStatus, EventRecord,
    GroupSummary, TraineeSummary,
};

/// Late arrivals that add up to one chargeable hour and to one note point.
pub const LATES_PER_PENALTY: usize = 4;
pub const MAX_NOTE: f64 = 20.0;

const TIERS: [(f64, &str, &str); 8] = [
    (40.0, "EXCL DEF (CD)", "#FF0000"),
    (35.0, "EXCL TEMP (CD)", "#FEAE00"),
    (30.0, "SUSP 2J (CD)", "#FFA500"),
    (25.0, "BLÂME (CD)", "#8B4513"),
    (20.0, "2ème MISE (CD)", "#8784b6"),
    (15.0, "1er MISE (CD)", "#a084c6"),
    (10.0, "2ème AVERT (SC)", "#191E46"),
    (5.0, "1er AVERT (SC)", "#235a8c"),
];

pub const NORMAL: DisciplinaryStatus = DisciplinaryStatus {
    text: "NORMAL",
    color: "#9FE855",
    severity: 0,
};

/// Which disciplinary note the caller wants. The two formulas disagree for the
/// same input and neither is canonical, so the choice is always explicit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteFormula {
    /// Half a point per full 2.5 hours, rounded to one decimal.
    #[default]
    Graduated,
    /// One point per full 5 hours, whole points.
    Points,
}

impl NoteFormula {
    pub fn note(self, absence_hours: f64, late_count: usize) -> f64 {
        match self {
            Self::Graduated => calculate_disciplinary_note(absence_hours, late_count),
            Self::Points => calculate_points_note(absence_hours, late_count),
        }
    }
}

/// `round(x * 10) / 10` with halves rounded up.
pub fn round_one_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttendanceTally {
    /// Unjustified absence hours, before lates are converted.
    pub absence_hours: f64,
    pub late_count: usize,
    /// Validated events of any status, justified absences included.
    pub event_count: usize,
}

impl AttendanceTally {
    pub fn late_hours(&self) -> f64 {
        (self.late_count / LATES_PER_PENALTY) as f64
    }

    pub fn total_hours(&self) -> f64 {
        round_one_decimal(self.absence_hours + self.late_hours())
    }
}

pub fn tally<'a, I>(events: I) -> AttendanceTally
where
    I: IntoIterator<Item = &'a AttendanceEvent>,
{
    let mut tally = AttendanceTally::default();

    for event in events {
        if !event.is_validated {
            continue;
        }
        tally.event_count += 1;

        match event.status {
            AttendanceStatus::Absent if !event.is_justified => {
                if event.absence_hours.is_finite() && event.absence_hours > 0.0 {
                    tally.absence_hours += event.absence_hours;
                }
            }
            AttendanceStatus::Late => tally.late_count += 1,
            _ => {}
        }
    }

    tally
}

pub fn calculate_total_absence_hours(events: &[AttendanceEvent]) -> f64 {
    tally(events).total_hours()
}

pub fn disciplinary_status(hours: f64) -> DisciplinaryStatus {
    for (index, &(threshold, text, color)) in TIERS.iter().enumerate() {
        if hours >= threshold {
            return DisciplinaryStatus {
                text,
                color,
                severity: (TIERS.len() - index) as u8,
            };
        }
    }
    NORMAL
}

pub fn calculate_disciplinary_note(absence_hours: f64, late_count: usize) -> f64 {
    let absence_deduction = (absence_hours / 2.5).floor().max(0.0) * 0.5;
    let lateness_deduction = (late_count / LATES_PER_PENALTY) as f64;
    round_one_decimal((MAX_NOTE - absence_deduction - lateness_deduction).max(0.0))
}

/// Whole-point variant shown on the trainee tracking lists.
pub fn calculate_points_note(absence_hours: f64, late_count: usize) -> f64 {
    let absence_points = (absence_hours / 5.0).floor().max(0.0);
    let late_points = (late_count / LATES_PER_PENALTY) as f64;
    (MAX_NOTE - absence_points - late_points).max(0.0)
}

fn result_from_tally(tally: &AttendanceTally, formula: NoteFormula) -> AggregateResult {
    let total_absence_hours = tally.total_hours();
    AggregateResult {
        total_absence_hours,
        disciplinary_status: disciplinary_status(total_absence_hours),
        disciplinary_note: formula.note(round_one_decimal(tally.absence_hours), tally.late_count),
    }
}

pub fn aggregate(events: &[AttendanceEvent], formula: NoteFormula) -> AggregateResult {
    result_from_tally(&tally(events), formula)
}

pub fn summarize_trainees(records: &[EventRecord], formula: NoteFormula) -> Vec<TraineeSummary> {
    let mut by_trainee: HashMap<Uuid, Vec<&EventRecord>> = HashMap::new();
    for record in records {
        by_trainee.entry(record.trainee_id).or_default().push(record);
    }

    let mut summaries: Vec<TraineeSummary> = by_trainee
        .into_values()
        .map(|records| {
            let first = records[0];
            let tally = tally(records.iter().map(|r| &r.event));
            TraineeSummary {
                trainee_id: first.trainee_id,
                trainee_name: first.trainee_name.clone(),
                trainee_email: first.trainee_email.clone(),
                group_name: first.group_name.clone(),
                late_count: tally.late_count,
                event_count: tally.event_count,
                result: result_from_tally(&tally, formula),
                points_note: calculate_points_note(
                    round_one_decimal(tally.absence_hours),
                    tally.late_count,
                ),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.result
            .total_absence_hours
            .partial_cmp(&a.result.total_absence_hours)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.trainee_name.cmp(&b.trainee_name))
    });
    summaries
}

pub fn summarize_groups(summaries: &[TraineeSummary]) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<&str, Vec<&TraineeSummary>> = BTreeMap::new();
    for summary in summaries {
        groups.entry(summary.group_name.as_str()).or_default().push(summary);
    }

    groups
        .into_iter()
        .map(|(group_name, members)| {
            let trainee_count = members.len();
            let total_hours: f64 = members.iter().map(|m| m.result.total_absence_hours).sum();
            let note_sum: f64 = members.iter().map(|m| m.result.disciplinary_note).sum();
            GroupSummary {
                group_name: group_name.to_string(),
                trainee_count,
                total_absence_hours: round_one_decimal(total_hours),
                flagged_count: members
                    .iter()
                    .filter(|m| m.result.disciplinary_status.severity > 0)
                    .count(),
                average_note: if trainee_count == 0 {
                    0.0
                } else {
                    round_one_decimal(note_sum / trainee_count as f64)
                },
            }
        })
        .collect()
}

pub fn cutoff_date(since_days: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(since_days.max(1))
}
