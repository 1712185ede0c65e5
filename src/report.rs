use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{AttendanceStatus, EventRecord, TraineeSummary};
use crate::scoring;

const CSV_HEADERS: [&str; 9] = [
    "trainee_name",
    "trainee_email",
    "group_name",
    "total_absence_hours",
    "late_count",
    "disciplinary_status",
    "status_color",
    "disciplinary_note",
    "points_note",
];

pub fn build_report(
    scope: Option<&str>,
    since: Option<NaiveDate>,
    trainees: &[TraineeSummary],
    records: &[EventRecord],
) -> String {
    let groups = scoring::summarize_groups(trainees);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all groups");

    let _ = writeln!(output, "# Attendance Discipline Report");
    match since {
        Some(date) => {
            let _ = writeln!(output, "Generated for {} (events since {})", scope_label, date);
        }
        None => {
            let _ = writeln!(output, "Generated for {} (all recorded events)", scope_label);
        }
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Disciplinary Overview");

    if trainees.is_empty() {
        let _ = writeln!(output, "No trainees recorded for this window.");
    } else {
        let mut tiers: BTreeMap<u8, (&str, &str, usize)> = BTreeMap::new();
        for trainee in trainees {
            let status = trainee.result.disciplinary_status;
            tiers
                .entry(status.severity)
                .or_insert((status.text, status.color, 0))
                .2 += 1;
        }
        for (text, color, count) in tiers.values().rev() {
            let _ = writeln!(output, "- {} ({}): {} trainees", text, color, count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Group Rollup");

    if groups.is_empty() {
        let _ = writeln!(output, "No groups recorded for this window.");
    } else {
        for group in groups.iter() {
            let _ = writeln!(
                output,
                "- {}: {} trainees, {:.1} h chargeable, {} flagged, average note {:.1}/20",
                group.group_name,
                group.trainee_count,
                group.total_absence_hours,
                group.flagged_count,
                group.average_note
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trainees Requiring Follow-up");

    let flagged: Vec<&TraineeSummary> = trainees
        .iter()
        .filter(|t| t.result.disciplinary_status.severity > 0)
        .collect();
    if flagged.is_empty() {
        let _ = writeln!(output, "No trainee is above NORMAL.");
    } else {
        for trainee in flagged.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}): {:.1} h, {} lates, {}, note {:.1}/20",
                trainee.trainee_name,
                trainee.trainee_email,
                trainee.group_name,
                trainee.result.total_absence_hours,
                trainee.late_count,
                trainee.result.disciplinary_status.text,
                trainee.result.disciplinary_note
            );
        }
    }

    let mut absences: Vec<&EventRecord> = records
        .iter()
        .filter(|r| r.event.is_validated && r.event.status == AttendanceStatus::Absent)
        .collect();
    absences.sort_by(|a, b| b.occurred_on.cmp(&a.occurred_on));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Validated Absences");

    if absences.is_empty() {
        let _ = writeln!(output, "No validated absences recorded for this window.");
    } else {
        for record in absences.iter().take(5) {
            let justification = if record.event.is_justified {
                "justified"
            } else {
                "unjustified"
            };
            let _ = writeln!(
                output,
                "- {} on {}: {:.1} h {}, {}",
                record.trainee_name,
                record.occurred_on,
                record.event.absence_hours,
                justification,
                record.note
            );
        }
    }

    output
}

pub fn write_summary_csv<W: std::io::Write>(
    writer: W,
    summaries: &[TraineeSummary],
) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct CsvRow<'a> {
        trainee_name: &'a str,
        trainee_email: &'a str,
        group_name: &'a str,
        total_absence_hours: f64,
        late_count: usize,
        disciplinary_status: &'a str,
        status_color: &'a str,
        disciplinary_note: f64,
        points_note: f64,
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(CSV_HEADERS)?;

    for summary in summaries {
        writer.serialize(CsvRow {
            trainee_name: &summary.trainee_name,
            trainee_email: &summary.trainee_email,
            group_name: &summary.group_name,
            total_absence_hours: summary.result.total_absence_hours,
            late_count: summary.late_count,
            disciplinary_status: summary.result.disciplinary_status.text,
            status_color: summary.result.disciplinary_status.color,
            disciplinary_note: summary.result.disciplinary_note,
            points_note: summary.points_note,
        })?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceEvent;
    use crate::scoring::NoteFormula;
    use uuid::Uuid;

    fn sample_record(id: u128, name: &str, day: u32, event: AttendanceEvent) -> EventRecord {
        EventRecord {
            trainee_id: Uuid::from_u128(id),
            trainee_name: name.to_string(),
            trainee_email: format!("{}@example.com", name.to_lowercase()),
            group_name: "TDI-101".to_string(),
            event,
            occurred_on: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            note: "cours de maths".to_string(),
            source_key: format!("{}-{}", name, day),
        }
    }

    #[test]
    fn empty_report_has_placeholders() {
        let report = build_report(None, None, &[], &[]);
        assert!(report.contains("Generated for all groups (all recorded events)"));
        assert!(report.contains("No trainees recorded for this window."));
        assert!(report.contains("No validated absences recorded for this window."));
    }

    #[test]
    fn report_lists_flagged_trainees_and_recent_absences() {
        let records = vec![
            sample_record(1, "Avery", 2, AttendanceEvent::absence(6.0).validated()),
            sample_record(2, "Kiara", 4, AttendanceEvent::absence(2.0).validated().justified()),
            sample_record(2, "Kiara", 5, AttendanceEvent::absence(9.0)),
        ];
        let trainees = scoring::summarize_trainees(&records, NoteFormula::Graduated);
        let since = NaiveDate::from_ymd_opt(2026, 3, 1);
        let report = build_report(Some("TDI-101"), since, &trainees, &records);

        assert!(report.contains("Generated for TDI-101 (events since 2026-03-01)"));
        assert!(report.contains("- 1er AVERT (SC) (#235a8c): 1 trainees"));
        assert!(report.contains("- NORMAL (#9FE855): 1 trainees"));
        assert!(report.contains("- TDI-101: 2 trainees, 6.0 h chargeable, 1 flagged"));
        assert!(report.contains("Avery (avery@example.com, TDI-101): 6.0 h, 0 lates"));
        assert!(report.contains("- Kiara on 2026-03-04: 2.0 h justified"));
        assert!(!report.contains("9.0 h"));

        let overview = report.find("1er AVERT").unwrap();
        let normal = report.find("- NORMAL").unwrap();
        assert!(overview < normal);
    }

    #[test]
    fn csv_export_writes_header_even_without_rows() {
        let mut buf = Vec::new();
        write_summary_csv(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("trainee_name,trainee_email,group_name"));
    }
}
