use attendance_discipline::models::{AttendanceEvent, AttendanceStatus};
use attendance_discipline::scoring::{aggregate, calculate_total_absence_hours, NoteFormula};
use serde_json::json;

fn decode(value: serde_json::Value) -> Vec<AttendanceEvent> {
    serde_json::from_value(value).expect("events decode")
}

#[test]
fn missing_fields_take_defaults() {
    let events = decode(json!([{ "status": "absent", "absenceHours": 6 }, {}]));
    assert_eq!(events[0].status, AttendanceStatus::Absent);
    assert!(!events[0].is_validated);
    assert!(!events[0].is_justified);
    assert_eq!(events[1], AttendanceEvent::present());
    assert_eq!(calculate_total_absence_hours(&events), 0.0);
}

#[test]
fn hours_are_coerced_from_strings() {
    let events = decode(json!([
        { "status": "absent", "isValidated": true, "absenceHours": "2.5" },
        { "status": "absent", "isValidated": true, "absenceHours": " 3 " },
        { "status": "absent", "isValidated": true, "absenceHours": "abc" },
        { "status": "absent", "isValidated": true, "absenceHours": null },
        { "status": "absent", "isValidated": true, "absenceHours": -4 },
    ]));

    let hours: Vec<f64> = events.iter().map(|e| e.absence_hours).collect();
    assert_eq!(hours, vec![2.5, 3.0, 0.0, 0.0, 0.0]);
    assert_eq!(calculate_total_absence_hours(&events), 5.5);
}

#[test]
fn flags_accept_common_spellings() {
    let events = decode(json!([
        { "status": "late", "isValidated": "true" },
        { "status": "late", "isValidated": 1 },
        { "status": "late", "isValidated": "oui" },
        { "status": "late", "isValidated": null },
    ]));
    let validated: Vec<bool> = events.iter().map(|e| e.is_validated).collect();
    assert_eq!(validated, vec![true, true, true, false]);
}

#[test]
fn unknown_status_counts_as_present() {
    let events = decode(json!([
        { "status": " LATE ", "isValidated": true },
        { "status": "excused", "isValidated": true, "absenceHours": 10 },
    ]));
    assert_eq!(events[0].status, AttendanceStatus::Late);
    assert_eq!(events[1].status, AttendanceStatus::Present);
    assert_eq!(calculate_total_absence_hours(&events), 0.0);
}

#[test]
fn non_string_status_counts_as_present() {
    let events = decode(json!([
        { "status": null, "isValidated": true, "absenceHours": 3 },
        { "status": 3, "isValidated": true, "absenceHours": 4 },
        { "status": ["absent"], "isValidated": true, "absenceHours": 5 },
        { "status": "absent", "isValidated": true, "absenceHours": 2 },
    ]));
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].status, AttendanceStatus::Present);
    assert_eq!(events[1].status, AttendanceStatus::Present);
    assert_eq!(events[2].status, AttendanceStatus::Present);
    assert_eq!(calculate_total_absence_hours(&events), 2.0);
}

#[test]
fn aggregate_serializes_with_camel_case_keys() {
    let events = decode(json!([
        { "status": "absent", "isValidated": true, "isJustified": false, "absenceHours": 2 },
        { "status": "absent", "isValidated": true, "isJustified": false, "absenceHours": 3 },
    ]));
    let result = aggregate(&events, NoteFormula::Graduated);

    assert_eq!(
        serde_json::to_value(result).unwrap(),
        json!({
            "totalAbsenceHours": 5.0,
            "disciplinaryStatus": { "text": "1er AVERT (SC)", "color": "#235a8c" },
            "disciplinaryNote": 19.0,
        })
    );
}

#[test]
fn demo_event_file_scores_as_documented() {
    let events: Vec<AttendanceEvent> =
        serde_json::from_str(include_str!("../demos/events.json")).expect("demo events decode");
    let result = aggregate(&events, NoteFormula::Graduated);

    assert_eq!(result.total_absence_hours, 6.0);
    assert_eq!(result.disciplinary_status.text, "1er AVERT (SC)");
    assert_eq!(result.disciplinary_note, 18.0);
}
