use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{coerce_hours, parse_flag, AttendanceEvent, AttendanceStatus, EventRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("attendance schema migrated");
    Ok(())
}

async fn upsert_trainee(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    group_name: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO attendance.trainees (id, full_name, email, group_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name, group_name = EXCLUDED.group_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .bind(group_name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert trainee {email}"))?
    .get("id");

    Ok(id)
}

async fn insert_event(
    pool: &PgPool,
    trainee_id: Uuid,
    event: &AttendanceEvent,
    occurred_on: NaiveDate,
    note: &str,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance.events
        (id, trainee_id, status, is_validated, is_justified, absence_hours, occurred_on, note, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(trainee_id)
    .bind(event.status.as_str())
    .bind(event.is_validated)
    .bind(event.is_justified)
    .bind(event.absence_hours)
    .bind(occurred_on)
    .bind(note)
    .bind(source_key)
    .execute(pool)
    .await
    .with_context(|| format!("failed to insert attendance event {source_key}"))?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let trainees = [
        ("Yasmine Alaoui", "yasmine.alaoui@ofppt-demo.ma", "TDI-101"),
        ("Omar Benali", "omar.benali@ofppt-demo.ma", "TDI-101"),
        ("Salma Idrissi", "salma.idrissi@ofppt-demo.ma", "DEV-201"),
    ];

    let mut ids = Vec::with_capacity(trainees.len());
    for (name, email, group_name) in trainees {
        ids.push(upsert_trainee(pool, name, email, group_name).await?);
    }

    let day = |d: u32| NaiveDate::from_ymd_opt(2026, 2, d).context("invalid seed date");
    let events = [
        ("seed-001", ids[0], AttendanceEvent::absence(4.0).validated(), day(2)?, "Absent morning block"),
        ("seed-002", ids[0], AttendanceEvent::absence(2.5).validated(), day(9)?, "Left before practical"),
        ("seed-003", ids[0], AttendanceEvent::late().validated(), day(10)?, "Arrived 20 minutes late"),
        ("seed-004", ids[1], AttendanceEvent::absence(5.0).validated().justified(), day(3)?, "Medical certificate"),
        ("seed-005", ids[1], AttendanceEvent::absence(3.0), day(11)?, "Awaiting SG validation"),
        ("seed-006", ids[2], AttendanceEvent::absence(8.0).validated(), day(4)?, "Full day absence"),
        ("seed-007", ids[2], AttendanceEvent::absence(4.0).validated(), day(12)?, "Skipped workshop"),
        ("seed-008", ids[2], AttendanceEvent::present().validated(), day(13)?, ""),
    ];

    let mut inserted = 0usize;
    for (source_key, trainee_id, event, occurred_on, note) in events {
        if insert_event(pool, trainee_id, &event, occurred_on, note, source_key).await? {
            inserted += 1;
        }
    }

    info!(inserted, "seed data applied");
    Ok(inserted)
}

pub async fn fetch_events(
    pool: &PgPool,
    since: Option<NaiveDate>,
    group_name: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<EventRecord>> {
    let mut query = String::from(
        "SELECT t.id AS trainee_id, t.full_name, t.email, t.group_name, \
         e.status, e.is_validated, e.is_justified, e.absence_hours, \
         e.occurred_on, e.note, e.source_key \
         FROM attendance.events e \
         JOIN attendance.trainees t ON t.id = e.trainee_id \
         WHERE TRUE",
    );

    let mut placeholder = 0;
    if since.is_some() {
        placeholder += 1;
        query.push_str(&format!(" AND e.occurred_on >= ${placeholder}"));
    }
    if group_name.is_some() {
        placeholder += 1;
        query.push_str(&format!(" AND t.group_name = ${placeholder}"));
    } else if email.is_some() {
        placeholder += 1;
        query.push_str(&format!(" AND t.email = ${placeholder}"));
    }
    query.push_str(" ORDER BY e.occurred_on, t.full_name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = since {
        rows = rows.bind(value);
    }
    if let Some(value) = group_name {
        rows = rows.bind(value);
    } else if let Some(value) = email {
        rows = rows.bind(value);
    }

    let records = rows
        .fetch_all(pool)
        .await
        .context("failed to load attendance events")?;
    debug!(count = records.len(), "attendance events loaded");

    let mut events = Vec::with_capacity(records.len());
    for row in records {
        let status: String = row.get("status");
        events.push(EventRecord {
            trainee_id: row.get("trainee_id"),
            trainee_name: row.get("full_name"),
            trainee_email: row.get("email"),
            group_name: row.get("group_name"),
            event: AttendanceEvent {
                status: AttendanceStatus::parse(&status),
                is_validated: row.get("is_validated"),
                is_justified: row.get("is_justified"),
                absence_hours: row.get("absence_hours"),
            },
            occurred_on: row.get("occurred_on"),
            note: row.get("note"),
            source_key: row.get("source_key"),
        });
    }

    Ok(events)
}

/// Supervisor confirmation. Only validated events count towards any total.
pub async fn set_validated(pool: &PgPool, source_key: &str, validated: bool) -> anyhow::Result<()> {
    let result = sqlx::query("UPDATE attendance.events SET is_validated = $1 WHERE source_key = $2")
        .bind(validated)
        .bind(source_key)
        .execute(pool)
        .await
        .context("failed to update validation flag")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("no attendance event with source key {source_key}");
    }
    info!(source_key, validated, "validation flag updated");
    Ok(())
}

pub async fn set_justified(pool: &PgPool, source_key: &str, justified: bool) -> anyhow::Result<()> {
    let status: Option<String> =
        sqlx::query("SELECT status FROM attendance.events WHERE source_key = $1")
            .bind(source_key)
            .fetch_optional(pool)
            .await
            .context("failed to look up attendance event")?
            .map(|row| row.get("status"));

    let Some(status) = status else {
        anyhow::bail!("no attendance event with source key {source_key}");
    };
    if AttendanceStatus::parse(&status) != AttendanceStatus::Absent {
        anyhow::bail!("event {source_key} is a {status} record; only absences can be justified");
    }

    sqlx::query("UPDATE attendance.events SET is_justified = $1 WHERE source_key = $2")
        .bind(justified)
        .bind(source_key)
        .execute(pool)
        .await
        .context("failed to update justification flag")?;

    info!(source_key, justified, "justification flag updated");
    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        group_name: String,
        status: String,
        is_validated: Option<String>,
        is_justified: Option<String>,
        absence_hours: Option<String>,
        occurred_on: NaiveDate,
        note: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;
    let mut skipped = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV record {}", line + 1))?;
        let trainee_id = upsert_trainee(pool, &row.full_name, &row.email, &row.group_name).await?;

        let raw_hours = row.absence_hours.as_deref().unwrap_or("");
        let absence_hours = coerce_hours(raw_hours);
        if !raw_hours.trim().is_empty() && absence_hours == 0.0 && raw_hours.trim() != "0" {
            warn!(line = line + 1, raw_hours, "absence hours not numeric, counted as 0");
        }

        let event = AttendanceEvent {
            status: AttendanceStatus::parse(&row.status),
            is_validated: row.is_validated.as_deref().is_some_and(parse_flag),
            is_justified: row.is_justified.as_deref().is_some_and(parse_flag),
            absence_hours,
        };

        let source_key = row
            .source_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let note = row.note.unwrap_or_default();
        if insert_event(pool, trainee_id, &event, row.occurred_on, &note, &source_key).await? {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    info!(inserted, skipped, path = %csv_path.display(), "attendance CSV imported");
    Ok(inserted)
}
