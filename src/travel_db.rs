//! Travel database snapshot preparation.
//!
//! Downloads the SQLite travel database, keeps a pristine backup next to
//! the working copy, and moves every flight and booking timestamp forward
//! so the most recent actual departure lands on "now".

use crate::config::Settings;
use crate::error::{KallError, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Columns shifted by [`time_shift`], per table.
const SHIFTED_COLUMNS: &[(&str, &str)] = &[
    ("bookings", "book_date"),
    ("flights", "scheduled_departure"),
    ("flights", "scheduled_arrival"),
    ("flights", "actual_departure"),
    ("flights", "actual_arrival"),
];

const ZONED_FORMAT_IN: &str = "%Y-%m-%d %H:%M:%S%.f%#z";
const ZONED_FORMAT_OUT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";
const NAIVE_FORMAT_IN: &str = "%Y-%m-%d %H:%M:%S%.f";
const NAIVE_FORMAT_OUT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A timestamp cell as stored in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stamp {
    Zoned(DateTime<FixedOffset>),
    /// No offset in the text; interpreted as UTC.
    Naive(NaiveDateTime),
}

impl Stamp {
    /// Parse a cell. Missing values (`\N`, empty) yield None.
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() || text == "\\N" {
            return None;
        }
        DateTime::parse_from_str(text, ZONED_FORMAT_IN)
            .map(Stamp::Zoned)
            .or_else(|_| NaiveDateTime::parse_from_str(text, NAIVE_FORMAT_IN).map(Stamp::Naive))
            .ok()
    }

    fn to_utc(self) -> DateTime<Utc> {
        match self {
            Stamp::Zoned(dt) => dt.with_timezone(&Utc),
            Stamp::Naive(dt) => dt.and_utc(),
        }
    }

    fn shifted(self, delta: Duration) -> Self {
        match self {
            Stamp::Zoned(dt) => Stamp::Zoned(dt + delta),
            Stamp::Naive(dt) => Stamp::Naive(dt + delta),
        }
    }

    fn format(&self) -> String {
        match self {
            Stamp::Zoned(dt) => dt.format(ZONED_FORMAT_OUT).to_string(),
            Stamp::Naive(dt) => dt.format(NAIVE_FORMAT_OUT).to_string(),
        }
    }
}

/// Outcome of a time shift.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftReport {
    /// Amount every timestamp was moved by.
    pub delta: Duration,
    /// Number of cells rewritten.
    pub cells_updated: usize,
}

/// Outcome of [`prepare`].
#[derive(Debug, Clone)]
pub struct PrepareReport {
    pub path: PathBuf,
    pub backup_path: PathBuf,
    pub downloaded: bool,
    pub shift: ShiftReport,
}

/// Move all shifted columns forward so the latest actual departure is `now`.
#[instrument(skip(conn))]
pub fn time_shift(conn: &mut Connection, now: DateTime<Utc>) -> Result<ShiftReport> {
    let latest = {
        let mut stmt = conn.prepare("SELECT actual_departure FROM flights")?;
        let rows = stmt.query_map([], |row| row.get::<_, Option<String>>(0))?;

        let mut latest: Option<DateTime<Utc>> = None;
        for value in rows {
            if let Some(stamp) = value?.as_deref().and_then(Stamp::parse) {
                let utc = stamp.to_utc();
                latest = Some(latest.map_or(utc, |l| l.max(utc)));
            }
        }
        latest
    }
    .ok_or_else(|| KallError::TravelDb("No actual departures found in flights".to_string()))?;

    let delta = now.signed_duration_since(latest);
    info!("Shifting travel database timestamps by {}", delta);

    let tx = conn.transaction()?;
    let mut cells_updated = 0;

    for (table, column) in SHIFTED_COLUMNS {
        let updates: Vec<(i64, String)> = {
            let mut stmt = tx.prepare(&format!("SELECT rowid, {} FROM {}", column, table))?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
            })?;

            let mut updates = Vec::new();
            for row in rows {
                let (rowid, value) = row?;
                if let Some(stamp) = value.as_deref().and_then(Stamp::parse) {
                    updates.push((rowid, stamp.shifted(delta).format()));
                }
            }
            updates
        };

        let mut stmt = tx.prepare(&format!("UPDATE {} SET {} = ?1 WHERE rowid = ?2", table, column))?;
        for (rowid, value) in &updates {
            stmt.execute(params![value, rowid])?;
        }
        debug!("Shifted {} values in {}.{}", updates.len(), table, column);
        cells_updated += updates.len();
    }

    tx.commit()?;

    Ok(ShiftReport {
        delta,
        cells_updated,
    })
}

/// Download a snapshot to `path`, replacing it atomically.
#[instrument]
pub async fn download(url: &str, path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    info!("Downloading travel database from {}", url);
    let bytes = reqwest::get(url).await?.error_for_status()?.bytes().await?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(&bytes)?;
    file.persist(path)
        .map_err(|e| KallError::TravelDb(format!("Failed to write {}: {}", path.display(), e)))?;

    info!("Saved {} bytes to {:?}", bytes.len(), path);
    Ok(())
}

/// Make sure the working copy and its backup exist, then time-shift the
/// working copy to the present.
pub async fn prepare(settings: &Settings, force: bool) -> Result<PrepareReport> {
    let path = settings.travel_db_path();
    let backup_path = settings.travel_db_backup_path();

    let downloaded = force || !path.exists();
    if downloaded {
        download(&settings.travel_db.url, &path).await?;
    }
    if downloaded || !backup_path.exists() {
        if let Some(parent) = backup_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&path, &backup_path)?;
        debug!("Backed up travel database to {:?}", backup_path);
    }

    let mut conn = Connection::open(&path)?;
    let shift = time_shift(&mut conn, Utc::now())?;

    Ok(PrepareReport {
        path,
        backup_path,
        downloaded,
        shift,
    })
}

/// Restore the working copy from the backup.
pub fn reset(settings: &Settings) -> Result<PathBuf> {
    let path = settings.travel_db_path();
    let backup_path = settings.travel_db_backup_path();

    if !backup_path.exists() {
        return Err(KallError::TravelDb(format!(
            "No backup at {}; run 'kall travel-db prepare' first",
            backup_path.display()
        )));
    }

    std::fs::copy(&backup_path, &path)?;
    info!("Restored {:?} from {:?}", path, backup_path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixture(conn: &Connection) {
        conn.execute_batch(
            r#"
            CREATE TABLE flights (
                flight_id INTEGER,
                scheduled_departure TEXT,
                scheduled_arrival TEXT,
                actual_departure TEXT,
                actual_arrival TEXT
            );
            CREATE TABLE bookings (book_ref TEXT, book_date TEXT);

            INSERT INTO flights VALUES
                (1, '2024-04-30 09:00:00.000000-04:00', '2024-04-30 11:00:00.000000-04:00',
                    '2024-04-30 09:05:00.000000-04:00', '2024-04-30 11:10:00.000000-04:00'),
                (2, '2024-05-01 10:00:00.000000+02:00', '2024-05-01 12:00:00.000000+02:00',
                    '\N', '\N'),
                (3, '2024-04-29 08:00:00', '2024-04-29 09:00:00', NULL, NULL);

            INSERT INTO bookings VALUES ('00000F', '2024-04-28 17:46:00.000000+03:00');
            "#,
        )
        .unwrap();
    }

    fn text(conn: &Connection, sql: &str) -> Option<String> {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_stamp_parse() {
        assert!(matches!(
            Stamp::parse("2024-04-30 09:05:00.000000-04:00"),
            Some(Stamp::Zoned(_))
        ));
        assert!(matches!(Stamp::parse("2024-04-30 09:05:00+03"), Some(Stamp::Zoned(_))));
        assert!(matches!(Stamp::parse("2024-04-29 08:00:00"), Some(Stamp::Naive(_))));
        assert_eq!(Stamp::parse("\\N"), None);
        assert_eq!(Stamp::parse("not a date"), None);
    }

    #[test]
    fn test_time_shift_moves_latest_departure_to_now() {
        let mut conn = Connection::open_in_memory().unwrap();
        fixture(&conn);

        // Latest actual departure is 2024-04-30 13:05 UTC.
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 13, 5, 0).unwrap();
        let report = time_shift(&mut conn, now).unwrap();

        let expected_delta = now.signed_duration_since(Utc.with_ymd_and_hms(2024, 4, 30, 13, 5, 0).unwrap());
        assert_eq!(report.delta, expected_delta);
        // 3 + 3 scheduled, 1 actual departure, 1 actual arrival, 1 booking
        assert_eq!(report.cells_updated, 9);

        let departure = text(&conn, "SELECT actual_departure FROM flights WHERE flight_id = 1").unwrap();
        let shifted = DateTime::parse_from_str(&departure, ZONED_FORMAT_IN).unwrap();
        assert_eq!(shifted.with_timezone(&Utc), now);
        // The cell keeps its UTC offset.
        assert!(departure.ends_with("-04:00"));

        let booking = text(&conn, "SELECT book_date FROM bookings").unwrap();
        let booked = DateTime::parse_from_str(&booking, ZONED_FORMAT_IN).unwrap();
        assert_eq!(
            booked.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 4, 28, 14, 46, 0).unwrap() + expected_delta
        );
    }

    #[test]
    fn test_time_shift_leaves_missing_values() {
        let mut conn = Connection::open_in_memory().unwrap();
        fixture(&conn);
        time_shift(&mut conn, Utc::now()).unwrap();

        assert_eq!(
            text(&conn, "SELECT actual_departure FROM flights WHERE flight_id = 2").as_deref(),
            Some("\\N")
        );
        assert_eq!(text(&conn, "SELECT actual_departure FROM flights WHERE flight_id = 3"), None);

        let naive = text(&conn, "SELECT scheduled_departure FROM flights WHERE flight_id = 3").unwrap();
        assert!(NaiveDateTime::parse_from_str(&naive, NAIVE_FORMAT_IN).is_ok());
    }

    #[test]
    fn test_time_shift_requires_departures() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE flights (actual_departure TEXT); CREATE TABLE bookings (book_date TEXT);",
        )
        .unwrap();

        assert!(matches!(time_shift(&mut conn, Utc::now()), Err(KallError::TravelDb(_))));
    }

    fn settings_in(dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.travel_db.path = dir.join("travel.sqlite").display().to_string();
        settings.travel_db.backup_path = dir.join("backup").join("travel.sqlite").display().to_string();
        settings.travel_db.url = "http://127.0.0.1:9/unreachable.sqlite".to_string();
        settings
    }

    #[tokio::test]
    async fn test_prepare_existing_copy_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());

        {
            let conn = Connection::open(settings.travel_db_path()).unwrap();
            fixture(&conn);
        }

        let report = prepare(&settings, false).await.unwrap();
        assert!(!report.downloaded);
        assert!(report.backup_path.exists());
        assert_eq!(report.shift.cells_updated, 9);

        // The backup keeps the unshifted timestamps.
        let backup = Connection::open(settings.travel_db_backup_path()).unwrap();
        assert_eq!(
            text(&backup, "SELECT book_date FROM bookings").as_deref(),
            Some("2024-04-28 17:46:00.000000+03:00")
        );

        reset(&settings).unwrap();
        let restored = Connection::open(settings.travel_db_path()).unwrap();
        assert_eq!(
            text(&restored, "SELECT book_date FROM bookings").as_deref(),
            Some("2024-04-28 17:46:00.000000+03:00")
        );
    }

    #[test]
    fn test_reset_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        assert!(matches!(reset(&settings), Err(KallError::TravelDb(_))));
    }
}
