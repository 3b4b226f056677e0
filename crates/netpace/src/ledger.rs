//! Durable action ledger: contacted profiles, sent messages and per-day
//! counters, in one SQLite file.
//!
//! Status only ever moves forward along
//! `skipped < requested < accepted < messaged`; every status write below
//! carries a rank guard in its SQL.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDate, SecondsFormat};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::error::BotResult;
use crate::timing::{Clock, SystemClock};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS connections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    company TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    contacted_at TEXT NOT NULL,
    accepted_at TEXT,
    last_message_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_connections_status ON connections(status);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_url TEXT NOT NULL,
    body TEXT NOT NULL,
    sent_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_profile ON messages(profile_url);

CREATE TABLE IF NOT EXISTS counters (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// SQL expression ranking a status column.
fn rank_sql(column: &str) -> String {
    format!(
        "(CASE {column} WHEN 'skipped' THEN 0 WHEN 'requested' THEN 1 \
         WHEN 'accepted' THEN 2 WHEN 'messaged' THEN 3 ELSE 0 END)"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Skipped,
    Requested,
    Accepted,
    Messaged,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileStatus::Skipped => "skipped",
            ProfileStatus::Requested => "requested",
            ProfileStatus::Accepted => "accepted",
            ProfileStatus::Messaged => "messaged",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            ProfileStatus::Skipped => 0,
            ProfileStatus::Requested => 1,
            ProfileStatus::Accepted => 2,
            ProfileStatus::Messaged => 3,
        }
    }
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skipped" => Ok(ProfileStatus::Skipped),
            "requested" => Ok(ProfileStatus::Requested),
            "accepted" => Ok(ProfileStatus::Accepted),
            "messaged" => Ok(ProfileStatus::Messaged),
            other => Err(format!("unknown profile status '{other}'")),
        }
    }
}

impl ToSql for ProfileStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ProfileStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

/// Outbound action kinds with a daily counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Connections,
    Messages,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Connections => "connections",
            ActionKind::Messages => "messages",
        }
    }

    /// Counter key, `<kind>:YYYY-MM-DD`.
    pub fn counter_key(&self, date: NaiveDate) -> String {
        format!("{}:{}", self.as_str(), date.format("%Y-%m-%d"))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileRecord {
    pub url: String,
    pub name: String,
    pub company: String,
    pub status: ProfileStatus,
    pub contacted_at: String,
    pub accepted_at: Option<String>,
    pub last_message_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub profile_url: String,
    pub body: String,
    pub sent_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub skipped: u32,
    pub requested: u32,
    pub accepted: u32,
    pub messaged: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCounters {
    pub date: NaiveDate,
    pub connections: u32,
    pub messages: u32,
}

pub struct Ledger {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    /// Open or create the ledger file, creating parent directories.
    pub fn open(path: &Path) -> BotResult<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(path: &Path, clock: Arc<dyn Clock>) -> BotResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, clock)
    }

    pub fn open_in_memory(clock: Arc<dyn Clock>) -> BotResult<Self> {
        Self::init(Connection::open_in_memory()?, clock)
    }

    fn init(conn: Connection, clock: Arc<dyn Clock>) -> BotResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn now_stamp(&self) -> String {
        self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// Upsert a profile. On conflict only a forward status change is applied.
    pub fn save_profile(&self, url: &str, name: &str, company: &str, status: ProfileStatus) -> BotResult<()> {
        let conn = self.lock_conn();
        upsert_profile(&conn, url, name, company, status, &self.now_stamp())?;
        Ok(())
    }

    /// Promote to `accepted`. No-op when already accepted or messaged.
    pub fn mark_accepted(&self, url: &str) -> BotResult<bool> {
        let conn = self.lock_conn();
        let sql = format!(
            "UPDATE connections SET status = 'accepted', accepted_at = ?2
             WHERE profile_url = ?1 AND {} < 2",
            rank_sql("status")
        );
        let rows = conn.execute(&sql, params![url, self.now_stamp()])?;
        Ok(rows > 0)
    }

    /// Append a message and stamp the profile, promoting `accepted` to
    /// `messaged`. The profile update is a no-op for unknown URLs.
    pub fn save_message(&self, url: &str, body: &str) -> BotResult<()> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        append_message(&tx, url, body, &self.now_stamp())?;
        tx.commit()?;
        Ok(())
    }

    /// Atomically bump today's counter for `kind`; returns the new value.
    pub fn increment_daily_counter(&self, kind: ActionKind) -> BotResult<u32> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = bump_counter(&tx, &kind.counter_key(self.today()))?;
        tx.commit()?;
        Ok(value)
    }

    pub fn get_daily_counter(&self, kind: ActionKind) -> BotResult<u32> {
        let conn = self.lock_conn();
        read_counter(&conn, &kind.counter_key(self.today()))
    }

    /// Count a sent connection request and record the profile as
    /// `requested`, in one transaction. Returns the new counter value.
    pub fn record_connection(&self, url: &str, name: &str, company: &str) -> BotResult<u32> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = bump_counter(&tx, &ActionKind::Connections.counter_key(self.today()))?;
        upsert_profile(&tx, url, name, company, ProfileStatus::Requested, &self.now_stamp())?;
        tx.commit()?;
        Ok(value)
    }

    /// Count a sent message and append it, in one transaction. Returns the
    /// new counter value.
    pub fn record_message(&self, url: &str, body: &str) -> BotResult<u32> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = bump_counter(&tx, &ActionKind::Messages.counter_key(self.today()))?;
        append_message(&tx, url, body, &self.now_stamp())?;
        tx.commit()?;
        Ok(value)
    }

    /// URLs with status `requested`, in insertion order.
    pub fn requested_profiles(&self) -> BotResult<Vec<String>> {
        self.urls_with_status(ProfileStatus::Requested)
    }

    /// URLs with status `accepted`, in insertion order.
    pub fn pending_followups(&self) -> BotResult<Vec<String>> {
        self.urls_with_status(ProfileStatus::Accepted)
    }

    fn urls_with_status(&self, status: ProfileStatus) -> BotResult<Vec<String>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare("SELECT profile_url FROM connections WHERE status = ?1 ORDER BY id")?;
        let urls = stmt
            .query_map(params![status], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    pub fn profile(&self, url: &str) -> BotResult<Option<ProfileRecord>> {
        let conn = self.lock_conn();
        let record = conn
            .query_row(
                "SELECT profile_url, name, company, status, contacted_at, accepted_at, last_message_at
                 FROM connections WHERE profile_url = ?1",
                params![url],
                |row| {
                    Ok(ProfileRecord {
                        url: row.get(0)?,
                        name: row.get(1)?,
                        company: row.get(2)?,
                        status: row.get(3)?,
                        contacted_at: row.get(4)?,
                        accepted_at: row.get(5)?,
                        last_message_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Messages sent to `url`, oldest first.
    pub fn messages_for(&self, url: &str) -> BotResult<Vec<MessageRecord>> {
        let conn = self.lock_conn();
        let mut stmt =
            conn.prepare("SELECT profile_url, body, sent_at FROM messages WHERE profile_url = ?1 ORDER BY id")?;
        let messages = stmt
            .query_map(params![url], |row| {
                Ok(MessageRecord {
                    profile_url: row.get(0)?,
                    body: row.get(1)?,
                    sent_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    pub fn contains(&self, url: &str) -> BotResult<bool> {
        let conn = self.lock_conn();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM connections WHERE profile_url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn status_counts(&self) -> BotResult<StatusCounts> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM connections GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, ProfileStatus>(0)?, row.get::<_, u32>(1)?)))?;
        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, n) = row?;
            match status {
                ProfileStatus::Skipped => counts.skipped = n,
                ProfileStatus::Requested => counts.requested = n,
                ProfileStatus::Accepted => counts.accepted = n,
                ProfileStatus::Messaged => counts.messaged = n,
            }
        }
        Ok(counts)
    }

    pub fn counters_on(&self, date: NaiveDate) -> BotResult<DayCounters> {
        let conn = self.lock_conn();
        Ok(DayCounters {
            date,
            connections: read_counter(&conn, &ActionKind::Connections.counter_key(date))?,
            messages: read_counter(&conn, &ActionKind::Messages.counter_key(date))?,
        })
    }

    /// Counters for today and the `days - 1` days before it, newest first.
    pub fn counter_history(&self, days: u32) -> BotResult<Vec<DayCounters>> {
        let today = self.today();
        (0..days)
            .map(|back| self.counters_on(today - Duration::days(i64::from(back))))
            .collect()
    }

    pub fn set_meta(&self, key: &str, value: &str) -> BotResult<()> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn meta(&self, key: &str) -> BotResult<Option<String>> {
        let conn = self.lock_conn();
        let value = conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Stamp `last_login_at` with the current time.
    pub fn record_login(&self) -> BotResult<()> {
        self.set_meta("last_login_at", &self.now_stamp())
    }
}

fn upsert_profile(
    conn: &Connection,
    url: &str,
    name: &str,
    company: &str,
    status: ProfileStatus,
    now: &str,
) -> rusqlite::Result<()> {
    let sql = format!(
        "INSERT INTO connections (profile_url, name, company, status, contacted_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(profile_url) DO UPDATE SET status = excluded.status
         WHERE {} > {}",
        rank_sql("excluded.status"),
        rank_sql("connections.status")
    );
    conn.execute(&sql, params![url, name, company, status, now])?;
    Ok(())
}

fn append_message(conn: &Connection, url: &str, body: &str, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO messages (profile_url, body, sent_at) VALUES (?1, ?2, ?3)",
        params![url, body, now],
    )?;
    conn.execute(
        "UPDATE connections
         SET last_message_at = ?2,
             status = CASE WHEN status = 'accepted' THEN 'messaged' ELSE status END
         WHERE profile_url = ?1",
        params![url, now],
    )?;
    Ok(())
}

fn bump_counter(conn: &Connection, key: &str) -> rusqlite::Result<u32> {
    conn.execute(
        "INSERT INTO counters (key, value) VALUES (?1, 1)
         ON CONFLICT(key) DO UPDATE SET value = value + 1",
        params![key],
    )?;
    conn.query_row("SELECT value FROM counters WHERE key = ?1", params![key], |row| row.get(0))
}

fn read_counter(conn: &Connection, key: &str) -> BotResult<u32> {
    let value = conn
        .query_row("SELECT value FROM counters WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;
    Ok(value.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ManualClock;
    use chrono::{Local, TimeZone};

    fn clock_at(h: u32) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Local.with_ymd_and_hms(2026, 5, 4, h, 15, 0).unwrap()))
    }

    fn ledger(clock: Arc<ManualClock>) -> Ledger {
        Ledger::open_in_memory(clock).unwrap()
    }

    #[test]
    fn test_counter_starts_at_zero_and_counts() {
        let l = ledger(clock_at(10));
        assert_eq!(l.get_daily_counter(ActionKind::Connections).unwrap(), 0);
        for n in 1..=5 {
            assert_eq!(l.increment_daily_counter(ActionKind::Connections).unwrap(), n);
        }
        assert_eq!(l.get_daily_counter(ActionKind::Connections).unwrap(), 5);
        assert_eq!(l.get_daily_counter(ActionKind::Messages).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let l = Arc::new(Ledger::open_with_clock(&dir.path().join("state.db"), clock_at(10)).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let l = Arc::clone(&l);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        l.increment_daily_counter(ActionKind::Messages).unwrap();
                        l.get_daily_counter(ActionKind::Messages).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(l.get_daily_counter(ActionKind::Messages).unwrap(), 200);
    }

    #[test]
    fn test_counters_roll_by_date() {
        let clock = clock_at(23);
        let l = ledger(clock.clone());
        l.increment_daily_counter(ActionKind::Connections).unwrap();
        l.increment_daily_counter(ActionKind::Connections).unwrap();
        clock.advance(chrono::Duration::hours(2));
        assert_eq!(l.get_daily_counter(ActionKind::Connections).unwrap(), 0);
        l.increment_daily_counter(ActionKind::Connections).unwrap();

        let history = l.counter_history(3).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].connections, 1);
        assert_eq!(history[1].connections, 2);
        assert_eq!(history[2].connections, 0);
        assert_eq!(history[1].date, NaiveDate::from_ymd_opt(2026, 5, 4).unwrap());
    }

    #[test]
    fn test_save_profile_never_duplicates() {
        let clock = clock_at(9);
        let l = ledger(clock.clone());
        l.save_profile("https://x.test/in/ada", "Ada", "Engines", ProfileStatus::Requested)
            .unwrap();
        clock.advance(chrono::Duration::hours(1));
        l.save_profile("https://x.test/in/ada", "Someone Else", "Other", ProfileStatus::Requested)
            .unwrap();
        l.save_profile("https://x.test/in/ada", "", "", ProfileStatus::Accepted)
            .unwrap();

        let conn = l.lock_conn();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM connections", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
        drop(conn);

        let p = l.profile("https://x.test/in/ada").unwrap().unwrap();
        assert_eq!(p.name, "Ada");
        assert_eq!(p.company, "Engines");
        assert_eq!(p.status, ProfileStatus::Accepted);
        assert!(p.contacted_at.starts_with("2026-05-04T09:15:00"));
    }

    #[test]
    fn test_status_never_moves_backward() {
        assert!(ProfileStatus::Skipped.rank() < ProfileStatus::Requested.rank());
        assert!(ProfileStatus::Accepted.rank() < ProfileStatus::Messaged.rank());
        assert_eq!("accepted".parse::<ProfileStatus>(), Ok(ProfileStatus::Accepted));

        let l = ledger(clock_at(11));
        let url = "https://x.test/in/grace";
        l.save_profile(url, "Grace", "Navy", ProfileStatus::Requested).unwrap();
        assert!(l.mark_accepted(url).unwrap());
        assert!(!l.mark_accepted(url).unwrap());

        l.save_profile(url, "Grace", "Navy", ProfileStatus::Requested).unwrap();
        assert_eq!(l.profile(url).unwrap().unwrap().status, ProfileStatus::Accepted);

        l.save_message(url, "hi").unwrap();
        assert_eq!(l.profile(url).unwrap().unwrap().status, ProfileStatus::Messaged);

        l.mark_accepted(url).unwrap();
        l.save_profile(url, "", "", ProfileStatus::Requested).unwrap();
        l.save_profile(url, "", "", ProfileStatus::Skipped).unwrap();
        let p = l.profile(url).unwrap().unwrap();
        assert_eq!(p.status, ProfileStatus::Messaged);
        assert!(p.accepted_at.is_some());
        assert!(p.last_message_at.is_some());
    }

    #[test]
    fn test_save_message_without_profile() {
        let l = ledger(clock_at(12));
        l.save_message("https://x.test/in/nobody", "hello").unwrap();
        assert!(l.profile("https://x.test/in/nobody").unwrap().is_none());
        let msgs = l.messages_for("https://x.test/in/nobody").unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].body, "hello");
        assert!(msgs[0].sent_at.starts_with("2026-05-04T12:15"));
    }

    #[test]
    fn test_lists_follow_insertion_order() {
        let l = ledger(clock_at(10));
        for name in ["c", "a", "d", "b"] {
            l.save_profile(&format!("https://x.test/in/{name}"), name, "", ProfileStatus::Requested)
                .unwrap();
        }
        l.save_profile("https://x.test/in/z", "z", "", ProfileStatus::Skipped).unwrap();
        l.mark_accepted("https://x.test/in/d").unwrap();
        l.mark_accepted("https://x.test/in/c").unwrap();

        assert_eq!(
            l.requested_profiles().unwrap(),
            vec!["https://x.test/in/a", "https://x.test/in/b"]
        );
        assert_eq!(
            l.pending_followups().unwrap(),
            vec!["https://x.test/in/c", "https://x.test/in/d"]
        );
        let counts = l.status_counts().unwrap();
        assert_eq!(
            counts,
            StatusCounts {
                skipped: 1,
                requested: 2,
                accepted: 2,
                messaged: 0
            }
        );
    }

    #[test]
    fn test_combined_writes_keep_counters_and_rows_in_step() {
        let clock = clock_at(10);
        let l = ledger(clock.clone());
        for i in 0..3 {
            l.record_connection(&format!("https://x.test/in/p{i}"), "P", "Co").unwrap();
        }
        l.mark_accepted("https://x.test/in/p0").unwrap();
        assert_eq!(l.record_message("https://x.test/in/p0", "thanks!").unwrap(), 1);

        clock.advance(chrono::Duration::days(1));
        l.record_connection("https://x.test/in/p9", "P", "Co").unwrap();
        l.record_message("https://x.test/in/p1", "hello").unwrap();

        let conn = l.lock_conn();
        for day in ["2026-05-04", "2026-05-05"] {
            let conns: u32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM connections WHERE status != 'skipped' AND substr(contacted_at, 1, 10) = ?1",
                    params![day],
                    |r| r.get(0),
                )
                .unwrap();
            let msgs: u32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM messages WHERE substr(sent_at, 1, 10) = ?1",
                    params![day],
                    |r| r.get(0),
                )
                .unwrap();
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap();
            assert_eq!(read_counter(&conn, &ActionKind::Connections.counter_key(date)).unwrap(), conns);
            assert_eq!(read_counter(&conn, &ActionKind::Messages.counter_key(date)).unwrap(), msgs);
        }
        drop(conn);
        assert_eq!(
            l.profile("https://x.test/in/p0").unwrap().unwrap().status,
            ProfileStatus::Messaged
        );
    }

    #[test]
    fn test_meta_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        {
            let l = Ledger::open_with_clock(&path, clock_at(8)).unwrap();
            l.record_login().unwrap();
            l.record_connection("https://x.test/in/kept", "K", "").unwrap();
        }
        let l = Ledger::open_with_clock(&path, clock_at(8)).unwrap();
        assert!(l.meta("last_login_at").unwrap().unwrap().starts_with("2026-05-04T08:15"));
        assert!(l.meta("missing").unwrap().is_none());
        assert!(l.contains("https://x.test/in/kept").unwrap());
        assert_eq!(l.get_daily_counter(ActionKind::Connections).unwrap(), 1);
    }
}
