//! Meeting rows.

use crate::database::{Database, Transaction};
use crate::error::{StorageError, StorageResult};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use spanningtree_types::{
    FilterParam, Identity, Meeting, MeetingId, TableAcl, Timestamp, UserId, compile_filter,
};

const COLUMNS: &str = "id, host_id, invited_by, city, state, title, notes, last_modified";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Meeting> {
    let raw_id: String = row.get(0)?;
    let id = MeetingId::parse(&raw_id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(Meeting {
        city: row.get(3)?,
        host_id: UserId::new(row.get(1)?),
        id,
        invited_by: row.get::<_, Option<i64>>(2)?.map(UserId::new),
        last_modified: row.get::<_, Option<i64>>(7)?.map(Timestamp::from_secs),
        notes: row.get(6)?,
        state: row.get(4)?,
        title: row.get(5)?,
    })
}

fn get(conn: &Connection, id: &MeetingId) -> StorageResult<Option<Meeting>> {
    let meeting = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM meetings WHERE id = ?1"),
            params![id.to_string()],
            from_row,
        )
        .optional()?;
    Ok(meeting)
}

fn insert(conn: &Connection, meeting: &Meeting) -> StorageResult<()> {
    conn.execute(
        &format!("INSERT INTO meetings ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            meeting.id.to_string(),
            meeting.host_id.get(),
            meeting.invited_by.map(|u| u.get()),
            meeting.city,
            meeting.state,
            meeting.title,
            meeting.notes,
            meeting.last_modified.map(|t| t.as_secs()),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StorageError::AlreadyExists(format!("meeting {}", meeting.id))
        }
        other => other.into(),
    })?;
    Ok(())
}

fn replace(conn: &Connection, meeting: &Meeting) -> StorageResult<()> {
    let changed = conn.execute(
        "UPDATE meetings SET host_id = ?2, invited_by = ?3, city = ?4, state = ?5,
             title = ?6, notes = ?7, last_modified = ?8
         WHERE id = ?1",
        params![
            meeting.id.to_string(),
            meeting.host_id.get(),
            meeting.invited_by.map(|u| u.get()),
            meeting.city,
            meeting.state,
            meeting.title,
            meeting.notes,
            meeting.last_modified.map(|t| t.as_secs()),
        ],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("meeting {}", meeting.id)));
    }
    Ok(())
}

fn query(conn: &Connection, sql: &str, values: Vec<Value>) -> StorageResult<Vec<Meeting>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn bind(params: Vec<FilterParam>) -> Vec<Value> {
    params
        .into_iter()
        .map(|p| match p {
            FilterParam::Text(s) => Value::Text(s),
            FilterParam::Integer(i) => Value::Integer(i),
        })
        .collect()
}

impl Database {
    /// Loads a meeting by id.
    pub fn meeting(&self, id: &MeetingId) -> StorageResult<Option<Meeting>> {
        get(&*self.lock()?, id)
    }

    /// Inserts a new meeting. Fails with `AlreadyExists` on a duplicate id.
    pub fn insert_meeting(&self, meeting: &Meeting) -> StorageResult<()> {
        insert(&*self.lock()?, meeting)
    }

    /// Overwrites every field of an existing meeting.
    pub fn replace_meeting(&self, meeting: &Meeting) -> StorageResult<()> {
        replace(&*self.lock()?, meeting)
    }

    /// Meetings whose `last_modified` is strictly after `since`, oldest
    /// first. `None` returns every meeting that carries a timestamp.
    ///
    /// Served by the `last_modified` index.
    pub fn meetings_changed_since(&self, since: Option<Timestamp>) -> StorageResult<Vec<Meeting>> {
        let conn = self.lock()?;
        match since {
            Some(since) => query(
                &conn,
                &format!(
                    "SELECT {COLUMNS} FROM meetings
                     WHERE last_modified > ?1
                     ORDER BY last_modified, id"
                ),
                vec![Value::Integer(since.as_secs())],
            ),
            None => query(
                &conn,
                &format!(
                    "SELECT {COLUMNS} FROM meetings
                     WHERE last_modified IS NOT NULL
                     ORDER BY last_modified, id"
                ),
                Vec::new(),
            ),
        }
    }

    /// Meetings `viewer` may see, filtered in SQL.
    pub fn meetings_visible_to(&self, viewer: &Identity) -> StorageResult<Vec<Meeting>> {
        let filter = compile_filter(viewer, &TableAcl::MEETINGS);
        let sql = format!(
            "SELECT {COLUMNS} FROM meetings WHERE {} ORDER BY last_modified, id",
            filter.clause
        );
        query(&*self.lock()?, &sql, bind(filter.params))
    }

    /// Every meeting, oldest first.
    pub fn list_meetings(&self) -> StorageResult<Vec<Meeting>> {
        query(
            &*self.lock()?,
            &format!("SELECT {COLUMNS} FROM meetings ORDER BY last_modified, id"),
            Vec::new(),
        )
    }

    pub fn meeting_count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM meetings", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| StorageError::InvalidData(format!("row count {count}")))
    }
}

impl Transaction<'_> {
    pub fn meeting(&self, id: &MeetingId) -> StorageResult<Option<Meeting>> {
        get(self.conn(), id)
    }

    pub fn insert_meeting(&self, meeting: &Meeting) -> StorageResult<()> {
        insert(self.conn(), meeting)
    }

    pub fn replace_meeting(&self, meeting: &Meeting) -> StorageResult<()> {
        replace(self.conn(), meeting)
    }
}
