//! Community member rows (`nodes` table).

use crate::database::{Database, Transaction};
use crate::error::{StorageError, StorageResult};
use crate::meetings::bind;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use spanningtree_types::{Identity, Member, NewMember, TableAcl, Timestamp, UserId, compile_filter};

const COLUMNS: &str = "id, name, email, city, state, invited_by, cc_score";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        city: row.get(3)?,
        state: row.get(4)?,
        invited_by: row.get::<_, Option<i64>>(5)?.map(UserId::new),
        cc_score: row.get(6)?,
    })
}

fn insert(
    conn: &Connection,
    member: &NewMember,
    invited_by: Option<UserId>,
) -> StorageResult<Member> {
    conn.execute(
        "INSERT INTO nodes (name, email, city, state, invited_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            member.name,
            member.email,
            member.city,
            member.state,
            invited_by.map(|u| u.get()),
            Timestamp::now().as_secs(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StorageError::AlreadyExists(format!("member {}", member.email))
        }
        other => other.into(),
    })?;
    Ok(Member {
        id: conn.last_insert_rowid(),
        name: member.name.clone(),
        email: member.email.clone(),
        city: member.city.clone(),
        state: member.state.clone(),
        invited_by,
        cc_score: 0,
    })
}

impl Database {
    /// Adds a member brought in by `invited_by`.
    pub fn insert_member(
        &self,
        member: &NewMember,
        invited_by: Option<UserId>,
    ) -> StorageResult<Member> {
        insert(&*self.lock()?, member, invited_by)
    }

    pub fn member(&self, id: i64) -> StorageResult<Option<Member>> {
        let member = self
            .lock()?
            .query_row(
                &format!("SELECT {COLUMNS} FROM nodes WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()?;
        Ok(member)
    }

    /// Members `viewer` may see, highest score first.
    pub fn members_visible_to(&self, viewer: &Identity) -> StorageResult<Vec<Member>> {
        let filter = compile_filter(viewer, &TableAcl::NODES);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM nodes WHERE {} ORDER BY cc_score DESC, id",
            filter.clause
        ))?;
        let rows = stmt
            .query_map(params_from_iter(bind(filter.params)), from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl Transaction<'_> {
    pub fn insert_member(
        &self,
        member: &NewMember,
        invited_by: Option<UserId>,
    ) -> StorageResult<Member> {
        insert(self.conn(), member, invited_by)
    }
}
