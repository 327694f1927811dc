//! Row-level access control.
//!
//! [`allows`] decides in memory whether a viewer may see a row.
//! [`compile_filter`] produces the equivalent SQL `WHERE` fragment so the
//! same decision can be pushed down to storage. The two must agree for
//! every (viewer, record) pair; the storage tests check this against SQLite
//! for each table.

use crate::{Identity, Meeting, Member, Role, UserId};

/// The columns of a row that access decisions look at.
///
/// Each implementation must agree with its table's [`TableAcl`].
pub trait AclRecord {
    fn state(&self) -> &str;
    fn city(&self) -> &str;
    fn invited_by(&self) -> Option<UserId>;
    /// True if `user` owns the row for facilitator access.
    fn is_owned_by(&self, user: UserId) -> bool;
}

impl AclRecord for Meeting {
    fn state(&self) -> &str {
        &self.state
    }

    fn city(&self) -> &str {
        &self.city
    }

    fn invited_by(&self) -> Option<UserId> {
        self.invited_by
    }

    fn is_owned_by(&self, user: UserId) -> bool {
        self.host_id == user || self.invited_by == Some(user)
    }
}

impl AclRecord for Member {
    fn state(&self) -> &str {
        &self.state
    }

    fn city(&self) -> &str {
        &self.city
    }

    fn invited_by(&self) -> Option<UserId> {
        self.invited_by
    }

    fn is_owned_by(&self, user: UserId) -> bool {
        self.invited_by == Some(user)
    }
}

/// Returns true if `viewer` may see `record`.
///
/// - national, dev: everything
/// - statal: records in the viewer's state
/// - municipal: records in the viewer's city
/// - facilitator: records they own (see [`AclRecord::is_owned_by`])
/// - shadower: records they invited
/// - connector: nothing
#[must_use]
pub fn allows<R: AclRecord + ?Sized>(viewer: &Identity, record: &R) -> bool {
    let region = viewer.region.as_deref();
    match viewer.role {
        Role::National | Role::Dev => true,
        Role::Statal => region == Some(record.state()),
        Role::Municipal => region == Some(record.city()),
        Role::Facilitator => record.is_owned_by(viewer.id),
        Role::Shadower => record.invited_by() == Some(viewer.id),
        Role::Connector => false,
    }
}

/// Column mapping of one table for ACL filtering.
///
/// Ownership differs per table: a meeting is "owned" by its host and by
/// whoever invited it, while membership-like tables only know who invited
/// the row. Each table states this explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableAcl {
    pub table: &'static str,
    pub state_column: &'static str,
    pub city_column: &'static str,
    /// Column checked for shadowers.
    pub invited_by_column: &'static str,
    /// Columns any one of which grants a facilitator access.
    pub owner_columns: &'static [&'static str],
}

impl TableAcl {
    pub const MEETINGS: TableAcl = TableAcl {
        table: "meetings",
        state_column: "state",
        city_column: "city",
        invited_by_column: "invited_by",
        owner_columns: &["host_id", "invited_by"],
    };

    pub const NODES: TableAcl = TableAcl {
        table: "nodes",
        state_column: "state",
        city_column: "city",
        invited_by_column: "invited_by",
        owner_columns: &["invited_by"],
    };
}

/// A bound parameter of a compiled filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterParam {
    Text(String),
    Integer(i64),
}

/// A SQL boolean expression plus its positional (`?`) parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<FilterParam>,
}

impl SqlFilter {
    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            clause: "1 = 1".to_string(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn deny_all() -> Self {
        Self {
            clause: "1 = 0".to_string(),
            params: Vec::new(),
        }
    }

    fn column_eq(column: &str, param: FilterParam) -> Self {
        Self {
            clause: format!("{column} = ?"),
            params: vec![param],
        }
    }
}

/// Compiles the storage filter equivalent to [`allows`] for `table`.
#[must_use]
pub fn compile_filter(viewer: &Identity, table: &TableAcl) -> SqlFilter {
    let user_id = FilterParam::Integer(viewer.id.get());
    match viewer.role {
        Role::National | Role::Dev => SqlFilter::allow_all(),
        Role::Statal | Role::Municipal => {
            let Some(region) = viewer.region.as_deref() else {
                return SqlFilter::deny_all();
            };
            let column = if viewer.role == Role::Statal {
                table.state_column
            } else {
                table.city_column
            };
            SqlFilter::column_eq(column, FilterParam::Text(region.to_string()))
        }
        Role::Facilitator => {
            if table.owner_columns.is_empty() {
                return SqlFilter::deny_all();
            }
            let clause = table
                .owner_columns
                .iter()
                .map(|c| format!("({c} = ?)"))
                .collect::<Vec<_>>()
                .join(" OR ");
            SqlFilter {
                clause,
                params: vec![user_id; table.owner_columns.len()],
            }
        }
        Role::Shadower => SqlFilter::column_eq(table.invited_by_column, user_id),
        Role::Connector => SqlFilter::deny_all(),
    }
}
