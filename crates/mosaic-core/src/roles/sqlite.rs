//! SQLite persistence for roles and users.
//!
//! Scopes are stored as JSON text in `roles.permission_scopes`, the role
//! references of a user as a JSON id list in `users.role`.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::info;

use mosaic_types::{Role, RoleId, User, UserId};

use super::plan::plan_base_path_rewrites;
use super::store::RoleStore;
use crate::access::{AccessError, AccessResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    permission_scopes TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    base_path TEXT NOT NULL DEFAULT '/',
    role TEXT NOT NULL DEFAULT '[]',
    disabled INTEGER NOT NULL DEFAULT 0,
    password_ts INTEGER NOT NULL DEFAULT 0
);
"#;

const ROLE_COLUMNS: &str = "id, name, description, permission_scopes";
const USER_COLUMNS: &str = "id, username, base_path, role, disabled, password_ts";

/// Raw `roles` row.
struct RoleRow {
    id: u32,
    name: String,
    description: String,
    scopes: String,
}

impl RoleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            scopes: row.get(3)?,
        })
    }

    fn into_role(self) -> AccessResult<Role> {
        let mut role = Role::new(RoleId::new(self.id), self.name).with_description(self.description);
        role.permission_scopes = Role::scopes_from_json(&self.scopes).map_err(AccessError::store)?;
        Ok(role)
    }
}

/// Raw `users` row.
struct UserRow {
    id: u32,
    username: String,
    base_path: String,
    role: String,
    disabled: bool,
    password_ts: i64,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            base_path: row.get(2)?,
            role: row.get(3)?,
            disabled: row.get(4)?,
            password_ts: row.get(5)?,
        })
    }

    fn into_user(self) -> AccessResult<User> {
        let mut user = User::new(UserId::new(self.id), self.username).with_base_path(self.base_path);
        user.role_ids = serde_json::from_str(&self.role).map_err(AccessError::store)?;
        user.disabled = self.disabled;
        user.password_ts = self.password_ts;
        Ok(user)
    }
}

/// SQLite-backed [`RoleStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a database at `path`.
    pub fn open(path: impl AsRef<Path>) -> AccessResult<Self> {
        let conn = Connection::open(path).map_err(AccessError::store)?;
        Self::init(conn)
    }

    /// An in-memory database (for testing).
    pub fn in_memory() -> AccessResult<Self> {
        let conn = Connection::open_in_memory().map_err(AccessError::store)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AccessResult<Self> {
        conn.execute_batch(SCHEMA).map_err(AccessError::store)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_role(&self, clause: &str, param: &dyn rusqlite::ToSql) -> AccessResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE {clause}");
        let row = self
            .conn
            .lock()
            .query_row(&sql, [param], RoleRow::from_row)
            .optional()
            .map_err(AccessError::store)?;
        row.map(RoleRow::into_role).transpose()
    }

    fn query_user(&self, clause: &str, param: &dyn rusqlite::ToSql) -> AccessResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let row = self
            .conn
            .lock()
            .query_row(&sql, [param], UserRow::from_row)
            .optional()
            .map_err(AccessError::store)?;
        row.map(UserRow::into_user).transpose()
    }

    fn all_users(&self) -> AccessResult<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .map_err(AccessError::store)?;
        let rows = stmt
            .query_map([], UserRow::from_row)
            .map_err(AccessError::store)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(AccessError::store)?;
        rows.into_iter().map(UserRow::into_user).collect()
    }
}

/// Map a uniqueness violation to `AlreadyExists`.
fn write_error(e: rusqlite::Error, name: &str) -> AccessError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            AccessError::AlreadyExists(name.to_string())
        }
        _ => AccessError::store(e),
    }
}

#[async_trait]
impl RoleStore for SqliteStore {
    async fn load_role(&self, id: RoleId) -> AccessResult<Role> {
        self.query_role("id = ?1", &id.get())?
            .ok_or_else(|| AccessError::RoleNotFound(id.to_string()))
    }

    async fn load_role_by_name(&self, name: &str) -> AccessResult<Role> {
        self.query_role("name = ?1", &name)?
            .ok_or_else(|| AccessError::RoleNotFound(name.to_string()))
    }

    async fn list_roles(&self) -> AccessResult<Vec<Role>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY id"))
            .map_err(AccessError::store)?;
        let rows = stmt
            .query_map([], RoleRow::from_row)
            .map_err(AccessError::store)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(AccessError::store)?;
        rows.into_iter().map(RoleRow::into_role).collect()
    }

    async fn save_role(&self, mut role: Role) -> AccessResult<Role> {
        let scopes = role.scopes_json().map_err(AccessError::store)?;
        let conn = self.conn.lock();
        if role.id.get() == 0 {
            conn.execute(
                "INSERT INTO roles (name, description, permission_scopes) VALUES (?1, ?2, ?3)",
                params![role.name, role.description, scopes],
            )
            .map_err(|e| write_error(e, &role.name))?;
            let id = u32::try_from(conn.last_insert_rowid()).map_err(AccessError::store)?;
            role.id = RoleId::new(id);
        } else {
            conn.execute(
                "INSERT INTO roles (id, name, description, permission_scopes) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    permission_scopes = excluded.permission_scopes",
                params![role.id.get(), role.name, role.description, scopes],
            )
            .map_err(|e| write_error(e, &role.name))?;
        }
        Ok(role)
    }

    async fn delete_role(&self, id: RoleId) -> AccessResult<()> {
        let deleted = self
            .conn
            .lock()
            .execute("DELETE FROM roles WHERE id = ?1", [id.get()])
            .map_err(AccessError::store)?;
        if deleted == 0 {
            return Err(AccessError::RoleNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn load_user(&self, username: &str) -> AccessResult<User> {
        self.query_user("username = ?1", &username)?
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))
    }

    async fn load_user_by_id(&self, id: UserId) -> AccessResult<User> {
        self.query_user("id = ?1", &id.get())?
            .ok_or_else(|| AccessError::UserNotFound(id.to_string()))
    }

    async fn list_users(&self) -> AccessResult<Vec<User>> {
        self.all_users()
    }

    async fn save_user(&self, mut user: User) -> AccessResult<User> {
        let roles = serde_json::to_string(&user.role_ids).map_err(AccessError::store)?;
        let conn = self.conn.lock();
        if user.id.get() == 0 {
            conn.execute(
                "INSERT INTO users (username, base_path, role, disabled, password_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user.username, user.base_path, roles, user.disabled, user.password_ts],
            )
            .map_err(|e| write_error(e, &user.username))?;
            let id = u32::try_from(conn.last_insert_rowid()).map_err(AccessError::store)?;
            user.id = UserId::new(id);
        } else {
            conn.execute(
                "INSERT INTO users (id, username, base_path, role, disabled, password_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    username = excluded.username,
                    base_path = excluded.base_path,
                    role = excluded.role,
                    disabled = excluded.disabled,
                    password_ts = excluded.password_ts",
                params![
                    user.id.get(),
                    user.username,
                    user.base_path,
                    roles,
                    user.disabled,
                    user.password_ts
                ],
            )
            .map_err(|e| write_error(e, &user.username))?;
        }
        Ok(user)
    }

    async fn rewrite_user_base_paths(&self, old: &str, new: &str) -> AccessResult<Vec<String>> {
        let users = self.all_users()?;
        let plan = plan_base_path_rewrites(&users, old, new);
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(AccessError::store)?;
        for rewrite in &plan {
            tx.execute(
                "UPDATE users SET base_path = ?1 WHERE id = ?2",
                params![rewrite.to, rewrite.user_id.get()],
            )
            .map_err(AccessError::store)?;
        }
        tx.commit().map_err(AccessError::store)?;

        info!(from = %old, to = %new, users = plan.len(), "user base paths rewritten");
        Ok(plan.into_iter().map(|r| r.username).collect())
    }

    async fn load_user_roles(&self, user_id: UserId) -> AccessResult<Vec<Role>> {
        let user = self.load_user_by_id(user_id).await?;
        let mut roles = Vec::with_capacity(user.role_ids.len());
        for id in &user.role_ids {
            if let Some(role) = self.query_role("id = ?1", &id.get())? {
                roles.push(role);
            }
        }
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_types::{Perm, PermSet};

    #[tokio::test]
    async fn test_role_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        store.save_role(Role::admin()).await.unwrap();
        let team = store
            .save_role(
                Role::new(RoleId::new(0), "team")
                    .with_scope("/t", PermSet::from(Perm::Write))
                    .with_scope("/u", PermSet::NONE),
            )
            .await
            .unwrap();
        assert_eq!(team.id, RoleId::new(3));

        let loaded = store.load_role_by_name("team").await.unwrap();
        assert_eq!(loaded, team);
        assert_eq!(store.load_role(RoleId::ADMIN).await.unwrap(), Role::admin());

        let dup = store.save_role(Role::new(RoleId::new(0), "admin")).await;
        assert!(matches!(dup, Err(AccessError::AlreadyExists(_))));

        store.delete_role(team.id).await.unwrap();
        assert!(store.load_role(team.id).await.unwrap_err().is_not_found());
        assert_eq!(store.list_roles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_scopes_persist_as_empty_text() {
        let store = SqliteStore::in_memory().unwrap();
        let bare = store.save_role(Role::new(RoleId::new(0), "bare")).await.unwrap();
        let raw: String = store
            .conn
            .lock()
            .query_row(
                "SELECT permission_scopes FROM roles WHERE id = ?1",
                [bare.id.get()],
                |row| row.get(0),
            )
            .unwrap();
        assert!(raw.is_empty());
        assert!(store.load_role(bare.id).await.unwrap().permission_scopes.is_empty());
    }

    #[tokio::test]
    async fn test_users_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosaic.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_role(Role::guest()).await.unwrap();
            for (name, base) in [("a", "/old"), ("b", "/old/x"), ("c", "/else")] {
                store
                    .save_user(
                        User::new(UserId::new(0), name)
                            .with_base_path(base)
                            .with_role(RoleId::GUEST)
                            .with_role(RoleId::new(42)),
                    )
                    .await
                    .unwrap();
            }
        }

        let store = SqliteStore::open(&path).unwrap();
        let affected = store.rewrite_user_base_paths("/old", "/new").await.unwrap();
        assert_eq!(affected, vec!["a", "b"]);
        let b = store.load_user("b").await.unwrap();
        assert_eq!(b.base_path, "/new/x");
        assert_eq!(b.role_ids, vec![RoleId::GUEST, RoleId::new(42)]);

        let roles = store.load_user_roles(b.id).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "guest");
    }
}
