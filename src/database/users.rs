use serde::Serialize;
use serde_json::Value;

use super::{Database, DatabaseError, JsonRow, SqlValue, Statement};

const FIND_BY_USERNAME: &str = r#"
    SELECT UserId, Username, DisplayName, PasswordHash, Role, IsActive
    FROM dbo.Users
    WHERE Username = @P1
"#;

const INSERT_USER: &str = r#"
    INSERT INTO dbo.Users (Username, DisplayName, PasswordHash, Role, IsActive)
    OUTPUT inserted.UserId
    VALUES (@P1, @P2, @P3, @P4, 1)
"#;

/// Row of `dbo.Users` as read at login.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
}

/// User fields safe to return to clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub role: String,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.display_name.clone(),
            role: user.role.clone(),
        }
    }
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub display_name: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
}

/// Look up a user by username
pub async fn find_user_by_username(
    db: &dyn Database,
    username: &str,
) -> Result<Option<UserRecord>, DatabaseError> {
    let statement =
        Statement::sql(FIND_BY_USERNAME).bind("username", SqlValue::Text(username.to_string()));

    let rows = db.execute(&statement).await?;
    rows.first().map(parse_user).transpose()
}

/// Insert a user and return the generated id. A duplicate username surfaces
/// as [`DatabaseError::UniqueViolation`].
pub async fn insert_user(db: &dyn Database, user: NewUser<'_>) -> Result<i64, DatabaseError> {
    let statement = Statement::sql(INSERT_USER)
        .bind("username", SqlValue::Text(user.username.to_string()))
        .bind("displayName", SqlValue::Text(user.display_name.to_string()))
        .bind("passwordHash", SqlValue::Text(user.password_hash.to_string()))
        .bind("role", SqlValue::Text(user.role.to_string()));

    let rows = db.execute(&statement).await?;
    rows.first()
        .and_then(|row| row.get("UserId"))
        .and_then(Value::as_i64)
        .ok_or_else(|| DatabaseError::Query("insert did not return UserId".to_string()))
}

fn parse_user(row: &JsonRow) -> Result<UserRecord, DatabaseError> {
    let text = |column: &str| -> String {
        match row.get(column) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    };

    let id = row
        .get("UserId")
        .and_then(Value::as_i64)
        .ok_or_else(|| DatabaseError::Query("user row is missing UserId".to_string()))?;

    let active = match row.get("IsActive") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    };

    Ok(UserRecord {
        id,
        username: text("Username"),
        display_name: text("DisplayName"),
        password_hash: text("PasswordHash"),
        role: text("Role"),
        active,
    })
}
