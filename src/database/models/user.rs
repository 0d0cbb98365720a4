use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_never_serializes() {
        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            hashed_password: "secret-hash".to_string(),
            is_admin: false,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("hashed_password").is_none());
        assert_eq!(value["username"], "alice");
    }
}
