/// Database row types, mapped 1:1 from the `users` table.
/// Kept apart from fontid-types so the API never sees `password_hash`.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
    pub plan: Option<String>,
    pub expiry_date: Option<String>,
}
