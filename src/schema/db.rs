use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(FromRow)]
pub struct Id {
    pub id: i32, // SERIAL value
}

#[derive(FromRow, Serialize, Debug, Clone, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(FromRow, Serialize, Debug, Clone, ToSchema)]
pub struct Quote {
    pub id: i32,
    pub body: String,
    pub book_id: i32,
    pub user_id: i32,
    pub page_number: Option<i32>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    pub deleted_at: Option<chrono::NaiveDateTime>,
}

/// A quote joined with its book and submitter, as read by the list,
/// detail and digest queries.
#[derive(FromRow, Serialize, Debug, Clone, ToSchema)]
pub struct QuoteDetail {
    pub id: i32,
    pub body: String,
    pub page_number: Option<i32>,
    pub created_at: chrono::NaiveDateTime,
    pub deleted_at: Option<chrono::NaiveDateTime>,
    pub book_id: i32,
    pub title: String,
    pub author: String,
    pub submitter: String,
}

#[derive(FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}
