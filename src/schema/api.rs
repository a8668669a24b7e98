use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::schema::db::QuoteDetail;

/// A quote submission. Either `book` or both `title` and `author` must
/// be set; `page_number` left blank means absent.
#[derive(Deserialize, Debug, ToSchema)]
pub struct NewQuote {
    pub quote: String,
    pub book: Option<i32>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub page_number: Option<i32>,
}

#[derive(Deserialize, Debug, IntoParams)]
pub struct FetchParams {
    pub q: Option<String>,
    pub lt: Option<i32>,
    pub limit: Option<u32>,
    pub book: Option<i32>,
}

#[derive(Deserialize, Debug, IntoParams)]
pub struct ConfirmParams {
    pub confirm: Option<bool>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct QuoteResponse {
    pub id: i32,
    pub quote: String,
    pub book: BookResponse,
    pub submitter: String,
    pub page_number: Option<i32>,
    pub created_at: chrono::NaiveDateTime,
    pub deleted_at: Option<chrono::NaiveDateTime>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BookResponse {
    pub id: i32,
    pub title: String,
    pub author: String,
}

impl From<QuoteDetail> for QuoteResponse {
    fn from(row: QuoteDetail) -> Self {
        QuoteResponse {
            id: row.id,
            quote: row.body,
            book: BookResponse {
                id: row.book_id,
                title: row.title,
                author: row.author,
            },
            submitter: row.submitter,
            page_number: row.page_number,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}
