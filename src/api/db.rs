//! Store accessors. Quote reads come in two flavors: `find_live_*` /
//! `list_live` only see rows whose `deleted_at` is NULL, while the
//! `*_any` accessors see every row. Call sites pick one explicitly;
//! there is no implicit default filter.

use sqlx::{query, query_as, Pool, Postgres, Transaction};

use crate::auth::User;
use crate::schema::db::{Book, Id, Quote, QuoteDetail, UserRow};

const DETAIL_COLUMNS: &str = "q.id, q.body, q.page_number, q.created_at, q.deleted_at,
        b.id AS book_id, b.title, b.author, u.username AS submitter
        FROM quotes q
        JOIN books b ON b.id = q.book_id
        JOIN users u ON u.id = q.user_id";

/// Provision the users row for an authenticated identity, refreshing
/// profile fields from the token claims on every hit. Callers supply
/// the email separately because the claim is optional on the token and
/// the column is UNIQUE NOT NULL; identities without one are rejected
/// before reaching the store.
pub async fn get_or_create_user(
    db: &Pool<Postgres>,
    user: &User,
    email: &str,
) -> Result<UserRow, sqlx::Error> {
    query_as::<_, UserRow>(
        "INSERT INTO users (username, email, first_name, last_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (username) DO UPDATE
            SET email = EXCLUDED.email,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name
        RETURNING id, username, email, first_name, last_name",
    )
    .bind(&user.preferred_username)
    .bind(email)
    .bind(user.given_name.clone().unwrap_or_default())
    .bind(user.family_name.clone().unwrap_or_default())
    .fetch_one(db)
    .await
}

pub async fn list_users(db: &Pool<Postgres>) -> Result<Vec<UserRow>, sqlx::Error> {
    query_as::<_, UserRow>("SELECT id, username, email, first_name, last_name FROM users")
        .fetch_all(db)
        .await
}

/// Atomic find-or-insert on (title, author). The DO UPDATE arm makes
/// RETURNING yield a row for the existing book as well, so concurrent
/// identical submissions resolve to the same id without a race window.
/// The assignment is a no-op: resolving a book is a read, only real
/// edits may move `updated_at`.
pub async fn resolve_or_create_book(
    tx: &mut Transaction<'_, Postgres>,
    title: &str,
    author: &str,
) -> Result<Id, sqlx::Error> {
    query_as::<_, Id>(
        "INSERT INTO books (title, author) VALUES ($1, $2)
        ON CONFLICT (title, author) DO UPDATE SET title = EXCLUDED.title
        RETURNING id",
    )
    .bind(title)
    .bind(author)
    .fetch_one(&mut **tx)
    .await
}

pub async fn find_book(
    tx: &mut Transaction<'_, Postgres>,
    book_id: i32,
) -> Result<Option<Id>, sqlx::Error> {
    query_as::<_, Id>("SELECT id FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_optional(&mut **tx)
        .await
}

pub async fn list_books(db: &Pool<Postgres>) -> Result<Vec<Book>, sqlx::Error> {
    query_as::<_, Book>(
        "SELECT id, title, author, created_at, updated_at FROM books ORDER BY title, author",
    )
    .fetch_all(db)
    .await
}

pub async fn find_live_quote(
    tx: &mut Transaction<'_, Postgres>,
    body: &str,
    book_id: i32,
    user_id: i32,
) -> Result<Option<Id>, sqlx::Error> {
    query_as::<_, Id>(
        "SELECT id FROM quotes
        WHERE body = $1 AND book_id = $2 AND user_id = $3 AND deleted_at IS NULL",
    )
    .bind(body)
    .bind(book_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn insert_quote(
    tx: &mut Transaction<'_, Postgres>,
    body: &str,
    book_id: i32,
    user_id: i32,
    page_number: Option<i32>,
) -> Result<Quote, sqlx::Error> {
    query_as::<_, Quote>(
        "INSERT INTO quotes (body, book_id, user_id, page_number)
        VALUES ($1, $2, $3, $4)
        RETURNING id, body, book_id, user_id, page_number, created_at, updated_at, deleted_at",
    )
    .bind(body)
    .bind(book_id)
    .bind(user_id)
    .bind(page_number)
    .fetch_one(&mut **tx)
    .await
}

pub async fn update_quote(
    tx: &mut Transaction<'_, Postgres>,
    quote_id: i32,
    body: &str,
    book_id: i32,
    user_id: i32,
    page_number: Option<i32>,
) -> Result<Option<Quote>, sqlx::Error> {
    query_as::<_, Quote>(
        "UPDATE quotes
        SET body = $2, book_id = $3, page_number = $4, updated_at = NOW()
        WHERE id = $1 AND user_id = $5 AND deleted_at IS NULL
        RETURNING id, body, book_id, user_id, page_number, created_at, updated_at, deleted_at",
    )
    .bind(quote_id)
    .bind(body)
    .bind(book_id)
    .bind(page_number)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn find_live_detail(
    db: &Pool<Postgres>,
    quote_id: i32,
) -> Result<Option<QuoteDetail>, sqlx::Error> {
    query_as::<_, QuoteDetail>(&format!(
        "SELECT {DETAIL_COLUMNS}
        WHERE q.id = $1 AND q.deleted_at IS NULL"
    ))
    .bind(quote_id)
    .fetch_optional(db)
    .await
}

pub async fn list_live(
    db: &Pool<Postgres>,
    search: &str,
    lt_qid: i32,
    book_id: Option<i32>,
    limit: i64,
) -> Result<Vec<QuoteDetail>, sqlx::Error> {
    query_as::<_, QuoteDetail>(&format!(
        "SELECT {DETAIL_COLUMNS}
        WHERE q.deleted_at IS NULL
        AND LOWER(q.body) LIKE LOWER($1)
        AND CASE WHEN $2 > 0 THEN q.id < $2 ELSE true END
        AND ($3::int4 IS NULL OR q.book_id = $3)
        ORDER BY q.id DESC
        LIMIT $4"
    ))
    .bind(search)
    .bind(lt_qid)
    .bind(book_id)
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Admin surface: every row, soft-deleted ones included.
pub async fn list_any(db: &Pool<Postgres>, limit: i64) -> Result<Vec<QuoteDetail>, sqlx::Error> {
    query_as::<_, QuoteDetail>(&format!(
        "SELECT {DETAIL_COLUMNS}
        ORDER BY q.id DESC
        LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Stamp `deleted_at` on a quote owned by `user_id`, found through the
/// all-rows surface. Returns false when no owned row matched, whether
/// the id is absent or belongs to someone else.
pub async fn soft_delete_quote(
    db: &Pool<Postgres>,
    quote_id: i32,
    user_id: i32,
) -> Result<bool, sqlx::Error> {
    let result = query("UPDATE quotes SET deleted_at = NOW() WHERE id = $1 AND user_id = $2")
        .bind(quote_id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn hard_delete_quote(db: &Pool<Postgres>, quote_id: i32) -> Result<bool, sqlx::Error> {
    let result = query("DELETE FROM quotes WHERE id = $1")
        .bind(quote_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Cascades to the book's quotes, live or deleted. Callers gate this
/// behind an explicit confirmation.
pub async fn hard_delete_book(db: &Pool<Postgres>, book_id: i32) -> Result<bool, sqlx::Error> {
    let result = query("DELETE FROM books WHERE id = $1")
        .bind(book_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn live_quotes_for_user(
    db: &Pool<Postgres>,
    user_id: i32,
) -> Result<Vec<QuoteDetail>, sqlx::Error> {
    query_as::<_, QuoteDetail>(&format!(
        "SELECT {DETAIL_COLUMNS}
        WHERE q.deleted_at IS NULL AND q.user_id = $1"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}
