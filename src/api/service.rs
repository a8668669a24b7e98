//! Quote creation and soft deletion. Validation never touches the
//! store; persistence runs inside one transaction so a failure partway
//! through leaves no orphan book or partial quote behind.

use sqlx::{Pool, Postgres};

use crate::api::db;
use crate::schema::api::NewQuote;
use crate::schema::db::Quote;

/// Closed outcome of a create submission. Store faults are not a
/// variant; they surface as the `Err` arm of the surrounding `Result`.
#[derive(Debug)]
pub enum CreateOutcome {
    Success(Quote),
    FormError(&'static str),
    QuoteExists(i32),
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Quote),
    FormError(&'static str),
    NotFound,
}

pub const ERR_BOOK_REQUIRED: &str = "Please select a book or enter both a title and author.";
pub const ERR_BOOK_OVERSPECIFIED: &str =
    "You can only EITHER: 1) select a book OR 2) enter both a title and author.";
pub const ERR_TITLE_TOO_LONG: &str = "Title must be less than 255 characters.";
pub const ERR_AUTHOR_TOO_LONG: &str = "Author must be less than 255 characters.";
pub const ERR_QUOTE_REQUIRED: &str = "Quote text is required.";
pub const ERR_PAGE_NEGATIVE: &str = "Page number must be greater than or equal to 0.";
pub const ERR_BOOK_MISSING: &str = "Selected book does not exist.";

fn has_text(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

/// Pure input validation, run before any persistence. Returns the form
/// message for the first rule the submission breaks.
pub fn validate(new: &NewQuote) -> Option<&'static str> {
    let has_title = has_text(&new.title);
    let has_author = has_text(&new.author);

    if new.book.is_none() && !(has_title && has_author) {
        return Some(ERR_BOOK_REQUIRED);
    }
    if new.book.is_some() && (has_title || has_author) {
        return Some(ERR_BOOK_OVERSPECIFIED);
    }
    if new.book.is_none() {
        if new.title.as_deref().unwrap_or("").chars().count() > 255 {
            return Some(ERR_TITLE_TOO_LONG);
        }
        if new.author.as_deref().unwrap_or("").chars().count() > 255 {
            return Some(ERR_AUTHOR_TOO_LONG);
        }
    }
    if new.quote.is_empty() {
        return Some(ERR_QUOTE_REQUIRED);
    }
    if new.page_number.is_some_and(|p| p < 0) {
        return Some(ERR_PAGE_NEGATIVE);
    }
    None
}

/// Create a quote for `user_id`, resolving or creating its book. On a
/// retried identical submission the live-row lookup reports the first
/// row's id instead of inserting a duplicate; a race that slips past
/// the lookup still trips the partial unique index and comes back as a
/// store error.
pub async fn create_quote(
    db: &Pool<Postgres>,
    new: &NewQuote,
    user_id: i32,
) -> Result<CreateOutcome, sqlx::Error> {
    if let Some(message) = validate(new) {
        return Ok(CreateOutcome::FormError(message));
    }

    let mut tx = db.begin().await?;

    let book_id = match new.book {
        Some(id) => match db::find_book(&mut tx, id).await? {
            Some(book) => book.id,
            None => {
                tx.rollback().await?;
                return Ok(CreateOutcome::FormError(ERR_BOOK_MISSING));
            }
        },
        // validate() guarantees title and author are both present here
        None => {
            db::resolve_or_create_book(
                &mut tx,
                new.title.as_deref().unwrap_or(""),
                new.author.as_deref().unwrap_or(""),
            )
            .await?
            .id
        }
    };

    if let Some(existing) = db::find_live_quote(&mut tx, &new.quote, book_id, user_id).await? {
        tx.commit().await?;
        return Ok(CreateOutcome::QuoteExists(existing.id));
    }

    let quote = db::insert_quote(&mut tx, &new.quote, book_id, user_id, new.page_number).await?;
    tx.commit().await?;
    Ok(CreateOutcome::Success(quote))
}

/// Owner-scoped edit over the live view, with the same book-resolution
/// rules as creation.
pub async fn update_quote(
    db: &Pool<Postgres>,
    quote_id: i32,
    update: &NewQuote,
    user_id: i32,
) -> Result<UpdateOutcome, sqlx::Error> {
    if let Some(message) = validate(update) {
        return Ok(UpdateOutcome::FormError(message));
    }

    let mut tx = db.begin().await?;

    let book_id = match update.book {
        Some(id) => match db::find_book(&mut tx, id).await? {
            Some(book) => book.id,
            None => {
                tx.rollback().await?;
                return Ok(UpdateOutcome::FormError(ERR_BOOK_MISSING));
            }
        },
        None => {
            db::resolve_or_create_book(
                &mut tx,
                update.title.as_deref().unwrap_or(""),
                update.author.as_deref().unwrap_or(""),
            )
            .await?
            .id
        }
    };

    match db::update_quote(
        &mut tx,
        quote_id,
        &update.quote,
        book_id,
        user_id,
        update.page_number,
    )
    .await?
    {
        Some(quote) => {
            tx.commit().await?;
            Ok(UpdateOutcome::Updated(quote))
        }
        None => {
            tx.rollback().await?;
            Ok(UpdateOutcome::NotFound)
        }
    }
}

/// Stamp `deleted_at` on an owned quote. Absent and foreign rows both
/// come back as false so callers answer 404 either way.
pub async fn soft_delete(
    db: &Pool<Postgres>,
    quote_id: i32,
    user_id: i32,
) -> Result<bool, sqlx::Error> {
    db::soft_delete_quote(db, quote_id, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(
        quote: &str,
        book: Option<i32>,
        title: Option<&str>,
        author: Option<&str>,
        page_number: Option<i32>,
    ) -> NewQuote {
        NewQuote {
            quote: quote.to_string(),
            book,
            title: title.map(str::to_string),
            author: author.map(str::to_string),
            page_number,
        }
    }

    #[test]
    fn accepts_existing_book_reference() {
        let new = submission("Stone by stone.", Some(1), None, None, Some(100));
        assert_eq!(validate(&new), None);
    }

    #[test]
    fn accepts_new_title_and_author() {
        let new = submission(
            "Stone by stone.",
            None,
            Some("Pragmatic Programmer"),
            Some("Hunt/Thomas"),
            None,
        );
        assert_eq!(validate(&new), None);
    }

    #[test]
    fn rejects_missing_book_info() {
        let new = submission("Stone by stone.", None, None, None, None);
        assert_eq!(validate(&new), Some(ERR_BOOK_REQUIRED));
    }

    #[test]
    fn rejects_title_without_author() {
        let new = submission("Stone by stone.", None, Some("Pragmatic Programmer"), None, None);
        assert_eq!(validate(&new), Some(ERR_BOOK_REQUIRED));
    }

    #[test]
    fn rejects_book_and_title_together() {
        let new = submission(
            "Stone by stone.",
            Some(1),
            Some("Pragmatic Programmer"),
            Some("Hunt/Thomas"),
            None,
        );
        assert_eq!(validate(&new), Some(ERR_BOOK_OVERSPECIFIED));
    }

    #[test]
    fn rejects_book_and_partial_title_info() {
        let new = submission("Stone by stone.", Some(1), Some("Pragmatic Programmer"), None, None);
        assert_eq!(validate(&new), Some(ERR_BOOK_OVERSPECIFIED));
    }

    #[test]
    fn rejects_oversized_title() {
        let long = "a".repeat(256);
        let new = submission("Stone by stone.", None, Some(&long), Some("Hunt/Thomas"), None);
        assert_eq!(validate(&new), Some(ERR_TITLE_TOO_LONG));
    }

    #[test]
    fn accepts_title_of_exactly_255() {
        let edge = "a".repeat(255);
        let new = submission("Stone by stone.", None, Some(&edge), Some("Hunt/Thomas"), None);
        assert_eq!(validate(&new), None);
    }

    #[test]
    fn rejects_oversized_author() {
        let long = "a".repeat(256);
        let new = submission(
            "Stone by stone.",
            None,
            Some("Pragmatic Programmer"),
            Some(&long),
            None,
        );
        assert_eq!(validate(&new), Some(ERR_AUTHOR_TOO_LONG));
    }

    #[test]
    fn rejects_empty_quote_text() {
        let new = submission("", Some(1), None, None, None);
        assert_eq!(validate(&new), Some(ERR_QUOTE_REQUIRED));
    }

    #[test]
    fn rejects_negative_page_number() {
        let new = submission("Stone by stone.", Some(1), None, None, Some(-1));
        assert_eq!(validate(&new), Some(ERR_PAGE_NEGATIVE));
    }

    #[test]
    fn accepts_page_zero_and_absent_page() {
        let zero = submission("Stone by stone.", Some(1), None, None, Some(0));
        assert_eq!(validate(&zero), None);
        let absent = submission("Stone by stone.", Some(1), None, None, None);
        assert_eq!(validate(&absent), None);
    }

    #[test]
    fn book_selection_check_runs_before_quote_text() {
        // Both problems present; the book rule wins, matching the form's
        // field order.
        let new = submission("", None, None, None, None);
        assert_eq!(validate(&new), Some(ERR_BOOK_REQUIRED));
    }
}
