//! Weekly digest: pick up to three of a user's live quotes at random,
//! compose a plain-text email, hand it to the mail transport. The
//! per-user jobs are independent; one failing only logs.

use actix_web::web::Data;
use chrono::NaiveDate;
use log::{log, Level};
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::{Pool, Postgres};

use crate::api::db;
use crate::app::AppState;
use crate::mail;
use crate::schema::db::{QuoteDetail, UserRow};

pub const DIGEST_SAMPLE_SIZE: usize = 3;

/// Distinct authors in first-seen order, last one joined with "and".
pub fn join_authors(quotes: &[&QuoteDetail]) -> String {
    let mut authors: Vec<&str> = Vec::new();
    for quote in quotes {
        if !authors.contains(&quote.author.as_str()) {
            authors.push(&quote.author);
        }
    }
    match authors.split_last() {
        None => String::new(),
        Some((only, [])) => only.to_string(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

pub fn sample<'a, R: Rng + ?Sized>(
    quotes: &'a [QuoteDetail],
    rng: &mut R,
) -> Vec<&'a QuoteDetail> {
    quotes.choose_multiple(rng, DIGEST_SAMPLE_SIZE).collect()
}

/// Subject and body for one user's digest, or None when there is
/// nothing to say — an empty selection sends no mail. Page numbers
/// render as stored, so an absent page prints "None".
pub fn compose(quotes: &[&QuoteDetail], date: NaiveDate) -> Option<(String, String)> {
    if quotes.is_empty() {
        return None;
    }
    let subject = format!("Your quotes for {}: {}", date, join_authors(quotes));
    let mut body = String::from("Here are some quotes you saved:\n\n");
    for quote in quotes {
        let page = quote
            .page_number
            .map(|p| p.to_string())
            .unwrap_or_else(|| "None".to_string());
        body.push_str(&format!(
            "\"{}\"\n{} by {}\nPage: {}\n\n",
            quote.body, quote.title, quote.author, page
        ));
    }
    Some((subject, body))
}

/// One digest unit of work. No quotes means no email and no error.
pub async fn select_and_notify(db: &Pool<Postgres>, user: &UserRow) -> Result<(), anyhow::Error> {
    let quotes = db::live_quotes_for_user(db, user.id).await?;
    let picked = sample(&quotes, &mut rand::thread_rng());
    let Some((subject, body)) = compose(&picked, chrono::Local::now().date_naive()) else {
        log!(Level::Debug, "no live quotes for {}, skipping", user.username);
        return Ok(());
    };
    mail::send(&subject, &body, &[user.email.clone()]).await
}

/// Fan out one spawned job per user. Jobs share nothing and run in no
/// particular order; the external scheduler triggers this weekly.
pub async fn send_digests(state: Data<AppState>) -> Result<usize, sqlx::Error> {
    let users = db::list_users(&state.db).await?;
    let count = users.len();
    for user in users {
        let state = state.clone();
        actix_web::rt::spawn(async move {
            if let Err(e) = select_and_notify(&state.db, &user).await {
                log!(Level::Warn, "digest for {} failed: {}", user.username, e);
            }
        });
    }
    Ok(count)
}
