use actix_web::{
    delete, get, post, put,
    web::{self, Data, Json, Path},
    HttpResponse, Responder,
};
use log::{log, Level};

use crate::{
    api::db,
    api::digest,
    api::service::{self, CreateOutcome, UpdateOutcome},
    app::AppState,
    auth::{Auth, User},
    schema::api::{ConfirmParams, FetchParams, NewQuote, QuoteResponse},
    schema::db::{Book, Quote, UserRow},
    utils::is_valid_username,
};

fn db_error(e: sqlx::Error) -> HttpResponse {
    log!(Level::Warn, "DB query failed: {}", e);
    HttpResponse::InternalServerError().body("Internal DB Error")
}

/// Resolve the token identity to a users row, provisioning it on first
/// sight. Tokens without a usable email claim are refused: the users
/// table requires a unique address and the digest mails to it.
async fn current_user(state: &AppState, user: &User) -> Result<UserRow, HttpResponse> {
    if !is_valid_username(user.preferred_username.as_str()) {
        return Err(HttpResponse::BadRequest().body("Invalid username in token."));
    }
    let email = match user.contact_email() {
        Some(e) => e,
        None => return Err(HttpResponse::BadRequest().body("Token is missing an email claim.")),
    };
    db::get_or_create_user(&state.db, user, email)
        .await
        .map_err(db_error)
}

#[utoipa::path(
    context_path = "/api",
    request_body = NewQuote,
    responses(
        (status = 201, description = "Quote created", body = Quote),
        (status = 303, description = "Identical live quote already exists; Location points at it"),
        (status = 400, description = "Validation failed, body carries the form message"),
    ),
    security(("token" = []))
)]
#[post("/quotes", wrap = "Auth::enabled()")]
pub async fn create_quote(
    state: Data<AppState>,
    body: Json<NewQuote>,
    user: User,
) -> impl Responder {
    log!(Level::Info, "POST /api/quotes");

    let submitter = match current_user(&state, &user).await {
        Ok(u) => u,
        Err(res) => return res,
    };

    match service::create_quote(&state.db, &body, submitter.id).await {
        Ok(CreateOutcome::Success(quote)) => HttpResponse::Created().json(quote),
        Ok(CreateOutcome::QuoteExists(id)) => {
            log!(Level::Info, "duplicate submission, pointing at quote {}", id);
            HttpResponse::SeeOther()
                .insert_header(("Location", format!("/api/quotes/{}", id)))
                .finish()
        }
        Ok(CreateOutcome::FormError(message)) => HttpResponse::BadRequest().body(message),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    params(FetchParams),
    responses((status = 200, description = "Live quotes, newest first", body = [QuoteResponse])),
    security(("token" = []))
)]
#[get("/quotes", wrap = "Auth::enabled()")]
pub async fn get_quotes(state: Data<AppState>, params: web::Query<FetchParams>) -> impl Responder {
    let limit: i64 = params.limit.unwrap_or(10).into();
    let lt_qid: i32 = params.lt.unwrap_or(0);
    let search = params
        .q
        .clone()
        .map(|x| format!("%{}%", x))
        .unwrap_or("%%".into());

    match db::list_live(&state.db, &search, lt_qid, params.book, limit).await {
        Ok(rows) => HttpResponse::Ok().json(
            rows.into_iter().map(QuoteResponse::from).collect::<Vec<_>>(),
        ),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    params(("id" = i32, Path, description = "Quote id")),
    responses(
        (status = 200, body = QuoteResponse),
        (status = 404, description = "No live quote with that id"),
    ),
    security(("token" = []))
)]
#[get("/quotes/{id}", wrap = "Auth::enabled()")]
pub async fn get_quote(state: Data<AppState>, path: Path<(i32,)>) -> impl Responder {
    let (id,) = path.into_inner();
    match db::find_live_detail(&state.db, id).await {
        Ok(Some(row)) => HttpResponse::Ok().json(QuoteResponse::from(row)),
        Ok(None) => HttpResponse::NotFound().body("Quote could not be found"),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    request_body = NewQuote,
    params(("id" = i32, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote updated", body = Quote),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No live quote with that id owned by the caller"),
    ),
    security(("token" = []))
)]
#[put("/quotes/{id}", wrap = "Auth::enabled()")]
pub async fn update_quote(
    state: Data<AppState>,
    path: Path<(i32,)>,
    body: Json<NewQuote>,
    user: User,
) -> impl Responder {
    let (id,) = path.into_inner();
    let submitter = match current_user(&state, &user).await {
        Ok(u) => u,
        Err(res) => return res,
    };

    match service::update_quote(&state.db, id, &body, submitter.id).await {
        Ok(UpdateOutcome::Updated(quote)) => HttpResponse::Ok().json(quote),
        Ok(UpdateOutcome::FormError(message)) => HttpResponse::BadRequest().body(message),
        Ok(UpdateOutcome::NotFound) => HttpResponse::NotFound().body("Quote could not be found"),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    params(("id" = i32, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote soft-deleted"),
        (status = 404, description = "No quote with that id owned by the caller"),
    ),
    security(("token" = []))
)]
#[delete("/quotes/{id}", wrap = "Auth::enabled()")]
pub async fn delete_quote(
    state: Data<AppState>,
    path: Path<(i32,)>,
    user: User,
) -> impl Responder {
    let (id,) = path.into_inner();
    let submitter = match current_user(&state, &user).await {
        Ok(u) => u,
        Err(res) => return res,
    };

    match service::soft_delete(&state.db, id, submitter.id).await {
        Ok(true) => HttpResponse::Ok().body(""),
        // Foreign and absent rows answer alike, existence stays private.
        Ok(false) => HttpResponse::NotFound().body("Quote could not be found"),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    responses((status = 200, description = "All books", body = [Book])),
    security(("token" = []))
)]
#[get("/books", wrap = "Auth::enabled()")]
pub async fn get_books(state: Data<AppState>) -> impl Responder {
    match db::list_books(&state.db).await {
        Ok(books) => HttpResponse::Ok().json(books),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    responses((status = 200, description = "Every quote row, deleted included", body = [QuoteResponse])),
    security(("token" = []))
)]
#[get("/admin/quotes", wrap = "Auth::admin_only()")]
pub async fn get_all_quotes(state: Data<AppState>) -> impl Responder {
    match db::list_any(&state.db, 1000).await {
        Ok(rows) => HttpResponse::Ok().json(
            rows.into_iter().map(QuoteResponse::from).collect::<Vec<_>>(),
        ),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    params(("id" = i32, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote removed from storage"),
        (status = 404, description = "No quote with that id"),
    ),
    security(("token" = []))
)]
#[delete("/admin/quotes/{id}", wrap = "Auth::admin_only()")]
pub async fn purge_quote(state: Data<AppState>, path: Path<(i32,)>) -> impl Responder {
    let (id,) = path.into_inner();
    match db::hard_delete_quote(&state.db, id).await {
        Ok(true) => HttpResponse::Ok().body(""),
        Ok(false) => HttpResponse::NotFound().body("Quote could not be found"),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    params(("id" = i32, Path, description = "Book id"), ConfirmParams),
    responses(
        (status = 200, description = "Book and all of its quotes removed"),
        (status = 400, description = "Missing confirm=true"),
        (status = 404, description = "No book with that id"),
    ),
    security(("token" = []))
)]
#[delete("/admin/books/{id}", wrap = "Auth::admin_only()")]
pub async fn purge_book(
    state: Data<AppState>,
    path: Path<(i32,)>,
    params: web::Query<ConfirmParams>,
) -> impl Responder {
    let (id,) = path.into_inner();
    // Cascades to every quote of the book, so an explicit confirmation
    // is required.
    if params.confirm != Some(true) {
        return HttpResponse::BadRequest()
            .body("Deleting a book deletes all of its quotes. Pass confirm=true to proceed.");
    }
    match db::hard_delete_book(&state.db, id).await {
        Ok(true) => HttpResponse::Ok().body(""),
        Ok(false) => HttpResponse::NotFound().body("Book could not be found"),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    responses((status = 200, description = "Digest jobs spawned, body carries the user count")),
    security(("token" = []))
)]
#[post("/digests/send", wrap = "Auth::admin_only()")]
pub async fn send_digests(state: Data<AppState>) -> impl Responder {
    log!(Level::Info, "POST /api/digests/send");
    match digest::send_digests(state.clone()).await {
        Ok(count) => HttpResponse::Ok().json(serde_json::json!({ "users": count })),
        Err(e) => db_error(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    responses((status = 200, description = "Build metadata"))
)]
#[get("/version", wrap = "Auth::disabled()")]
pub async fn get_version() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "sha": env!("VERGEN_GIT_SHA"),
        "build_timestamp": env!("VERGEN_BUILD_TIMESTAMP"),
        "commit_timestamp": env!("VERGEN_GIT_COMMIT_TIMESTAMP"),
    }))
}
