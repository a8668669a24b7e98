use std::env;

use actix_web::web::{self, scope, Data};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{api::endpoints::*, auth::SECURITY_ENABLED};

pub struct AppState {
    pub db: Pool<Postgres>,
}

pub fn configure_app(cfg: &mut web::ServiceConfig) {
    let cors = if *SECURITY_ENABLED {
        actix_cors::Cors::default()
            .allowed_headers(vec!["Authorization", "Content-Type", "Accept"])
            .allow_any_method()
            .max_age(3600)
    } else {
        actix_cors::Cors::permissive()
    };

    #[derive(OpenApi)]
    #[openapi(
        paths(
            create_quote,
            get_quotes,
            get_quote,
            update_quote,
            delete_quote,
            get_books,
            get_all_quotes,
            purge_quote,
            purge_book,
            send_digests,
            get_version
        ),
        components(schemas(
            crate::schema::api::NewQuote,
            crate::schema::api::QuoteResponse,
            crate::schema::api::BookResponse,
            crate::schema::db::Quote,
            crate::schema::db::Book,
            crate::schema::db::QuoteDetail
        )),
        modifiers(&SecurityAddon),
        tags(
            (name = "Quotebook", description = "Quotebook API")
        ),
    )]
    struct ApiDoc;

    struct SecurityAddon;

    impl Modify for SecurityAddon {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            let components = openapi.components.as_mut().unwrap();
            components.add_security_scheme(
                "token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }

    let openapi = ApiDoc::openapi();

    cfg.service(SwaggerUi::new("/api/docs/{_:.*}").url("/api/openapi.json", openapi))
        .service(
            scope("/api")
                .wrap(cors)
                .service(create_quote)
                .service(get_quotes)
                .service(get_books)
                .service(get_all_quotes)
                .service(get_quote)
                .service(update_quote)
                .service(delete_quote)
                .service(purge_quote)
                .service(purge_book)
                .service(send_digests)
                .service(get_version),
        );
}

pub async fn get_app_data() -> Data<AppState> {
    let db = PgPoolOptions::new()
        .connect(&env::var("DATABASE_URL").expect("DATABASE_URL not set"))
        .await
        .expect("Could not connect to database");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run migrations");
    println!("Successfully connected to database! :)");
    Data::new(AppState { db })
}
