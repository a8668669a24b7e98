pub mod app;
pub mod auth;
pub mod mail;
pub mod utils;

pub mod schema {
    pub mod api;
    pub mod db;
    pub mod mail;
}

pub mod api {
    pub mod db;
    pub mod digest;
    pub mod endpoints;
    pub mod service;
}
