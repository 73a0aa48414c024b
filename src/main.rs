#[macro_use]
extern crate log;

use std::time::Duration;

use actix_web::{App, HttpServer, middleware::Logger};
use sqlx::postgres::PgPoolOptions;

use auth::GoTrueGateway;
use config::Config;
use db::PollDb;
use operations::PollOperations;

mod auth;
mod config;
mod db;
mod lifecycle;
mod model;
mod operations;
mod paths;
mod util;
mod validation;

#[actix_web::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::load()
        .unwrap_or_else(|e| panic!("Environment misconfigured: {}", e));
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(2))
        .test_before_acquire(true)
        .connect(&config.db_url)
        .await
        .expect("Failed to create database pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let auth_config = config.auth.clone();
    let app = move || {
        let ops = PollOperations::new(PollDb::new(pool.clone()));
        let gateway = GoTrueGateway::new(auth_config.clone());
        App::new()
            .wrap(Logger::default())
            .data(ops)
            .data(gateway)
            .configure(paths::config::<PollOperations<PollDb>, GoTrueGateway>)
    };
    info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(app).bind((config.host.as_str(), config.port))
        .unwrap_or_else(|e| panic!("HTTP server failed to bind to {}:{}: {}", config.host, config.port, e))
        .run()
        .await
        .expect("HTTP Server failed to run");
}
