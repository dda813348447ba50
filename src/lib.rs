#[macro_use]
extern crate rocket;

pub mod article;
pub mod config;
pub mod db;
pub mod favorite;
pub mod follow;
pub mod profile;
pub mod state;
pub mod tag;
pub mod types;
pub mod users;
pub mod utils;

use rocket::fairing::AdHoc;
use rocket::serde::json::{json, Value};
use rocket::{Build, Request, Rocket};
use tracing::info;

use crate::state::AppState;

#[catch(403)]
fn forbidden(_req: &Request) -> Value {
    json!({ "errors": { "token": ["could not validate credentials"] } })
}

#[catch(404)]
fn not_found(_req: &Request) -> Value {
    json!({ "errors": { "body": ["entity not found"] } })
}

#[catch(422)]
fn unprocessable(_req: &Request) -> Value {
    json!({ "errors": { "body": ["malformed request body"] } })
}

#[catch(500)]
fn internal(_req: &Request) -> Value {
    json!({ "errors": { "body": ["internal server error"] } })
}

/// Mounts every route over `state`. The binary launches the result and the
/// integration tests drive it through a local client.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .mount("/api/users", routes![users::register, users::login])
        .mount(
            "/api",
            routes![
                users::current,
                users::update,
                profile::profile,
                profile::follow,
                profile::unfollow,
                tag::list,
            ],
        )
        .mount(
            "/api/articles",
            routes![
                article::list,
                article::get,
                article::create,
                article::favorite,
                article::unfavorite,
            ],
        )
        .register("/", catchers![forbidden, not_found, unprocessable, internal])
        .attach(AdHoc::on_shutdown("Store teardown", |rocket| {
            Box::pin(async move {
                if let Some(state) = rocket.state::<AppState>() {
                    let pool = state.store.state();
                    info!(
                        connections = pool.connections,
                        idle = pool.idle_connections,
                        "shutting down, releasing store connections"
                    );
                }
            })
        }))
}
