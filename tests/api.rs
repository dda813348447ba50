use realworld::config::Config;
use realworld::db::{self, Store};
use realworld::state::AppState;
use rocket::http::{ContentType, Cookie, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use serde_json::{json, Value};
use tempfile::TempDir;

const CAPTCHA: &str = "1234";

fn client() -> (Client, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = Config {
        database_url: dir.path().join("api.sqlite").to_string_lossy().into_owned(),
        ..Config::default()
    };
    let pool = db::init_pool(&config).expect("pool");
    let state = AppState::new(Store::new(pool), &config).expect("state");
    let client = Client::tracked(realworld::build_rocket(state)).expect("valid rocket");
    (client, dir)
}

fn auth(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Token {}", token))
}

fn json_body(response: LocalResponse) -> Value {
    response.into_json::<Value>().expect("json body")
}

fn register<'a>(client: &'a Client, username: &str, email: &str) -> LocalResponse<'a> {
    client
        .post("/api/users")
        .header(ContentType::JSON)
        .cookie(Cookie::new("cap", CAPTCHA))
        .body(
            json!({ "user": {
                "username": username,
                "email": email,
                "password": "pw123",
                "vcode": CAPTCHA,
            }})
            .to_string(),
        )
        .dispatch()
}

fn token_for(client: &Client, username: &str) -> String {
    let response = register(client, username, &format!("{}@x.com", username));
    assert_eq!(response.status(), Status::Created);
    json_body(response)["user"]["token"]
        .as_str()
        .expect("token")
        .to_string()
}

fn create_article(client: &Client, token: &str, title: &str, tags: &[&str]) -> Value {
    let response = client
        .post("/api/articles")
        .header(ContentType::JSON)
        .header(auth(token))
        .body(
            json!({ "article": {
                "title": title,
                "description": "d",
                "body": "b",
                "tagList": tags,
            }})
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::Created);
    json_body(response)
}

#[test]
fn register_create_and_read_anonymously() {
    let (client, _dir) = client();

    let response = register(&client, "alice", "a@x.com");
    assert_eq!(response.status(), Status::Created);
    let body = json_body(response);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "a@x.com");
    let token = body["user"]["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    let created = create_article(&client, &token, "Hello World", &["intro"]);
    assert_eq!(created["article"]["slug"], "hello-world");
    assert_eq!(created["article"]["favoritesCount"], 1);
    assert_eq!(created["article"]["favorited"], true);
    assert_eq!(created["article"]["author"]["username"], "alice");
    assert_eq!(created["article"]["tagList"], json!(["intro"]));

    let response = client.get("/api/articles/hello-world").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let fetched = json_body(response);
    assert_eq!(fetched["article"]["slug"], "hello-world");
    assert_eq!(fetched["article"]["favorited"], false);
    assert_eq!(fetched["article"]["favoritesCount"], 0);

    let response = client.get("/api/tags").dispatch();
    assert_eq!(json_body(response)["tags"], json!(["intro"]));
}

#[test]
fn captcha_must_match_cookie() {
    let (client, _dir) = client();
    let response = client
        .post("/api/users")
        .header(ContentType::JSON)
        .cookie(Cookie::new("cap", "9999"))
        .body(
            json!({ "user": {
                "username": "alice",
                "email": "a@x.com",
                "password": "pw123",
                "vcode": CAPTCHA,
            }})
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert!(json_body(response)["errors"]["vcode"].is_array());
}

#[test]
fn duplicate_registration_is_unprocessable() {
    let (client, _dir) = client();
    assert_eq!(register(&client, "alice", "a@x.com").status(), Status::Created);

    let response = register(&client, "alice", "other@x.com");
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert!(json_body(response)["errors"]["username"].is_array());

    let response = register(&client, "bob", "a@x.com");
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert!(json_body(response)["errors"]["email"].is_array());
}

#[test]
fn padded_username_is_the_same_account() {
    let (client, _dir) = client();
    assert_eq!(register(&client, "alice", "a@x.com").status(), Status::Created);

    let response = register(&client, " alice ", "alice2@x.com");
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert!(json_body(response)["errors"]["username"].is_array());

    let response = register(&client, "  bob ", " b@x.com ");
    assert_eq!(response.status(), Status::Created);
    let body = json_body(response);
    assert_eq!(body["user"]["username"], "bob");
    assert_eq!(body["user"]["email"], "b@x.com");
    assert_eq!(client.get("/api/profiles/bob").dispatch().status(), Status::Ok);

    let response = login(&client, " b@x.com", "pw123", None);
    assert_eq!(response.status(), Status::Ok);

    let response = login(&client, "carol@x.com", "pw123", Some(" alice"));
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[test]
fn bad_credentials_are_forbidden() {
    let (client, _dir) = client();

    assert_eq!(client.get("/api/user").dispatch().status(), Status::Forbidden);

    let response = client
        .get("/api/user")
        .header(Header::new("Authorization", "Bearer abc"))
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .get("/api/articles/hello-world")
        .header(auth("not.a.token"))
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let token = token_for(&client, "alice");
    let response = client.get("/api/user").header(auth(&token)).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response)["user"]["token"], token.as_str());
}

fn login<'a>(client: &'a Client, email: &str, password: &str, username: Option<&str>) -> LocalResponse<'a> {
    let mut user = json!({ "email": email, "password": password, "vcode": CAPTCHA });
    if let Some(username) = username {
        user["username"] = json!(username);
    }
    client
        .post("/api/users/login")
        .header(ContentType::JSON)
        .cookie(Cookie::new("cap", CAPTCHA))
        .body(json!({ "user": user }).to_string())
        .dispatch()
}

#[test]
fn login_and_first_login_registration() {
    let (client, _dir) = client();
    token_for(&client, "alice");

    let response = login(&client, "alice@x.com", "pw123", None);
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response)["user"]["username"], "alice");

    let response = login(&client, "alice@x.com", "wrong", Some("mallory"));
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert!(json_body(response)["errors"]["email or password"].is_array());

    let response = login(&client, "carol@x.com", "pw123", None);
    assert_eq!(response.status(), Status::UnprocessableEntity);

    let response = login(&client, "carol@x.com", "pw123", Some("carol"));
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response)["user"]["username"], "carol");

    let response = login(&client, "carol@x.com", "pw123", None);
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn update_changes_only_given_fields() {
    let (client, _dir) = client();
    let token = token_for(&client, "alice");

    let response = client
        .put("/api/user")
        .header(ContentType::JSON)
        .header(auth(&token))
        .body(json!({ "user": { "bio": "I like Rust", "email": "" } }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body = json_body(response);
    assert_eq!(body["user"]["bio"], "I like Rust");
    assert_eq!(body["user"]["email"], "alice@x.com");
}

#[test]
fn following_is_viewer_relative() {
    let (client, _dir) = client();
    token_for(&client, "alice");
    let bob = token_for(&client, "bob");

    let response = client.post("/api/profiles/alice/follow").header(auth(&bob)).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response)["profile"]["following"], true);

    let response = client.get("/api/profiles/alice").header(auth(&bob)).dispatch();
    assert_eq!(json_body(response)["profile"]["following"], true);

    let response = client.get("/api/profiles/alice").dispatch();
    assert_eq!(json_body(response)["profile"]["following"], false);

    let response = client.post("/api/profiles/bob/follow").header(auth(&bob)).dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);

    let response = client.delete("/api/profiles/alice/follow").header(auth(&bob)).dispatch();
    assert_eq!(json_body(response)["profile"]["following"], false);

    assert_eq!(client.get("/api/profiles/nobody").dispatch().status(), Status::NotFound);
}

#[test]
fn listing_filters_and_favorites() {
    let (client, _dir) = client();
    let alice = token_for(&client, "alice");
    let bob = token_for(&client, "bob");
    create_article(&client, &alice, "First", &["rust"]);
    create_article(&client, &bob, "Second", &["web"]);

    let response = client.post("/api/articles/first/favorite").header(auth(&bob)).dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body = json_body(response);
    assert_eq!(body["article"]["favorited"], true);
    assert_eq!(body["article"]["favoritesCount"], 1);

    let body = json_body(client.get("/api/articles").dispatch());
    assert_eq!(body["articlesCount"], 2);
    assert_eq!(body["articles"][0]["slug"], "second");
    assert_eq!(body["articles"][1]["author"]["username"], "alice");

    let body = json_body(client.get("/api/articles?favorited=bob").dispatch());
    assert_eq!(body["articlesCount"], 1);
    assert_eq!(body["articles"][0]["slug"], "first");

    let body = json_body(client.get("/api/articles?tag=web").dispatch());
    assert_eq!(body["articles"][0]["slug"], "second");

    let body = json_body(client.get("/api/articles?author=nobody").dispatch());
    assert_eq!(body["articlesCount"], 0);

    let response = client.get("/api/articles?limit=0").dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);

    let response = client.delete("/api/articles/first/favorite").header(auth(&bob)).dispatch();
    assert_eq!(json_body(response)["article"]["favoritesCount"], 0);

    assert_eq!(client.get("/api/articles/missing").dispatch().status(), Status::NotFound);
}
