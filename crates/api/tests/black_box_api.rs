use reqwest::StatusCode;
use serde_json::{json, Value};

use warden_infra::config::BootstrapAdmin;
use warden_infra::WardenConfig;

const ADMIN_USER: &str = "root";
const ADMIN_PASSWORD: &str = "root-password";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let mut config = WardenConfig::default();
        config.session.secret = "test-secret".to_string();
        config.bootstrap_admin = Some(BootstrapAdmin {
            username: ADMIN_USER.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        });

        // Same router as prod, in-memory store, ephemeral port.
        let app = warden_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn session_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("failed to build client")
}

async fn login(server: &TestServer, username: &str, password: &str) -> reqwest::Client {
    let client = session_client();
    let res = client
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK, "login failed for {username}");
    client
}

async fn register(server: &TestServer, username: &str, password: &str) -> Value {
    let res = session_client()
        .post(server.url("/api/auth/register"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn find_by_field(client: &reqwest::Client, url: String, field: &str, value: &str) -> Value {
    let items: Vec<Value> = client.get(url).send().await.unwrap().json().await.unwrap();
    items
        .into_iter()
        .find(|item| item[field] == value)
        .unwrap_or_else(|| panic!("no item with {field} = {value}"))
}

#[tokio::test]
async fn health_is_public_and_whoami_requires_session() {
    let server = TestServer::spawn().await;
    let client = session_client();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(server.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_whoami_logout() {
    let server = TestServer::spawn().await;

    let user = register(&server, "alice", "s3cret-pass").await;
    assert_eq!(user["username"], "alice");
    assert!(user.get("password_hash").is_none());

    let res = session_client()
        .post(server.url("/api/auth/register"))
        .json(&json!({ "username": "alice", "password": "other-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = session_client()
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let client = session_client();
    let res = client
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": "alice", "password": "s3cret-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("warden_session="));
    assert!(cookie.contains("HttpOnly"));

    let me: Value = client
        .get(server.url("/whoami"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["name"], "alice");
    assert_eq!(me["roles"], json!([]));

    let res = client.post(server.url("/api/auth/logout")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(server.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tampered_cookie_is_rejected() {
    let server = TestServer::spawn().await;
    register(&server, "mallory", "s3cret-pass").await;

    let res = session_client()
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": "mallory", "password": "s3cret-pass" }))
        .send()
        .await
        .unwrap();
    let cookie = res
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    let pair = cookie.split(';').next().unwrap();
    let tampered = format!("{pair}x");

    let res = reqwest::Client::new()
        .get(server.url("/whoami"))
        .header(reqwest::header::COOKIE, tampered)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // The untouched cookie still works without a cookie jar.
    let res = reqwest::Client::new()
        .get(server.url("/whoami"))
        .header(reqwest::header::COOKIE, pair)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_pages_are_forbidden_without_grants() {
    let server = TestServer::spawn().await;
    register(&server, "bob", "s3cret-pass").await;
    let bob = login(&server, "bob", "s3cret-pass").await;

    for path in ["/users", "/roles", "/permissions"] {
        let res = bob.get(server.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
    }
}

#[tokio::test]
async fn password_change_requires_old_password() {
    let server = TestServer::spawn().await;
    register(&server, "carol", "first-pass").await;
    let carol = login(&server, "carol", "first-pass").await;

    let res = carol
        .post(server.url("/api/auth/password"))
        .json(&json!({ "old_password": "nope", "new_password": "second-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = carol
        .post(server.url("/api/auth/password"))
        .json(&json!({ "old_password": "first-pass", "new_password": "second-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = session_client()
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": "carol", "password": "first-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    login(&server, "carol", "second-pass").await;
}

#[tokio::test]
async fn admin_grants_take_effect_without_relogin() {
    let server = TestServer::spawn().await;
    let admin = login(&server, ADMIN_USER, ADMIN_PASSWORD).await;

    let me: Value = admin.get(server.url("/whoami")).send().await.unwrap().json().await.unwrap();
    assert_eq!(me["roles"], json!(["admin"]));

    // A new data permission and a role carrying it.
    let res = admin
        .post(server.url("/permissions"))
        .json(&json!({
            "name": "reports",
            "resource_uri": "/Reports",
            "type": "Data",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let reports: Value = res.json().await.unwrap();

    let res = admin
        .post(server.url("/roles"))
        .json(&json!({ "name": "analyst", "description": "reads reports" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let analyst: Value = res.json().await.unwrap();
    let role_id = analyst["id"].as_i64().unwrap();

    let res = admin
        .put(server.url(&format!("/roles/{role_id}/permissions")))
        .json(&json!({ "permission_ids": [reports["id"]] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let perms: Vec<Value> = admin
        .get(server.url(&format!("/roles/{role_id}/permissions")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(perms.len(), 1);
    assert_eq!(perms[0]["resource_uri"], "/Reports");

    // Unknown permission ids leave the role untouched.
    let res = admin
        .put(server.url(&format!("/roles/{role_id}/permissions")))
        .json(&json!({ "permission_ids": [9999] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Dave logs in before being granted anything.
    register(&server, "dave", "s3cret-pass").await;
    let dave = login(&server, "dave", "s3cret-pass").await;

    let check = |client: reqwest::Client, query: &'static str| {
        let url = server.url(&format!("/authorize?{query}"));
        async move {
            let body: Value = client.get(url).send().await.unwrap().json().await.unwrap();
            body
        }
    };

    let before = check(dave.clone(), "resource=/reports&type=data").await;
    assert_eq!(before["granted"], false);

    let dave_row = find_by_field(&admin, server.url("/users"), "username", "dave").await;
    let dave_id = dave_row["id"].as_i64().unwrap();
    let res = admin
        .put(server.url(&format!("/users/{dave_id}/roles")))
        .json(&json!({ "role_ids": [role_id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // Fresh check sees the grant; the session claims still predate it.
    let after = check(dave.clone(), "resource=/REPORTS&type=data").await;
    assert_eq!(after["granted"], true);
    assert_eq!(after["session"]["granted"], false);

    // Only the Data kind was granted.
    let page = check(dave.clone(), "resource=/reports").await;
    assert_eq!(page["granted"], false);

    let res = dave.get(server.url("/authorize?resource=/reports&type=bogus")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let effective: Vec<Value> = admin
        .get(server.url(&format!("/users/{dave_id}/permissions")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(effective.len(), 1);

    // Deleting the role revokes it everywhere.
    let res = admin
        .delete(server.url(&format!("/roles/{role_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let roles: Vec<Value> = admin
        .get(server.url(&format!("/users/{dave_id}/roles")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(roles.is_empty());

    let gone = check(dave, "resource=/reports&type=data").await;
    assert_eq!(gone["granted"], false);
}

#[tokio::test]
async fn admin_manages_users() {
    let server = TestServer::spawn().await;
    let admin = login(&server, ADMIN_USER, ADMIN_PASSWORD).await;

    let standard = find_by_field(&admin, server.url("/roles"), "name", "standard user").await;

    let res = admin
        .post(server.url("/users"))
        .json(&json!({
            "username": "erin",
            "email": "erin@example.com",
            "password": "s3cret-pass",
            "role_ids": [standard["id"]],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let erin: Value = res.json().await.unwrap();
    let erin_id = erin["id"].as_i64().unwrap();

    let erin_client = login(&server, "erin", "s3cret-pass").await;
    let home = erin_client
        .get(server.url("/authorize?resource=/"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(home["granted"], true);
    assert_eq!(home["session"]["granted"], true);

    let res = admin
        .put(server.url(&format!("/users/{erin_id}")))
        .json(&json!({ "username": "erin", "email": "erin@example.org", "is_active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["email"], "erin@example.org");
    assert_eq!(updated["is_active"], false);

    // Inactive accounts cannot start new sessions.
    let res = session_client()
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": "erin", "password": "s3cret-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = admin
        .delete(server.url(&format!("/users/{erin_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = admin
        .get(server.url(&format!("/users/{erin_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
