use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode};
use tokio::net::TcpListener;

use contact_directory::delay::{NoDelay, ResponseDelay};
use contact_directory::error::{
    ACCESS_DENIED_MESSAGE, BAD_REQUEST_MESSAGE, INTERNAL_MESSAGE, METHOD_NOT_ALLOWED_MESSAGE,
    NOT_FOUND_MESSAGE,
};
use contact_directory::server::{self, AppState};
use contact_directory_core::models::{Contact, ContactFields, Gender};
use contact_directory_core::query::ContactQuery;
use contact_directory_core::store::memory::InMemoryStore;
use contact_directory_core::store::{ContactStore, ListWindow, StoreProvider};

struct TestApp {
    base: String,
    store: Arc<InMemoryStore>,
    client: Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn seed(&self, first: &str, last: &str, gender: Gender) -> i64 {
        self.store
            .create(&ContactFields {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email_address: format!("{}@x.com", first.to_lowercase()),
                gender,
            })
            .await
            .unwrap()
            .id
    }
}

/// Serves `state` on an ephemeral port and returns its base URL.
async fn spawn_server(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server::serve(listener, state).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client() -> Client {
    Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .unwrap()
}

async fn spawn_app_with_delay(delay: Arc<dyn ResponseDelay>) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let provider: Arc<dyn StoreProvider> = Arc::new(store.clone());
    let base = spawn_server(AppState::new(provider, delay)).await;

    TestApp {
        base,
        store,
        client: client(),
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with_delay(Arc::new(NoDelay)).await
}

/// Counts pauses instead of sleeping.
#[derive(Default)]
struct CountingDelay {
    pauses: AtomicUsize,
}

impl CountingDelay {
    fn count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseDelay for CountingDelay {
    async fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }
}

/// A backend that is always unreachable.
struct UnavailableStore;

fn unavailable<T>() -> Result<T> {
    Err(anyhow!("db down at /var/lib/contacts.sqlite"))
}

#[async_trait]
impl ContactStore for UnavailableStore {
    async fn get(&self, _id: i64) -> Result<Option<Contact>> {
        unavailable()
    }

    async fn list(&self, _query: &ContactQuery) -> Result<ListWindow> {
        unavailable()
    }

    async fn create(&self, _fields: &ContactFields) -> Result<Contact> {
        unavailable()
    }

    async fn update(&self, _id: i64, _fields: &ContactFields) -> Result<Option<Contact>> {
        unavailable()
    }

    async fn delete(&self, _id: i64) -> Result<bool> {
        unavailable()
    }
}

struct UnavailableProvider;

impl StoreProvider for UnavailableProvider {
    fn open(&self) -> Box<dyn ContactStore> {
        Box::new(UnavailableStore)
    }
}

fn contact_form<'a>(first: &'a str, last: &'a str, email: &'a str, gender: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("first_name", first),
        ("last_name", last),
        ("email_address", email),
        ("gender", gender),
    ]
}

#[tokio::test]
async fn test_root_redirects_to_list() {
    let app = spawn_app().await;
    let resp = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/contacts/");
}

#[tokio::test]
async fn test_list_shape_follows_transport_hint() {
    let app = spawn_app().await;
    app.seed("Ann", "Lee", Gender::Female).await;

    let resp = app.client.get(app.url("/contacts/")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["vary"], "HX-Request");
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains("contact-search"));
    assert!(body.contains("Ann Lee"));

    let resp = app
        .client
        .get(app.url("/contacts/"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(!body.contains("<!DOCTYPE html>"));
    assert!(!body.contains("contact-search"));
    assert!(body.contains("Ann Lee"));
}

#[tokio::test]
async fn test_search_lee_lists_ann_before_bob_without_more() {
    let app = spawn_app().await;
    app.seed("Bob", "Lee", Gender::Male).await;
    app.seed("Ann", "Lee", Gender::Female).await;
    app.seed("Cy", "Ray", Gender::Male).await;

    let body = app
        .client
        .get(app.url("/contacts/?search_query=lee&gender_query=&page=1"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let ann = body.find("Ann Lee").unwrap();
    let bob = body.find("Bob Lee").unwrap();
    assert!(ann < bob);
    assert!(!body.contains("Cy Ray"));
    assert!(!body.contains("Load more"));
}

#[tokio::test]
async fn test_pagination_links_next_page() {
    let app = spawn_app().await;
    for i in 0..25 {
        app.seed(&format!("N{:02}", i), "Z", Gender::Female).await;
    }

    let page1 = app
        .client
        .get(app.url("/contacts/?gender_query=F"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(page1.matches("<tr id=\"contact-").count(), 20);
    assert!(page1.contains("gender_query=F&amp;page=2"));

    let page2 = app
        .client
        .get(app.url("/contacts/?gender_query=F&page=2"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(page2.matches("<tr id=\"contact-").count(), 5);
    assert!(!page2.contains("Load more"));
}

#[tokio::test]
async fn test_invalid_page_is_rejected_in_negotiated_shape() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(app.url("/contacts/?page=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains("minimum integer value of 1"));

    let resp = app
        .client
        .get(app.url("/contacts/?page=abc"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.text().await.unwrap();
    assert!(!body.contains("<!DOCTYPE html>"));
    assert!(body.contains("Not a valid integer value."));
}

#[tokio::test]
async fn test_delete_without_hint_is_forbidden() {
    let app = spawn_app().await;
    let id = app.seed("Ann", "Lee", Gender::Female).await;

    for path in [format!("/contacts/{}/", id), "/contacts/9999/".to_string()] {
        let resp = app.client.delete(app.url(&path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{}", path);
        let body = resp.text().await.unwrap();
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains(ACCESS_DENIED_MESSAGE));
    }
    assert_eq!(app.store.len().unwrap(), 1);
}

#[tokio::test]
async fn test_fragment_routes_require_hint() {
    let app = spawn_app().await;
    let id = app.seed("Ann", "Lee", Gender::Female).await;

    let gets = [
        format!("/contacts/{}/", id),
        "/contacts/add/".to_string(),
        format!("/contacts/{}/change/", id),
    ];
    for path in gets {
        let resp = app.client.get(app.url(&path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{}", path);
    }

    let resp = app
        .client
        .put(app.url(&format!("/contacts/{}/", id)))
        .form(&contact_form("X", "Y", "x@y.com", "M"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .client
        .post(app.url("/validate/email-address/"))
        .form(&[("email_address", "bad")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let unchanged = app.store.get(id).await.unwrap().unwrap();
    assert_eq!(unchanged.first_name, "Ann");
}

#[tokio::test]
async fn test_delete_returns_confirmation_and_is_final() {
    let app = spawn_app().await;
    let id = app.seed("Ann", "Lee", Gender::Female).await;

    let resp = app
        .client
        .delete(app.url(&format!("/contacts/{}/", id)))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let trigger = resp.headers()["hx-trigger"].to_str().unwrap().to_string();
    assert!(trigger.contains("\"remove\""));
    let body = resp.text().await.unwrap();
    assert!(body.contains("Ann Lee (ann@x.com) has been deleted."));
    assert!(body.contains("hx-swap-oob=\"delete\""));

    let resp = app
        .client
        .get(app.url(&format!("/contacts/{}/", id)))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = resp.text().await.unwrap();
    assert!(!body.contains("<!DOCTYPE html>"));
    assert!(body.contains(NOT_FOUND_MESSAGE));

    let resp = app
        .client
        .delete(app.url(&format!("/contacts/{}/", id)))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_appends_and_validates() {
    let app = spawn_app().await;

    let resp = app
        .client
        .post(app.url("/contacts/"))
        .header("HX-Request", "true")
        .form(&contact_form(" Ann ", "Lee", "ann@x.com", "F"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["hx-trigger"]
        .to_str()
        .unwrap()
        .contains("\"append\""));
    let body = resp.text().await.unwrap();
    assert!(body.contains("beforeend:#contact-list-body"));
    assert!(body.contains("<dd>Ann</dd>"));
    assert_eq!(app.store.len().unwrap(), 1);

    let resp = app
        .client
        .post(app.url("/contacts/"))
        .header("HX-Request", "true")
        .form(&contact_form("", "Lee", "not-an-email", "Q"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.headers().get("hx-trigger").is_none());
    let body = resp.text().await.unwrap();
    assert!(body.contains("This field is required."));
    assert!(body.contains("Please enter a valid email address."));
    assert!(body.contains("Not a valid choice."));
    assert!(body.contains("value=\"Lee\""));
    assert_eq!(app.store.len().unwrap(), 1);
}

#[tokio::test]
async fn test_create_without_hint_renders_full_page() {
    let app = spawn_app().await;
    let resp = app
        .client
        .post(app.url("/contacts/"))
        .form(&contact_form("Bob", "Lee", "bob@x.com", "M"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains("<dd>Bob</dd>"));
}

#[tokio::test]
async fn test_update_replaces_entry() {
    let app = spawn_app().await;
    let id = app.seed("Ann", "Lee", Gender::Female).await;

    let resp = app
        .client
        .put(app.url(&format!("/contacts/{}/", id)))
        .header("HX-Request", "true")
        .form(&contact_form("Anna", "Leigh", "anna@y.org", "F"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["hx-trigger"]
        .to_str()
        .unwrap()
        .contains("\"replace\""));
    let body = resp.text().await.unwrap();
    assert!(body.contains(&format!("<tr hx-swap-oob=\"outerHTML\" id=\"contact-{}\">", id)));

    let stored = app.store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.id, id);
    assert_eq!(stored.first_name, "Anna");
    assert_eq!(stored.email_address, "anna@y.org");
}

#[tokio::test]
async fn test_update_invalid_form_leaves_contact_untouched() {
    let app = spawn_app().await;
    let id = app.seed("Ann", "Lee", Gender::Female).await;

    let resp = app
        .client
        .put(app.url(&format!("/contacts/{}/", id)))
        .header("HX-Request", "true")
        .form(&contact_form("Anna", "", "anna@y.org", "F"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.text().await.unwrap();
    assert!(body.contains(&format!("hx-put=\"/contacts/{}/\"", id)));
    assert!(body.contains("This field is required."));

    let stored = app.store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.first_name, "Ann");
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found_before_validation() {
    let app = spawn_app().await;
    let resp = app
        .client
        .put(app.url("/contacts/404/"))
        .header("HX-Request", "true")
        .form(&contact_form("", "", "", ""))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forms() {
    let app = spawn_app().await;
    let id = app.seed("Ann", "Lee", Gender::Female).await;

    let body = app
        .client
        .get(app.url("/contacts/add/"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("hx-post=\"/contacts/\""));
    assert!(!body.contains("field-errors"));

    let body = app
        .client
        .get(app.url(&format!("/contacts/{}/change/", id)))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("value=\"Ann\""));
    assert!(body.contains("value=\"ann@x.com\""));
    assert!(body.contains("<option value=\"F\" selected>Female</option>"));

    let resp = app
        .client
        .get(app.url("/contacts/77/change/"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validate_email_endpoint() {
    let app = spawn_app().await;

    let resp = app
        .client
        .post(app.url("/validate/email-address/"))
        .header("HX-Request", "true")
        .form(&[("email_address", "nope@")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<li>Please enter a valid email address.</li>"));

    let resp = app
        .client
        .post(app.url("/validate/email-address/"))
        .header("HX-Request", "true")
        .form(&[("email_address", " ok@example.com ")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_numeric_id_is_not_found() {
    let app = spawn_app().await;
    let resp = app
        .client
        .get(app.url("/contacts/abc/"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route_renders_not_found_page() {
    let app = spawn_app().await;
    let resp = app.client.get(app.url("/nowhere")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains("404 Not Found"));
}

#[tokio::test]
async fn test_wrong_method_renders_error_view() {
    let app = spawn_app().await;

    let resp = app
        .client
        .patch(app.url("/contacts/"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(resp.headers().contains_key("allow"));
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains(METHOD_NOT_ALLOWED_MESSAGE));

    let resp = app
        .client
        .patch(app.url("/contacts/"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<section class=\"exception\">"));
    assert!(body.contains("405 Method Not Allowed"));
}

#[tokio::test]
async fn test_malformed_query_renders_error_view() {
    let app = spawn_app().await;

    let resp = app
        .client
        .get(app.url("/contacts/?page=1&page=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains(BAD_REQUEST_MESSAGE));
    assert!(!body.contains("duplicate field"));

    let resp = app
        .client
        .get(app.url("/contacts/?page=1&page=2"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<section class=\"exception\">"));
    assert!(body.contains(BAD_REQUEST_MESSAGE));
}

#[tokio::test]
async fn test_non_form_body_renders_error_view() {
    let app = spawn_app().await;
    let resp = app
        .client
        .post(app.url("/contacts/"))
        .header("content-type", "application/json")
        .body(r#"{"first_name":"Ann"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains(BAD_REQUEST_MESSAGE));
    assert!(app.store.is_empty().unwrap());
}

#[tokio::test]
async fn test_store_failure_is_generic_server_error() {
    let base = spawn_server(AppState::new(
        Arc::new(UnavailableProvider),
        Arc::new(NoDelay),
    ))
    .await;
    let client = client();

    let resp = client
        .get(format!("{}/contacts/", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains(INTERNAL_MESSAGE));
    assert!(!body.contains("db down"));

    let resp = client
        .delete(format!("{}/contacts/1/", base))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("<section class=\"exception\">"));
    assert!(!body.contains("db down"));

    // The server keeps answering after a failed request.
    let resp = client
        .get(format!("{}/contacts/1/", base))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_delay_applies_to_list_and_contact_routes_only() {
    let delay = Arc::new(CountingDelay::default());
    let app = spawn_app_with_delay(delay.clone()).await;
    let id = app.seed("Ann", "Lee", Gender::Female).await;

    let send = |req: reqwest::RequestBuilder| async move {
        req.header("HX-Request", "true").send().await.unwrap().status()
    };

    let delayed = [
        send(app.client.get(app.url("/contacts/"))).await,
        send(
            app.client
                .post(app.url("/contacts/"))
                .form(&contact_form("Bob", "Lee", "bob@x.com", "M")),
        )
        .await,
        send(app.client.get(app.url(&format!("/contacts/{}/", id)))).await,
        send(
            app.client
                .put(app.url(&format!("/contacts/{}/", id)))
                .form(&contact_form("Anna", "Lee", "anna@x.com", "F")),
        )
        .await,
        send(app.client.delete(app.url(&format!("/contacts/{}/", id)))).await,
    ];
    assert!(delayed.iter().all(|s| *s == StatusCode::OK), "{:?}", delayed);
    assert_eq!(delay.count(), 5);

    let undelayed = [
        send(app.client.get(app.url("/contacts/add/"))).await,
        send(app.client.get(app.url("/contacts/2/change/"))).await,
        send(
            app.client
                .post(app.url("/validate/email-address/"))
                .form(&[("email_address", "a@b.com")]),
        )
        .await,
    ];
    assert!(undelayed.iter().all(|s| *s == StatusCode::OK), "{:?}", undelayed);
    assert_eq!(delay.count(), 5);
}
