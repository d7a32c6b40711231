//! `GithubClient` tests.
//!
//! These tests exercise the behavior of `GithubClient` against a local HTTP
//! server: conditional requests, `Link` pagination, and the contents API.

use super::common::{HttpServerHandle, Method::GET, Response, TestBuilder};
use notifybot::github::{GithubClient, SourceHost};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn client(server: &HttpServerHandle) -> GithubClient {
    GithubClient::new(
        "sekrit-token".to_string().into(),
        server.url(),
        "acme".to_string(),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn commits_json() -> serde_json::Value {
    json!([{
        "sha": "abc123",
        "html_url": "https://github.com/acme/web/commit/abc123",
        "commit": {
            "author": {
                "name": "Jane Doe",
                "email": "jane@acme.test",
                "date": "2024-03-01T10:00:00Z"
            }
        },
        "author": {"login": "janed"}
    }, {
        "sha": "def456",
        "html_url": "https://github.com/acme/web/commit/def456",
        "commit": {
            "author": {"name": null, "email": null, "date": "2024-03-01T09:00:00Z"}
        },
        "author": null
    }])
}

#[tokio::test]
async fn commits_are_fetched_conditionally() {
    let server = TestBuilder::default()
        .handler(GET, "repos/acme/web/commits", |req| {
            assert_eq!(req.query, vec![("sha".to_string(), "master".to_string())]);
            assert_eq!(req.header("authorization"), Some("token sekrit-token"));
            assert_eq!(req.header("user-agent"), Some("notifybot"));
            match req.header("if-none-match") {
                Some("\"v1\"") => Response::new().code(304).header("ETag: \"v1\""),
                None => Response::new()
                    .header("ETag: W/\"v1\"")
                    .json(commits_json()),
                Some(other) => panic!("unexpected validator {other}"),
            }
        })
        .start();
    let gh = client(&server);

    let first = gh.commits("web", "master", None).await.unwrap();
    assert_eq!(first.etag.as_deref(), Some("W/\"v1\""));
    let commits = first.body.unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].commit.author.name, "Jane Doe");
    assert_eq!(commits[0].author.as_ref().unwrap().login, "janed");
    assert_eq!(commits[1].commit.author.email, "");
    assert!(commits[1].author.is_none());

    let second = gh
        .commits("web", "master", Some("\"v1\"".to_string()))
        .await
        .unwrap();
    assert!(second.body.is_none());
    assert_eq!(second.etag.as_deref(), Some("\"v1\""));
}

#[tokio::test]
async fn org_repos_follow_next_links() {
    let server = TestBuilder::default()
        .handler(GET, "orgs/acme/repos", |req| {
            let page = req
                .query
                .iter()
                .find(|(k, _)| k == "page")
                .map(|(_, v)| v.clone());
            match page.as_deref() {
                None => Response::new()
                    .header(format!(
                        "Link: <{base}/orgs/acme/repos?per_page=100&page=2>; rel=\"next\", \
                         <{base}/orgs/acme/repos?per_page=100&page=2>; rel=\"last\"",
                        base = req.base_url()
                    ))
                    .json(json!([{"name": "web"}, {"name": "api"}])),
                Some("2") => Response::new().json(json!([{"name": "docs"}])),
                Some(p) => panic!("unexpected page {p}"),
            }
        })
        .start();
    let gh = client(&server);

    let repos = gh.org_repos().await.unwrap();
    let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["web", "api", "docs"]);
    server.events.assert_eq(&[
        (GET, "/orgs/acme/repos"),
        (GET, "/orgs/acme/repos"),
    ]);
}

fn comment_json(id: u64, body: &str) -> serde_json::Value {
    json!({
        "id": id,
        "html_url": format!("https://github.com/acme/web/issues/1#issuecomment-{id}"),
        "created_at": "2024-03-01T10:00:00Z",
        "user": {"login": "janed"},
        "body": body
    })
}

#[tokio::test]
async fn comments_come_from_the_last_page() {
    // The last page gains comment 901 after the first request to it.
    let last_page_hits = Arc::new(AtomicUsize::new(0));
    let hits = last_page_hits.clone();
    let server = TestBuilder::default()
        .handler(GET, "repos/acme/web/issues/comments", move |req| {
            if req.query.iter().any(|(k, v)| k == "page" && v == "3") {
                let version = hits.fetch_add(1, Ordering::SeqCst);
                return match (req.header("if-none-match"), version) {
                    (Some("\"p3v2\""), _) => Response::new().code(304).header("ETag: \"p3v2\""),
                    (_, 0) => Response::new()
                        .header("ETag: \"p3v1\"")
                        .json(json!([comment_json(900, "LGTM")])),
                    _ => Response::new()
                        .header("ETag: \"p3v2\"")
                        .json(json!([comment_json(900, "LGTM"), comment_json(901, "ship it")])),
                };
            }
            // The first page itself never changes.
            if req.header("if-none-match") == Some("\"c1\"") {
                return Response::new().code(304).header("ETag: \"c1\"");
            }
            Response::new()
                .header("ETag: \"c1\"")
                .header(format!(
                    "Link: <{base}/repos/acme/web/issues/comments?page=2>; rel=\"next\", \
                     <{base}/repos/acme/web/issues/comments?page=3>; rel=\"last\"",
                    base = req.base_url()
                ))
                .json(json!([comment_json(1, "first!")]))
        })
        .start();
    let gh = client(&server);

    let first = gh.issue_comments("web", None).await.unwrap();
    assert_eq!(first.etag.as_deref(), Some("\"p3v1\""));
    let comments = first.body.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, 900);
    assert_eq!(comments[0].body, "LGTM");

    let second = gh.issue_comments("web", first.etag).await.unwrap();
    assert_eq!(second.etag.as_deref(), Some("\"p3v2\""));
    let ids: Vec<u64> = second.body.unwrap().iter().map(|c| c.id).collect();
    assert_eq!(ids, [900, 901]);

    let third = gh.issue_comments("web", second.etag).await.unwrap();
    assert!(third.body.is_none());
    assert_eq!(third.etag.as_deref(), Some("\"p3v2\""));
    assert_eq!(last_page_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn single_page_of_comments() {
    let server = TestBuilder::default()
        .handler(GET, "repos/acme/web/issues/comments", |req| {
            assert_eq!(req.header("if-none-match"), None);
            Response::new()
                .header("ETag: \"c1\"")
                .json(json!([comment_json(7, "hello")]))
        })
        .start();
    let gh = client(&server);

    let comments = gh
        .issue_comments("web", Some("\"c1\"".to_string()))
        .await
        .unwrap();
    assert_eq!(comments.etag.as_deref(), Some("\"c1\""));
    assert_eq!(comments.body.unwrap()[0].id, 7);
    server
        .events
        .assert_eq(&[(GET, "/repos/acme/web/issues/comments")]);
}

#[tokio::test]
async fn file_contents_are_decoded() {
    let server = TestBuilder::default()
        .handler(GET, "repos/acme/notify-config/contents/{path}", |req| {
            assert_eq!(req.components["path"], "mapping.csv");
            // "real_name,slack_name\n" wrapped the way the API wraps it
            Response::new()
                .header("ETag: \"m1\"")
                .json(json!({"content": "cmVhbF9uYW1l\nLHNsYWNrX25h\nbWUK\n", "encoding": "base64"}))
        })
        .start();
    let gh = client(&server);

    let contents = gh
        .file_contents("notify-config", "mapping.csv", None)
        .await
        .unwrap();
    assert_eq!(contents.etag.as_deref(), Some("\"m1\""));
    assert_eq!(contents.body.unwrap(), b"real_name,slack_name\n");
}

#[tokio::test]
async fn server_errors_are_reported() {
    let server = TestBuilder::default()
        .handler(GET, "users/{login}", |_req| {
            Response::new().code(502).body(b"bad gateway")
        })
        .start();
    let gh = client(&server);

    let err = gh.user("janed").await.unwrap_err();
    assert!(format!("{err:?}").contains("bad gateway"), "{err:?}");
}

#[tokio::test]
async fn user_details() {
    let server = TestBuilder::default()
        .handler(GET, "users/{login}", |req| {
            Response::new().json(json!({
                "login": req.components["login"],
                "name": "Jane Doe",
                "email": null
            }))
        })
        .start();
    let gh = client(&server);

    let user = gh.user("janed").await.unwrap();
    assert_eq!(user.login, "janed");
    assert_eq!(user.name, "Jane Doe");
    assert_eq!(user.email, "");
}
