//! `SlackClient` tests.

use super::common::{HttpServerHandle, Method::POST, Response, TestBuilder};
use notifybot::slack::{Messenger, SlackClient};
use serde_json::json;
use std::time::Duration;

fn client(server: &HttpServerHandle) -> SlackClient {
    SlackClient::new(
        server.url(),
        "xoxb-token".to_string().into(),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn posts_message() {
    let server = TestBuilder::default()
        .handler(POST, "chat.postMessage", |req| {
            let body = req.body_str();
            let form: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
                .into_owned()
                .collect();
            assert!(form.contains(&("token".to_string(), "xoxb-token".to_string())));
            assert!(form.contains(&("channel".to_string(), "#build-notifications".to_string())));
            assert!(form.contains(&("text".to_string(), "@jdoe: it broke".to_string())));
            assert!(form.contains(&("link_names".to_string(), "1".to_string())));
            Response::new().json(json!({"ok": true}))
        })
        .start();
    let slack = client(&server);

    slack
        .send_message("#build-notifications", "@jdoe: it broke")
        .await
        .unwrap();
    server.events.assert_eq(&[(POST, "/chat.postMessage")]);
}

#[tokio::test]
async fn rejected_message_is_an_error() {
    let server = TestBuilder::default()
        .handler(POST, "chat.postMessage", |_req| {
            Response::new().json(json!({"ok": false, "error": "channel_not_found"}))
        })
        .start();
    let slack = client(&server);

    let err = slack.send_message("C-nowhere", "hi").await.unwrap_err();
    assert!(err.to_string().contains("channel_not_found"), "{err}");
}
