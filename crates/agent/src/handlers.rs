//! Conversation handlers: accept offered rings, fetch attached files.

use std::sync::Arc;

use {
    courier_client::AgentConnection,
    courier_protocol::{
        DownloadDescriptor, MessagingNotification, Request, RingState, RoutingNotification,
    },
    tracing::{info, warn},
};

use crate::{download::Downloader, session::AgentSession};

/// Accept every ring that is waiting in an `UPSERT` change.
///
/// Each accept is fire-and-forget; the outcome is only logged. Rings seen
/// twice are accepted twice. Returns the number of accept requests issued.
pub fn on_routing_notification(
    connection: &Arc<dyn AgentConnection>,
    body: &RoutingNotification,
) -> usize {
    let mut issued = 0;
    for ring in body.changes.iter().flat_map(|change| change.waiting_rings()) {
        info!(ring_id = %ring.ring_id, "incoming conversation");
        let response = connection.request(Request::UpdateRingState {
            ring_id: ring.ring_id.clone(),
            ring_state: RingState::Accepted,
        });
        let ring_id = ring.ring_id.clone();
        tokio::spawn(async move {
            match response.wait().await {
                Ok(_) => info!(ring_id, "conversation accepted"),
                Err(e) => warn!(ring_id, error = %e, "error accepting conversation"),
            }
        });
        issued += 1;
    }
    issued
}

/// Request a signed URL for every file attachment and download it once the
/// URL arrives. Text messages and other events are ignored.
///
/// Returns the number of URL requests issued.
pub fn on_messaging_event(
    connection: &Arc<dyn AgentConnection>,
    session: &Arc<AgentSession>,
    downloader: &Arc<Downloader>,
    body: &MessagingNotification,
) -> usize {
    let mut issued = 0;
    for change in &body.changes {
        let Some(path) = change.attachment_path() else {
            continue;
        };
        let dialog_id = change
            .dialog_id
            .as_deref()
            .or(body.dialog_id.as_deref())
            .unwrap_or("unknown")
            .to_string();
        info!(dialog_id, path, "file received");

        let response = connection.request(Request::GenerateDownloadUrl {
            relative_path: path.to_string(),
        });
        let session = Arc::clone(session);
        let downloader = Arc::clone(downloader);
        tokio::spawn(async move {
            let descriptor: DownloadDescriptor = match response.wait_as().await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(dialog_id, error = %e, "failed to generate download URL");
                    return;
                },
            };
            let domain = session.swift_domain();
            match downloader
                .download(domain.as_deref(), &descriptor, &dialog_id)
                .await
            {
                Ok(file) => info!(dialog_id, file = %file.display(), "file downloaded"),
                Err(e) => warn!(
                    dialog_id,
                    path = %descriptor.relative_path,
                    error = %e,
                    "file download failed"
                ),
            }
        });
        issued += 1;
    }
    issued
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{MockConnection, settle},
        courier_client::RequestError,
        courier_protocol::types,
        rstest::rstest,
        serde_json::json,
        std::time::Duration,
    };

    fn routing(changes: serde_json::Value) -> RoutingNotification {
        serde_json::from_value(json!({"subscriptionId": "s", "changes": changes})).unwrap()
    }

    fn messaging(changes: serde_json::Value) -> MessagingNotification {
        serde_json::from_value(json!({"dialogId": "dlg-body", "changes": changes})).unwrap()
    }

    fn accept(ring_id: &str) -> Request {
        Request::UpdateRingState {
            ring_id: ring_id.into(),
            ring_state: RingState::Accepted,
        }
    }

    fn downloader(dir: &std::path::Path) -> Arc<Downloader> {
        Arc::new(
            Downloader::new(reqwest::Client::new(), dir, "A", Duration::from_secs(5))
                .with_insecure_scheme(),
        )
    }

    #[rstest]
    #[case("UPSERT", "WAITING", true)]
    #[case("UPSERT", "ACCEPTED", false)]
    #[case("UPSERT", "REJECTED", false)]
    #[case("UPSERT", "EXPIRED", false)]
    #[case("DELETE", "WAITING", false)]
    #[case("OTHER", "WAITING", false)]
    #[tokio::test]
    async fn accepts_iff_upsert_and_waiting(
        #[case] change_type: &str,
        #[case] ring_state: &str,
        #[case] accepted: bool,
    ) {
        let mock = MockConnection::new();
        let connection: Arc<dyn AgentConnection> = mock.clone();
        let body = routing(json!([{
            "type": change_type,
            "result": {"ringsDetails": [{"ringId": "r1", "ringState": ring_state}]}
        }]));

        let issued = on_routing_notification(&connection, &body);

        let expected = if accepted { vec![accept("r1")] } else { vec![] };
        assert_eq!(mock.requests(), expected);
        assert_eq!(issued, expected.len());
    }

    #[tokio::test]
    async fn accepts_every_waiting_ring_in_order() {
        let mock = MockConnection::new();
        let connection: Arc<dyn AgentConnection> = mock.clone();
        let body = routing(json!([
            {"type": "UPSERT", "result": {"ringsDetails": [
                {"ringId": "a", "ringState": "WAITING"},
                {"ringId": "b", "ringState": "ACCEPTED"}
            ]}},
            {"type": "DELETE"},
            {"type": "UPSERT", "result": {"ringsDetails": [{"ringId": "c", "ringState": "WAITING"}]}}
        ]));

        on_routing_notification(&connection, &body);
        assert_eq!(mock.requests(), vec![accept("a"), accept("c")]);
    }

    #[tokio::test]
    async fn replayed_notification_is_accepted_again() {
        let mock = MockConnection::new();
        let connection: Arc<dyn AgentConnection> = mock.clone();
        let body = routing(json!([{
            "type": "UPSERT",
            "result": {"ringsDetails": [{"ringId": "r1", "ringState": "WAITING"}]}
        }]));

        on_routing_notification(&connection, &body);
        on_routing_notification(&connection, &body);
        assert_eq!(mock.requests(), vec![accept("r1"), accept("r1")]);
    }

    #[tokio::test]
    async fn failed_accept_is_not_retried() {
        let mock = MockConnection::new();
        mock.respond(
            types::UPDATE_RING_STATE,
            Err(RequestError::Rejected {
                code: 400,
                body: json!("ring expired"),
            }),
        );
        let connection: Arc<dyn AgentConnection> = mock.clone();
        let body = routing(json!([{
            "type": "UPSERT",
            "result": {"ringsDetails": [{"ringId": "r1", "ringState": "WAITING"}]}
        }]));

        on_routing_notification(&connection, &body);
        settle().await;
        assert_eq!(mock.requests().len(), 1);
    }

    #[rstest]
    #[case(json!({"type": "ContentEvent", "message": {"relativePath": "/f/1.png"}}), true)]
    #[case(json!({"type": "ContentEvent", "contentType": "text/plain", "message": "hello"}), false)]
    #[case(json!({"type": "ContentEvent", "message": {"caption": "no file"}}), false)]
    #[case(json!({"type": "ContentEvent"}), false)]
    #[case(json!({"type": "AcceptStatusEvent", "status": "READ", "sequenceList": [1]}), false)]
    #[case(json!({"type": "ChatStateEvent", "chatState": "COMPOSING"}), false)]
    #[tokio::test]
    async fn requests_url_iff_file_content_event(
        #[case] event: serde_json::Value,
        #[case] requested: bool,
    ) {
        let mock = MockConnection::new();
        let connection: Arc<dyn AgentConnection> = mock.clone();
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(AgentSession::new("A"));
        let body = messaging(json!([{"sequence": 0, "event": event}]));

        let issued = on_messaging_event(&connection, &session, &downloader(dir.path()), &body);

        let expected = if requested {
            vec![Request::GenerateDownloadUrl {
                relative_path: "/f/1.png".into(),
            }]
        } else {
            vec![]
        };
        assert_eq!(mock.requests(), expected);
        assert_eq!(issued, expected.len());
    }

    #[tokio::test]
    async fn download_before_domain_resolved_writes_nothing() {
        let mock = MockConnection::new();
        mock.respond(
            types::GENERATE_DOWNLOAD_URL,
            Ok(json!({
                "relativePath": "/f/1.png",
                "queryParams": {"temp_url_sig": "s", "temp_url_expires": 1}
            })),
        );
        let connection: Arc<dyn AgentConnection> = mock.clone();
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(AgentSession::new("A"));
        let body = messaging(json!([{
            "event": {"type": "ContentEvent", "message": {"relativePath": "/f/1.png"}}
        }]));

        on_messaging_event(&connection, &session, &downloader(dir.path()), &body);
        settle().await;

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn downloads_attachment_with_dialog_id() {
        use axum::{Router, routing::get};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let domain = listener.local_addr().unwrap().to_string();
        let app = Router::new().route("/f/photo.JPG", get(|| async { "jpeg" }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mock = MockConnection::new();
        mock.respond(
            types::GENERATE_DOWNLOAD_URL,
            Ok(json!({
                "relativePath": "/f/photo.JPG",
                "queryParams": {"temp_url_sig": "s", "temp_url_expires": "1"}
            })),
        );
        let connection: Arc<dyn AgentConnection> = mock.clone();
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(AgentSession::new("A"));
        session.set_swift_domain(domain);
        let body = messaging(json!([{
            "dialogId": "dlg-change",
            "event": {"type": "ContentEvent", "message": {"relativePath": "/f/photo.JPG"}}
        }]));

        on_messaging_event(&connection, &session, &downloader(dir.path()), &body);

        let mut written = Vec::new();
        for _ in 0..100 {
            written = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|entry| entry.unwrap().path())
                .collect();
            if !written.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(written.len(), 1);
        let name = written[0].file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("A_dlg-change_"), "{name}");
        assert!(name.ends_with(".jpg"), "{name}");
    }
}
