//! Integration tests for groqchat.
//!
//! The offline tests point the client at a tiny local HTTP server that replays canned
//! server-sent events.  The live tests at the bottom require GROQ_API_KEY and skip without it.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    use groqchat::chat::{ChatConfig, ChatController, ChatSessionStore, TurnOutcome};
    use groqchat::{
        Attachment, FileStore, Groq, KnownModel, Locale, MemoryStore, Message, Model,
        PlainTextRenderer, Storage, StreamOutcome, Theme,
    };

    const OK: &str = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

    fn event(text: &str) -> String {
        let chunk = serde_json::json!({
            "id": "chatcmpl-1",
            "model": "llama-3.1-8b-instant",
            "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
        });
        format!("data: {chunk}\n\n")
    }

    const DONE: &str = "data: [DONE]\n\n";

    /// Serve one request: reply with `head`, then each of `parts`, then either close or hang.
    /// The handle yields the request body.
    async fn serve(
        head: &'static str,
        parts: Vec<String>,
        hang: bool,
    ) -> (String, JoinHandle<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let length: usize = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|value| value.trim().parse().unwrap())
                .unwrap_or(0);
            while buf.len() < header_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending the body");
                buf.extend_from_slice(&chunk[..n]);
            }
            let body: Value = serde_json::from_slice(&buf[header_end..header_end + length])
                .unwrap_or(Value::Null);

            socket.write_all(head.as_bytes()).await.unwrap();
            for part in parts {
                if socket.write_all(part.as_bytes()).await.is_err() {
                    return body;
                }
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            if hang {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            let _ = socket.shutdown().await;
            body
        });
        (url, handle)
    }

    fn controller(url: &str, locale: Locale) -> ChatController<MemoryStore> {
        controller_with_tick(url, locale, Duration::from_millis(1))
    }

    fn controller_with_tick(
        url: &str,
        locale: Locale,
        tick: Duration,
    ) -> ChatController<MemoryStore> {
        let client = Groq::with_options(Some("test-key".to_string()), Some(url.to_string()), None)
            .unwrap();
        let store = ChatSessionStore::load(Storage::new(MemoryStore::new()));
        let config = ChatConfig::new()
            .with_locale(locale)
            .with_tick(tick)
            .without_color();
        ChatController::new(client, store, config).unwrap()
    }

    fn renderer() -> PlainTextRenderer<Vec<u8>> {
        PlainTextRenderer::with_writer(Vec::new(), false, Theme::Dark)
    }

    #[tokio::test]
    async fn first_turn_streams_reply_into_session() {
        let (url, server) = serve(
            OK,
            vec![event("Hel"), event("lo"), event("!"), DONE.to_string()],
            false,
        )
        .await;
        let mut controller = controller(&url, Locale::En);
        let mut out = renderer();

        let outcome = controller.send("Hi", None, &mut out).await;
        assert!(
            matches!(outcome, TurnOutcome::Completed { revealed: 6 }),
            "{outcome:?}"
        );

        let session = controller.store().active().unwrap();
        assert_eq!(session.title, "Hi");
        assert_eq!(
            session.messages,
            vec![
                Message::assistant("Hello! How can I help you?"),
                Message::user("Hi"),
                Message::assistant("Hello!"),
            ]
        );
        assert_eq!(String::from_utf8(out.into_inner()).unwrap(), "AI: Hello!\n");
        assert!(!controller.submission_lock().is_busy());

        let request = server.await.unwrap();
        assert_eq!(request["model"], "llama-3.1-8b-instant");
        assert_eq!(request["stream"], true);
        assert!(request.get("temperature").is_none());
        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "assistant");
        assert_eq!(messages[1], serde_json::json!({"role": "user", "content": "Hi"}));
    }

    #[tokio::test]
    async fn configured_temperature_reaches_the_request() {
        let (url, server) = serve(OK, vec![event("ok"), DONE.to_string()], false).await;
        let client = Groq::with_options(Some("k".to_string()), Some(url), None).unwrap();
        let store = ChatSessionStore::load(Storage::new(MemoryStore::new()));
        let config = ChatConfig::new()
            .with_temperature(Some(0.5))
            .with_tick(Duration::from_millis(1));
        let mut controller = ChatController::new(client, store, config).unwrap();

        let outcome = controller.send("Merhaba", None, &mut renderer()).await;
        assert!(matches!(outcome, TurnOutcome::Completed { revealed: 2 }), "{outcome:?}");
        let request = server.await.unwrap();
        assert_eq!(request["temperature"], 0.5);
    }

    #[tokio::test]
    async fn image_attachment_is_sent_as_two_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"\x89PNG fake").unwrap();
        let attachment = Attachment::new(&path).unwrap();

        let (url, server) = serve(OK, vec![event("Bir kedi."), DONE.to_string()], false).await;
        let mut controller = controller(&url, Locale::Tr);
        let mut out = renderer();

        let outcome = controller.send("", Some(&attachment), &mut out).await;
        assert!(matches!(outcome, TurnOutcome::Completed { .. }), "{outcome:?}");

        let session = controller.store().active().unwrap();
        assert_eq!(session.title, "Dosya Gönderimi");
        assert!(
            session.messages[1]
                .content()
                .contains("![Görsel](data:image/png;base64,")
        );
        assert_eq!(session.messages[2].content(), "Bir kedi.");

        let request = server.await.unwrap();
        let content = &request["messages"][1]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "Bu görsel hakkında ne düşünüyorsun?");
        assert_eq!(content[1]["type"], "image_url");
        assert!(
            content[1]["image_url"]["url"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
    }

    #[tokio::test]
    async fn stop_freezes_partial_reply() {
        let (url, _server) = serve(OK, vec![event("abc")], true).await;
        let mut controller = controller(&url, Locale::En);
        let stop = controller.stop_handle();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            stop.stop()
        });
        let mut out = renderer();

        let outcome = controller.send("Count", None, &mut out).await;
        assert!(stopper.await.unwrap());
        assert!(
            matches!(outcome, TurnOutcome::Cancelled { revealed: 3 }),
            "{outcome:?}"
        );
        assert!(!controller.submission_lock().is_busy());

        let frozen = controller.store().active().unwrap().messages[2].clone();
        assert_eq!(frozen.content(), "abc");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.store().active().unwrap().messages[2], frozen);
        assert!(
            String::from_utf8(out.into_inner())
                .unwrap()
                .ends_with("abc\n[interrupted]\n")
        );

        // Nothing to stop once the turn is over.
        assert!(!controller.stop_handle().stop());
    }

    #[tokio::test]
    async fn stop_after_stream_finished_freezes_the_queue() {
        let long = "y".repeat(200);
        let (url, server) = serve(OK, vec![event(&long), DONE.to_string()], false).await;
        let mut controller = controller_with_tick(&url, Locale::En, Duration::from_millis(5));
        let stop = controller.stop_handle();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            stop.stop()
        });
        let mut out = renderer();

        let outcome = controller.send("Long one", None, &mut out).await;
        assert!(stopper.await.unwrap());
        // The endpoint already closed the stream.
        server.await.unwrap();
        let TurnOutcome::Cancelled { revealed } = outcome else {
            panic!("expected a stopped reply, got {outcome:?}");
        };
        assert!(revealed > 0 && revealed < 200, "{revealed}");
        assert!(!controller.submission_lock().is_busy());

        let frozen = controller.store().active().unwrap().messages[2].clone();
        assert_eq!(frozen.content().len(), revealed);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(controller.store().active().unwrap().messages[2], frozen);
    }

    #[tokio::test]
    async fn stream_error_keeps_what_was_revealed() {
        let error = "data: {\"error\":{\"message\":\"boom\",\"type\":\"server_error\"}}\n\n";
        let (url, _server) = serve(OK, vec![event("par"), error.to_string()], false).await;
        let mut controller = controller(&url, Locale::En);
        let mut out = renderer();

        let outcome = controller.send("Hi", None, &mut out).await;
        let TurnOutcome::Failed(err) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(err.to_string().contains("boom"));
        assert!(!controller.submission_lock().is_busy());
        let partial = controller.store().active().unwrap().messages[2].content().to_string();
        assert!("par".starts_with(&partial), "{partial:?}");
    }

    #[tokio::test]
    async fn rejected_key_is_an_authentication_failure() {
        const UNAUTHORIZED: &str = "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\nconnection: close\r\n\r\n";
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        let (url, _server) = serve(UNAUTHORIZED, vec![body.to_string()], false).await;
        let mut controller = controller(&url, Locale::En);
        let mut out = renderer();

        let outcome = controller.send("Hi", None, &mut out).await;
        let TurnOutcome::Failed(err) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(err.is_authentication(), "{err}");
        assert_eq!(controller.store().active().unwrap().messages[2].content(), "");
    }

    #[tokio::test]
    async fn client_cancelled_before_reply_runs_no_callbacks() {
        let (url, _server) = serve(OK, vec![event("never")], true).await;
        let client = Groq::with_options(Some("k".to_string()), Some(url), None).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut chunks = 0;
        let mut done = false;
        let outcome = client
            .send_message(
                vec![(&Message::user("Hi")).into()],
                &Model::default(),
                |_| chunks += 1,
                || done = true,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert_eq!(chunks, 0);
        assert!(!done);
    }

    #[tokio::test]
    async fn deleting_only_session_creates_a_fresh_one_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let client = Groq::with_options(
            Some("k".to_string()),
            Some("http://127.0.0.1:9/".to_string()),
            None,
        )
        .unwrap();
        let store = ChatSessionStore::load(Storage::new(FileStore::open(dir.path()).unwrap()));
        let mut controller =
            ChatController::new(client, store, ChatConfig::new().with_locale(Locale::En)).unwrap();
        let only = controller.active_id();
        assert!(controller.delete_session(only));

        let reloaded = ChatSessionStore::load(Storage::new(FileStore::open(dir.path()).unwrap()));
        assert_eq!(reloaded.sessions().len(), 1);
        let fresh = &reloaded.sessions()[0];
        assert_ne!(fresh.id, only);
        assert_eq!(fresh.messages[0].content(), "Hello! How can I help you?");
    }

    #[tokio::test]
    async fn live_streaming_reply() {
        // This test requires GROQ_API_KEY to be set
        let api_key = std::env::var("GROQ_API_KEY").ok();
        if api_key.is_none() {
            eprintln!("Skipping test: GROQ_API_KEY not set");
            return;
        }

        let client = Groq::new(api_key).expect("Failed to create client");
        let mut reply = String::new();
        let mut done = false;
        let outcome = client
            .send_message(
                vec![(&Message::user("Say 'test passed'")).into()],
                &Model::Known(KnownModel::Llama31_8bInstant),
                |text| reply.push_str(text),
                || done = true,
                &CancellationToken::new(),
            )
            .await;
        assert!(outcome.is_ok(), "Request should succeed with valid API key");
        assert!(done);
        assert!(!reply.is_empty());
    }

    #[tokio::test]
    async fn live_controller_turn() {
        let api_key = std::env::var("GROQ_API_KEY").ok();
        if api_key.is_none() {
            eprintln!("Skipping test: GROQ_API_KEY not set");
            return;
        }

        let client = Groq::new(api_key).expect("Failed to create client");
        let store = ChatSessionStore::load(Storage::new(MemoryStore::new()));
        let mut controller = ChatController::new(
            client,
            store,
            ChatConfig::new().with_tick(Duration::from_millis(1)),
        )
        .unwrap();
        let mut out = renderer();
        let outcome = controller.send("Merhaba, nasılsın?", None, &mut out).await;
        assert!(matches!(outcome, TurnOutcome::Completed { .. }), "{outcome:?}");
        assert!(!controller.store().active().unwrap().messages[2].content().is_empty());
    }
}
