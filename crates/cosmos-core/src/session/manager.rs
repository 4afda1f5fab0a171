//! Active chat session: in-memory history plus its backing files

use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::identity::{FALLBACK_BOT_NAME, IdentityFile};
use crate::llm::{ChatClient, ChatCompletionRequest};
use crate::session::{Message, SessionStore, recent_messages};
use crate::{Error, Result};

/// A conversation that lives until process exit
pub struct ChatSession {
    id: String,
    store: SessionStore,
    bot_name: String,
    messages: Vec<Message>,
    /// Messages sent per request
    max_history: usize,
}

impl ChatSession {
    /// Create a new session on disk.
    ///
    /// `seed` replaces the default history (a single system message carrying
    /// the identity text) when it is non-empty.
    pub fn start(
        store: SessionStore,
        identity: &IdentityFile,
        seed: Vec<Message>,
        max_history: usize,
    ) -> Result<Self> {
        let messages = if seed.is_empty() {
            vec![Message::system(&identity.identity)]
        } else {
            seed
        };

        let id = store.create(identity, &messages)?;

        Ok(Self {
            id,
            store,
            bot_name: identity.bot_name.clone(),
            messages,
            max_history,
        })
    }

    /// Resume an existing session.
    ///
    /// A missing identity file is an error. An identity file without a
    /// readable bot name falls back to [`FALLBACK_BOT_NAME`].
    pub fn resume(store: SessionStore, id: &str, max_history: usize) -> Result<Self> {
        if !store.exists(id) {
            return Err(Error::SessionNotFound(id.to_string()));
        }

        let bot_name = match store.load_identity(id) {
            Ok(identity) => identity.bot_name,
            Err(e @ Error::IdentityParse { .. }) => {
                warn!("{}; using '{}'", e, FALLBACK_BOT_NAME);
                FALLBACK_BOT_NAME.to_string()
            }
            Err(e) => return Err(e),
        };

        let messages = store.load_history(id)?;
        info!(session = %id, messages = messages.len(), "Resumed session");

        Ok(Self {
            id: id.to_string(),
            store,
            bot_name,
            messages,
            max_history,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// Full history, including messages outside the request window
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn history_path(&self) -> PathBuf {
        self.store.history_path(&self.id)
    }

    pub fn identity_path(&self) -> PathBuf {
        self.store.identity_path(&self.id)
    }

    /// Messages that go out with the next request
    pub fn window(&self) -> &[Message] {
        recent_messages(&self.messages, self.max_history)
    }

    /// Write the full history to disk
    pub fn persist(&self) -> Result<()> {
        self.store.save_history(&self.id, &self.messages)
    }

    /// Record the user's input and build the request for it
    pub fn prepare_turn(&mut self, input: &str, model: &str) -> ChatCompletionRequest {
        self.messages.push(Message::user(input));
        let request = ChatCompletionRequest::new(model, self.window());
        debug!(
            session = %self.id,
            total = self.messages.len(),
            sent = request.messages.len(),
            "Prepared turn"
        );
        request
    }

    /// Apply the outcome of a request and persist.
    ///
    /// On success the reply is appended as an assistant message. On failure
    /// only the user's message (already recorded) remains.
    pub fn finish_turn(&mut self, outcome: Result<String>) -> Result<String> {
        if let Ok(reply) = &outcome {
            self.messages.push(Message::assistant(reply));
        }
        self.persist()?;
        outcome
    }

    /// Run one full turn against the endpoint
    pub async fn send(&mut self, client: &ChatClient, input: &str) -> Result<String> {
        self.send_with(client, input, |_| {}).await
    }

    /// Run one full turn, handing the outgoing request to `inspect` first
    pub async fn send_with<F>(
        &mut self,
        client: &ChatClient,
        input: &str,
        inspect: F,
    ) -> Result<String>
    where
        F: FnOnce(&ChatCompletionRequest),
    {
        let request = self.prepare_turn(input, client.model());
        inspect(&request);
        let outcome = client.complete(&request).await;
        self.finish_turn(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::session::Role;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store() -> (TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("data"));
        (dir, store)
    }

    fn identity() -> IdentityFile {
        IdentityFile::new("Ana", "Nova", "You are Nova.")
    }

    async fn client_for(server: &MockServer) -> ChatClient {
        let config = LlmConfig {
            api_key: "k".to_string(),
            ..LlmConfig::default()
        };
        ChatClient::with_base_url(&config, server.uri()).unwrap()
    }

    async fn reply_server(reply: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": reply}}]
            })))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_start_seeds_system_message() {
        let (_dir, store) = store();
        let session = ChatSession::start(store.clone(), &identity(), vec![], 20).unwrap();

        assert_eq!(session.bot_name(), "Nova");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::System);
        assert_eq!(session.messages()[0].content, "You are Nova.");
        assert_eq!(store.load_history(session.id()).unwrap(), session.messages());
    }

    #[test]
    fn test_start_with_custom_seed() {
        let (_dir, store) = store();
        let seed = vec![
            Message::system("custom"),
            Message::user("earlier"),
            Message::assistant("reply"),
        ];
        let session = ChatSession::start(store, &identity(), seed.clone(), 20).unwrap();
        assert_eq!(session.messages(), seed.as_slice());
    }

    #[test]
    fn test_resume_reads_bot_name_and_history() {
        let (_dir, store) = store();
        let seed = vec![Message::system("s"), Message::user("u")];
        store.create_with_id("old", &identity(), &seed).unwrap();

        let session = ChatSession::resume(store, "old", 20).unwrap();
        assert_eq!(session.bot_name(), "Nova");
        assert_eq!(session.messages(), seed.as_slice());
    }

    #[test]
    fn test_resume_headerless_identity_falls_back() {
        let (_dir, store) = store();
        store.create_with_id("legacy", &identity(), &[]).unwrap();
        std::fs::write(store.identity_path("legacy"), "single line persona").unwrap();

        let session = ChatSession::resume(store, "legacy", 20).unwrap();
        assert_eq!(session.bot_name(), FALLBACK_BOT_NAME);
    }

    #[test]
    fn test_resume_keeps_hand_edited_history_across_failed_turn() {
        let (_dir, store) = store();
        store.create_with_id("old", &identity(), &[]).unwrap();
        std::fs::write(
            store.history_path("old"),
            r#"[{"role": "system", "content": "You are Nova.", "timestamp": "2024-01-01 00:00:00"},
                {"role": "user", "content": "important note"}]"#,
        )
        .unwrap();

        let mut session = ChatSession::resume(store.clone(), "old", 20).unwrap();
        assert_eq!(session.messages().len(), 2);

        session.prepare_turn("hi", "cosmosrp");
        assert!(session.finish_turn(Err(Error::NoChoices)).is_err());

        let persisted = store.load_history("old").unwrap();
        let contents: Vec<&str> = persisted.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["You are Nova.", "important note", "hi"]);
    }

    #[test]
    fn test_resume_undecodable_history_is_moved_aside() {
        let (_dir, store) = store();
        store.create_with_id("old", &identity(), &[]).unwrap();
        let raw = r#"[{"role": "narrator", "content": "important note"}]"#;
        std::fs::write(store.history_path("old"), raw).unwrap();

        let mut session = ChatSession::resume(store.clone(), "old", 20).unwrap();
        assert!(session.messages().is_empty());

        session.prepare_turn("hi", "cosmosrp");
        session.finish_turn(Err(Error::NoChoices)).unwrap_err();

        let backup = std::fs::read_to_string(store.history_backup_path("old")).unwrap();
        assert_eq!(backup, raw);
    }

    #[test]
    fn test_resume_missing_session() {
        let (_dir, store) = store();
        let err = ChatSession::resume(store, "ghost", 20).err().unwrap();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[test]
    fn test_resume_missing_identity_is_error() {
        let (_dir, store) = store();
        store.create_with_id("s", &identity(), &[]).unwrap();
        std::fs::remove_file(store.identity_path("s")).unwrap();

        let err = ChatSession::resume(store, "s", 20).err().unwrap();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[test]
    fn test_prepare_turn_windows_but_keeps_full_history() {
        let (_dir, store) = store();
        let seed: Vec<Message> = (0..30).map(|i| Message::user(format!("m{i}"))).collect();
        let mut session = ChatSession::start(store.clone(), &identity(), seed, 20).unwrap();

        let request = session.prepare_turn("latest", "cosmosrp");
        assert_eq!(request.messages.len(), 20);
        assert_eq!(request.messages.last().unwrap().content, "latest");
        assert_eq!(request.messages.first().unwrap().content, "m11");

        session.finish_turn(Ok("ok".to_string())).unwrap();
        let persisted = store.load_history(session.id()).unwrap();
        assert_eq!(persisted.len(), 32);
        assert_eq!(persisted[0].content, "m0");
    }

    #[tokio::test]
    async fn test_send_success_appends_and_persists() {
        let server = reply_server("Hello Ana!").await;
        let client = client_for(&server).await;
        let (_dir, store) = store();
        let mut session = ChatSession::start(store.clone(), &identity(), vec![], 20).unwrap();

        let reply = session.send(&client, "Hi").await.unwrap();
        assert_eq!(reply, "Hello Ana!");

        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

        let persisted = store.load_history(session.id()).unwrap();
        assert_eq!(persisted, session.messages());
        assert_eq!(persisted[2].content, "Hello Ana!");
    }

    #[tokio::test]
    async fn test_send_non_200_keeps_only_user_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;
        let client = client_for(&server).await;
        let (_dir, store) = store();
        let mut session = ChatSession::start(store.clone(), &identity(), vec![], 20).unwrap();
        let before = session.messages().to_vec();

        let err = session.send(&client, "Hi").await.unwrap_err();
        assert!(matches!(err, Error::ApiStatus { status: 429, .. }));
        assert!(err.is_recoverable());

        assert_eq!(session.messages().len(), before.len() + 1);
        assert_eq!(&session.messages()[..before.len()], before.as_slice());
        let last = session.messages().last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "Hi");

        assert_eq!(store.load_history(session.id()).unwrap(), session.messages());
    }

    #[tokio::test]
    async fn test_send_with_sees_windowed_request() {
        let server = reply_server("ack").await;
        let client = client_for(&server).await;
        let (_dir, store) = store();
        let mut session = ChatSession::start(store, &identity(), vec![], 2).unwrap();

        let mut seen = Vec::new();
        session
            .send_with(&client, "Hi", |request| {
                seen = request.messages.iter().map(|m| m.content.clone()).collect();
            })
            .await
            .unwrap();

        assert_eq!(seen, vec!["You are Nova.", "Hi"]);
    }

    #[tokio::test]
    async fn test_send_persists_full_history_beyond_window() {
        let server = reply_server("ack").await;
        let client = client_for(&server).await;
        let (_dir, store) = store();
        let mut session = ChatSession::start(store.clone(), &identity(), vec![], 4).unwrap();

        for i in 0..6 {
            session.send(&client, &format!("turn {i}")).await.unwrap();
        }

        let persisted = store.load_history(session.id()).unwrap();
        assert_eq!(persisted.len(), 13);
        assert_eq!(session.window().len(), 4);

        let requests = server.received_requests().await.unwrap();
        let last: serde_json::Value = requests.last().unwrap().body_json().unwrap();
        assert_eq!(last["messages"].as_array().unwrap().len(), 4);
    }
}
