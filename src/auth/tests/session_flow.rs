// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end flows: OAuth sign-in, a file backed session, and requests
//! through the executor against a local server.

#[cfg(test)]
mod tests {
    use httptest::matchers::{all_of, contains, eq, json_decoded, request};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use orderdesk_auth::api::{Resource, ResourceClient};
    use orderdesk_auth::config::Config;
    use orderdesk_auth::executor::{RequestExecutor, SESSION_EXPIRED_TITLE};
    use orderdesk_auth::fetch::{Fetch, ViewScope};
    use orderdesk_auth::latch::NavigationLatch;
    use orderdesk_auth::navigator::Navigator;
    use orderdesk_auth::request::RequestOptions;
    use orderdesk_auth::session_manager::SessionManager;
    use orderdesk_auth::store::{AUTH_TOKEN_KEY, SessionStore, USERNAME_KEY};
    use orderdesk_test_utils::tokens::{LONG_LIVED_BEARER, LONG_LIVED_JWT, jwt_expiring_in};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use url::Url;

    type TestResult = anyhow::Result<()>;

    #[derive(Debug)]
    struct TestNavigator {
        prompts: Mutex<Vec<String>>,
        resets: mpsc::UnboundedSender<String>,
    }

    #[async_trait::async_trait]
    impl Navigator for TestNavigator {
        async fn acknowledge(&self, title: &str, message: &str) {
            assert_eq!(title, SESSION_EXPIRED_TITLE);
            self.prompts
                .lock()
                .expect("prompts lock")
                .push(message.to_string());
        }

        fn reset_to(&self, route: &str) {
            let _ = self.resets.send(route.to_string());
        }
    }

    struct App {
        sessions: Arc<SessionManager>,
        store: Arc<dyn SessionStore>,
        executor: RequestExecutor,
        navigator: Arc<TestNavigator>,
        resets: mpsc::UnboundedReceiver<String>,
    }

    fn app(server: &Server, session_file: &std::path::Path) -> anyhow::Result<App> {
        let config = Config::default()
            .with_api_url(Url::parse(&server.url_str("/api"))?)
            .with_token_url(Url::parse(&server.url_str("/oauth/token"))?)
            .with_client_id("test-client")
            .with_session_file(session_file)
            .with_redirect_grace(Duration::from_millis(20));
        let store = config.session_store();
        let provider = config
            .oauth_provider(store.clone())
            .ok_or_else(|| anyhow::anyhow!("token URL is configured"))?;
        let sessions = Arc::new(SessionManager::new(Arc::new(provider), store.clone()));

        let (tx, resets) = mpsc::unbounded_channel();
        let navigator = Arc::new(TestNavigator {
            prompts: Mutex::new(Vec::new()),
            resets: tx,
        });
        let executor = RequestExecutor::builder(sessions.clone(), navigator.clone())
            .with_config(config)
            .with_latch(Arc::new(NavigationLatch::new()))
            .build();
        Ok(App {
            sessions,
            store,
            executor,
            navigator,
            resets,
        })
    }

    fn expect_password_grant(server: &Server, access_token: String) {
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/oauth/token"),
                request::body(json_decoded(eq(json!({
                    "grant_type": "password",
                    "client_id": "test-client",
                    "username": "alice",
                    "password": "secret",
                })))),
            ])
            .respond_with(json_encoded(json!({
                "access_token": access_token,
                "refresh_token": "rt-1",
                "token_type": "Bearer",
            }))),
        );
    }

    async fn next_reset(resets: &mut mpsc::UnboundedReceiver<String>) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), resets.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn login_then_fetch() -> TestResult {
        let _guard = orderdesk_test_utils::tracing::enable_tracing();
        let dir = tempfile::tempdir()?;
        let server = Server::run();
        expect_password_grant(&server, LONG_LIVED_JWT.to_string());
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/api/orders"),
                request::headers(contains(("authorization", LONG_LIVED_BEARER))),
            ])
            .respond_with(json_encoded(json!([{"id": "o1"}]))),
        );

        let app = app(&server, &dir.path().join("session.json"))?;
        assert!(!app.sessions.is_authenticated().await);
        app.sessions.login("alice", "secret").await?;
        assert!(app.sessions.is_authenticated().await);
        assert_eq!(app.sessions.username().await.as_deref(), Some("alice"));

        let orders = ResourceClient::new(
            Fetch::new(app.executor.clone(), ViewScope::new()),
            Resource::Orders,
        );
        assert_eq!(orders.list().await, Some(json!([{"id": "o1"}])));
        assert!(app.navigator.prompts.lock().expect("prompts lock").is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn restart_restores_and_refreshes() -> TestResult {
        let _guard = orderdesk_test_utils::tracing::enable_tracing();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        let mut server = Server::run();

        // Sign in with a token that is already expired.
        expect_password_grant(&server, jwt_expiring_in(-60));
        {
            let app = app(&server, &path)?;
            app.sessions.login("alice", "secret").await?;
            assert_eq!(
                app.store.get(USERNAME_KEY).await?.as_deref(),
                Some("alice")
            );
        }
        server.verify_and_clear();

        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/oauth/token"),
                request::body(json_decoded(eq(json!({
                    "grant_type": "refresh_token",
                    "client_id": "test-client",
                    "refresh_token": "rt-1",
                })))),
            ])
            .respond_with(json_encoded(json!({"access_token": LONG_LIVED_JWT}))),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/api/orders"),
                request::headers(contains(("authorization", LONG_LIVED_BEARER))),
                request::body(json_decoded(eq(json!({"client": "acme"})))),
            ])
            .respond_with(json_encoded(json!({"id": "o2", "status": "success"}))),
        );

        let app = app(&server, &path)?;
        assert!(app.sessions.initialize().await);
        assert_eq!(
            app.store.get(AUTH_TOKEN_KEY).await?.as_deref(),
            Some(LONG_LIVED_JWT)
        );
        let got = app
            .executor
            .execute(RequestOptions::new("orders").with_body(json!({"client": "acme"})))
            .await?;
        assert_eq!(got, json!({"id": "o2", "status": "success"}));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_unauthorized_prompts_once() -> TestResult {
        let _guard = orderdesk_test_utils::tracing::enable_tracing();
        let dir = tempfile::tempdir()?;
        let server = Server::run();
        expect_password_grant(&server, LONG_LIVED_JWT.to_string());
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/clients"))
                .times(1..=5)
                .respond_with(status_code(401)),
        );

        let mut app = app(&server, &dir.path().join("session.json"))?;
        app.sessions.login("alice", "secret").await?;

        let views: Vec<_> = (0..5)
            .map(|_| {
                ResourceClient::new(
                    Fetch::new(app.executor.clone(), ViewScope::new()),
                    Resource::Clients,
                )
            })
            .collect();
        let tasks: Vec<_> = views
            .iter()
            .cloned()
            .map(|v| tokio::spawn(async move { v.list().await }))
            .collect();
        for task in tasks {
            assert_eq!(task.await?, None);
        }
        for view in &views {
            let state = view.fetch().state();
            assert!(
                state.error.is_none()
                    || state.error.as_deref()
                        == Some("Your session is no longer authorized, please log in again"),
                "{state:?}"
            );
        }

        assert_eq!(next_reset(&mut app.resets).await.as_deref(), Some("Login"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(app.navigator.prompts.lock().expect("prompts lock").len(), 1);
        assert!(app.resets.try_recv().is_err());
        assert!(!app.executor.redirect_in_progress());
        Ok(())
    }

    #[tokio::test]
    async fn logout_then_fetch() -> TestResult {
        let _guard = orderdesk_test_utils::tracing::enable_tracing();
        let dir = tempfile::tempdir()?;
        let server = Server::run();
        expect_password_grant(&server, LONG_LIVED_JWT.to_string());

        let mut app = app(&server, &dir.path().join("session.json"))?;
        app.sessions.login("alice", "secret").await?;
        app.sessions.logout().await;
        assert_eq!(app.store.get(AUTH_TOKEN_KEY).await?, None);
        assert_eq!(app.store.get(USERNAME_KEY).await?, None);

        let fetch = Fetch::new(app.executor.clone(), ViewScope::new());
        assert_eq!(fetch.fetch_data(RequestOptions::new("orders")).await, None);
        let state = fetch.state();
        assert_eq!(
            state.error.as_deref(),
            Some("No token available, please log in")
        );
        assert!(state.initial_check_done);
        assert_eq!(next_reset(&mut app.resets).await.as_deref(), Some("Login"));
        assert_eq!(
            *app.navigator.prompts.lock().expect("prompts lock"),
            vec!["No token available, please log in".to_string()]
        );
        Ok(())
    }
}
