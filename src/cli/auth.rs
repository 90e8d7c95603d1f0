use super::ui;
use crate::core::routing::{self, Navigation, Route};
use crate::core::session::Session;
use crate::providers::AgroApiClient;
use anyhow::{Context, Result};
use comfy_table::Cell;
use console::Term;

fn read_password() -> Result<String> {
    let term = Term::stderr();
    term.write_str("Password: ")
        .context("Failed to write password prompt")?;
    term.read_secure_line().context("Failed to read password")
}

/// Logs in and reports the home screen of the user's role.
pub async fn login(
    client: &AgroApiClient,
    session: &mut Session,
    username: &str,
    password: Option<String>,
) -> Result<()> {
    if let (Some(user), Navigation::Redirect(home)) =
        (session.user(), routing::resolve(Route::Login, session))
    {
        println!(
            "Already logged in as {} (home: {home}). Run `agromarket logout` first to switch users.",
            user.username
        );
        return Ok(());
    }

    let password = match password {
        Some(p) => p,
        None => read_password()?,
    };

    session.begin_login(username);
    match client.login(username, &password).await {
        Ok(auth) => {
            session.login_succeeded(auth.user);
        }
        Err(e) => {
            session.login_failed(e.to_string());
            return Err(e.into());
        }
    }

    if let (Some(user), Navigation::Redirect(home)) =
        (session.user(), routing::resolve(Route::Root, session))
    {
        println!(
            "Welcome {}! Logged in as {}, home: {home}",
            ui::style_text(&user.display_name(), ui::StyleType::Value),
            user.role
        );
    }
    Ok(())
}

pub async fn logout(client: &AgroApiClient, session: &mut Session) -> Result<()> {
    client.logout().await?;
    session.logout();
    println!("Logged out.");
    Ok(())
}

pub fn whoami(session: &Session) -> Result<()> {
    let Some(user) = session.user() else {
        println!("Not logged in.");
        return Ok(());
    };

    let mut table = ui::new_styled_table();
    table.add_row(vec![ui::header_cell("Username"), Cell::new(&user.username)]);
    table.add_row(vec![ui::header_cell("Name"), Cell::new(user.display_name())]);
    table.add_row(vec![
        ui::header_cell("Email"),
        Cell::new(user.email.as_deref().unwrap_or("-")),
    ]);
    table.add_row(vec![ui::header_cell("Role"), Cell::new(user.role)]);
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{Role, SessionState};
    use crate::store::{MemoryTokenStore, TokenStore};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_login_updates_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"user": {"id": 2, "username": "agent", "role": "agent"},
                    "access": "a1", "refresh": "r1"}"#,
            ))
            .mount(&server)
            .await;

        let store = MemoryTokenStore::new();
        let client = AgroApiClient::new(&server.uri(), Arc::new(store.clone())).unwrap();
        let mut session = Session::anonymous();
        login(&client, &mut session, "agent", Some("secret".to_string()))
            .await
            .unwrap();

        assert_eq!(session.role(), Some(Role::Agent));
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_username_and_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"detail": "Bad password"}"#),
            )
            .mount(&server)
            .await;

        let client =
            AgroApiClient::new(&server.uri(), Arc::new(MemoryTokenStore::new())).unwrap();
        let mut session = Session::anonymous();
        let err = login(&client, &mut session, "agent", Some("nope".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Bad password");
        assert_eq!(session.state(), &SessionState::Anonymous);
        assert_eq!(session.last_username(), Some("agent"));
        assert_eq!(session.last_error(), Some("Bad password"));
    }

    #[tokio::test]
    async fn test_login_when_already_authenticated_is_a_no_op() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client =
            AgroApiClient::new(&server.uri(), Arc::new(MemoryTokenStore::new())).unwrap();
        let mut session = crate::cli::tests::session(Role::Admin);
        login(&client, &mut session, "other", Some("x".to_string()))
            .await
            .unwrap();
        assert_eq!(session.role(), Some(Role::Admin));
    }

    #[test]
    fn test_whoami_anonymous() {
        assert!(whoami(&Session::anonymous()).is_ok());
    }
}
