//! OAuth web application flow
//!
//! 1. Redirect the admin to `authorize_url(..)` with a random `state`
//! 2. GitHub redirects back with `code` + `state`
//! 3. `GitHubClient::exchange_code` trades the code for an access token

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use url::Url;

use crate::error::Result;

const STATE_LEN: usize = 40;

/// Token returned by a successful code exchange
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// Raw response from `/login/oauth/access_token`.
///
/// GitHub answers 200 even for failures and puts the reason in `error`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_token(self) -> std::result::Result<AccessToken, String> {
        match self.access_token {
            Some(access_token) => Ok(AccessToken {
                access_token,
                token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
                scope: self.scope.unwrap_or_default(),
            }),
            None => Err(self
                .error_description
                .or(self.error)
                .unwrap_or_else(|| "no access token in response".to_string())),
        }
    }
}

/// Random OAuth `state` value (CSRF protection for the callback).
pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// Build the URL the admin is redirected to.
pub fn authorize_url(
    oauth_base: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    scopes: &[String],
) -> Result<String> {
    let mut url = Url::parse(&format!("{}/login/oauth/authorize", oauth_base))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", state);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_all_parameters() {
        let scopes = vec!["repo".to_string(), "admin:repo_hook".to_string()];
        let url = authorize_url(
            "https://github.com",
            "Iv1.abc",
            "https://feedback.example.com/admin/integrations/github/callback",
            "xyz",
            &scopes,
        )
        .unwrap();

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/login/oauth/authorize");
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_id".into(), "Iv1.abc".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "https://feedback.example.com/admin/integrations/github/callback".into()
        )));
        assert!(pairs.contains(&("scope".into(), "repo admin:repo_hook".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
    }

    #[test]
    fn authorize_url_rejects_garbage_base() {
        assert!(authorize_url("not a url", "id", "cb", "s", &[]).is_err());
    }

    #[test]
    fn state_is_random_alphanumeric() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), STATE_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_response_success() {
        let json = r#"{"access_token":"gho_abc","token_type":"bearer","scope":"repo,admin:repo_hook"}"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        let token = resp.into_token().unwrap();
        assert_eq!(token.access_token, "gho_abc");
        assert_eq!(token.scope, "repo,admin:repo_hook");
    }

    #[test]
    fn token_response_error_prefers_description() {
        let json = r#"{"error":"bad_verification_code","error_description":"The code passed is incorrect or expired."}"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.into_token().unwrap_err(),
            "The code passed is incorrect or expired."
        );
    }
}
