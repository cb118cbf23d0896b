//! Cookie login against the portal's `/Login` form.

use tracing::{debug, info};

use crate::{
    cookie::cookies_to_string, request::Transport, Error, Result, Session, LOGIN_PATH,
    LOGIN_REFERER_PATH, VERIFY_TOKEN_NAME,
};

/// Anti-forgery token from the login form plus the cookies that came with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub form_token: String,
    pub cookie_string: String,
}

/// Logs in with `username`/`password` and returns the session cookie.
///
/// Empty credentials are rejected before anything is sent.
pub async fn login<T>(transport: &T, username: &str, password: &str) -> Result<Session>
where
    T: Transport + ?Sized,
{
    if username.is_empty() {
        return Err(Error::Validation("username is required".into()));
    }
    if password.is_empty() {
        return Err(Error::Validation("password is required".into()));
    }

    let base_url = transport.base_url().to_string();
    let login_url = format!("{base_url}{LOGIN_PATH}");
    let referer = format!("{base_url}{LOGIN_REFERER_PATH}");

    let token = fetch_login_token(transport, &login_url, &referer).await?;
    debug!("got anti-forgery token");

    let res = transport
        .post(
            &login_url,
            &[
                (VERIFY_TOKEN_NAME, token.form_token.as_str()),
                ("account", username),
                ("password", password),
                ("X-Requested-With", "XMLHttpRequest"),
            ],
            &[
                ("cookie", token.cookie_string.as_str()),
                ("Referer", referer.as_str()),
                ("Referrer-Policy", "strict-origin-when-cross-origin"),
            ],
        )
        .await?;

    if res.status() != 200 {
        return Err(Error::Auth(format!("login rejected (status {})", res.status())));
    }
    // A wrong account/password still answers 200, just without setting any cookie.
    if res.cookies().is_empty() {
        return Err(Error::Auth("invalid credentials".into()));
    }

    info!(username, "logged in");
    Ok(Session {
        cookie_string: cookies_to_string(res.cookies()),
        base_url,
    })
}

async fn fetch_login_token<T>(transport: &T, login_url: &str, referer: &str) -> Result<AuthToken>
where
    T: Transport + ?Sized,
{
    let res = transport.get(login_url, &[("Referer", referer)]).await?;
    if res.status() != 200 {
        return Err(Error::Auth(format!(
            "unexpected login page status {}",
            res.status()
        )));
    }

    let form_token = res
        .content()
        .and_then(extract_verify_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Auth(format!("token not found: {VERIFY_TOKEN_NAME} in login form")))?
        .to_string();

    let cookie_string = cookies_to_string(res.cookies());
    if !cookie_string.contains(VERIFY_TOKEN_NAME) {
        return Err(Error::Auth(format!(
            "token missing from cookies: {VERIFY_TOKEN_NAME}"
        )));
    }

    Ok(AuthToken {
        form_token,
        cookie_string,
    })
}

/// Finds the token field by name, then the next `value="…"` after it.
///
/// Plain string search on purpose: the form markup is fixed and a full HTML parse buys nothing.
pub fn extract_verify_token(html: &str) -> Option<&str> {
    const ATTR: &str = r#"value=""#;

    let beg = html.find(VERIFY_TOKEN_NAME)? + VERIFY_TOKEN_NAME.len();
    let beg = beg + html[beg..].find(ATTR)? + ATTR.len();
    let end = beg + html[beg..].find('"')?;
    Some(&html[beg..end])
}
