//! HTTP transport that never follows redirects on its own.
//!
//! Every response is turned into a [`FetchResult`]: a body for 2xx, a resolved location for 302,
//! an error for anything else. The login flow depends on seeing the cookies of each hop, which an
//! auto-following client would swallow.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE, LOCATION, SET_COOKIE},
    redirect::Policy,
    Client, RequestBuilder, Response, StatusCode,
};
use tracing::debug;
use url::Url;

use crate::{Error, Result, BASE_URL};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// A normalized response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Ok {
        status: u16,
        content: String,
        cookies: Vec<String>,
    },
    Redirect {
        status: u16,
        /// The URL that answered with the redirect.
        referer_url: String,
        /// Absolute target of the redirect.
        redirect_url: String,
        cookies: Vec<String>,
    },
}

impl FetchResult {
    pub fn status(&self) -> u16 {
        match self {
            FetchResult::Ok { status, .. } | FetchResult::Redirect { status, .. } => *status,
        }
    }

    /// Raw `Set-Cookie` values in the order the server sent them.
    pub fn cookies(&self) -> &[String] {
        match self {
            FetchResult::Ok { cookies, .. } | FetchResult::Redirect { cookies, .. } => cookies,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            FetchResult::Ok { content, .. } => Some(content),
            FetchResult::Redirect { .. } => None,
        }
    }

    pub fn into_content(self) -> Option<String> {
        match self {
            FetchResult::Ok { content, .. } => Some(content),
            FetchResult::Redirect { .. } => None,
        }
    }
}

/// What the authenticator and the session client need from the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL relative redirects and paths are resolved against.
    fn base_url(&self) -> &str;

    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchResult>;

    /// Sends `form` url-encoded as `application/x-www-form-urlencoded`.
    async fn post(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<FetchResult>;
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: None,
            user_agent: None,
        }
    }
}

/// [`Transport`] backed by `reqwest` with redirects disabled.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let mut builder = Client::builder().redirect(Policy::none());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, req: RequestBuilder, headers: &[(&str, &str)]) -> Result<FetchResult> {
        let req = headers
            .iter()
            .fold(req, |req, (name, value)| req.header(*name, *value));
        let res = req.send().await?;
        handle_response(res, &self.base_url).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchResult> {
        debug!(url, "GET");
        self.send(self.client.get(url), headers).await
    }

    async fn post(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<FetchResult> {
        debug!(url, "POST");
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body);
        self.send(req, headers).await
    }
}

async fn handle_response(res: Response, base_url: &str) -> Result<FetchResult> {
    let status = res.status();
    let url = res.url().to_string();
    let cookies = collect_cookies(res.headers());

    if status.is_success() {
        return Ok(FetchResult::Ok {
            status: status.as_u16(),
            content: res.text().await?,
            cookies,
        });
    }

    if status != StatusCode::FOUND {
        return Err(Error::Network {
            status: status.as_u16(),
            url,
        });
    }

    let redirect_url = redirect_location(res.headers(), base_url)?;
    debug!(%redirect_url, "302");
    Ok(FetchResult::Redirect {
        status: status.as_u16(),
        referer_url: url,
        redirect_url,
        cookies,
    })
}

/// Every `Set-Cookie` header value, in order.
fn collect_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect()
}

/// Reads the `Location` header and makes it absolute against `base_url`.
fn redirect_location(headers: &HeaderMap, base_url: &str) -> Result<String> {
    let location = headers
        .get(LOCATION)
        .ok_or_else(|| Error::Protocol("302 without a redirect location".into()))?
        .to_str()
        .map_err(|_| Error::Protocol("302 location is not valid text".into()))?;
    resolve_url(location, base_url)
}

/// Returns `location` untouched when it is already absolute, otherwise joins it onto `base_url`.
pub(crate) fn resolve_url(location: &str, base_url: &str) -> Result<String> {
    match Url::parse(location) {
        Ok(_) => Ok(location.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Ok(Url::parse(base_url)?.join(location)?.to_string())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;

    use reqwest::header::HeaderValue;

    /// Answers each accepted connection with the next canned raw response and records the raw
    /// requests it saw.
    struct TestServer {
        base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
        join_handle: Option<JoinHandle<()>>,
    }

    impl TestServer {
        fn spawn(responses: Vec<String>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            let addr = listener.local_addr().expect("local addr");
            let requests = Arc::new(Mutex::new(Vec::new()));
            let requests_clone = Arc::clone(&requests);

            let join_handle = std::thread::spawn(move || {
                for response in responses {
                    let Ok((mut stream, _)) = listener.accept() else {
                        return;
                    };
                    let request = read_request(&mut stream);
                    requests_clone.lock().unwrap().push(request);
                    let _ = stream.write_all(response.as_bytes());
                    let _ = stream.flush();
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                requests,
                join_handle: Some(join_handle),
            }
        }

        fn transport(&self) -> HttpTransport {
            HttpTransport::with_config(TransportConfig {
                base_url: self.base_url.clone(),
                timeout: Some(Duration::from_secs(5)),
                user_agent: None,
            })
            .unwrap()
        }

        fn requests(mut self) -> Vec<String> {
            if let Some(handle) = self.join_handle.take() {
                handle.join().unwrap();
            }
            self.requests.lock().unwrap().clone()
        }
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn raw_response(status_line: &str, headers: &[&str], body: &str) -> String {
        let mut res = format!("HTTP/1.1 {status_line}\r\n");
        for h in headers {
            res.push_str(h);
            res.push_str("\r\n");
        }
        res.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ));
        res
    }

    #[test]
    fn relative_location_is_resolved_against_base() {
        assert_eq!(
            resolve_url("/foo", "https://youzheng.topschool.tw").unwrap(),
            "https://youzheng.topschool.tw/foo"
        );
        assert_eq!(
            resolve_url("https://elsewhere/x", "https://youzheng.topschool.tw").unwrap(),
            "https://elsewhere/x"
        );
    }

    #[test]
    fn location_lookup_ignores_header_case() {
        let mut headers = HeaderMap::new();
        headers.insert("location", HeaderValue::from_static("/Activity/Class-Albums"));
        assert_eq!(
            redirect_location(&headers, "https://host").unwrap(),
            "https://host/Activity/Class-Albums"
        );
    }

    #[test]
    fn non_ascii_cookies_are_kept() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_bytes("name=中; path=/".as_bytes()).unwrap(),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        assert_eq!(
            collect_cookies(&headers),
            vec!["name=中; path=/".to_string(), "b=2".to_string()]
        );
    }

    #[test]
    fn missing_location_is_a_protocol_error() {
        let err = redirect_location(&HeaderMap::new(), "https://host").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{err:?}");
    }

    #[tokio::test]
    async fn ok_response_carries_body_and_all_cookies() {
        let server = TestServer::spawn(vec![raw_response(
            "200 OK",
            &["Set-Cookie: a=1; path=/", "Set-Cookie: b=2; HttpOnly"],
            "<html>hi</html>",
        )]);
        let transport = server.transport();
        let url = format!("{}/page", server.base_url);

        let res = transport
            .get(&url, &[("Referer", "https://ref/")])
            .await
            .unwrap();
        assert_eq!(
            res,
            FetchResult::Ok {
                status: 200,
                content: "<html>hi</html>".into(),
                cookies: vec!["a=1; path=/".into(), "b=2; HttpOnly".into()],
            }
        );

        let requests = server.requests();
        assert!(requests[0].starts_with("GET /page HTTP/1.1"));
        assert!(requests[0].to_lowercase().contains("referer: https://ref/"));
    }

    #[tokio::test]
    async fn redirect_is_not_followed() {
        let server = TestServer::spawn(vec![
            raw_response("302 Found", &["Location: /foo", "Set-Cookie: s=1"], ""),
            raw_response("302 Found", &["Location: https://elsewhere/x"], ""),
        ]);
        let transport = server.transport();
        let url = format!("{}/start", server.base_url);

        let first = transport.get(&url, &[]).await.unwrap();
        assert_eq!(
            first,
            FetchResult::Redirect {
                status: 302,
                referer_url: url.clone(),
                redirect_url: format!("{}/foo", server.base_url),
                cookies: vec!["s=1".into()],
            }
        );
        assert_eq!(first.content(), None);

        let second = transport.get(&url, &[]).await.unwrap();
        match second {
            FetchResult::Redirect { redirect_url, .. } => {
                assert_eq!(redirect_url, "https://elsewhere/x")
            }
            other => panic!("expected redirect, got {other:?}"),
        }

        // Only the two scripted requests, nothing followed.
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn redirect_without_location_fails() {
        let server = TestServer::spawn(vec![raw_response("302 Found", &[], "")]);
        let transport = server.transport();
        let err = transport
            .get(&format!("{}/", server.base_url), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{err:?}");
        server.requests();
    }

    #[tokio::test]
    async fn other_status_is_a_network_error() {
        let server = TestServer::spawn(vec![raw_response("404 Not Found", &[], "nope")]);
        let transport = server.transport();
        let err = transport
            .get(&format!("{}/missing", server.base_url), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network { status: 404, .. }), "{err:?}");
        server.requests();
    }

    #[tokio::test]
    async fn post_sends_urlencoded_form() {
        let server = TestServer::spawn(vec![raw_response("200 OK", &[], "ok")]);
        let transport = server.transport();
        let res = transport
            .post(
                &format!("{}/Login", server.base_url),
                &[("account", "a b"), ("password", "p&w")],
                &[("cookie", "t=1")],
            )
            .await
            .unwrap();
        assert_eq!(res.status(), 200);

        let request = server.requests().remove(0);
        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /Login HTTP/1.1"));
        assert!(lower.contains("content-type: application/x-www-form-urlencoded; charset=utf-8"));
        assert!(lower.contains("cookie: t=1"));
        assert!(request.ends_with("account=a+b&password=p%26w"));
    }
}
