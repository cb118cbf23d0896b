//! Turning `Set-Cookie` values into a request-ready `Cookie` header.

use std::{io::ErrorKind, path::Path};

use tracing::debug;

use crate::Result;

/// Joins raw `Set-Cookie` values into a single `Cookie` header value.
///
/// Only the leading `name=value` pair of each cookie is kept, attributes such as `path` or
/// `expires` are dropped. Entries are joined with `"; "` in their original order.
pub fn cookies_to_string<I, S>(cookies: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    cookies
        .into_iter()
        .map(|c| {
            let c = c.as_ref();
            c.split(';').next().unwrap_or(c).to_string()
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reads a cookie file with one raw cookie per line and joins it with [`cookies_to_string`].
///
/// Blank lines are skipped. A missing file is not an error and yields `Ok(None)`.
pub async fn read_cookie_file(path: impl AsRef<Path>) -> Result<Option<String>> {
    let path = path.as_ref();
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "cookie file not found");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Some(cookie_lines_to_string(&content)))
}

fn cookie_lines_to_string(content: &str) -> String {
    cookies_to_string(content.lines().map(str::trim).filter(|l| !l.is_empty()))
}
