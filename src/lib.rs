//! Scraper for the album pages of a topschool parent portal.
//!
//! The portal only serves its albums as server-rendered HTML behind a cookie login, so this crate
//! logs in the way a browser would (anti-forgery token + form POST), keeps the resulting session
//! cookie and turns the listing pages into serializable records.
//!
//! ```no_run
//! use albumscrap::{Scope, SessionClient};
//!
//! # async fn run() -> albumscrap::Result<()> {
//! let client = SessionClient::login("account", "password").await?;
//! let albums = client.get_full_album_list(Scope::Class).await?;
//! println!("{}", serde_json::to_string_pretty(&albums)?);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod client;
pub mod cookie;
mod error;
mod macros;
pub mod model;
pub mod parse;
pub mod request;

pub use auth::login;
pub use client::{Scope, SessionClient};
pub use cookie::{cookies_to_string, read_cookie_file};
pub use error::{Error, ErrorKind, Result};
pub use model::{
    AggregatedAlbumList, AggregatedPhotoList, AlbumListPage, AlbumRecord, PhotoListPage,
    PhotoRecord, Session,
};
pub use parse::{parse_album_list, parse_photo_list};
pub use request::{FetchResult, HttpTransport, Transport, TransportConfig};

pub const HOSTNAME: &str = "youzheng.topschool.tw";
pub const BASE_URL: &str = "https://youzheng.topschool.tw";
pub const LOGIN_PATH: &str = "/Login";
/// Name of the anti-forgery form field. The server mirrors it as a cookie.
pub const VERIFY_TOKEN_NAME: &str = "__RequestVerificationToken";
/// The login page only renders a usable token when requested with this referer.
pub const LOGIN_REFERER_PATH: &str = "/Login/Blank?returnUrl=%2FActivity%2FClass-Albums";

/// Prefix the portal puts in front of every album title.
const TITLE_PREFIX: &str = "相簿名稱: ";
/// Separates title and description inside an album card's `title` attribute.
const DESC_SEPARATOR: &str = "\n相簿說明: ";
