use std::fmt;

use chrono::Local;
use tokio::task::spawn_blocking;
use tracing::{debug, info};
use url::Url;

use crate::{
    auth, info_time,
    parse::{parse_album_list_with_base, parse_photo_list_with_base},
    AggregatedAlbumList, AggregatedPhotoList, AlbumListPage, Error, FetchResult, HttpTransport,
    PhotoListPage, Result, Session, Transport,
};

/// Which of the two parallel album collections to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scope {
    Class,
    School,
}

impl Scope {
    fn albums_path(self) -> &'static str {
        match self {
            Scope::Class => "/Activity/Class-Albums",
            Scope::School => "/Activity/School-Albums",
        }
    }

    fn detail_path(self) -> &'static str {
        match self {
            Scope::Class => "/Activity/Class-Album-Detail",
            Scope::School => "/Activity/School-Album-Detail",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Class => write!(f, "class"),
            Scope::School => write!(f, "school"),
        }
    }
}

/// Logged-in view of the portal.
///
/// The session is fixed for the client's lifetime. There is no refresh: once the portal drops
/// the session, requests start failing and the caller has to log in again.
#[derive(Debug)]
pub struct SessionClient<T = HttpTransport> {
    session: Session,
    user: String,
    transport: T,
}

impl SessionClient<HttpTransport> {
    /// Logs in over a default [`HttpTransport`].
    pub async fn login(user: &str, pass: &str) -> Result<Self> {
        Self::login_with(HttpTransport::new()?, user, pass).await
    }
}

impl<T: Transport> SessionClient<T> {
    pub async fn login_with(transport: T, user: &str, pass: &str) -> Result<Self> {
        let session = auth::login(&transport, user, pass).await?;
        Ok(Self::new(transport, session, user))
    }

    /// Wraps an existing session, e.g. one seeded from a cookie file.
    pub fn new(transport: T, session: Session, user: impl Into<String>) -> Self {
        Self {
            session,
            user: user.into(),
            transport,
        }
    }

    /// Builds a session for `transport`'s portal from a ready `Cookie` header value.
    pub fn from_cookie_string(
        transport: T,
        cookie_string: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        let session = Session {
            cookie_string: cookie_string.into(),
            base_url: transport.base_url().to_string(),
        };
        Self::new(transport, session, user)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// True for absolute URLs on the portal this session belongs to.
    pub fn is_this_website(&self, url: &str) -> bool {
        if !url.starts_with(&self.session.base_url) {
            return false;
        }
        match (Url::parse(url), Url::parse(&self.session.base_url)) {
            (Ok(url), Ok(base)) => url.host_str() == base.host_str(),
            _ => false,
        }
    }

    /// GETs an absolute portal URL with the session cookie. Anything but a 200 is an error.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult> {
        if !self.is_this_website(url) {
            return Err(Error::Validation(format!("{url} is not on this site")));
        }

        let res = self
            .transport
            .get(url, &[("cookie", self.session.cookie_string.as_str())])
            .await?;
        if res.status() != 200 {
            return Err(Error::Network {
                status: res.status(),
                url: url.to_string(),
            });
        }
        Ok(res)
    }

    /// Like [`fetch`](Self::fetch) for a path, query or fragment relative to the portal root.
    pub async fn fetch_path(&self, path: &str) -> Result<FetchResult> {
        match path.chars().next() {
            Some('/' | '?' | '#') => {}
            _ => return Err(Error::Validation(format!("invalid path {path:?}"))),
        }
        let url = format!("{}{path}", self.session.base_url);
        self.fetch(&url).await
    }

    /// One page of the album listing. Pages start at 1.
    pub async fn fetch_album_list(&self, scope: Scope, page_index: u32) -> Result<AlbumListPage> {
        let path = format!("{}?PageIndex={page_index}", scope.albums_path());
        let content = ok_content(self.fetch_path(&path).await?)?;
        let base_url = self.session.base_url.clone();
        spawn_blocking(move || parse_album_list_with_base(&content, &base_url)).await?
    }

    /// Raw response of one page of an album. Pages start at 1.
    pub async fn fetch_photo_page(
        &self,
        scope: Scope,
        album_id: u64,
        page_index: u32,
    ) -> Result<FetchResult> {
        if album_id == 0 {
            return Err(Error::Validation("album id is required".into()));
        }
        let path = format!(
            "{}?albumId={album_id}&pageIndex={page_index}",
            scope.detail_path()
        );
        self.fetch_path(&path).await
    }

    /// [`fetch_photo_page`](Self::fetch_photo_page), parsed.
    pub async fn fetch_photo_list(
        &self,
        scope: Scope,
        album_id: u64,
        page_index: u32,
    ) -> Result<PhotoListPage> {
        let content = ok_content(self.fetch_photo_page(scope, album_id, page_index).await?)?;
        let base_url = self.session.base_url.clone();
        spawn_blocking(move || parse_photo_list_with_base(&content, &base_url)).await?
    }

    /// Every album of `scope`, pages fetched one after another.
    pub async fn get_full_album_list(&self, scope: Scope) -> Result<AggregatedAlbumList> {
        let start_time = Local::now();

        let first = self.fetch_album_list(scope, 1).await?;
        if first.all_pages == 0 {
            return Err(Error::Protocol("allPages missing".into()));
        }

        let mut list = AggregatedAlbumList::from_first_page(first, self.user.as_str());
        for page_index in 2..=list.all_pages {
            let page = self.fetch_album_list(scope, page_index).await?;
            list.append(page);
            debug!(page_index, total_albums = list.total_albums, "appended album page");
        }

        info_time!(
            start_time,
            "Fetched {} {scope} albums from {} pages",
            list.total_albums,
            list.all_pages
        );
        Ok(list)
    }

    /// Every photo of a class album.
    pub async fn get_full_photo_list_for_album(&self, album_id: u64) -> Result<AggregatedPhotoList> {
        self.get_full_photo_list(Scope::Class, album_id).await
    }

    /// Every photo of an album in `scope`, pages fetched one after another.
    pub async fn get_full_photo_list(
        &self,
        scope: Scope,
        album_id: u64,
    ) -> Result<AggregatedPhotoList> {
        let start_time = Local::now();

        let first = self.fetch_photo_list(scope, album_id, 1).await?;
        if first.total_pages == 0 {
            return Err(Error::Protocol("totalPages missing".into()));
        }

        let mut list = AggregatedPhotoList::from_first_page(first, album_id, self.user.as_str());
        for page_index in 2..=list.list.total_pages {
            let page = self.fetch_photo_list(scope, album_id, page_index).await?;
            list.append(page);
            debug!(
                page_index,
                total_photos = list.list.total_photos,
                "appended photo page"
            );
        }

        info!(album_id, %scope, "fetched album");
        info_time!(
            start_time,
            "Fetched {} photos from {} pages",
            list.list.total_photos,
            list.list.total_pages
        );
        Ok(list)
    }
}

fn ok_content(res: FetchResult) -> Result<String> {
    res.into_content()
        .ok_or_else(|| Error::Protocol("expected a page, got a redirect".into()))
}
