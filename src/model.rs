//! Records scraped from the portal. All of them serialize to camelCase JSON; fields the page
//! didn't provide are left out instead of being written as empty strings.

use serde::{Deserialize, Serialize};

/// An authenticated session: the cookie header to send and the portal it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub cookie_string: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// One page of an album listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumListPage {
    pub date: String,
    pub all_pages: u32,
    pub read_albums: usize,
    pub albums: Vec<AlbumRecord>,
}

/// Every page of an album listing, concatenated in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedAlbumList {
    pub date: String,
    pub all_pages: u32,
    pub albums: Vec<AlbumRecord>,
    pub user: String,
    pub total_albums: usize,
}

impl AggregatedAlbumList {
    pub fn from_first_page(page: AlbumListPage, user: impl Into<String>) -> Self {
        let total_albums = page.albums.len();
        Self {
            date: page.date,
            all_pages: page.all_pages,
            albums: page.albums,
            user: user.into(),
            total_albums,
        }
    }

    pub fn append(&mut self, page: AlbumListPage) {
        self.albums.extend(page.albums);
        self.total_albums = self.albums.len();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// One page of an album's photos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoListPage {
    pub date: String,
    pub total_pages: u32,
    pub total_photos: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_title: Option<String>,
    pub photos: Vec<PhotoRecord>,
}

/// All photos of one album, concatenated in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPhotoList {
    #[serde(flatten)]
    pub list: PhotoListPage,
    pub user: String,
}

impl AggregatedPhotoList {
    pub fn from_first_page(mut page: PhotoListPage, album_id: u64, user: impl Into<String>) -> Self {
        page.album_id = Some(album_id);
        page.total_photos = page.photos.len();
        Self {
            list: page,
            user: user.into(),
        }
    }

    pub fn append(&mut self, page: PhotoListPage) {
        self.list.photos.extend(page.photos);
        self.list.total_photos = self.list.photos.len();
    }
}
