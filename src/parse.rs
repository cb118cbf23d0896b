//! Extracts album and photo records from the portal's listing pages.
//!
//! The markup is matched with a handful of fixed selectors. Card thumbnails, titles and the
//! pagination block are looked up independently and lined up by position.

use chrono::Local;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{
    AlbumListPage, AlbumRecord, Error, PhotoListPage, PhotoRecord, Result, BASE_URL,
    DESC_SEPARATOR, TITLE_PREFIX,
};

/// Parses one page of `/Activity/{Class,School}-Albums`, resolving links against the portal.
pub fn parse_album_list(html: &str) -> Result<AlbumListPage> {
    parse_album_list_with_base(html, BASE_URL)
}

/// Parses one page of `/Activity/{Class,School}-Album-Detail`, resolving links against the portal.
pub fn parse_photo_list(html: &str) -> Result<PhotoListPage> {
    parse_photo_list_with_base(html, BASE_URL)
}

pub fn parse_album_list_with_base(html: &str, base_url: &str) -> Result<AlbumListPage> {
    let base = Url::parse(base_url)?;
    let doc = Html::parse_document(html);

    let albums = album_cards(&doc, &base)?;
    let all_pages = page_count(&doc, &base)?;

    Ok(AlbumListPage {
        date: now_stamp(),
        all_pages,
        read_albums: albums.len(),
        albums,
    })
}

pub fn parse_photo_list_with_base(html: &str, base_url: &str) -> Result<PhotoListPage> {
    let base = Url::parse(base_url)?;
    let doc = Html::parse_document(html);

    let photos = photo_cards(&doc, &base)?;

    let album_id_selector = create_selector(".titleline > .fb-like[data-href]")?;
    let album_id = doc
        .select(&album_id_selector)
        .next()
        .and_then(|el| el.value().attr("data-href"))
        .and_then(|href| base.join(href).ok())
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "albumId")
                .and_then(|(_, v)| v.parse::<u64>().ok())
        });

    let album_title_selector = create_selector(".row > .row > h2")?;
    let album_title = doc
        .select(&album_title_selector)
        .next()
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .map(|t| remove_prefix(&t, TITLE_PREFIX).to_string());

    let total_pages = page_count(&doc, &base)?;

    Ok(PhotoListPage {
        date: now_stamp(),
        total_pages,
        total_photos: photos.len(),
        album_id,
        album_title,
        photos,
    })
}

/// Pairs every `a.albumbgphoto` card with the `.margin10[title]` element at the same position.
///
/// When the page has fewer title elements than cards, the extra cards get no title and no
/// description. A page without any title element yields no albums at all.
fn album_cards(doc: &Html, base: &Url) -> Result<Vec<AlbumRecord>> {
    let title_selector = create_selector(".margin10[title]")?;
    let titles = doc
        .select(&title_selector)
        .filter_map(|el| el.value().attr("title"))
        .map(split_title)
        .collect::<Vec<_>>();

    if titles.is_empty() {
        return Ok(Vec::new());
    }

    let card_selector = create_selector("a.albumbgphoto")?;
    doc.select(&card_selector)
        .enumerate()
        .map(|(idx, card)| {
            let (title, desc) = match titles.get(idx) {
                Some((title, desc)) => (Some(title.clone()), Some(desc.clone())),
                None => (None, None),
            };
            Ok(AlbumRecord {
                title,
                desc,
                url: card_url(&card, base)?,
                thumbnail_url: card_thumbnail(&card),
            })
        })
        .collect()
}

/// Pairs every `a.albumbgphoto` card with the `.info` caption at the same position.
fn photo_cards(doc: &Html, base: &Url) -> Result<Vec<PhotoRecord>> {
    let info_selector = create_selector(".info")?;
    let titles = doc
        .select(&info_selector)
        .map(|el| element_text(&el))
        .collect::<Vec<_>>();

    if titles.is_empty() {
        return Ok(Vec::new());
    }

    let card_selector = create_selector("a.albumbgphoto")?;
    doc.select(&card_selector)
        .enumerate()
        .map(|(idx, card)| {
            Ok(PhotoRecord {
                title: titles.get(idx).cloned(),
                url: card_url(&card, base)?,
                thumbnail_url: card_thumbnail(&card),
            })
        })
        .collect()
}

/// Splits a card's `title` attribute into `(title, description)`.
///
/// The portal writes `相簿名稱: <title>\n相簿說明: <desc>`. Some albums repeat the title as the
/// start of the description, in that case the description is the more complete title.
fn split_title(full: &str) -> (String, String) {
    let (title, desc) = match full.find(DESC_SEPARATOR) {
        Some(p) => (&full[..p], &full[p + DESC_SEPARATOR.len()..]),
        None => (full, ""),
    };
    let title = remove_prefix(title, TITLE_PREFIX);

    if desc.starts_with(title) {
        (desc.to_string(), String::new())
    } else {
        (title.to_string(), desc.to_string())
    }
}

/// Number of pages, taken from the `pageIndex` query parameter of the last pagination link.
/// Pages without a pagination block are a single page.
fn page_count(doc: &Html, base: &Url) -> Result<u32> {
    let pagination_selector = create_selector(".pagination a[href]")?;
    let Some(last) = doc.select(&pagination_selector).last() else {
        return Ok(1);
    };

    let href = last.value().attr("href").unwrap_or_default();
    let url = base.join(href)?;
    let (_, value) = url
        .query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case("pageindex"))
        .ok_or_else(|| Error::Parse(format!("page index missing in pagination link {href}")))?;

    value
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::Parse(format!("page index {value:?} is not a number")))
}

fn card_url(card: &ElementRef, base: &Url) -> Result<String> {
    let href = card.value().attr("href").unwrap_or_default();
    Ok(base.join(href)?.to_string())
}

/// Reads the thumbnail out of the card's inline `background-image: url(...)` style.
fn card_thumbnail(card: &ElementRef) -> Option<String> {
    let style = card.value().attr("style")?;
    let declarations = split_declarations(style)
        .into_iter()
        .filter_map(|decl| decl.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim()))
        .collect::<Vec<_>>();

    ["background-image", "background"]
        .iter()
        .find_map(|wanted| {
            declarations
                .iter()
                .find(|(name, _)| name == wanted)
                .and_then(|(_, value)| extract_url(value))
        })
}

/// Splits an inline style on the `;` that end declarations. A `;` inside parentheses or quotes,
/// as in `url('x.jpg;v=2')`, belongs to the value.
fn split_declarations(style: &str) -> Vec<&str> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;

    for (idx, ch) in style.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                declarations.push(&style[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    declarations.push(&style[start..]);
    declarations
}

/// Returns what sits between the first `url(` and the last `)`, without surrounding quotes.
pub(crate) fn extract_url(value: &str) -> Option<String> {
    let beg = value.find("url(")? + "url(".len();
    let end = value.rfind(')')?;
    if end < beg {
        return None;
    }
    let inner = value[beg..end].trim();
    let inner = inner
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(inner);
    Some(inner.to_string())
}

#[inline]
fn remove_prefix<'a>(s: &'a str, prefix: &str) -> &'a str {
    s.strip_prefix(prefix).unwrap_or(s)
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn now_stamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::Parse(format!("invalid selector {sel_str}")))
}
