//! Article gating
//!
//! The annotator only runs on article pages. Two checks exist because the
//! decision is made twice: once by whatever activates the content script
//! (it only sees a full URL) and once by the content script itself (it sees
//! `location.pathname`).

const ARTICLE_PREFIX: &str = "/wiki/";
const MAIN_PAGE: &str = "/wiki/Main_Page";
const SPECIAL_PREFIX: &str = "/wiki/Special:";
const HOST_MARKER: &str = "wikipedia.org/wiki/";

/// True for `/wiki/<Title>` paths other than the main page and `Special:` pages.
pub fn is_article_path(path: &str) -> bool {
    path.starts_with(ARTICLE_PREFIX) && path != MAIN_PAGE && !path.starts_with(SPECIAL_PREFIX)
}

/// True for a Wikipedia article URL other than the main page. Exported to
/// the activating side as `isAnnotatableUrl`.
pub fn is_annotatable_url(url: &str) -> bool {
    url.contains(HOST_MARKER) && !url.contains(MAIN_PAGE)
}
