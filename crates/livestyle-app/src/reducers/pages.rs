//! Page configuration reducer

use std::sync::Arc;

use chrono::Utc;
use livestyle_core::{normalize_url, Page};

use crate::action::Action;
use crate::state::PageMap;

/// Prefix of synthetic user stylesheet ids
pub const USER_STYLESHEET_PREFIX: &str = "lsus-";

pub(crate) fn reduce(pages: &Arc<PageMap>, action: &Action) -> Arc<PageMap> {
    match action {
        Action::EnablePage { url } => {
            let key = normalize_url(url);
            match pages.get(&key) {
                Some(page) if page.enabled => pages.clone(),
                Some(page) => with_page(
                    pages,
                    &key,
                    Page {
                        enabled: true,
                        last_used: Utc::now(),
                        ..(**page).clone()
                    },
                ),
                None => with_page(pages, &key, Page::enabled()),
            }
        }

        Action::DisablePage { url } => update_page(pages, url, |page| {
            page.enabled.then(|| Page {
                enabled: false,
                ..page.clone()
            })
        }),

        Action::SetDirection { url, direction } => update_page(pages, url, |page| {
            (page.direction != *direction).then(|| Page {
                direction: *direction,
                ..page.clone()
            })
        }),

        Action::SetUserMapping {
            url,
            browser,
            editor,
        } => update_page(pages, url, |page| {
            let current = page.user_mapping.get(browser);
            if current == editor.as_ref() {
                return None;
            }
            let mut mapping = (*page.user_mapping).clone();
            match editor {
                Some(editor) => mapping.insert(browser.clone(), editor.clone()),
                None => mapping.remove(browser),
            };
            Some(Page {
                user_mapping: Arc::new(mapping),
                ..page.clone()
            })
        }),

        Action::AddUserStylesheet { url } => update_page(pages, url, |page| {
            let mut ids = (*page.user_stylesheets).clone();
            ids.push(next_user_stylesheet_id(&ids));
            Some(Page {
                user_stylesheets: Arc::new(ids),
                ..page.clone()
            })
        }),

        Action::RemoveUserStylesheet { url, id } => update_page(pages, url, |page| {
            if !page.user_stylesheets.contains(id) {
                return None;
            }
            let ids = page
                .user_stylesheets
                .iter()
                .filter(|existing| *existing != id)
                .cloned()
                .collect();
            Some(Page {
                user_stylesheets: Arc::new(ids),
                ..page.clone()
            })
        }),

        Action::RemovePage { url } => {
            let key = normalize_url(url);
            if !pages.contains_key(&key) {
                return pages.clone();
            }
            let mut next = (**pages).clone();
            next.remove(&key);
            Arc::new(next)
        }

        _ => pages.clone(),
    }
}

/// Apply `f` to an existing page; `None` from `f` means "unchanged"
fn update_page<F>(pages: &Arc<PageMap>, url: &str, f: F) -> Arc<PageMap>
where
    F: FnOnce(&Page) -> Option<Page>,
{
    let key = normalize_url(url);
    let Some(page) = pages.get(&key) else {
        return pages.clone();
    };
    match f(page) {
        Some(next) => with_page(pages, &key, next),
        None => pages.clone(),
    }
}

fn with_page(pages: &Arc<PageMap>, key: &str, page: Page) -> Arc<PageMap> {
    let mut next = (**pages).clone();
    next.insert(key.to_string(), Arc::new(page));
    Arc::new(next)
}

/// `lsus-N` with N one past the highest id in use
fn next_user_stylesheet_id(existing: &[String]) -> String {
    let highest = existing
        .iter()
        .filter_map(|id| id.strip_prefix(USER_STYLESHEET_PREFIX)?.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{USER_STYLESHEET_PREFIX}{}", highest + 1)
}
