//! In-memory collaborators for unit tests.
use crate::catalog::{Catalog, CatalogError, Chapter, SearchResults, TitleSummary};
use crate::notify::{Mention, Notification, Notifier, NotifyError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn chapter(id: &str, number: f64) -> Chapter {
    Chapter {
        chapter_id: id.to_string(),
        number,
        released_at: None,
    }
}

pub fn summary(id: &str, name: &str) -> TitleSummary {
    TitleSummary {
        title_id: id.to_string(),
        name: name.to_string(),
        cover_url: Some(format!("https://img.example.com/{}.jpg", id)),
        description: None,
    }
}

#[derive(Default)]
struct FakeTitle {
    summary: Option<TitleSummary>,
    chapters: Vec<Chapter>,
}

/// Catalog backed by a map; titles marked unreachable fail with a timeout.
#[derive(Default)]
pub struct FakeCatalog {
    titles: Mutex<HashMap<String, FakeTitle>>,
    unreachable: Mutex<Vec<String>>,
    detail_down: AtomicBool,
    pub chapter_requests: AtomicUsize,
    pub search_page_size: usize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            search_page_size: 3,
            ..Self::default()
        }
    }

    pub fn add_title(&self, id: &str, name: &str, chapters: Vec<Chapter>) {
        self.titles.lock().unwrap().insert(
            id.to_string(),
            FakeTitle {
                summary: Some(summary(id, name)),
                chapters,
            },
        );
    }

    pub fn publish(&self, id: &str, chapter: Chapter) {
        let mut titles = self.titles.lock().unwrap();
        titles.entry(id.to_string()).or_default().chapters.push(chapter);
    }

    pub fn set_unreachable(&self, id: &str) {
        self.unreachable.lock().unwrap().push(id.to_string());
    }

    pub fn set_detail_down(&self, down: bool) {
        self.detail_down.store(down, Ordering::SeqCst);
    }

    fn check_reachable(&self, id: &str) -> Result<(), CatalogError> {
        if self.unreachable.lock().unwrap().iter().any(|u| u == id) {
            return Err(CatalogError::Timeout);
        }
        Ok(())
    }

    fn sorted_chapters(&self, id: &str) -> Result<Vec<Chapter>, CatalogError> {
        self.check_reachable(id)?;
        let titles = self.titles.lock().unwrap();
        let title = titles
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        let mut chapters = title.chapters.clone();
        chapters.sort_by(|a, b| b.number.total_cmp(&a.number));
        Ok(chapters)
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn search(&self, query: &str, page: u32) -> Result<SearchResults, CatalogError> {
        let query = crate::catalog::validate_query(query)?.to_lowercase();
        let titles = self.titles.lock().unwrap();
        let mut matches: Vec<TitleSummary> = titles
            .values()
            .filter_map(|t| t.summary.clone())
            .filter(|s| s.name.to_lowercase().contains(&query))
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        let size = self.search_page_size.max(1);
        let total_pages = matches.len().div_ceil(size) as u32;
        let start = (page.max(1) as usize - 1) * size;
        let items = matches.into_iter().skip(start).take(size).collect();
        Ok(SearchResults { items, total_pages })
    }

    async fn detail(&self, title_id: &str) -> Result<TitleSummary, CatalogError> {
        self.check_reachable(title_id)?;
        if self.detail_down.load(Ordering::SeqCst) {
            return Err(CatalogError::HttpStatus(503));
        }
        self.titles
            .lock()
            .unwrap()
            .get(title_id)
            .and_then(|t| t.summary.clone())
            .ok_or_else(|| CatalogError::NotFound(title_id.to_string()))
    }

    async fn chapters(
        &self,
        title_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Chapter>, CatalogError> {
        self.chapter_requests.fetch_add(1, Ordering::SeqCst);
        let chapters = self.sorted_chapters(title_id)?;
        let start = (page.max(1) as usize - 1) * page_size as usize;
        Ok(chapters
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect())
    }

    async fn latest_chapter(&self, title_id: &str) -> Result<Chapter, CatalogError> {
        self.sorted_chapters(title_id)?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NoChapters(title_id.to_string()))
    }
}

/// Notifier that records every dispatch and can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Vec<Mention>, Notification)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(
        &self,
        channel: &str,
        mentions: &[Mention],
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::HttpStatus(502));
        }
        self.sent.lock().unwrap().push((
            channel.to_string(),
            mentions.to_vec(),
            notification.clone(),
        ));
        Ok(())
    }
}
