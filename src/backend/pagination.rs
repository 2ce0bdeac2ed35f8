use super::rickmorty::{EpisodePage, EpisodeRecord};

/// Accumulated episode list plus the cursor used to extend it.
///
/// Pages are only ever requested one at a time and strictly in order, so the
/// list is always page 1 followed by page 2 and so on.
#[derive(Debug, Default)]
pub struct Pagination {
    episodes: Vec<EpisodeRecord>,
    current_page: u32,
    in_flight: Option<u32>,
    total_pages: Option<u32>,
    exhausted: bool,
}

impl Pagination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn episodes(&self) -> &[EpisodeRecord] {
        &self.episodes
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn in_flight(&self) -> Option<u32> {
        self.in_flight
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Claims the next page to fetch. Returns `None` while another page is
    /// in flight or once the last page has been appended.
    pub fn request_next(&mut self) -> Option<u32> {
        if self.in_flight.is_some() || self.exhausted {
            return None;
        }

        let page = self.current_page + 1;
        self.in_flight = Some(page);
        Some(page)
    }

    /// Appends a fetched page. Anything other than the page in flight is
    /// dropped and leaves the list untouched.
    pub fn apply(&mut self, page: u32, fetched: EpisodePage) -> bool {
        if self.in_flight != Some(page) {
            log::warn!(
                "dropping episode page {page}, expected {:?}",
                self.in_flight
            );
            return false;
        }

        self.episodes.extend(fetched.episodes);
        self.current_page = page;
        self.in_flight = None;
        self.total_pages = Some(fetched.info.total_pages);
        self.exhausted = fetched.info.next_page.is_none() || page >= fetched.info.total_pages;
        true
    }

    /// Releases the in-flight claim so the same page can be retried.
    pub fn fail(&mut self, page: u32) {
        if self.in_flight == Some(page) {
            self.in_flight = None;
        }
    }

    /// True when `row` is the last loaded row, the point at which the list
    /// should grow.
    pub fn should_load_more(&self, row: usize) -> bool {
        !self.episodes.is_empty() && row + 1 == self.episodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::rickmorty::PageInfo;

    fn episode(id: u32) -> EpisodeRecord {
        EpisodeRecord {
            id,
            name: format!("Episode {id}"),
            air_date: "December 2, 2013".to_string(),
            episode_code: format!("S01E{id:02}"),
            character_refs: vec![],
            source_url: format!("https://rickandmortyapi.com/api/episode/{id}"),
            created: "2017-11-10T12:56:33.798Z".to_string(),
        }
    }

    fn page(ids: std::ops::RangeInclusive<u32>, pages: u32, has_next: bool) -> EpisodePage {
        EpisodePage {
            episodes: ids.map(episode).collect(),
            info: PageInfo {
                total_count: 36,
                total_pages: pages,
                next_page: has_next.then(|| "next".to_string()),
                prev_page: None,
            },
        }
    }

    #[test]
    fn test_first_request_is_page_one() {
        let mut p = Pagination::new();
        assert_eq!(p.request_next(), Some(1));
        assert_eq!(p.in_flight(), Some(1));
    }

    #[test]
    fn test_duplicate_trigger_is_suppressed() {
        let mut p = Pagination::new();
        assert_eq!(p.request_next(), Some(1));
        assert_eq!(p.request_next(), None);
        assert_eq!(p.request_next(), None);
    }

    #[test]
    fn test_pages_append_in_order_and_advance() {
        let mut p = Pagination::new();

        let first = p.request_next().unwrap();
        assert!(p.apply(first, page(1..=20, 2, true)));
        assert_eq!(p.current_page(), 1);

        let second = p.request_next().unwrap();
        assert_eq!(second, 2);
        assert!(p.apply(second, page(21..=36, 2, false)));

        let ids: Vec<u32> = p.episodes().iter().map(|e| e.id).collect();
        assert_eq!(ids, (1..=36).collect::<Vec<_>>());
        assert_eq!(p.total_pages(), Some(2));
    }

    #[test]
    fn test_advances_past_page_two() {
        let mut p = Pagination::new();
        for n in 1..=3u32 {
            let requested = p.request_next().unwrap();
            assert_eq!(requested, n);
            let start = (n - 1) * 10 + 1;
            assert!(p.apply(requested, page(start..=start + 9, 4, true)));
        }
        assert_eq!(p.request_next(), Some(4));
    }

    #[test]
    fn test_stops_after_last_page() {
        let mut p = Pagination::new();
        let first = p.request_next().unwrap();
        p.apply(first, page(1..=5, 1, false));

        assert!(p.is_exhausted());
        assert_eq!(p.request_next(), None);
    }

    #[test]
    fn test_stale_page_is_ignored() {
        let mut p = Pagination::new();
        let first = p.request_next().unwrap();

        assert!(!p.apply(2, page(21..=22, 2, false)));
        assert!(p.episodes().is_empty());
        assert_eq!(p.in_flight(), Some(first));
    }

    #[test]
    fn test_failure_leaves_list_and_allows_retry() {
        let mut p = Pagination::new();
        let first = p.request_next().unwrap();
        p.apply(first, page(1..=20, 2, true));

        let second = p.request_next().unwrap();
        p.fail(second);

        assert_eq!(p.episodes().len(), 20);
        assert_eq!(p.current_page(), 1);
        assert_eq!(p.request_next(), Some(2));
    }

    #[test]
    fn test_should_load_more_only_on_last_row() {
        let mut p = Pagination::new();
        assert!(!p.should_load_more(0));

        let first = p.request_next().unwrap();
        p.apply(first, page(1..=3, 2, true));

        assert!(!p.should_load_more(0));
        assert!(!p.should_load_more(1));
        assert!(p.should_load_more(2));
    }
}
