use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::Serialize;

use crate::{config::Config, error::Error};

/// A requested page, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    /// Both the page number and the page size must be at least 1.
    pub fn new(page_num: usize, page_size: usize) -> Option<Self> {
        (page_num >= 1 && page_size >= 1).then_some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn skip(&self) -> usize {
        (self.page_num - 1).saturating_mul(self.page_size)
    }

    pub fn paginate<T>(&self, total: usize, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
                page_count: total.div_ceil(self.page_size),
            },
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let default_size = req
            .rocket()
            .state::<Config>()
            .map(Config::party_page_size)
            .unwrap_or(6);

        let page_num = match req.query_value::<usize>("page_num").unwrap_or(Ok(1)) {
            Ok(page_num) => page_num,
            Err(_) => return bad_request("page_num must be a positive integer"),
        };
        let page_size = match req.query_value::<usize>("page_size").unwrap_or(Ok(default_size)) {
            Ok(page_size) => page_size,
            Err(_) => return bad_request("page_size must be a positive integer"),
        };

        match Self::new(page_num, page_size) {
            Some(pagination) => request::Outcome::Success(pagination),
            None => bad_request("page_num and page_size start at 1"),
        }
    }
}

fn bad_request<S>(msg: &str) -> request::Outcome<S, Error> {
    request::Outcome::Failure((Status::BadRequest, Error::BadRequest(msg.to_string())))
}

#[derive(Debug, Serialize)]
pub struct PaginationResult {
    pub page_num: usize,
    pub page_size: usize,
    pub total: usize,
    pub page_count: usize,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert!(Pagination::new(0, 6).is_none());
        assert!(Pagination::new(1, 0).is_none());
    }

    #[test]
    fn skip_counts_whole_pages() {
        assert_eq!(Pagination::new(1, 6).unwrap().skip(), 0);
        assert_eq!(Pagination::new(3, 6).unwrap().skip(), 12);
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Pagination::new(1, 6).unwrap().paginate(13, Vec::<()>::new());
        assert_eq!(page.pagination.page_count, 3);
        let page = Pagination::new(1, 6).unwrap().paginate(0, Vec::<()>::new());
        assert_eq!(page.pagination.page_count, 0);
    }
}
