//! Page/page-size handling for list endpoints

use crate::error::{api_success_with_meta, ApiResponse, PaginationInfo, ResponseMetadata};
use serde::Deserialize;
use utoipa::IntoParams;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    #[param(example = 1, minimum = 1)]
    pub page: Option<u32>,

    #[param(example = 20, minimum = 1, maximum = 100)]
    pub page_size: Option<u32>,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self { page, page_size }
    }

    /// 1-based page, never below 1
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Defaults to 20, clamped to 1..=100
    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.page_size())
    }

    pub fn total_pages(&self, total_count: i64) -> u32 {
        if total_count <= 0 {
            return 1;
        }
        let size = i64::from(self.page_size());
        u32::try_from((total_count + size - 1) / size).unwrap_or(u32::MAX)
    }

    pub fn to_metadata(&self, total_count: i64) -> ResponseMetadata {
        let total_pages = self.total_pages(total_count);
        ResponseMetadata {
            pagination: Some(PaginationInfo {
                page: self.page(),
                page_size: self.page_size(),
                total_pages,
                has_next: self.page() < total_pages,
                has_previous: self.page() > 1,
            }),
            total_count: Some(total_count),
        }
    }

    pub fn wrap_response<T>(&self, data: T, total_count: i64) -> ApiResponse<T> {
        api_success_with_meta(data, self.to_metadata(total_count))
    }
}
