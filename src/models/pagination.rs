//! 分页相关的数据结构

use crate::models::TicketResponse;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;
pub const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationParams {
    pub fn new(page: Option<u64>, per_page: Option<u64>) -> Self {
        Self { page, per_page }
    }

    pub fn get_page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn get_per_page(&self) -> u64 {
        self.per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// 超大页码饱和到数据库可接受的最大偏移
    pub fn get_offset(&self) -> u64 {
        (self.get_page() - 1)
            .saturating_mul(self.get_per_page())
            .min(MAX_OFFSET)
    }

    pub fn get_limit(&self) -> u64 {
        self.get_per_page()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(PaginatedTicketResponse = PaginatedResponse<TicketResponse>)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, params: &PaginationParams, total: u64) -> Self {
        let per_page = params.get_per_page();
        let total_pages = total.div_ceil(per_page).max(1);
        Self {
            items,
            page: params.get_page(),
            per_page,
            total,
            total_pages,
        }
    }
}
