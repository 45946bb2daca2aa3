use crate::entities::TicketType;
use crate::utils::{DateRange, DayTotal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    /// YYYY-MM-DD，默认 end_date 前 7 天
    pub start_date: Option<String>,
    /// YYYY-MM-DD，默认今天
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketLink {
    pub id: i32,
    pub title: String,
    pub url: String,
}

impl TicketLink {
    pub fn new(id: i32, title: String) -> Self {
        Self {
            id,
            title,
            url: ticket_url(id),
        }
    }
}

pub fn ticket_url(id: i32) -> String {
    format!("/tickets/{id}/")
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SummaryStats {
    pub bugs_this_week: u64,
    pub features_coming_soon: u64,
    pub total_features_implemented: u64,
    pub most_requested_feature: Option<TicketLink>,
    /// 例如 "3 days 4 hours"
    pub average_bug_fix_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DateRangeInfo {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub label: String,
}

impl From<&DateRange> for DateRangeInfo {
    fn from(range: &DateRange) -> Self {
        Self {
            start_date: range.start,
            end_date: range.end,
            label: range.label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketChartData {
    pub comments: Vec<DayTotal>,
    pub views: Vec<DayTotal>,
    pub votes: Vec<DayTotal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketStatsResponse {
    pub ticket: TicketLink,
    pub date_range: DateRangeInfo,
    pub chart_data: TicketChartData,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllTicketsChartData {
    pub bugs: Vec<DayTotal>,
    pub features: Vec<DayTotal>,
    pub comments: Vec<DayTotal>,
    pub views: Vec<DayTotal>,
    pub votes: Vec<DayTotal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopTicket {
    #[serde(flatten)]
    pub link: TicketLink,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllTicketsStatsResponse {
    pub date_range: DateRangeInfo,
    pub chart_data: AllTicketsChartData,
    pub awaiting_approval: u64,
    pub top_features: Vec<TopTicket>,
    pub top_bugs: Vec<TopTicket>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionChartData {
    pub sales: Vec<DayTotal>,
    pub refunds: Vec<DayTotal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionStatsResponse {
    pub date_range: DateRangeInfo,
    pub chart_data: TransactionChartData,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoadmapQuery {
    pub page: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoadmapItem {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub ticket_type: String,
    /// "Coming Soon" 或完成日期 dd/mm/yy
    pub date: String,
}

impl RoadmapItem {
    pub fn new(id: i32, title: String, ticket_type: TicketType, date: String) -> Self {
        Self {
            title,
            url: ticket_url(id),
            ticket_type: ticket_type.label().to_string(),
            date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoadmapResponse {
    pub page: u64,
    pub tickets: Vec<RoadmapItem>,
    /// 当前页是最后一页（或已超出）
    pub done: bool,
}
