// ==========================================
// 会展搭建项目管理系统 - 领域类型定义
// ==========================================
// 职责: 核心枚举类型（部门、任务、单据、补充项）
// 序列化格式: snake_case (与数据库/持久化字段一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 部门 (Department)
// ==========================================
// 物料清单会签部门: 三个部门各自独立签核, 互不隐含
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Design,     // 设计部
    Production, // 制作部
    Finance,    // 财务部
}

impl Department {
    /// 全部会签部门（顺序固定，用于初始化与汇总）
    pub const ALL: [Department; 3] = [
        Department::Design,
        Department::Production,
        Department::Finance,
    ];

    /// 从请求路径/负载中的部门标识解析
    ///
    /// # 返回
    /// - Some(Department): 合法部门
    /// - None: 非法部门名（调用方应拒绝请求）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "design" => Some(Department::Design),
            "production" => Some(Department::Production),
            "finance" => Some(Department::Finance),
            _ => None,
        }
    }

    /// 数据库存储标识
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Design => "design",
            Department::Production => "production",
            Department::Finance => "finance",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 元素分类 (Element Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementCategory {
    Production, // 自制
    Hire,       // 租赁
    Outsourced, // 外包
}

impl ElementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::Production => "production",
            ElementCategory::Hire => "hire",
            ElementCategory::Outsourced => "outsourced",
        }
    }

    /// 宽松解析（历史数据兜底为自制）
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hire" => ElementCategory::Hire,
            "outsourced" => ElementCategory::Outsourced,
            _ => ElementCategory::Production,
        }
    }
}

impl Default for ElementCategory {
    fn default() -> Self {
        ElementCategory::Production
    }
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 补充项状态 (Addition Status)
// ==========================================
// 状态机: draft → pending_approval → approved/rejected
// 红线: approved/rejected 后内容不可变（仅审计字段）; 仅 draft 可删除
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionStatus {
    Draft,           // 草稿
    PendingApproval, // 待审批
    Approved,        // 已批准
    Rejected,        // 已驳回
}

impl AdditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdditionStatus::Draft => "draft",
            AdditionStatus::PendingApproval => "pending_approval",
            AdditionStatus::Approved => "approved",
            AdditionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(AdditionStatus::Draft),
            "pending_approval" => Some(AdditionStatus::PendingApproval),
            "approved" => Some(AdditionStatus::Approved),
            "rejected" => Some(AdditionStatus::Rejected),
            _ => None,
        }
    }

    /// 是否已处理（终态: 批准或驳回）
    pub fn is_processed(&self) -> bool {
        matches!(self, AdditionStatus::Approved | AdditionStatus::Rejected)
    }
}

impl fmt::Display for AdditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 补充项来源 (Addition Source)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionSource {
    Manual,              // 预算人员手工录入
    MaterialsAdditional, // 物料清单中 additional 材料自动派生
}

impl AdditionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdditionSource::Manual => "manual",
            AdditionSource::MaterialsAdditional => "materials_additional",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.trim() {
            "materials_additional" => AdditionSource::MaterialsAdditional,
            _ => AdditionSource::Manual,
        }
    }
}

impl fmt::Display for AdditionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 任务阶段类型 (Task Type)
// ==========================================
// 一条询单 (enquiry) 按阶段拆分为若干任务, 每个任务持有自己的结构化单据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SiteSurvey,  // 现场勘测
    Design,      // 设计
    Materials,   // 物料清单
    Budget,      // 预算
    Quote,       // 报价
    Procurement, // 采购
    Production,  // 制作
    Logistics,   // 物流
    Handover,    // 交付
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::SiteSurvey => "site_survey",
            TaskType::Design => "design",
            TaskType::Materials => "materials",
            TaskType::Budget => "budget",
            TaskType::Quote => "quote",
            TaskType::Procurement => "procurement",
            TaskType::Production => "production",
            TaskType::Logistics => "logistics",
            TaskType::Handover => "handover",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "site_survey" => Some(TaskType::SiteSurvey),
            "design" => Some(TaskType::Design),
            "materials" => Some(TaskType::Materials),
            "budget" => Some(TaskType::Budget),
            "quote" => Some(TaskType::Quote),
            "procurement" => Some(TaskType::Procurement),
            "production" => Some(TaskType::Production),
            "logistics" => Some(TaskType::Logistics),
            "handover" => Some(TaskType::Handover),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 任务状态 (Task Status)
// ==========================================
// 预算任务标记 completed 后, 新引入的材料一律按 "Post-Budget Addition" 处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,    // 未开始
    InProgress, // 进行中
    Completed,  // 已完成
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Pending,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 单据类型 (Document Kind)
// ==========================================
// 版本快照按单据类型区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Materials, // 物料清单
    Budget,    // 预算
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Materials => "materials",
            DocumentKind::Budget => "budget",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "materials" => Some(DocumentKind::Materials),
            "budget" => Some(DocumentKind::Budget),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_parse() {
        assert_eq!(Department::parse("design"), Some(Department::Design));
        assert_eq!(Department::parse(" Finance "), Some(Department::Finance));
        assert_eq!(Department::parse("sales"), None);
        assert_eq!(Department::parse(""), None);
    }

    #[test]
    fn test_addition_status_round_trip() {
        for status in [
            AdditionStatus::Draft,
            AdditionStatus::PendingApproval,
            AdditionStatus::Approved,
            AdditionStatus::Rejected,
        ] {
            assert_eq!(AdditionStatus::parse(status.as_str()), Some(status));
        }
        assert!(AdditionStatus::Approved.is_processed());
        assert!(AdditionStatus::Rejected.is_processed());
        assert!(!AdditionStatus::PendingApproval.is_processed());
    }

    #[test]
    fn test_document_kind_serde_format() {
        let json = serde_json::to_string(&DocumentKind::Materials).unwrap();
        assert_eq!(json, "\"materials\"");
    }
}
