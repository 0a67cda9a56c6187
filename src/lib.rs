// ==========================================
// 会展搭建项目管理系统 - 核心库
// ==========================================
// 核心: 物料清单 → 预算 → 补充项 → 报价 协同管线
// 技术栈: Rust + SQLite
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AdditionSource, AdditionStatus, Department, DocumentKind, ElementCategory, TaskStatus,
    TaskType,
};

// 领域实体
pub use domain::{
    ActionLog, AdditionRecord, ApprovalStatus, BudgetAddition, BudgetDocument, DocumentVersion,
    MaterialsDocument, QuoteDocument, Task,
};

// 引擎
pub use engine::{
    AdditionReconciler, ApprovalGate, ChangeDetector, MaterialsBudgetSynchronizer, Normalizer,
    QuoteTransformer,
};

// API
pub use api::{AdditionApi, BudgetApi, MaterialsApi, QuoteApi, VersionApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "会展搭建项目管理系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
