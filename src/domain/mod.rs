// ==========================================
// 会展搭建项目管理系统 - 领域层
// ==========================================

pub mod action_log;
pub mod addition;
pub mod budget;
pub mod materials;
pub mod quote;
pub mod task;
pub mod types;
pub mod version;

// 重导出核心实体
pub use action_log::ActionLog;
pub use addition::{
    AdditionId, AdditionMaterialLine, AdditionRecord, BudgetAddition, VirtualAddition,
};
pub use budget::{BudgetDocument, BudgetElement, BudgetLine, BudgetMaterial, ImportMetadata};
pub use materials::{
    ApprovalStatus, DepartmentApproval, ElementMaterial, MaterialsDocument, ProjectElement,
    ProjectInfo,
};
pub use quote::{MarginConfig, QuoteDocument, QuoteLine, QuoteSection, QuoteTotals};
pub use task::Task;
pub use version::DocumentVersion;
