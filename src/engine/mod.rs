// ==========================================
// 会展搭建项目管理系统 - 引擎层
// ==========================================
// 协同管线的业务规则: 归一化 → 变化判定 → 会签门控 →
// 补充项对账 / 预算同步 / 报价转换
// ==========================================

pub mod addition_reconciler;
pub mod approval_gate;
pub mod budget_sync;
pub mod change_detector;
pub mod events;
pub mod normalizer;
pub mod quote_transformer;

pub use addition_reconciler::{AdditionReconciler, CandidateMaterial};
pub use approval_gate::{ApprovalGate, ApprovalOutcome, SavePolicyOutcome};
pub use budget_sync::MaterialsBudgetSynchronizer;
pub use change_detector::ChangeDetector;
pub use events::{
    LoggingEventPublisher, ReconcileEvent, ReconcileEventPublisher, ReconcileEventType,
};
pub use normalizer::{NormalizedElement, NormalizedMaterial, Normalizer};
pub use quote_transformer::QuoteTransformer;
