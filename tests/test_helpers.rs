// ==========================================
// 集成测试辅助 - 测试库与种子任务
// ==========================================

#![allow(dead_code)]

use chrono::Utc;
use expo_production_erp::app::AppState;
use expo_production_erp::domain::task::Task;
use expo_production_erp::domain::types::{TaskStatus, TaskType};
use tempfile::TempDir;

/// 创建临时数据库上的 AppState
///
/// 返回的 TempDir 必须在测试期间存活, 否则数据库文件被提前清理
pub fn create_test_app() -> (TempDir, AppState) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir
        .path()
        .join("expo_erp_test.db")
        .to_string_lossy()
        .to_string();
    let app = AppState::new(db_path).expect("Failed to create AppState");
    (dir, app)
}

/// 插入一个任务
pub fn seed_task(app: &AppState, task_id: &str, enquiry_id: &str, task_type: TaskType) -> Task {
    let now = Utc::now();
    let task = Task {
        task_id: task_id.to_string(),
        enquiry_id: enquiry_id.to_string(),
        task_type,
        title: format!("{} ({})", enquiry_id, task_type),
        status: TaskStatus::InProgress,
        created_at: now,
        updated_at: now,
    };
    app.task_repo.insert(&task).expect("Failed to insert task");
    task
}

/// 同一询单下的 物料/预算/报价 三个任务
///
/// 返回 (materials_task_id, budget_task_id, quote_task_id)
pub fn seed_enquiry_tasks(app: &AppState, enquiry_id: &str) -> (String, String, String) {
    let materials_id = format!("{}-materials", enquiry_id);
    let budget_id = format!("{}-budget", enquiry_id);
    let quote_id = format!("{}-quote", enquiry_id);

    seed_task(app, &materials_id, enquiry_id, TaskType::Materials);
    seed_task(app, &budget_id, enquiry_id, TaskType::Budget);
    seed_task(app, &quote_id, enquiry_id, TaskType::Quote);

    (materials_id, budget_id, quote_id)
}
