// ==========================================
// 会展搭建项目管理系统 - 任务领域模型
// ==========================================
// 任务是询单 (enquiry) 工作流中的一个阶段, 各自持有结构化单据。
// 本核心只消费任务查询 (任务 → 询单 → 同询单指定类型的兄弟任务),
// 任务的创建/流转由外部模块负责。
// ==========================================

use crate::domain::types::{TaskStatus, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Task - 工作流阶段任务
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub enquiry_id: String, // 所属询单
    pub task_type: TaskType,
    pub title: String,
    pub status: TaskStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
