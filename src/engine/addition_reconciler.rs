// ==========================================
// 会展搭建项目管理系统 - 补充项对账引擎
// ==========================================
// 职责: 保证每个需要补充审批的材料恰好对应一条未驳回的补充项
//   - 派生范围: additional 材料; 预算任务完成后还包括新引入的材料
//   - 自然键: 标题 ("Additional: ..." / "Post-Budget Addition: ...")
//   - 幂等: 已存在未驳回同名项时不再创建
// 读取侧: 持久化行与虚拟项合并 (AdditionRecord 和类型),
//   匹配顺序: 内嵌材料 id 优先, (标题, 描述) 兜底
// 仅在物料清单全签核时运行, 由调用方门控
// ==========================================

use crate::domain::addition::{
    derived_title, AdditionMaterialLine, AdditionRecord, BudgetAddition, VirtualAddition,
};
use crate::domain::budget::BudgetDocument;
use crate::domain::materials::MaterialsDocument;
use crate::domain::task::Task;
use crate::domain::types::{AdditionSource, AdditionStatus, TaskStatus};
use crate::repository::addition_repo::AdditionRepository;
use crate::repository::error::RepositoryResult;
use chrono::{DateTime, Utc};
use rusqlite::Transaction;
use std::sync::Arc;
use uuid::Uuid;

// ==========================================
// CandidateMaterial - 需要补充项的材料
// ==========================================
#[derive(Debug, Clone)]
pub struct CandidateMaterial {
    pub element_key: String,
    pub material_id: String,
    pub description: String,
    pub unit: String,
    pub quantity: f64,
    /// 该材料适用的自然键标题
    pub title: String,
}

// ==========================================
// AdditionReconciler - 对账引擎
// ==========================================
pub struct AdditionReconciler {
    addition_repo: Arc<AdditionRepository>,
}

impl AdditionReconciler {
    pub fn new(addition_repo: Arc<AdditionRepository>) -> Self {
        Self { addition_repo }
    }

    /// 计算需要补充项的材料集合
    ///
    /// - additional 材料始终入围
    /// - 预算任务完成后, 计入且未出现在预算物料区的新材料也入围
    /// - 没有持久化 id 的材料行无法追踪, 不入围
    pub fn candidates(
        materials_doc: &MaterialsDocument,
        budget_doc: &BudgetDocument,
        budget_completed: bool,
    ) -> Vec<CandidateMaterial> {
        let mut result = Vec::new();

        for element in &materials_doc.elements {
            for material in &element.materials {
                let material_id = match &material.material_id {
                    Some(id) => id.clone(),
                    None => continue,
                };

                let in_scope = material.additional
                    || (budget_completed
                        && material.included
                        && !budget_doc.contains_material(
                            &element.element_type,
                            &element.name,
                            &material.description,
                        ));

                if !in_scope {
                    continue;
                }

                result.push(CandidateMaterial {
                    element_key: element.normalize_key(),
                    material_id,
                    description: material.description.clone(),
                    unit: material.unit.clone(),
                    quantity: material.quantity,
                    title: derived_title(&material.description, budget_completed),
                });
            }
        }

        result
    }

    /// 对账: 为缺失补充项的入围材料创建 pending_approval 行
    ///
    /// 幂等: 同名未驳回行已存在时跳过。挂在调用方事务上,
    /// 任何失败沿 `?` 上抛并回滚整个触发操作。
    pub fn reconcile_tx(
        &self,
        tx: &Transaction,
        budget_task: &Task,
        materials_doc: &MaterialsDocument,
        budget_doc: &BudgetDocument,
        actor: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BudgetAddition>> {
        let budget_completed = budget_task.status == TaskStatus::Completed;
        let candidates = Self::candidates(materials_doc, budget_doc, budget_completed);

        let mut created = Vec::new();
        for candidate in candidates {
            let existing = self.addition_repo.find_active_by_title_tx(
                tx,
                &budget_task.task_id,
                &candidate.title,
            )?;
            if existing.is_some() {
                continue; // 幂等: 已有未驳回同名项
            }

            let addition = Self::build_derived_addition(
                &budget_task.task_id,
                &candidate,
                AdditionStatus::PendingApproval,
                actor,
                now,
            );
            self.addition_repo.insert_tx(tx, &addition)?;

            tracing::info!(
                task_id = %budget_task.task_id,
                title = %addition.title,
                material_id = %candidate.material_id,
                "已生成预算补充项"
            );
            created.push(addition);
        }

        Ok(created)
    }

    /// 合并持久化行与虚拟项
    ///
    /// 匹配规则: 入围材料若已被任一持久化行覆盖
    /// (source_material_id 命中, 或标题+描述兜底命中), 不再以虚拟项出现;
    /// 其余入围材料以 `materials_additional_<material_id>` 虚拟项出现。
    pub fn merge_with_virtual(
        persisted: Vec<BudgetAddition>,
        budget_task: &Task,
        materials_doc: &MaterialsDocument,
        budget_doc: &BudgetDocument,
    ) -> Vec<AdditionRecord> {
        let budget_completed = budget_task.status == TaskStatus::Completed;
        let candidates = Self::candidates(materials_doc, budget_doc, budget_completed);

        let mut records: Vec<AdditionRecord> = Vec::with_capacity(persisted.len());

        for candidate in candidates {
            let backed = persisted
                .iter()
                .any(|row| Self::row_matches_candidate(row, &candidate));
            if backed {
                continue;
            }

            records.push(AdditionRecord::Virtual(VirtualAddition {
                material_id: candidate.material_id,
                element_key: candidate.element_key,
                title: candidate.title,
                description: candidate.description,
                unit: candidate.unit,
                quantity: candidate.quantity,
            }));
        }

        records.extend(persisted.into_iter().map(AdditionRecord::Persisted));
        records
    }

    /// 虚拟项定位: 按底层材料 id 找回入围材料
    pub fn find_candidate(
        materials_doc: &MaterialsDocument,
        budget_doc: &BudgetDocument,
        budget_completed: bool,
        material_id: &str,
    ) -> Option<CandidateMaterial> {
        Self::candidates(materials_doc, budget_doc, budget_completed)
            .into_iter()
            .find(|c| c.material_id == material_id)
    }

    /// 虚拟项落库: 审批动作把虚拟项物化为持久化行
    ///
    /// approve → status=approved; reject → status=rejected
    /// (驳回也落一行终态, 否则下次读取会重新浮现同一虚拟项)
    pub fn materialize_virtual_tx(
        &self,
        tx: &Transaction,
        budget_task_id: &str,
        candidate: &CandidateMaterial,
        approve: bool,
        actor: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<BudgetAddition> {
        let status = if approve {
            AdditionStatus::Approved
        } else {
            AdditionStatus::Rejected
        };

        let mut addition =
            Self::build_derived_addition(budget_task_id, candidate, status, actor, now);
        addition.decided_by = Some(actor.to_string());
        addition.decided_at = Some(now);
        addition.decision_notes = notes;

        self.addition_repo.insert_tx(tx, &addition)?;
        Ok(addition)
    }

    /// 行是否覆盖某入围材料: 内嵌材料 id 优先, (标题, 描述) 兜底
    pub fn row_matches_candidate(row: &BudgetAddition, candidate: &CandidateMaterial) -> bool {
        // 内嵌材料 id 优先
        if row.source_material_id.as_deref() == Some(candidate.material_id.as_str()) {
            return true;
        }
        // (标题, 描述) 兜底
        row.title == candidate.title && row.description.as_deref() == Some(&candidate.description)
    }

    // ==========================================
    // 内部
    // ==========================================

    fn build_derived_addition(
        budget_task_id: &str,
        candidate: &CandidateMaterial,
        status: AdditionStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> BudgetAddition {
        BudgetAddition {
            addition_id: Uuid::new_v4().to_string(),
            task_id: budget_task_id.to_string(),
            title: candidate.title.clone(),
            description: Some(candidate.description.clone()),
            status,
            source: AdditionSource::MaterialsAdditional,
            source_element: Some(candidate.element_key.clone()),
            source_material_id: Some(candidate.material_id.clone()),
            // 单条合成材料行, 价格字段置零, 预算评审时填入
            materials: vec![AdditionMaterialLine {
                material_id: Some(candidate.material_id.clone()),
                description: candidate.description.clone(),
                unit: candidate.unit.clone(),
                quantity: candidate.quantity,
                unit_price: 0.0,
                total_price: 0.0,
            }],
            amount: 0.0,
            created_by: Some(actor.to_string()),
            created_at: now,
            decided_by: None,
            decided_at: None,
            decision_notes: None,
            updated_at: now,
        }
    }
}
