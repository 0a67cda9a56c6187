// ==========================================
// 会展搭建项目管理系统 - 会签门控引擎
// ==========================================
// 职责:
//   - 保存策略: 内容变化 → 重置全部签核; 未变化 → 原样延续
//   - 单部门签核: 写入部门记录并重算 all_approved,
//     达成全签核时打 last_approval_at 时间戳并通知调用方触发下游同步
// 红线: 签核只能因内容变化回退, 不存在撤销签核的直接接口;
//       单部门签核不隐含其他部门
// ==========================================

use crate::domain::materials::{ApprovalStatus, DepartmentApproval};
use crate::domain::types::Department;
use chrono::{DateTime, Utc};

/// 重置签核时写入的系统意见
pub const RESET_COMMENT: &str = "内容变化，签核已自动重置";

// ==========================================
// SavePolicyOutcome - 保存策略结果
// ==========================================
#[derive(Debug, Clone)]
pub struct SavePolicyOutcome {
    pub status: ApprovalStatus,
    /// 本次保存是否触发了签核重置
    pub was_reset: bool,
}

// ==========================================
// ApprovalOutcome - 单部门签核结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub status: ApprovalStatus,
    /// 本次签核是否恰好达成全签核（触发下游同步的信号）
    pub newly_fully_approved: bool,
}

// ==========================================
// ApprovalGate - 会签门控
// ==========================================
pub struct ApprovalGate;

impl ApprovalGate {
    /// 保存策略: 决定既有签核状态在本次内容保存后的去向
    ///
    /// # 规则
    /// - 无既有状态 → 初始化为全部未签核
    /// - 内容变化 → 全部门重置为未签核, 附系统意见
    /// - 内容未变化 → 原样延续
    pub fn apply_save_policy(
        existing: Option<ApprovalStatus>,
        content_changed: bool,
    ) -> SavePolicyOutcome {
        let existing = match existing {
            Some(status) => status,
            None => {
                return SavePolicyOutcome {
                    status: ApprovalStatus::unapproved(),
                    was_reset: false,
                }
            }
        };

        if !content_changed {
            return SavePolicyOutcome {
                status: existing,
                was_reset: false,
            };
        }

        // 仅当存在已签核的部门时, 重置才算一次实际回退
        let had_any_approval = Department::ALL.iter().any(|d| existing.entry(*d).approved);

        let mut status = ApprovalStatus::unapproved();
        for dept in Department::ALL {
            *status.entry_mut(dept) = DepartmentApproval {
                approved: false,
                approver: None,
                approved_at: None,
                comment: Some(RESET_COMMENT.to_string()),
            };
        }

        SavePolicyOutcome {
            status,
            was_reset: had_any_approval,
        }
    }

    /// 记录单部门签核
    ///
    /// # 参数
    /// - status: 当前签核状态（读取自部门签核行）
    /// - dept: 签核部门（合法性在 API 边界校验）
    /// - actor: 签核人
    /// - comment: 签核意见
    /// - now: 签核时间
    pub fn record_approval(
        mut status: ApprovalStatus,
        dept: Department,
        actor: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> ApprovalOutcome {
        let was_fully_approved = status.all_approved;

        *status.entry_mut(dept) = DepartmentApproval {
            approved: true,
            approver: Some(actor.to_string()),
            approved_at: Some(now),
            comment,
        };
        status.recompute_all_approved();

        let newly_fully_approved = status.all_approved && !was_fully_approved;
        if newly_fully_approved {
            status.last_approval_at = Some(now);
        }

        ApprovalOutcome {
            status,
            newly_fully_approved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved_status() -> ApprovalStatus {
        let mut status = ApprovalStatus::unapproved();
        for dept in Department::ALL {
            *status.entry_mut(dept) = DepartmentApproval {
                approved: true,
                approver: Some("张工".to_string()),
                approved_at: Some(Utc::now()),
                comment: None,
            };
        }
        status.recompute_all_approved();
        status
    }

    #[test]
    fn test_no_prior_status_initializes_unapproved() {
        let outcome = ApprovalGate::apply_save_policy(None, true);
        assert!(!outcome.was_reset);
        assert!(!outcome.status.all_approved);
        assert!(!outcome.status.design.approved);
    }

    #[test]
    fn test_unchanged_content_preserves_status() {
        let status = approved_status();
        let outcome = ApprovalGate::apply_save_policy(Some(status.clone()), false);
        assert!(!outcome.was_reset);
        assert_eq!(outcome.status, status);
        assert!(outcome.status.all_approved);
    }

    #[test]
    fn test_changed_content_resets_all_departments() {
        let outcome = ApprovalGate::apply_save_policy(Some(approved_status()), true);
        assert!(outcome.was_reset);
        assert!(!outcome.status.all_approved);
        for dept in Department::ALL {
            let entry = outcome.status.entry(dept);
            assert!(!entry.approved);
            assert!(entry.approver.is_none());
            assert_eq!(entry.comment.as_deref(), Some(RESET_COMMENT));
        }
    }

    #[test]
    fn test_reset_without_prior_approvals_is_not_a_regression() {
        let outcome = ApprovalGate::apply_save_policy(Some(ApprovalStatus::unapproved()), true);
        assert!(!outcome.was_reset);
        assert!(!outcome.status.all_approved);
    }

    #[test]
    fn test_single_department_does_not_imply_others() {
        let now = Utc::now();
        let outcome = ApprovalGate::record_approval(
            ApprovalStatus::unapproved(),
            Department::Design,
            "李设计",
            None,
            now,
        );
        assert!(!outcome.newly_fully_approved);
        assert!(outcome.status.design.approved);
        assert!(!outcome.status.production.approved);
        assert!(!outcome.status.finance.approved);
        assert!(outcome.status.last_approval_at.is_none());
    }

    #[test]
    fn test_last_approval_stamps_on_full_approval() {
        let now = Utc::now();
        let mut status = ApprovalStatus::unapproved();
        status.entry_mut(Department::Design).approved = true;
        status.entry_mut(Department::Production).approved = true;
        status.recompute_all_approved();

        let outcome =
            ApprovalGate::record_approval(status, Department::Finance, "王会计", None, now);
        assert!(outcome.newly_fully_approved);
        assert!(outcome.status.all_approved);
        assert_eq!(outcome.status.last_approval_at, Some(now));
    }

    #[test]
    fn test_re_approval_does_not_re_signal() {
        let now = Utc::now();
        let outcome = ApprovalGate::record_approval(
            approved_status(),
            Department::Design,
            "李设计",
            Some("补充意见".to_string()),
            now,
        );
        assert!(!outcome.newly_fully_approved);
        assert!(outcome.status.all_approved);
    }
}
