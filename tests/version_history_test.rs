// ==========================================
// 单据版本历史集成测试
// ==========================================
// 覆盖: 只追加版本号递增 / 未变化保存不记版本 /
//       预算快照关联物料版本 / 版本回滚走正常保存管线
// ==========================================

mod helpers;
mod test_helpers;

use expo_production_erp::api::ApiError;
use helpers::test_data_builder::single_material_request;

async fn approve_all(app: &expo_production_erp::app::AppState, task_id: &str) {
    for dept in ["design", "production", "finance"] {
        app.materials_api
            .approve_department(task_id, dept, None, "审批人")
            .await
            .expect("签核应成功");
    }
}

#[tokio::test]
async fn test_content_saves_append_versions() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, _, _) = test_helpers::seed_enquiry_tasks(&app, "E-40");

    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "木板", 10.0), "张工")
        .await
        .expect("保存应成功");
    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "木板", 15.0), "张工")
        .await
        .expect("保存应成功");
    // 内容未变化的保存不追加版本
    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "木板", 15.0), "张工")
        .await
        .expect("保存应成功");

    let versions = app
        .version_api
        .list_versions(&materials_id, "materials")
        .expect("列表应成功");
    assert_eq!(versions.len(), 2);
    // 倒序: 最新在前, 版本号严格递增
    assert_eq!(versions[0].version_no, 2);
    assert_eq!(versions[1].version_no, 1);
    assert_eq!(versions[0].label.as_deref(), Some("内容保存"));
}

#[tokio::test]
async fn test_budget_sync_version_links_materials_version() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, budget_id, _) = test_helpers::seed_enquiry_tasks(&app, "E-41");

    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "木板", 10.0), "张工")
        .await
        .expect("保存应成功");
    approve_all(&app, &materials_id).await;

    let versions = app
        .version_api
        .list_versions(&budget_id, "budget")
        .expect("列表应成功");
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].label.as_deref(), Some("预算同步"));
    // 关联到触发同步的物料版本
    assert_eq!(versions[0].linked_materials_version, Some(1));

    // 快照负载可还原为预算单据
    let snapshot: expo_production_erp::domain::budget::BudgetDocument =
        serde_json::from_str(&versions[0].payload_json).expect("快照应可解析");
    assert_eq!(snapshot.materials.len(), 1);
}

#[tokio::test]
async fn test_get_version_and_invalid_kind() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, _, _) = test_helpers::seed_enquiry_tasks(&app, "E-42");

    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "木板", 10.0), "张工")
        .await
        .expect("保存应成功");

    let version = app
        .version_api
        .get_version(&materials_id, "materials", 1)
        .expect("读取应成功");
    assert_eq!(version.version_no, 1);

    let err = app
        .version_api
        .get_version(&materials_id, "materials", 99)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = app
        .version_api
        .list_versions(&materials_id, "invoice")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[tokio::test]
async fn test_rollback_goes_through_save_pipeline() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, _, _) = test_helpers::seed_enquiry_tasks(&app, "E-43");

    // v1: qty 10; v2: qty 15
    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "木板", 10.0), "张工")
        .await
        .expect("保存应成功");
    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "木板", 15.0), "张工")
        .await
        .expect("保存应成功");
    approve_all(&app, &materials_id).await;

    // 回滚到 v1: 相对当前内容是变化 → 签核重置, 追加 v3
    let outcome = app
        .version_api
        .rollback_materials(&materials_id, 1, "张工")
        .await
        .expect("回滚应成功");
    assert!(outcome.content_changed);
    assert!(outcome.approvals_reset);

    let doc = app.materials_api.get_materials(&materials_id).expect("读取应成功");
    assert_eq!(doc.elements[0].materials[0].quantity, 10.0);
    assert!(!doc.approval_status.all_approved);

    let versions = app
        .version_api
        .list_versions(&materials_id, "materials")
        .expect("列表应成功");
    // v1, v2, v3(回滚产生) —— 历史只追加
    assert_eq!(versions.len(), 3);
    assert_eq!(versions[0].version_no, 3);
}

#[tokio::test]
async fn test_rollback_missing_version_is_not_found() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, _, _) = test_helpers::seed_enquiry_tasks(&app, "E-44");

    let err = app
        .version_api
        .rollback_materials(&materials_id, 7, "张工")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}
