// ==========================================
// 物料→预算同步集成测试
// ==========================================
// 覆盖: 全签核门控 / 投影过滤 / 溯源信息 /
//       单价保留 / 管线级幂等
// ==========================================

mod helpers;
mod test_helpers;

use expo_production_erp::api::SaveBudgetRequest;
use helpers::test_data_builder::{save_request, single_material_request, ElementBuilder, MaterialBuilder};

/// 三部门全签核
async fn approve_all(app: &expo_production_erp::app::AppState, task_id: &str) {
    for dept in ["design", "production", "finance"] {
        app.materials_api
            .approve_department(task_id, dept, None, "审批人")
            .await
            .expect("签核应成功");
    }
}

#[tokio::test]
async fn test_partial_approval_does_not_sync() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, budget_id, _) = test_helpers::seed_enquiry_tasks(&app, "E-10");

    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "木板", 10.0), "张工")
        .await
        .expect("保存应成功");

    app.materials_api
        .approve_department(&materials_id, "design", None, "李设计")
        .await
        .expect("签核应成功");
    app.materials_api
        .approve_department(&materials_id, "production", None, "王制作")
        .await
        .expect("签核应成功");

    // 未达成全签核 → 预算不动
    let budget = app.budget_api.get_budget(&budget_id).expect("读取应成功");
    assert!(budget.materials.is_empty());
    assert!(budget.imported_at.is_none());
}

#[tokio::test]
async fn test_full_approval_populates_budget_with_zero_prices() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, budget_id, _) = test_helpers::seed_enquiry_tasks(&app, "E-11");

    let request = save_request(vec![
        ElementBuilder::new("stage", "主舞台")
            .material(MaterialBuilder::new("木板").unit("块").quantity(10.0).build())
            .material(MaterialBuilder::new("补充灯架").additional().build()) // 不进预算
            .material(MaterialBuilder::new("备用板").excluded().build()) // 不进预算
            .build(),
        ElementBuilder::new("booth", "接待台").excluded()
            .material(MaterialBuilder::new("亚克力板").build())
            .build(), // 整个元素未计入
    ]);

    app.materials_api
        .save_materials(&materials_id, request, "张工")
        .await
        .expect("保存应成功");
    approve_all(&app, &materials_id).await;

    let budget = app.budget_api.get_budget(&budget_id).expect("读取应成功");
    assert_eq!(budget.materials.len(), 1);
    assert_eq!(budget.materials[0].name, "主舞台");
    assert_eq!(budget.materials[0].materials.len(), 1);

    let line = &budget.materials[0].materials[0];
    assert_eq!(line.description, "木板");
    assert_eq!(line.quantity, 10.0);
    assert_eq!(line.unit_price, 0.0);
    assert_eq!(line.total_price, 0.0);

    // 溯源信息
    assert!(budget.imported_at.is_some());
    assert_eq!(budget.imported_from_task.as_deref(), Some(materials_id.as_str()));
    assert!(!budget.manually_modified);
    assert_eq!(budget.import_metadata.element_count, 1);
    assert_eq!(budget.import_metadata.material_count, 1);
}

#[tokio::test]
async fn test_price_preserved_across_resync() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, budget_id, _) = test_helpers::seed_enquiry_tasks(&app, "E-12");

    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "Banner", 2.0), "张工")
        .await
        .expect("保存应成功");
    approve_all(&app, &materials_id).await;

    // 预算人员录入单价 500
    let mut budget = app.budget_api.get_budget(&budget_id).expect("读取应成功");
    budget.materials[0].materials[0].unit_price = 500.0;
    app.budget_api
        .save_budget(
            &budget_id,
            SaveBudgetRequest {
                materials: Some(budget.materials),
                labour: vec![],
                expenses: vec![],
                logistics: vec![],
            },
            "钱预算",
        )
        .expect("预算保存应成功");

    let budget = app.budget_api.get_budget(&budget_id).expect("读取应成功");
    assert_eq!(budget.materials[0].materials[0].total_price, 1000.0);
    assert!(budget.manually_modified);

    // 数量 2 → 5, 重置后重新全签核
    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "Banner", 5.0), "张工")
        .await
        .expect("保存应成功");
    approve_all(&app, &materials_id).await;

    // 单价保留, 行合计按新数量重算
    let budget = app.budget_api.get_budget(&budget_id).expect("读取应成功");
    let line = &budget.materials[0].materials[0];
    assert_eq!(line.quantity, 5.0);
    assert_eq!(line.unit_price, 500.0);
    assert_eq!(line.total_price, 2500.0);
}

#[tokio::test]
async fn test_resync_with_same_content_is_byte_identical() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, budget_id, _) = test_helpers::seed_enquiry_tasks(&app, "E-13");

    app.materials_api
        .save_materials(&materials_id, single_material_request("主舞台", "木板", 10.0), "张工")
        .await
        .expect("保存应成功");
    approve_all(&app, &materials_id).await;

    let first = app.budget_api.get_budget(&budget_id).expect("读取应成功");

    // 前端的编辑循环: 读取 → 改数量 → 回存 (id 随负载往返, 保持稳定)
    let resave = |app: &expo_production_erp::app::AppState, qty: f64| {
        let mut doc = app.materials_api.get_materials(&materials_id).expect("读取应成功");
        doc.elements[0].materials[0].quantity = qty;
        expo_production_erp::api::SaveMaterialsRequest {
            project_info: doc.project_info,
            project_elements: doc.elements,
            available_elements: doc.available_elements,
        }
    };

    // 内容改动后复原, 再次走完整签核 → 第二次同步
    let request = resave(&app, 12.0);
    app.materials_api
        .save_materials(&materials_id, request, "张工")
        .await
        .expect("保存应成功");
    approve_all(&app, &materials_id).await;
    let request = resave(&app, 10.0);
    app.materials_api
        .save_materials(&materials_id, request, "张工")
        .await
        .expect("保存应成功");
    approve_all(&app, &materials_id).await;

    let third = app.budget_api.get_budget(&budget_id).expect("读取应成功");

    // 物料区字节级一致
    assert_eq!(
        serde_json::to_string(&first.materials).unwrap(),
        serde_json::to_string(&third.materials).unwrap()
    );
}

#[tokio::test]
async fn test_approval_without_budget_task_still_succeeds() {
    let (_dir, app) = test_helpers::create_test_app();
    // 只建物料任务, 询单下没有预算任务
    test_helpers::seed_task(
        &app,
        "E-14-materials",
        "E-14",
        expo_production_erp::domain::types::TaskType::Materials,
    );

    app.materials_api
        .save_materials("E-14-materials", single_material_request("主舞台", "木板", 10.0), "张工")
        .await
        .expect("保存应成功");

    // 签核本身成立, 同步跳过
    for dept in ["design", "production", "finance"] {
        app.materials_api
            .approve_department("E-14-materials", dept, None, "审批人")
            .await
            .expect("签核应成功");
    }

    let doc = app
        .materials_api
        .get_materials("E-14-materials")
        .expect("读取应成功");
    assert!(doc.approval_status.all_approved);
}
