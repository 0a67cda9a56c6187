// ==========================================
// 报价导入与设置集成测试
// ==========================================
// 覆盖: 默认设置 / 从预算整体重建 / 分类加成 /
//       人工零加成 / 折扣与增值税 / 缺预算时报 NotFound
// ==========================================

mod helpers;
mod test_helpers;

use expo_production_erp::api::{ApiError, SaveBudgetRequest, SaveQuoteRequest};
use expo_production_erp::domain::budget::BudgetLine;
use expo_production_erp::domain::quote::MarginConfig;
use helpers::test_data_builder::single_material_request;

async fn approve_all(app: &expo_production_erp::app::AppState, task_id: &str) {
    for dept in ["design", "production", "finance"] {
        app.materials_api
            .approve_department(task_id, dept, None, "审批人")
            .await
            .expect("签核应成功");
    }
}

/// 物料走完签核, 预算录入单价并补人工/物流行
async fn prepare_budget(
    app: &expo_production_erp::app::AppState,
    materials_id: &str,
    budget_id: &str,
) {
    app.materials_api
        .save_materials(materials_id, single_material_request("主舞台", "木板", 10.0), "张工")
        .await
        .expect("保存应成功");
    approve_all(app, materials_id).await;

    let mut budget = app.budget_api.get_budget(budget_id).expect("读取应成功");
    budget.materials[0].materials[0].unit_price = 100.0; // 基数 1000
    app.budget_api
        .save_budget(
            budget_id,
            SaveBudgetRequest {
                materials: Some(budget.materials),
                labour: vec![BudgetLine {
                    description: "搭建工".to_string(),
                    unit: "人天".to_string(),
                    quantity: 6.0,
                    unit_price: 400.0,
                    total_price: 0.0,
                    notes: None,
                }],
                expenses: vec![],
                logistics: vec![BudgetLine {
                    description: "展馆运输".to_string(),
                    unit: "车次".to_string(),
                    quantity: 2.0,
                    unit_price: 500.0,
                    total_price: 0.0,
                    notes: None,
                }],
            },
            "钱预算",
        )
        .expect("预算保存应成功");
}

#[tokio::test]
async fn test_get_quote_defaults_from_config() {
    let (_dir, app) = test_helpers::create_test_app();
    let (_, _, quote_id) = test_helpers::seed_enquiry_tasks(&app, "E-30");

    let quote = app.quote_api.get_quote(&quote_id).expect("读取应成功");
    assert_eq!(quote.margins.materials, 20.0);
    assert_eq!(quote.margins.labour, 15.0);
    assert_eq!(quote.margins.expenses, 10.0);
    assert_eq!(quote.margins.logistics, 15.0);
    assert_eq!(quote.vat_rate, 13.0);
    assert!(!quote.vat_enabled);
    assert!(quote.generated_at.is_none());
}

#[tokio::test]
async fn test_import_without_budget_document_is_not_found() {
    let (_dir, app) = test_helpers::create_test_app();
    let (_, _, quote_id) = test_helpers::seed_enquiry_tasks(&app, "E-31");

    let err = app.quote_api.import_budget(&quote_id, "孙销售").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_import_budget_applies_category_margins() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, budget_id, quote_id) = test_helpers::seed_enquiry_tasks(&app, "E-32");
    prepare_budget(&app, &materials_id, &budget_id).await;

    let quote = app.quote_api.import_budget(&quote_id, "孙销售").await.expect("导入应成功");

    // 材料: 基数 1000, 20% → 加成 200, 对客 1200
    assert_eq!(quote.materials.lines.len(), 1);
    assert_eq!(quote.materials.lines[0].base_amount, 1000.0);
    assert_eq!(quote.materials.lines[0].margin_amount, 200.0);
    assert_eq!(quote.materials.lines[0].final_price, 1200.0);

    // 人工: 基数 2400, 定价零加成
    assert_eq!(quote.labour.lines[0].base_amount, 2400.0);
    assert_eq!(quote.labour.lines[0].margin_amount, 0.0);
    assert_eq!(quote.labour.lines[0].final_price, 2400.0);

    // 物流: 基数 1000, 15% → 对客 1150
    assert_eq!(quote.logistics.lines[0].final_price, 1150.0);

    // 汇总: 1200 + 2400 + 1150 = 4750
    assert_eq!(quote.totals.subtotal, 4750.0);
    assert_eq!(quote.totals.grand_total, 4750.0);
    assert_eq!(quote.generated_from_task.as_deref(), Some(budget_id.as_str()));
    assert!(quote.generated_at.is_some());
}

#[tokio::test]
async fn test_save_quote_settings_rebuilds_totals() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, budget_id, quote_id) = test_helpers::seed_enquiry_tasks(&app, "E-33");
    prepare_budget(&app, &materials_id, &budget_id).await;
    app.quote_api.import_budget(&quote_id, "孙销售").await.expect("导入应成功");

    // 调高材料加成并开启折扣+增值税
    let quote = app
        .quote_api
        .save_quote(
            &quote_id,
            SaveQuoteRequest {
                margins: Some(MarginConfig {
                    materials: 30.0,
                    labour: 15.0,
                    expenses: 10.0,
                    logistics: 15.0,
                }),
                discount: Some(250.0),
                vat_enabled: Some(true),
                vat_rate: None, // 保留默认 13
            },
            "孙销售",
        )
        .expect("保存应成功");

    // 材料对客 1300; subtotal = 1300 + 2400 + 1150 = 4850
    assert_eq!(quote.materials.lines[0].final_price, 1300.0);
    assert_eq!(quote.totals.subtotal, 4850.0);
    assert_eq!(quote.totals.total_after_discount, 4600.0);
    // 4600 * 13% = 598
    assert_eq!(quote.totals.vat_amount, 598.0);
    assert_eq!(quote.totals.grand_total, 5198.0);
}

#[tokio::test]
async fn test_save_quote_rejects_negative_settings() {
    let (_dir, app) = test_helpers::create_test_app();
    let (_, _, quote_id) = test_helpers::seed_enquiry_tasks(&app, "E-34");

    let err = app
        .quote_api
        .save_quote(
            &quote_id,
            SaveQuoteRequest {
                margins: None,
                discount: Some(-10.0),
                vat_enabled: None,
                vat_rate: None,
            },
            "孙销售",
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError { .. }));
}

#[tokio::test]
async fn test_reimport_reflects_budget_changes() {
    let (_dir, app) = test_helpers::create_test_app();
    let (materials_id, budget_id, quote_id) = test_helpers::seed_enquiry_tasks(&app, "E-35");
    prepare_budget(&app, &materials_id, &budget_id).await;
    app.quote_api.import_budget(&quote_id, "孙销售").await.expect("导入应成功");

    // 预算单价翻倍后重新导入 → 整体重建
    let mut budget = app.budget_api.get_budget(&budget_id).expect("读取应成功");
    budget.materials[0].materials[0].unit_price = 200.0;
    let labour = budget.labour.clone();
    let logistics = budget.logistics.clone();
    app.budget_api
        .save_budget(
            &budget_id,
            SaveBudgetRequest {
                materials: Some(budget.materials),
                labour,
                expenses: vec![],
                logistics,
            },
            "钱预算",
        )
        .expect("预算保存应成功");

    let quote = app.quote_api.import_budget(&quote_id, "孙销售").await.expect("导入应成功");
    assert_eq!(quote.materials.lines[0].base_amount, 2000.0);
    assert_eq!(quote.materials.lines[0].final_price, 2400.0);
}
