// ==========================================
// 会展搭建项目管理系统 - 报价领域模型
// ==========================================
// 报价是预算的派生视图: 按分类加成 + 折扣 + 增值税 的汇总树
// 导入时整体重新生成, 不做增量修补
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// MarginConfig - 分类加成比例 (百分数)
// ==========================================
// 人工行定价不加成 (final = base), labour 字段仅保留配置口径,
// 用于整体毛利统计的分母仍计入人工基数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginConfig {
    #[serde(alias = "materialsMargin")]
    pub materials: f64,
    #[serde(alias = "labourMargin")]
    pub labour: f64,
    #[serde(alias = "expensesMargin")]
    pub expenses: f64,
    #[serde(alias = "logisticsMargin")]
    pub logistics: f64,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            materials: 20.0,
            labour: 15.0,
            expenses: 10.0,
            logistics: 15.0,
        }
    }
}

// ==========================================
// QuoteLine - 报价行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub description: String,

    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub quantity: f64,

    /// 预算基数（行合计）
    #[serde(alias = "baseAmount")]
    pub base_amount: f64,

    /// 适用加成比例（百分数）
    #[serde(alias = "marginPercentage")]
    pub margin_percentage: f64,

    /// 加成金额 = base * margin%
    #[serde(alias = "marginAmount")]
    pub margin_amount: f64,

    /// 对客价格 = base * (1 + margin%)
    #[serde(alias = "finalPrice")]
    pub final_price: f64,
}

// ==========================================
// QuoteSection - 分类汇总区
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSection {
    #[serde(default)]
    pub lines: Vec<QuoteLine>,

    /// 分类基数合计（四舍五入到 2 位, 在汇总点完成）
    #[serde(alias = "baseTotal")]
    pub base_total: f64,

    #[serde(alias = "marginTotal")]
    pub margin_total: f64,

    #[serde(alias = "finalTotal")]
    pub final_total: f64,
}

// ==========================================
// QuoteTotals - 汇总树
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub subtotal: f64,                  // Σ 各分类对客合计
    pub discount: f64,                  // 折扣金额
    #[serde(alias = "totalAfterDiscount")]
    pub total_after_discount: f64,      // subtotal - discount
    #[serde(alias = "vatAmount")]
    pub vat_amount: f64,                // 增值税额（未启用时为 0）
    #[serde(alias = "grandTotal")]
    pub grand_total: f64,               // total_after_discount + vat_amount

    #[serde(alias = "totalBase")]
    pub total_base: f64,                // Σ 全部基数
    #[serde(alias = "totalMargin")]
    pub total_margin: f64,              // Σ 全部加成
    /// 整体毛利率 (%), 基数为 0 时取 0
    #[serde(alias = "overallMarginPercentage")]
    pub overall_margin_percentage: f64,
}

// ==========================================
// QuoteDocument - 报价单据
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteDocument {
    pub task_id: String, // 所属报价任务

    pub margins: MarginConfig,

    #[serde(default)]
    pub discount: f64,

    #[serde(default, alias = "vatEnabled")]
    pub vat_enabled: bool,

    /// 增值税率（百分数, 默认取配置值）
    #[serde(alias = "vatRate")]
    pub vat_rate: f64,

    pub materials: QuoteSection,
    pub labour: QuoteSection,
    pub expenses: QuoteSection,
    pub logistics: QuoteSection,

    pub totals: QuoteTotals,

    // ===== 生成溯源 =====
    #[serde(alias = "generatedFromTask")]
    pub generated_from_task: Option<String>, // 来源预算任务ID
    #[serde(alias = "generatedAt")]
    pub generated_at: Option<DateTime<Utc>>,

    // ===== 审计字段 =====
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl QuoteDocument {
    pub fn empty(task_id: &str, vat_rate: f64) -> Self {
        Self {
            task_id: task_id.to_string(),
            margins: MarginConfig::default(),
            discount: 0.0,
            vat_enabled: false,
            vat_rate,
            materials: QuoteSection::default(),
            labour: QuoteSection::default(),
            expenses: QuoteSection::default(),
            logistics: QuoteSection::default(),
            totals: QuoteTotals::default(),
            generated_from_task: None,
            generated_at: None,
            updated_at: Utc::now(),
            updated_by: None,
        }
    }
}
