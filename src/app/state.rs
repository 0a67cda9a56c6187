// ==========================================
// 会展搭建项目管理系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 装配: 共享连接 → Repository 层 → Engine 层 → API 层
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{AdditionApi, BudgetApi, MaterialsApi, QuoteApi, VersionApi};
use crate::config::ConfigManager;
use crate::db;
use crate::engine::addition_reconciler::AdditionReconciler;
use crate::engine::events::{LoggingEventPublisher, ReconcileEventPublisher};
use crate::repository::{
    ActionLogRepository, AdditionRepository, BudgetRepository, MaterialsRepository,
    QuoteRepository, TaskRepository, VersionRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 物料清单API
    pub materials_api: Arc<MaterialsApi>,

    /// 预算API
    pub budget_api: Arc<BudgetApi>,

    /// 预算补充项API
    pub addition_api: Arc<AdditionApi>,

    /// 报价API
    pub quote_api: Arc<QuoteApi>,

    /// 单据版本API
    pub version_api: Arc<VersionApi>,

    /// 任务仓储（外部工作流模块的对接口）
    pub task_repo: Arc<TaskRepository>,

    /// 操作日志仓储（审计追踪查询）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 事件发布器（通知系统对接口）
    pub event_publisher: Option<Arc<dyn ReconcileEventPublisher>>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 该方法会:
    /// 1. 打开共享数据库连接并应用统一 PRAGMA
    /// 2. 幂等初始化表结构
    /// 3. 装配 Repository / Engine / API 层
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        let conn = db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        db::init_schema(&conn).map_err(|e| format!("表结构初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================

        let task_repo = Arc::new(TaskRepository::new(conn.clone()));
        let materials_repo = Arc::new(MaterialsRepository::new(conn.clone()));
        let budget_repo = Arc::new(BudgetRepository::new(conn.clone()));
        let addition_repo = Arc::new(AdditionRepository::new(conn.clone()));
        let quote_repo = Arc::new(QuoteRepository::new(conn.clone()));
        let version_repo = Arc::new(VersionRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================

        // 配置管理器（报价默认加成/税率的注入口）
        let config_manager = Arc::new(ConfigManager::new(conn.clone()));

        // 补充项对账引擎
        let reconciler = Arc::new(AdditionReconciler::new(addition_repo.clone()));

        // 事件发布器: 默认仅写日志, 接入通知系统时替换
        let event_publisher: Option<Arc<dyn ReconcileEventPublisher>> =
            Some(Arc::new(LoggingEventPublisher));

        // ==========================================
        // 初始化API层
        // ==========================================

        let materials_api = Arc::new(MaterialsApi::new(
            conn.clone(),
            task_repo.clone(),
            materials_repo.clone(),
            budget_repo.clone(),
            version_repo.clone(),
            action_log_repo.clone(),
            reconciler.clone(),
            event_publisher.clone(),
        ));

        let budget_api = Arc::new(BudgetApi::new(
            conn.clone(),
            task_repo.clone(),
            budget_repo.clone(),
            version_repo.clone(),
            action_log_repo.clone(),
        ));

        let addition_api = Arc::new(AdditionApi::new(
            conn.clone(),
            task_repo.clone(),
            materials_repo.clone(),
            budget_repo.clone(),
            addition_repo.clone(),
            action_log_repo.clone(),
            reconciler,
            event_publisher.clone(),
        ));

        let quote_api = Arc::new(QuoteApi::new(
            task_repo.clone(),
            budget_repo.clone(),
            quote_repo,
            action_log_repo.clone(),
            config_manager,
            event_publisher.clone(),
        ));

        let version_api = Arc::new(VersionApi::new(
            task_repo.clone(),
            version_repo,
            action_log_repo.clone(),
            materials_api.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            materials_api,
            budget_api,
            addition_api,
            quote_api,
            version_api,
            task_repo,
            action_log_repo,
            event_publisher,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// 优先级: 环境变量 EXPO_ERP_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("EXPO_ERP_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./expo_production_erp.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录, 避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("expo-production-erp-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("expo-production-erp");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("expo_production_erp.db");
    }

    path.to_string_lossy().to_string()
}
