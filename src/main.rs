// ==========================================
// 会展搭建项目管理系统 - 主入口
// ==========================================
// 核心库以 API 层为边界供传输层集成;
// 该入口用于独立启动与自检 (初始化数据库 + 装配全部 API)
// ==========================================

use expo_production_erp::app::{get_default_db_path, AppState};
use expo_production_erp::logging;

fn main() {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} - 物料/预算/报价协同核心", expo_production_erp::APP_NAME);
    tracing::info!("系统版本: {}", expo_production_erp::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState (建表 + 装配)
    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("AppState初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("AppState初始化成功, 数据库: {}", app_state.get_db_path());
    tracing::info!("当前语言: {}", expo_production_erp::i18n::current_locale());
    tracing::info!("核心库就绪, 等待传输层集成");
}
