//! # danci-kmap - 知识地图估计核心库
//!
//! 本 crate 提供在二维语义地图上估计学习者掌握程度的纯 Rust 实现:
//!
//! - **Knowledge Grid** - 固定分辨率网格，每个单元格保存知识估计 K ∈ [0, 1]
//! - **Estimator** - Matérn-3/2 核平滑的观测更新与插值预测
//! - **IRT Model** - 有序难度阈值 + 标准正态 CDF 的答对概率
//! - **Sampler** - 分阶段主动学习选题 (Calibrate / Map / Learn)
//! - **Recommender** - 内容推荐 (TLP)、快照差分与迁移效果滑动平均
//!
//! ## 模块结构
//!
//! - [`kernel`] - Matérn-3/2 核函数
//! - [`irt`] - 标准正态 CDF 与项目反应模型
//! - [`grid`] - 知识网格、单元格映射与快照
//! - [`estimator`] - 观测记录与知识查询
//! - [`sampler`] - 选题策略
//! - [`recommender`] - 内容排序与学习效果度量
//! - [`session`] - 会话上下文与生命周期
//! - [`oracle`] - 投影与内容库边界接口
//! - [`config`] - 配置加载与校验
//! - [`sanitize`] - 数值清洗
//! - [`types`] - 公共类型和常量
//!
//! ## 使用示例
//!
//! ```rust
//! use danci_kmap::{EngineConfig, LearningSession, Position, Question};
//!
//! let mut session = LearningSession::new(EngineConfig::default()).unwrap();
//! let candidates = vec![
//!     Question::new("q1", Position::new(0.2, 0.3), 2, "all").unwrap(),
//!     Question::new("q2", Position::new(0.7, 0.6), 4, "all").unwrap(),
//! ];
//!
//! if let Some(question) = session.select_next(&candidates).unwrap().question() {
//!     let question = question.clone();
//!     session.answer_question(&question, true).unwrap();
//! }
//! let k = session.predict(Position::new(0.2, 0.3)).unwrap();
//! assert!(k.is_some());
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod config;
pub mod error;
pub mod estimator;
pub mod grid;
pub mod irt;
pub mod kernel;
pub mod logging;
pub mod oracle;
pub mod recommender;
pub mod sampler;
pub mod sanitize;
pub mod session;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

pub use types::*;

pub use config::{DomainConfig, EngineConfig, GridConfig, RecommenderConfig, SamplerConfig};
pub use error::{KmapError, Result};
pub use estimator::{Estimator, GridView, RecordOutcome};
pub use grid::{Cell, CellMap, KnowledgeGrid, KnowledgeSummary, Snapshot};
pub use irt::{normal_cdf, IrtModel};
pub use kernel::{matern32, Matern32};
pub use oracle::{ContentLibrary, ContentUnit, ProjectionOracle, UnitKind};
pub use recommender::{
    compute_difference_map, compute_relevance_map, update_running_average, ExposureState,
    RankedContent, Recommender, RunningDifference, TransferEstimate, TransferSource,
};
pub use sampler::{Phase, Sampler, ScoredQuestion, Selection, SelectionMode};
pub use session::LearningSession;
