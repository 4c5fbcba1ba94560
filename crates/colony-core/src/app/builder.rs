//! ColonyBuilder - Colony の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::collections::BTreeMap;

use super::colony::Colony;
use super::matcher::{Matcher, TwoTierMatcher};
use super::producer::ProducerDispatch;
use crate::domain::ColonyConfig;
use crate::impls::RoomScanner;
use crate::ports::{Discovery, IdGenerator, SystemClock, UlidGenerator};
use crate::store::{SweepPolicy, TaskStore};

/// ColonyBuilder は Colony を構築
///
/// # 使用例
/// ```ignore
/// let colony = ColonyBuilder::new()
///     .config(ColonyConfig::from_json(&raw)?)
///     .discovery(RoomScanner)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に設定値をすべて検証
/// - 問題があれば全件まとめて BuildError で返す（最初の 1 件で止めない）
pub struct ColonyBuilder {
    config: ColonyConfig,
    discovery: Box<dyn Discovery>,
    matcher: Box<dyn Matcher>,
    ids: Box<dyn IdGenerator>,
}

/// BuildError は Colony 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid config: {0:?}. Fix these settings before starting the colony.")]
    InvalidConfig(Vec<String>),
}

impl ColonyBuilder {
    /// 新しい ColonyBuilder を作成（RoomScanner / TwoTierMatcher / ULID）
    pub fn new() -> Self {
        Self {
            config: ColonyConfig::default(),
            discovery: Box::new(RoomScanner),
            matcher: Box::new(TwoTierMatcher),
            ids: Box::new(UlidGenerator::new(SystemClock)),
        }
    }

    /// 設定を差し替え
    pub fn config(mut self, config: ColonyConfig) -> Self {
        self.config = config;
        self
    }

    /// Discovery を差し替え
    ///
    /// # Example
    /// ```ignore
    /// builder.discovery(NoDiscovery); // タスクは submit() で手動投入
    /// ```
    pub fn discovery(mut self, discovery: impl Discovery + 'static) -> Self {
        self.discovery = Box::new(discovery);
        self
    }

    /// Matcher を差し替え
    pub fn matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// IdGenerator を差し替え（テストで FixedClock を使う場合など）
    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// ColonyBuilder を構築して Colony を生成
    ///
    /// # 検証
    /// - 各周期 > 0、パーツコスト > 0、max_body_parts > 0、進捗上限 > 0
    /// - 不足があれば BuildError::InvalidConfig を返す
    pub fn build(self) -> Result<Colony, BuildError> {
        let problems = self.config.problems();
        if !problems.is_empty() {
            return Err(BuildError::InvalidConfig(problems));
        }

        let store = TaskStore::new(
            self.ids,
            self.config.progress_limits,
            self.config.decision_log_limit,
        );
        Ok(Colony {
            producer: ProducerDispatch::from_config(&self.config),
            policy: SweepPolicy::from_config(&self.config),
            config: self.config,
            store,
            units: BTreeMap::new(),
            discovery: self.discovery,
            matcher: self.matcher,
            tick: 0,
        })
    }
}

impl Default for ColonyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
