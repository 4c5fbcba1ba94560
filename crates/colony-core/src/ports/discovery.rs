//! Discovery port - 世界の状態からタスク候補を作る
//!
//! 重複排除は Colony 側（intake）で行うので、Discovery は毎回すべての候補を返してよい。

use crate::domain::TaskDescriptor;
use crate::ports::World;
use crate::store::TaskStore;

/// Discovery は TaskDescriptor を生成
///
/// `store` は読み取り専用（誰がどのタスクを持っているかを見るため）。
pub trait Discovery: Send + Sync {
    fn discover(&self, world: &dyn World, store: &TaskStore) -> Vec<TaskDescriptor>;
}

/// 何も発見しない（タスクを手で投入するテスト用）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscovery;

impl Discovery for NoDiscovery {
    fn discover(&self, _world: &dyn World, _store: &TaskStore) -> Vec<TaskDescriptor> {
        Vec::new()
    }
}
