//! IdGenerator port - TaskId の採番
//!
//! TaskStore は TaskId をキーに BTreeMap で持つので、id の順序 = 作成順になるよう
//! 同一ミリ秒内でも単調増加する ULID を使う。

use std::sync::Mutex;
use std::time::SystemTime;

use ulid::{Generator, Ulid};

use crate::domain::TaskId;
use crate::ports::Clock;

/// IdGenerator は Task ID を生成
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// Clock の時刻から単調増加の ULID を作る
///
/// FixedClock と組み合わせると、タイムスタンプ部分は固定のまま
/// 生成順に並ぶ id が得られる。
pub struct UlidGenerator<C> {
    clock: C,
    monotonic: Mutex<Generator>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            monotonic: Mutex::new(Generator::new()),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let now = self.clock.now();
        let next = self
            .monotonic
            .lock()
            .ok()
            .and_then(|mut generator| generator.generate_from_datetime(SystemTime::from(now)).ok());
        // random part overflowed within one millisecond (or a poisoned lock): plain ULID
        let ulid = next.unwrap_or_else(|| {
            Ulid::from_parts(now.timestamp_millis() as u64, rand::random())
        });
        TaskId::from(ulid)
    }
}
