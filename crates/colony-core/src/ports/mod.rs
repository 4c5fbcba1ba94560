//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! Colony の外にあるもの（シミュレーション世界、タスク発見、時刻、ID 生成）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod discovery;
pub mod id_generator;
pub mod world;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::discovery::{Discovery, NoDiscovery};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::world::{ActionOutcome, EntityFilter, EntityKind, EntityView, World};
