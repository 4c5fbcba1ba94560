//! App - アプリケーション層
//!
//! このモジュールは、store と ports を組み合わせてコロニーの 1 tick を実装します。
//!
//! # 主要コンポーネント
//! - **ColonyBuilder**: Colony の構築とワイヤリング（起動時検証）
//! - **Colony**: tick ドライバ（reap → scan → validate → produce → step → purge/sweep）
//! - **Matcher**: 空きタスクの順位付け
//! - **binding**: ユニット 1 体ぶんのタスク束縛ファサード
//! - **behavior**: role ごとの多段ステートマシン
//! - **ProducerDispatch**: 生産施設ごとの生産判断
//! - **intake / validate**: タスクの取り込みと定期検証

pub mod behavior;
pub mod binding;
pub mod builder;
pub mod colony;
pub mod intake;
pub mod matcher;
pub mod producer;
pub mod status;
pub mod validate;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ColonyBuilder};
pub use self::colony::{Colony, ColonySnapshot};
pub use self::matcher::{Matcher, TwoTierMatcher};
pub use self::producer::{Production, ProducerDispatch};
pub use self::status::{ColonyStatus, TaskCounts, TickReport, ValidationReport};
