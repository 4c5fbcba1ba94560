//! colony-core
//!
//! Task lifecycle engine of a colony-management agent in a tick-based simulation.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, unit, body, decision, config, errors）
//! - **ports**: 抽象化レイヤー（World, Discovery, Clock, IdGenerator）
//! - **store**: タスクの正本（TaskRecord, TaskState, TaskStore, SweepPolicy）
//! - **app**: アプリケーションロジック（matcher, binding, behavior, producer, colony, builder）
//! - **impls**: 実装（GridWorld, RoomScanner）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod store;
