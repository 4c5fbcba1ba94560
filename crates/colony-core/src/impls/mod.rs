//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **GridWorld**: 1 部屋ぶんのインメモリ World（テスト・デモ用）
//! - **RoomScanner**: デフォルトの Discovery
//!
//! # 本番用実装
//! 実際のゲームにつなぐ World は別クレートに置く想定。

pub mod grid_world;
pub mod room_scanner;

// 主要な型を再エクスポート
pub use self::grid_world::{GridWorld, Pos};
pub use self::room_scanner::RoomScanner;
