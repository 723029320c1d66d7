//! サイトアダプター
//!
//! - ebike_connect: Bosch eBike Connect から累計距離・標高を取得
//! - radelt: radelt.at に走行を登録

pub mod ebike_connect;
pub mod radelt;

pub use ebike_connect::EbikeConnect;
pub use radelt::Radelt;

use crate::registry::AdapterModule;

/// 組み込みモジュール表 (設定上の名前の先頭セグメント → 登録関数)
pub static MODULES: &[AdapterModule] = &[
    AdapterModule::new("ebike_connect", ebike_connect::register),
    AdapterModule::new("bosch", ebike_connect::register),
    AdapterModule::new("radelt", radelt::register),
];
