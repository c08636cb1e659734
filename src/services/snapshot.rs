//! 快照存储：按命名槽位整值持久化应用状态
//!
//! 每个逻辑键独立成槽，单个槽位损坏不影响其余槽位。
//! 外部变更（如另一个标签页写同一个键）通过 `apply_external`
//! 整值替换内存副本，不做合并。

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Default)]
pub struct SnapshotStore {
    slots: FxHashMap<String, String>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取并反序列化一个槽位；槽位缺失或损坏返回 None（损坏会记录 warn）
    pub fn load_slot<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.slots.get(key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt snapshot slot, falling back to default");
                None
            }
        }
    }

    /// 同步整值写入一个槽位
    pub fn store_slot<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => {
                self.slots.insert(key.to_string(), raw);
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize snapshot slot");
            }
        }
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.slots.get(key).map(|s| s.as_str())
    }

    /// 外部变更通知：整值替换（`None` 表示键被清除），不做合并
    pub fn apply_external(&mut self, key: &str, raw: Option<String>) {
        match raw {
            Some(value) => {
                self.slots.insert(key.to_string(), value);
            }
            None => {
                self.slots.remove(key);
            }
        }
    }
}
