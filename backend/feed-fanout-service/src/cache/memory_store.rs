//! In-process feed store

use super::store::FeedStore;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
struct State {
    lists: HashMap<String, VecDeque<String>>,
    scalars: HashMap<String, i64>,
}

/// Feed store kept in process memory, for tests and local runs without Redis
#[derive(Default)]
pub struct MemoryFeedStore {
    state: Mutex<State>,
}

impl MemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    async fn push_front_unique(&self, key: &str, value: &str, max_len: usize) -> Result<()> {
        let mut state = self.state.lock();
        let list = state.lists.entry(key.to_string()).or_default();

        list.retain(|existing| existing != value);
        list.push_front(value.to_string());
        list.truncate(max_len);
        Ok(())
    }

    async fn remove_all(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock();

        if let Some(list) = state.lists.get_mut(key) {
            list.retain(|existing| existing != value);
            if list.is_empty() {
                state.lists.remove(key);
            }
        }
        Ok(())
    }

    async fn range_all(&self, key: &str) -> Result<Vec<String>> {
        let state = self.state.lock();
        Ok(state
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.state.lock().scalars.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.state.lock().scalars.get(key).copied())
    }
}
