//! Fan-out / fan-in over a dynamic number of tasks

use crate::avatar::AvatarResult;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::debug;

/// Spawns independent tasks and joins them all, stopping at the first failure.
///
/// Dropping the group aborts the tasks it still owns. Work that must outlive a
/// failed group (shared cache loads) runs on its own task and is unaffected.
pub struct TaskGroup<T> {
    label: &'static str,
    set: JoinSet<AvatarResult<T>>,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new(label: &'static str) -> Self {
        Self { label, set: JoinSet::new() }
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = AvatarResult<T>> + Send + 'static,
    {
        self.set.spawn(task);
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Results in completion order.
    pub async fn join_all(mut self) -> AvatarResult<Vec<T>> {
        let mut results = Vec::with_capacity(self.set.len());

        while let Some(joined) = self.set.join_next().await {
            match joined? {
                Ok(value) => results.push(value),
                Err(error) => {
                    debug!("{} group failed after {} tasks: {}", self.label, results.len(), error);
                    return Err(error);
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::AvatarError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_all_collects_every_result() {
        let mut group = TaskGroup::new("numbers");
        for i in 0..5u32 {
            group.spawn(async move {
                tokio::time::sleep(Duration::from_millis(u64::from(5 - i))).await;
                Ok(i)
            });
        }
        assert_eq!(group.len(), 5);

        let mut results = group.join_all().await.unwrap();
        results.sort_unstable();
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_join_all_propagates_failure() {
        let mut group = TaskGroup::new("mixed");
        group.spawn(async { Ok(1) });
        group.spawn(async {
            Err(AvatarError::Decode { file_id: "h_std_hd_1_2_0".into(), reason: "truncated".into() })
        });

        assert!(matches!(group.join_all().await, Err(AvatarError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_empty_group() {
        let group: TaskGroup<()> = TaskGroup::new("empty");
        assert!(group.is_empty());
        assert!(group.join_all().await.unwrap().is_empty());
    }
}
