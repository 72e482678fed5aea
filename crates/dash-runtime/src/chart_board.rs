//! Chart renderer seam and the slot board that owns live chart instances.

use std::collections::HashMap;
use std::sync::Arc;

use dash_core::error::Result;
use dash_data::charts::{ChartKind, ChartOptions};
use tokio::sync::Mutex;
use tracing::debug;

/// A chart currently on screen.
pub trait ChartInstance: Send {
    fn kind(&self) -> ChartKind;

    /// Tear the chart down and release whatever the renderer allocated.
    fn destroy(self: Box<Self>);
}

/// Turns declarative options into a live chart.
pub trait ChartRenderer: Send + Sync {
    fn create(&self, options: &ChartOptions) -> Result<Box<dyn ChartInstance>>;
}

/// One slot per [`ChartKind`]. Showing a chart destroys the previous
/// instance in its slot before the new one is created, so a slot never holds
/// two instances.
pub struct ChartBoard {
    renderer: Arc<dyn ChartRenderer>,
    slots: Mutex<HashMap<ChartKind, Box<dyn ChartInstance>>>,
}

impl ChartBoard {
    pub fn new(renderer: Arc<dyn ChartRenderer>) -> Self {
        Self {
            renderer,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn show(&self, options: &ChartOptions) -> Result<()> {
        let mut slots = self.slots.lock().await;
        if let Some(previous) = slots.remove(&options.kind) {
            debug!(kind = ?options.kind, "Destroying previous chart");
            previous.destroy();
        }
        let instance = self.renderer.create(options)?;
        slots.insert(options.kind, instance);
        Ok(())
    }

    /// Show each chart in order, stopping at the first failure.
    pub async fn show_all(&self, charts: &[ChartOptions]) -> Result<()> {
        for options in charts {
            self.show(options).await?;
        }
        Ok(())
    }

    /// Destroy every live chart.
    pub async fn clear(&self) {
        let mut slots = self.slots.lock().await;
        for (_, instance) in slots.drain() {
            instance.destroy();
        }
    }

    /// Kinds that currently hold an instance.
    pub async fn active(&self) -> Vec<ChartKind> {
        let slots = self.slots.lock().await;
        ChartKind::ALL
            .into_iter()
            .filter(|k| slots.contains_key(k))
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Lifecycle, RecordingRenderer};
    use super::*;
    use dash_data::aggregator::DashboardViews;

    fn all_options() -> [ChartOptions; 3] {
        ChartOptions::from_views(&DashboardViews::default())
    }

    #[tokio::test]
    async fn test_show_all_creates_one_instance_per_slot() {
        let renderer = Arc::new(RecordingRenderer::default());
        let board = ChartBoard::new(renderer.clone());

        board.show_all(&all_options()).await.unwrap();

        assert_eq!(board.active().await, ChartKind::ALL.to_vec());
        assert_eq!(renderer.log().len(), 3);
    }

    #[tokio::test]
    async fn test_show_tears_down_before_create() {
        let renderer = Arc::new(RecordingRenderer::default());
        let board = ChartBoard::new(renderer.clone());
        let [bar, _, _] = all_options();

        board.show(&bar).await.unwrap();
        board.show(&bar).await.unwrap();

        assert_eq!(
            renderer.log(),
            vec![
                Lifecycle::Created(ChartKind::Bar, bar.title.clone()),
                Lifecycle::Destroyed(ChartKind::Bar),
                Lifecycle::Created(ChartKind::Bar, bar.title.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_create_leaves_slot_empty() {
        let renderer = Arc::new(RecordingRenderer {
            fail_on: Some(ChartKind::Pie),
            ..Default::default()
        });
        let board = ChartBoard::new(renderer.clone());

        let err = board.show_all(&all_options()).await.unwrap_err();
        assert!(err.to_string().starts_with("Chart rendering failed"));
        assert_eq!(board.active().await, vec![ChartKind::Bar]);
    }

    #[tokio::test]
    async fn test_clear_destroys_everything() {
        let renderer = Arc::new(RecordingRenderer::default());
        let board = ChartBoard::new(renderer.clone());
        board.show_all(&all_options()).await.unwrap();

        board.clear().await;

        assert!(board.active().await.is_empty());
        let destroyed = renderer
            .log()
            .into_iter()
            .filter(|e| matches!(e, Lifecycle::Destroyed(_)))
            .count();
        assert_eq!(destroyed, 3);
    }
}
