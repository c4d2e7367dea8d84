//! Routing from target formats to conversion adapters.

use convertforge_av::{
    AudioAdapter, ConversionAdapter, DocumentAdapter, ImageAdapter, TranscodeEngine, VideoAdapter,
};
use convertforge_common::TargetFormat;

/// The adapters available to a queue, tried in order.
pub struct AdapterSet {
    adapters: Vec<Box<dyn ConversionAdapter>>,
}

impl AdapterSet {
    /// Built-in adapters. Audio and video use `engine` for genuine
    /// transcodes when one is given.
    pub fn new(engine: Option<TranscodeEngine>) -> Self {
        let (audio, video) = match engine {
            Some(engine) => (
                AudioAdapter::with_engine(engine.clone()),
                VideoAdapter::with_engine(engine),
            ),
            None => (AudioAdapter::new(), VideoAdapter::new()),
        };

        Self {
            adapters: vec![
                Box::new(ImageAdapter::new()),
                Box::new(DocumentAdapter::new()),
                Box::new(audio),
                Box::new(video),
            ],
        }
    }

    /// An empty set, for callers supplying their own adapters.
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    pub fn with_adapter(mut self, adapter: Box<dyn ConversionAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// First adapter that can produce `target`.
    pub fn for_target(&self, target: TargetFormat) -> Option<&dyn ConversionAdapter> {
        self.adapters
            .iter()
            .find(|a| a.accepts(target))
            .map(|a| a.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}

impl Default for AdapterSet {
    fn default() -> Self {
        Self::new(None)
    }
}
