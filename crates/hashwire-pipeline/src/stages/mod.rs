//! The five content stages and the set an orchestrator runs.

mod publisher;
mod quality;
mod repurposer;
mod researcher;
mod writer;

pub use publisher::{Publisher, PACKAGES_COLLECTION};
pub use quality::{QualityChecker, DEFAULT_MIN_WORDS};
pub use repurposer::{trim_to, Repurposer};
pub use researcher::Researcher;
pub use writer::Writer;

use std::sync::Arc;

use content_store::ContentStore;
use hashwire_core::TextGenerator;

use crate::package::{ContentPackage, Draft, PlatformVariant, ResearchBrief, ReviewedDraft};
use crate::stage::Stage;
use crate::topic::Topic;

/// Stages applied to every topic, in order. The publisher is optional.
#[derive(Clone)]
pub struct StageSet {
    pub researcher: Arc<dyn Stage<Topic, ResearchBrief>>,
    pub writer: Arc<dyn Stage<ResearchBrief, Draft>>,
    pub quality: Arc<dyn Stage<Draft, ReviewedDraft>>,
    pub repurposer: Arc<dyn Stage<ReviewedDraft, Vec<PlatformVariant>>>,
    pub publisher: Option<Arc<dyn Stage<ContentPackage, ContentPackage>>>,
}

impl StageSet {
    /// Default stages around one text generator, without publishing.
    pub fn standard(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            researcher: Arc::new(Researcher::new()),
            writer: Arc::new(Writer::new(generator)),
            quality: Arc::new(QualityChecker::new()),
            repurposer: Arc::new(Repurposer::new()),
            publisher: None,
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn Stage<ResearchBrief, Draft>>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_quality(mut self, quality: Arc<dyn Stage<Draft, ReviewedDraft>>) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.publisher = Some(Arc::new(Publisher::new(store)));
        self
    }
}
