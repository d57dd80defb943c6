//! Publisher contracts and the post-publication telemetry loop that feeds
//! engagement back into skill confidence (§4.7, §4.8).

mod metrics_collector;
mod publish_service;
mod publisher;

pub use metrics_collector::{MetricsCollector, MetricsReport, FEEDBACK_TRIGGER_THRESHOLD};
pub use publish_service::{PublishReport, PublishService};
pub use publisher::{Publisher, PublisherRegistry, PublishResult, TikTokPublisher, UploadPostPublisher};
