//! HTTP API handlers for segmark-server

pub mod batch;
pub mod export;
pub mod health;
pub mod segmentation;

pub use batch::batch_routes;
pub use export::export_routes;
pub use health::health_routes;
pub use segmentation::segmentation_routes;
