pub mod broadcast;
pub mod id;
pub mod retelecast;
pub mod vod_asset;

pub use broadcast::{Broadcast, BroadcastStatus, LatencyPreference, Visibility};
pub use id::{generate_id, BroadcastId, RetelecastId, VodAssetId};
pub use retelecast::{Retelecast, RetelecastStatus};
pub use vod_asset::{VodAsset, VodAssetStatus};
