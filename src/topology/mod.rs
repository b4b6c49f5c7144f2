mod attributes;
mod derive;
mod load;
mod model;

pub use attributes::{
    ASSET_ID_KEY, AttrValue, AttributeError, Attributes, BANDWIDTH_KEY, CONNECTION_BLOB_KEY,
    CONNECTION_TYPE_KEY, DEVICE_BLOB_KEY, ID_KEY, IP_ADDRESS_KEY, IS_ONLINE_KEY, LABEL_KEY,
    LATENCY_KEY, SOURCE_KEY, SYSTEM_VERSION_KEY, TARGET_KEY, X_POSITION_KEY, Y_POSITION_KEY,
    is_locked_key, is_required_key,
};
pub use derive::{
    DEFAULT_LINK_CAPACITY_MBPS, DerivedView, DeviceClass, HeatLevel, LinkStatus, edge_style,
    node_style, recompute,
};
pub use load::snapshot_from_records;
pub use model::{ConnectionKind, Edge, Node, Position, ResolutionError, Snapshot};

#[cfg(test)]
pub use attributes::DEVICE_TYPE_KEY;
