// Version information for the Fabstir Detect Node

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-sliced-inference-2025-11-02";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Build date
pub const BUILD_DATE: &str = "2025-11-02";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "sliced-inference",
    "multi-image-upload",
    "cross-tile-merge",
    "custom-labels",
];
