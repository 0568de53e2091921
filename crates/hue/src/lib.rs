pub mod colorspace;
pub mod legacy_api;
pub mod scale;

/// mDNS service type advertised by Hue bridges
pub const HUE_SERVICE_TYPE: &str = "_hue._tcp";

/// Lowest brightness step a Hue light accepts while on
pub const MIN_CAPABLE_BRIGHTNESS: u8 = 1;

/// Highest brightness step a Hue light accepts
pub const MAX_CAPABLE_BRIGHTNESS: u8 = 254;

/// Warmest color temperature (in mirek) supported by ambiance lights
pub const WARMEST_CAPABLE_MIREK: u16 = 500;

/// Coldest color temperature (in mirek) supported by ambiance lights
pub const COLDEST_CAPABLE_MIREK: u16 = 153;
