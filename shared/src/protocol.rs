/// Path of the listing endpoint, relative to the config service base URL
pub const SERVICES_PATH: &str = "/services";

/// Environment variable holding the config service base URL
pub const ENV_CONFIG_URL: &str = "JARVIS_CONFIG_URL";

/// Environment variable selecting the URL style the service should return
pub const ENV_URL_STYLE: &str = "JARVIS_CONFIG_URL_STYLE";

/// Query parameter carrying the URL style
pub const STYLE_PARAM: &str = "style";

/// URL style for containers that reach the host through host.docker.internal
pub const STYLE_DOCKERIZED: &str = "dockerized";

/// Defaults applied to listing entries that omit the field
pub const DEFAULT_HEALTH_PATH: &str = "/health";
pub const DEFAULT_SCHEME: &str = "http";
