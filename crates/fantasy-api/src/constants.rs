/// Fantasy sports REST API root
pub const BASE_URL: &str = "https://fantasysports.yahooapis.com/fantasy/v2";

/// Game code used when none is configured
pub const DEFAULT_GAME_CODE: &str = "nfl";

/// Per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size for player collections; the API caps a page at 25
pub const DEFAULT_PLAYER_COUNT: u32 = 25;

/// Player collection filters: sort by average rank, active players, offense
pub const PLAYER_SORT: &str = "AR";
pub const PLAYER_STATUS: &str = "A";
pub const PLAYER_POSITION: &str = "O";
