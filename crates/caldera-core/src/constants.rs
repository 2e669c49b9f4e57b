/// Name used in generated `PRODID` values and log lines.
pub const APP_NAME: &str = "caldera";

/// `PRODID` written on every calendar the server generates.
pub const PRODID: &str = const_str::concat!("-//", APP_NAME, "//", APP_NAME, " expansion core//EN");

/// Sub-directory of a collection's cache folder that holds item records.
pub const ITEM_CACHE_DIR: &str = "item";

/// Extension of the per-identity advisory lock file that guards publishing.
pub const LOCK_FILE_EXTENSION: &str = "lock";

/// Extension of in-progress cache records before they are renamed into place.
pub const TEMP_FILE_EXTENSION: &str = "tmp";

/// Extension of stored calendar objects in a filesystem collection.
pub const OBJECT_FILE_EXTENSION: &str = "ics";

/// Widest UTC offset in use anywhere (+14:00), in seconds.
///
/// Floating and all-day values are widened by this much when an absolute
/// bound is needed without knowing the reference zone.
pub const MAX_UTC_OFFSET_SECONDS: i64 = 14 * 3600;
