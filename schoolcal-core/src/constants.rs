/// Time sentinel for events without a slot
pub const ALL_DAY: &str = "All Day";

/// Location used when the extractor gives none
pub const DEFAULT_LOCATION: &str = "School";

/// Version written into `meta.version` of every snapshot
pub const SNAPSHOT_SCHEMA_VERSION: &str = "1.0";

/// Version of the pinned baseline file format
pub const BASELINE_FORMAT_VERSION: u32 = 1;

/// Characters of document text sent to the extractor
pub const DEFAULT_MAX_INPUT_CHARS: usize = 8000;

/// Characters of a bad extractor response kept in error messages
pub const RAW_PREVIEW_CHARS: usize = 500;

pub const SNAPSHOT_FILE: &str = "school_calendar_data.json";
pub const EVENTS_FILE: &str = "events.json";
pub const NOTICES_FILE: &str = "notices.json";
pub const ROSTER_FILE: &str = "roster.toml";
pub const LEDGER_FILE: &str = "processed_sources.json";
pub const BASELINE_FILE: &str = "baseline.json";
pub const LOCK_FILE: &str = ".schoolcal.lock";
