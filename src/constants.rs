/// Well-known catalog entry names and validation bounds, kept in one place
/// so the reconciler, seeding, and validators agree on them.

// Sentinel entries whose selection requires a free-text value
pub const OCCUPATION_OTHER: &str = "Other";
pub const SPECIFIC_NEED_OTHER: &str = "Others";

/// Connective words the label formatter keeps lowercase unless they lead the phrase
pub const CONNECTIVES: &[&str] = &["of", "the", "and"];

// Free-text label bounds (occupation override, custom specific needs)
pub const LABEL_MIN_LEN: usize = 3;
pub const LABEL_MAX_LEN: usize = 80;

// Participant field constraints
pub const NAME_MIN_LEN: usize = 2;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const MIN_AGE_YEARS: i32 = 12;
pub const CPF_LEN: usize = 11;
