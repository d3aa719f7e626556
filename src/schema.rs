/// Column-name constants for sheet-reportkit.
/// Single source of truth for every table the pipeline touches.

// ── Normalized long-table columns ───────────────────────────────────────────
pub mod long {
    pub const DATE: &str = "date";
    pub const VALUE: &str = "value";
    pub const COUNT: &str = "count";
}

// ── Fitness sheet columns ───────────────────────────────────────────────────
pub mod fitness {
    pub const CATEGORY: &str = "Category";
    pub const EXERCISE: &str = "Exercise";

    /// Fixed category order used for the per-category report sections.
    pub const CATEGORIES: [&str; 10] = [
        "Push",
        "Pull",
        "Leg",
        "Bicep",
        "Tricep",
        "Shoulder",
        "Calisthenics",
        "Ab",
        "Forearm",
        "Cardio",
    ];
}

// ── Navigation sheet columns (post-rename) ──────────────────────────────────
pub mod nav {
    pub const DATE_OF_ACTIVITY: &str = "Date of Activity";
    pub const PERSON: &str = "Person";
    pub const DURATION: &str = "Activity Duration";
    pub const TRAVEL: &str = "Travel";
    pub const LOCATION: &str = "Location";
    pub const SUPPORT: &str = "Support";
    pub const INSURANCE: &str = "Insurance";
    pub const STATUS: &str = "Status";
    pub const GENDER: &str = "Gender";
    pub const ETHNICITY: &str = "Ethnicity";
    pub const HOUSING: &str = "Housing";
    pub const INCOME: &str = "Income";
    pub const FIRST_NAME: &str = "Individual's First Name:";
    pub const LAST_NAME: &str = "Individual's Last Name:";
    pub const FULL_NAME: &str = "Full Name";
    pub const DATE_OF_BIRTH: &str = "Individual's Date of Birth:";
    pub const ZIP: &str = "ZIP Code:";
    pub const AGE_GROUP: &str = "Age Group";
}

// ── Canonical sentinel labels ───────────────────────────────────────────────
pub mod labels {
    pub const NOT_AVAILABLE: &str = "N/A";
    pub const UNKNOWN: &str = "Unknown";
}

// ── Age bands ───────────────────────────────────────────────────────────────
pub mod age {
    /// Ordinal presentation order; unmapped bands ("N/A") sort after these.
    pub const BANDS: [&str; 9] = [
        "0-9", "10-19", "20-29", "30-39", "40-49", "50-59", "60-69", "70-79", "80+",
    ];
}

// ── Period selector values ──────────────────────────────────────────────────
pub mod period {
    pub const ALL_TIME: &str = "All Time";

    pub const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
}
