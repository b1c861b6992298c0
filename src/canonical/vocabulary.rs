//! The canonical region vocabulary and its correction table.
//!
//! Keys in [`CORRECTIONS`] are written in their cleaned form (title-cased,
//! single-spaced, `&` already expanded to `And`), since lookups happen after
//! cleaning.

/// Bumped whenever [`CORRECTIONS`] or [`CANONICAL_STATES`] changes
pub const CORRECTIONS_VERSION: u32 = 3;

/// The 28 states and 8 union territories
pub const CANONICAL_STATES: [&str; 36] = [
    "Andaman And Nicobar Islands",
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chandigarh",
    "Chhattisgarh",
    "Dadra And Nagar Haveli And Daman And Diu",
    "Delhi",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jammu And Kashmir",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Ladakh",
    "Lakshadweep",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Puducherry",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
];

/// Known variant spellings and the canonical name each resolves to
pub static CORRECTIONS: &[(&str, &str)] = &[
    // Historical renames
    ("Orissa", "Odisha"),
    ("Pondicherry", "Puducherry"),
    ("Uttaranchal", "Uttarakhand"),
    // Misspellings seen in the source exports
    ("Westbengal", "West Bengal"),
    ("West Bangal", "West Bengal"),
    ("West Bengli", "West Bengal"),
    ("Chhatisgarh", "Chhattisgarh"),
    ("Tamilnadu", "Tamil Nadu"),
    ("Andaman And Nicobar", "Andaman And Nicobar Islands"),
    ("Nct Of Delhi", "Delhi"),
    // Territories merged in 2020
    ("Dadra And Nagar Haveli", "Dadra And Nagar Haveli And Daman And Diu"),
    ("Daman And Diu", "Dadra And Nagar Haveli And Daman And Diu"),
    (
        "The Dadra And Nagar Haveli And Daman And Diu",
        "Dadra And Nagar Haveli And Daman And Diu",
    ),
];
