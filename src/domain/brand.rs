//! Brand classification by title substring

/// Token used when no known brand appears in a title.
pub const UNCLASSIFIED_BRAND: &str = "OUTROS";

/// Known brands in match priority order. Earlier entries win, so a title
/// mentioning both an OEM and a chipset vendor is attributed to the OEM.
pub const KNOWN_BRANDS: &[&str] = &[
    "ASUS",
    "MSI",
    "GIGABYTE",
    "ASROCK",
    "GALAX",
    "PNY",
    "INTEL",
    "AMD",
    "CORSAIR",
    "KINGSTON",
    "XPG",
    "LOGITECH",
    "RAZER",
    "REDRAGON",
    "SAMSUNG",
    "LG",
    "AOC",
    "HUSKY",
    "MANCER",
    "PICHAU",
    "NVIDIA",
    "ZOTAC",
    "COLORFUL",
    "GAINWARD",
    "SAPPHIRE",
    "POWERCOLOR",
    "XFX",
    "INNO3D",
];

/// Return the first known brand contained in `title` (case-insensitive),
/// or [`UNCLASSIFIED_BRAND`].
#[must_use]
pub fn classify_brand(title: &str) -> &'static str {
    let upper = title.to_uppercase();
    KNOWN_BRANDS
        .iter()
        .copied()
        .find(|brand| upper.contains(brand))
        .unwrap_or(UNCLASSIFIED_BRAND)
}
