//! The parameter surface (spec §6 "Parameter surface"): the subset of
//! user-visible knobs that alter core behavior. Exchanged with a client
//! through a dictionary-style get/set interface in the original; here it's
//! a plain serde-derived struct, the same pattern the teacher uses for
//! `PdfConformance`/`CustomPdfConformance` in `conformance.rs`.

use serde_derive::{Deserialize, Serialize};

/// Default `XRefCacheLifetime`: number of pages a page-tagged cache entry
/// survives before it becomes eligible for sweep.
pub const DEFAULT_XREF_CACHE_LIFETIME: i32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoreParams {
    /// Pages a page-tagged cache entry survives (spec §6).
    pub xref_cache_lifetime: i32,
    /// Propagated into every `FlateDecode` filter's args dict (spec §4.D
    /// step 3).
    pub error_on_flate_checksum_failure: bool,
    pub error_on_pdf_repair: bool,
    pub pdfx_verify_external_profile_checksums: bool,
    pub size_page_to_bounding_box: bool,
    pub optimized_pdf_scan_limit_percent: i32,
    pub optimized_pdf_cache_size: i32,
    pub optimized_pdf_scan_window: i32,
    pub optimized_pdf_image_threshold: i32,
}

impl Default for CoreParams {
    fn default() -> Self {
        CoreParams {
            xref_cache_lifetime: DEFAULT_XREF_CACHE_LIFETIME,
            error_on_flate_checksum_failure: true,
            error_on_pdf_repair: false,
            pdfx_verify_external_profile_checksums: false,
            size_page_to_bounding_box: false,
            optimized_pdf_scan_limit_percent: 0,
            optimized_pdf_cache_size: 0,
            optimized_pdf_scan_window: 0,
            optimized_pdf_image_threshold: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let p = CoreParams::default();
        assert_eq!(p.xref_cache_lifetime, 10);
        assert!(p.error_on_flate_checksum_failure);
    }

    #[test]
    fn round_trips_through_json() {
        let p = CoreParams::default();
        let json = serde_json::to_string(&p).unwrap();
        let back: CoreParams = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
