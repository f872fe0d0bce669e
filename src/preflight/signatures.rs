//! Output signatures of the known helper strategies
//!
//! This is a compatibility shim against the compiler's textual output format.
//! Bump [`SIGNATURES_VERSION`] whenever a rule changes so that the change is
//! visible in logs.

use lazy_static::lazy_static;
use regex::Regex;

use super::HelperStrategy;

/// Revision of the matching rules below
pub const SIGNATURES_VERSION: u32 = 1;

/// Any of these in the probe output means `export default` survived
const DEFAULT_EXPORT_MARKERS: &[&str] = &[
    "export default",
    "export default Foo",
    "export { Foo as default }",
];

lazy_static! {
    static ref RUNTIME_HELPER_PATH: Regex = Regex::new(r"/helpers/(esm/)?inherits").unwrap();
}

const INLINE_HELPER_DEFINITION: &str = "function _inherits";

const EXTERNAL_HELPERS_REFERENCE: &str = "babelHelpers";

/// Classes were not transpiled, so no helper signal is visible yet
pub fn has_class_declaration(code: &str) -> bool {
    code.contains("class ")
}

pub fn keeps_default_export(code: &str) -> bool {
    DEFAULT_EXPORT_MARKERS.iter().any(|marker| code.contains(marker))
}

/// Match probe output against the known strategies, in priority order
pub fn match_strategy(code: &str) -> Option<HelperStrategy> {
    if RUNTIME_HELPER_PATH.is_match(code) {
        Some(HelperStrategy::Runtime)
    } else if code.contains(INLINE_HELPER_DEFINITION) {
        Some(HelperStrategy::Inline)
    } else if code.contains(EXTERNAL_HELPERS_REFERENCE) {
        Some(HelperStrategy::External)
    } else {
        None
    }
}
