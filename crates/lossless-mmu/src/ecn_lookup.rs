//! ECN rate-profile lookup file parser

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::{MmuError, MmuResult};
use crate::types::{EcnProfile, EcnRateMap};

/// Parse ECN rate-profile lookup file
///
/// File format:
/// ```text
/// # rate(bps)    kmin(KB) kmax(KB) pmax
/// 25000000000    5        200      0.2
/// 100000000000   20       800      0.2
/// ```
///
/// Lines starting with '#' are comments.
/// Empty lines and malformed lines are ignored.
pub fn parse_ecn_lookup_file(path: impl AsRef<Path>) -> MmuResult<EcnRateMap> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| MmuError::io(path.display().to_string(), e))?;

    let reader = BufReader::new(file);
    let mut lookup = EcnRateMap::new();

    for line in reader.lines() {
        let line = line.map_err(|e| MmuError::io(path.display().to_string(), e))?;

        // Skip empty lines and comments
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some((rate, profile)) = EcnProfile::from_line(trimmed) {
            info!(
                "ECN profile for rate {}: kmin={}KB, kmax={}KB, pmax={}",
                rate, profile.kmin_kb, profile.kmax_kb, profile.pmax
            );
            lookup.insert(rate, profile);
        }
    }

    Ok(lookup)
}
