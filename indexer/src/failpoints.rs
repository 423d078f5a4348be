use fail::fail_point;

use crate::error::IndexResult;

/// Evaluated before every index-store batch written by incremental maintenance.
pub const INDEX_MAINTENANCE__BEFORE_WRITE: &str = "index_maintenance.before_write";

/// Evaluated before every index-store batch written by a rebuild.
pub const INDEX_REBUILD__BEFORE_WRITE: &str = "index_rebuild.before_write";

/// Returns an error when the named failpoint is configured with `return`.
///
/// The optional parameter is copied into the error detail.
#[cfg_attr(not(feature = "failpoints"), allow(unused_variables))]
pub fn index_fail_point(name: &str) -> IndexResult<()> {
    fail_point!(name, |parameter| {
        let detail = match parameter {
            Some(parameter) => format!("The failpoint '{name}' returned an error: {parameter}"),
            None => format!("The failpoint '{name}' returned an error"),
        };

        crate::bail!(
            crate::error::ErrorKind::InjectedFault,
            "An error occurred in a fail point",
            detail = detail
        );
    });

    Ok(())
}
