//! CLI Exit Code Registry
//!
//! Single source of truth for `capsheet` exit codes. Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain      | Description                              |
//! |---------|-------------|------------------------------------------|
//! | 0       | Universal   | Success                                  |
//! | 1       | Universal   | General error (unspecified)              |
//! | 2       | Universal   | CLI usage error (bad args)               |
//! | 10-19   | api         | Server unreachable or rejected a request |
//! | 20-29   | worksheet   | Operation not valid in the current state |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `worksheet_exit_code`

use capsheet_api::ApiError;
use capsheet_worksheet::WorksheetError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing confirmation.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// API (10-19)
// =============================================================================

/// Server unreachable (connection refused, timeout).
pub const EXIT_API_NETWORK: u8 = 10;

/// Server answered with a non-success status.
pub const EXIT_API_HTTP: u8 = 11;

/// Scenario (or other resource) does not exist.
pub const EXIT_API_NOT_FOUND: u8 = 12;

/// Scenario name already taken for this user.
pub const EXIT_API_DUPLICATE: u8 = 13;

/// Response body could not be decoded.
pub const EXIT_API_PARSE: u8 = 14;

// =============================================================================
// Worksheet (20-29)
// =============================================================================

/// Command needs a loaded scenario.
pub const EXIT_NO_SCENARIO: u8 = 20;

/// Unknown or malformed capability / control id.
pub const EXIT_SELECTION: u8 = 21;

/// Capability tree could not be loaded.
pub const EXIT_TREE_UNAVAILABLE: u8 = 22;

/// Scenario name rejected before reaching the server.
pub const EXIT_INVALID_NAME: u8 = 23;

/// Map a worksheet error to its exit code.
pub fn worksheet_exit_code(err: &WorksheetError) -> u8 {
    match err {
        WorksheetError::Api(api) => api_exit_code(api),
        WorksheetError::Selection(_) => EXIT_SELECTION,
        WorksheetError::NoScenarioBound => EXIT_NO_SCENARIO,
        WorksheetError::TreeNotLoaded => EXIT_TREE_UNAVAILABLE,
        WorksheetError::InvalidName(_) => EXIT_INVALID_NAME,
    }
}

pub fn api_exit_code(err: &ApiError) -> u8 {
    match err {
        ApiError::Network(_) => EXIT_API_NETWORK,
        ApiError::Http(..) => EXIT_API_HTTP,
        ApiError::NotFound(_) => EXIT_API_NOT_FOUND,
        ApiError::DuplicateName(_) => EXIT_API_DUPLICATE,
        ApiError::Parse(_) => EXIT_API_PARSE,
    }
}
