//! Typed errors for the tagwarden engine
//!
//! Soft conditions (unknown rule discriminators) never surface here; they are
//! absorbed by the evaluator as logged no-ops. Everything in this enum is
//! fatal to the call that produced it.

use crate::cloud::CloudError;
use thiserror::Error;

/// Errors produced by the engine, discovery, and backup layers
#[derive(Debug, Error)]
pub enum Error {
    /// Rule document could not be read or parsed
    #[error("can't parse rules from '{path}'")]
    Rules {
        path: String,
        #[source]
        source: ParseError,
    },

    /// Listing the resource groups failed; the whole discovery call is void
    #[error("could not obtain resource groups")]
    GroupList(#[source] CloudError),

    /// A discovery worker failed inside one group; the whole call is void
    #[error("scan failed in resource group '{group}'")]
    GroupScan {
        group: String,
        #[source]
        source: CloudError,
    },

    /// A remote mutation failed; dispatch aborted, prior mutations stand
    #[error("action '{action}' of rule '{rule}' did not succeed for resource '{resource}'")]
    Action {
        rule: String,
        resource: String,
        action: String,
        #[source]
        source: CloudError,
    },

    /// A restore write failed; the restore run aborted, prior restores stand
    #[error("cannot restore tags for resource '{resource}'")]
    Restore {
        resource: String,
        #[source]
        source: CloudError,
    },

    /// Backup snapshot could not be written
    #[error("can't write backup file '{path}'")]
    BackupWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Backup file could not be read back
    #[error("can't read backup file '{path}'")]
    BackupRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Backup file contents are not a valid snapshot
    #[error("can't parse backup file '{path}'")]
    BackupParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Underlying cause of a rule document parse failure
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("error opening the file: {0}")]
    Io(#[from] std::io::Error),

    #[error("can't unmarshal json rules: {0}")]
    Json(#[from] serde_json::Error),

    #[error("can't unmarshal yaml rules: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
